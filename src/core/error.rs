use thiserror::Error;

use super::checksum::ChecksumError;

/// Errors that can occur while preparing, signing or transmitting a DPS.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum NfseError {
    /// A CNPJ or CPF failed its check-digit verification.
    #[error("checksum error: {0}")]
    Checksum(#[from] ChecksumError),

    /// One or more validation rules failed.
    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    /// DPS assembly hit a value it cannot encode (missing identifier, field overflow).
    #[error("builder error: {0}")]
    Builder(String),

    /// XML-DSig signing or verification failed.
    #[error("signing error: {0}")]
    Signing(String),

    /// Certificate could not be loaded or is not usable for signing.
    #[error("certificate error: {0}")]
    Certificate(String),

    /// Gzip/base64 encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),

    /// XML parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// A JSON template could not be read or was rejected.
    #[error("template error: {0}")]
    Template(String),

    /// Configuration file could not be read or written.
    #[error("config error: {0}")]
    Config(String),

    /// The NFS-e API rejected the request or could not be reached.
    #[error("API error{}: {message}", .status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
    Api { status: Option<u16>, message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl NfseError {
    /// Process exit code for this error category.
    ///
    /// 1 = input validation, 2 = certificate or signing, 3 = API or payload,
    /// 4 = files and configuration.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Checksum(_) | Self::Validation(_) | Self::Builder(_) => 1,
            Self::Signing(_) | Self::Certificate(_) => 2,
            Self::Api { .. } | Self::Codec(_) | Self::Xml(_) => 3,
            Self::Template(_) | Self::Config(_) | Self::Io(_) => 4,
        }
    }
}

impl From<ValidationError> for NfseError {
    fn from(err: ValidationError) -> Self {
        Self::Validation(vec![err])
    }
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "regTrib.opSimpNac").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// Fiscal rule ID if applicable (e.g. "NFSE-INCID").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a rule ID.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error tied to a fiscal rule.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }

    /// Prefix the field path with the enclosing element, e.g. `end` + `CEP` -> `end.CEP`.
    pub fn nested(mut self, parent: &str) -> Self {
        self.field = format!("{parent}.{}", self.field);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_rule() {
        let plain = ValidationError::new("xNome", "must not be empty");
        assert_eq!(plain.to_string(), "xNome: must not be empty");

        let ruled = ValidationError::with_rule("aliquota", "too high", "NFSE-ALIQ-MAX");
        assert_eq!(ruled.to_string(), "[NFSE-ALIQ-MAX] aliquota: too high");
    }

    #[test]
    fn nested_prefixes_field() {
        let err = ValidationError::new("CEP", "bad").nested("end");
        assert_eq!(err.field, "end.CEP");
    }

    #[test]
    fn exit_codes_by_category() {
        assert_eq!(NfseError::Validation(vec![]).exit_code(), 1);
        assert_eq!(NfseError::Signing("x".into()).exit_code(), 2);
        assert_eq!(NfseError::Certificate("x".into()).exit_code(), 2);
        let api = NfseError::Api {
            status: Some(400),
            message: "bad".into(),
        };
        assert_eq!(api.exit_code(), 3);
        assert_eq!(api.to_string(), "API error (HTTP 400): bad");
        assert_eq!(NfseError::Config("x".into()).exit_code(), 4);
    }

    #[test]
    fn validation_display_joins_all() {
        let err = NfseError::Validation(vec![
            ValidationError::new("a", "one"),
            ValidationError::new("b", "two"),
        ]);
        assert_eq!(err.to_string(), "validation failed: a: one; b: two");
    }
}
