//! Reusable JSON templates for provider, customer and service.

use std::fs;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::error::NfseError;
use super::types::{Customer, Provider, Service};

/// Per-emission fields that must be passed on the command line instead.
const PER_EMISSION_FIELDS: &[(&str, &str)] = &[("vServ", "--valor"), ("dhEmi", "--data")];

fn read(path: &Path) -> Result<String, NfseError> {
    fs::read_to_string(path)
        .map_err(|e| NfseError::Template(format!("cannot read {}: {e}", path.display())))
}

fn parse<T: DeserializeOwned>(json: &str, what: &str) -> Result<T, NfseError> {
    serde_json::from_str(json).map_err(|e| NfseError::Template(format!("invalid {what}: {e}")))
}

/// Write a template as pretty JSON, creating parent directories.
pub fn save_template<T: Serialize>(value: &T, path: impl AsRef<Path>) -> Result<(), NfseError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| NfseError::Template(format!("cannot serialize {}: {e}", path.display())))?;
    fs::write(path, json)
        .map_err(|e| NfseError::Template(format!("cannot write {}: {e}", path.display())))
}

impl Provider {
    pub fn from_json(json: &str) -> Result<Self, NfseError> {
        parse(json, "provider template")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, NfseError> {
        Self::from_json(&read(path.as_ref())?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NfseError> {
        save_template(self, path)
    }
}

impl Customer {
    pub fn from_json(json: &str) -> Result<Self, NfseError> {
        parse(json, "customer template")
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, NfseError> {
        Self::from_json(&read(path.as_ref())?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NfseError> {
        save_template(self, path)
    }
}

impl Service {
    /// Parse a service template.
    ///
    /// Templates carrying `vServ` or `dhEmi` are rejected: value and date
    /// belong to a single emission.
    pub fn from_json(json: &str) -> Result<Self, NfseError> {
        let value: serde_json::Value = parse(json, "service template")?;
        if let Some(object) = value.as_object() {
            for (field, flag) in PER_EMISSION_FIELDS {
                if object.contains_key(*field) {
                    return Err(NfseError::Template(format!(
                        "service template must not contain '{field}'; pass it with {flag}"
                    )));
                }
            }
        }
        serde_json::from_value(value)
            .map_err(|e| NfseError::Template(format!("invalid service template: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, NfseError> {
        Self::from_json(&read(path.as_ref())?)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NfseError> {
        save_template(self, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_rejects_value_and_date() {
        let json = r#"{"xDescServ": "x", "cTribNac": "010101", "cLocPrestacao": "3550308", "vServ": 10}"#;
        let err = Service::from_json(json).unwrap_err();
        assert!(err.to_string().contains("--valor"));
        assert_eq!(err.exit_code(), 4);

        let json = r#"{"xDescServ": "x", "dhEmi": "2024-01-15"}"#;
        assert!(Service::from_json(json).unwrap_err().to_string().contains("dhEmi"));
    }

    #[test]
    fn malformed_json_is_template_error() {
        assert!(matches!(
            Provider::from_json("{not json"),
            Err(NfseError::Template(_))
        ));
    }
}
