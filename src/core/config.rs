//! Persisted `config.json`.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::error::NfseError;
use super::numbering::DpsSequence;
use super::types::{DigestAlgorithm, Environment};

pub const DEFAULT_CONFIG_FILE: &str = "config.json";

/// Base URLs of the national API (ADN) per environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiUrls {
    pub producao: String,
    pub producaorestrita: String,
}

impl Default for ApiUrls {
    fn default() -> Self {
        Self {
            producao: "https://adn.nfse.gov.br".into(),
            producaorestrita: "https://adn.producaorestrita.nfse.gov.br".into(),
        }
    }
}

/// Default template files used when `emitir` is called without paths.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prestador: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tomador: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servicos: Option<PathBuf>,
}

/// Application configuration.
///
/// Unknown or missing keys fall back to defaults, so older files keep loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    #[serde(rename = "ambiente")]
    pub environment: Environment,
    /// Simulate transmission instead of calling the API.
    pub dry_run: bool,
    /// HTTP timeout in seconds.
    pub timeout: u64,
    pub urls: ApiUrls,
    /// PKCS#12 certificate bundle.
    #[serde(rename = "arquivo_cert_pfx")]
    pub certificate_pfx: PathBuf,
    /// File holding the PKCS#12 passphrase.
    #[serde(rename = "arquivo_cert_senha")]
    pub certificate_password_file: PathBuf,
    /// PEM bundle (key + chain); takes precedence over the PKCS#12 file.
    #[serde(
        rename = "arquivo_cert_pem",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub certificate_pem: Option<PathBuf>,
    #[serde(rename = "serie")]
    pub series: u32,
    #[serde(rename = "proximo_numero")]
    pub next_number: u64,
    #[serde(rename = "versao_aplicativo")]
    pub app_version: String,
    /// Digest of the XML signature: `sha256` or `sha1`.
    #[serde(rename = "algoritmo_digest")]
    pub digest: DigestAlgorithm,
    pub defaults: TemplateDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: Environment::Restricted,
            dry_run: true,
            timeout: 30,
            urls: ApiUrls::default(),
            certificate_pfx: PathBuf::from("cert/certificado.pfx"),
            certificate_password_file: PathBuf::from("cert/certificado.secret"),
            certificate_pem: None,
            series: 1,
            next_number: 1,
            app_version: concat!("nfse-", env!("CARGO_PKG_VERSION")).into(),
            digest: DigestAlgorithm::Sha256,
            defaults: TemplateDefaults::default(),
        }
    }
}

/// Settings the assembler takes from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DpsSettings {
    pub environment: Environment,
    pub series: u32,
    pub number: u64,
    pub app_version: String,
}

impl Config {
    /// Load from `path`; a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NfseError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)
            .map_err(|e| NfseError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| NfseError::Config(format!("invalid {}: {e}", path.display())))
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NfseError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let text = serde_json::to_string_pretty(self)
            .map_err(|e| NfseError::Config(format!("cannot serialize config: {e}")))?;
        fs::write(path, text)
            .map_err(|e| NfseError::Config(format!("cannot write {}: {e}", path.display())))
    }

    /// Base URL for the configured environment, without trailing slash.
    pub fn api_url(&self) -> &str {
        let url = match self.environment {
            Environment::Production => &self.urls.producao,
            Environment::Restricted => &self.urls.producaorestrita,
        };
        url.trim_end_matches('/')
    }

    pub fn sequence(&self) -> DpsSequence {
        DpsSequence::starting_at(self.series, self.next_number)
    }

    /// Settings for the next DPS, using the current `next_number`.
    pub fn dps_settings(&self) -> DpsSettings {
        DpsSettings {
            environment: self.environment,
            series: self.series,
            number: self.next_number,
            app_version: self.app_version.clone(),
        }
    }

    /// Record that `next_number` was used.
    pub fn advance_number(&mut self) -> Result<(), NfseError> {
        let mut seq = self.sequence();
        seq.next_number()?;
        self.next_number = seq.peek();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.environment, Environment::Restricted);
        assert!(config.dry_run);
        assert_eq!(config.api_url(), "https://adn.producaorestrita.nfse.gov.br");
        assert_eq!(config.dps_settings().number, 1);
    }

    #[test]
    fn partial_file_loads() {
        let json = r#"{"ambiente": "producao", "serie": 7, "urls": {"producao": "https://example.test/"}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.environment, Environment::Production);
        assert_eq!(config.series, 7);
        assert_eq!(config.api_url(), "https://example.test");
        assert_eq!(config.timeout, 30);
        assert_eq!(config.digest, DigestAlgorithm::Sha256);
        assert_eq!(
            config.urls.producaorestrita,
            "https://adn.producaorestrita.nfse.gov.br"
        );
    }

    #[test]
    fn advance_number_increments() {
        let mut config = Config {
            next_number: 41,
            ..Config::default()
        };
        config.advance_number().unwrap();
        assert_eq!(config.next_number, 42);
    }

    #[test]
    fn serializes_portuguese_keys() {
        let value = serde_json::to_value(Config::default()).unwrap();
        assert_eq!(value["ambiente"], "producaorestrita");
        assert_eq!(value["proximo_numero"], 1);
        assert_eq!(value["arquivo_cert_pfx"], "cert/certificado.pfx");
        assert!(value.get("arquivo_cert_pem").is_none());
        assert_eq!(value["algoritmo_digest"], "sha256");
    }

    #[test]
    fn digest_round_trips() {
        let config: Config = serde_json::from_str(r#"{"algoritmo_digest": "sha1"}"#).unwrap();
        assert_eq!(config.digest, DigestAlgorithm::Sha1);
        let back: Config =
            serde_json::from_value(serde_json::to_value(&config).unwrap()).unwrap();
        assert_eq!(back, config);

        assert!(serde_json::from_str::<Config>(r#"{"algoritmo_digest": "md5"}"#).is_err());
        assert_eq!("SHA-1".parse::<DigestAlgorithm>(), Ok(DigestAlgorithm::Sha1));
    }
}
