use std::path::Path;

use chrono::{DateTime, FixedOffset, Local};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::transport::NfseReceipt;
use crate::core::{Customer, DpsId, EmissionRequest, Environment, NfseError, Provider, Service, save_template};

/// `YYYYMMDD_HHMMSS` in local time, used in artifact names.
pub fn artifact_timestamp() -> String {
    Local::now().format("%Y%m%d_%H%M%S").to_string()
}

/// `{timestamp}_{provider}_{customer}.{extension}`.
pub fn artifact_name(timestamp: &str, provider_doc: &str, customer_doc: &str, extension: &str) -> String {
    format!("{timestamp}_{provider_doc}_{customer_doc}.{extension}")
}

/// Outcome of the API call as recorded in the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiOutcome {
    #[serde(rename = "sucesso")]
    pub success: bool,
    pub status_code: u16,
    #[serde(rename = "dados")]
    pub data: serde_json::Value,
    #[serde(rename = "erro")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
}

impl ApiOutcome {
    pub fn from_result(result: &Result<NfseReceipt, NfseError>) -> Self {
        match result {
            Ok(receipt) => Self {
                success: true,
                status_code: receipt.status,
                data: serde_json::to_value(receipt).unwrap_or(serde_json::Value::Null),
                error: None,
                dry_run: receipt.dry_run,
            },
            Err(err) => Self {
                success: false,
                status_code: match err {
                    NfseError::Api { status, .. } => status.unwrap_or(0),
                    _ => 0,
                },
                data: serde_json::Value::Object(serde_json::Map::new()),
                error: Some(err.to_string()),
                dry_run: false,
            },
        }
    }
}

/// Host and build information.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogMetadata {
    pub sistema_operacional: String,
    pub arquitetura: String,
    pub versao_nfse: String,
}

impl Default for LogMetadata {
    fn default() -> Self {
        Self {
            sistema_operacional: std::env::consts::OS.into(),
            arquitetura: std::env::consts::ARCH.into(),
            versao_nfse: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Structured record of one emission attempt, saved under `logs/`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmissionLog {
    pub timestamp: String,
    #[serde(rename = "ambiente")]
    pub environment: Environment,
    pub dry_run: bool,
    #[serde(rename = "prestador")]
    pub provider: Provider,
    #[serde(rename = "tomador")]
    pub customer: Customer,
    #[serde(rename = "servico")]
    pub service: Service,
    #[serde(rename = "valor")]
    pub value: Decimal,
    #[serde(rename = "data_emissao")]
    pub issued_at: DateTime<FixedOffset>,
    #[serde(rename = "id_dps")]
    pub dps_id: String,
    #[serde(rename = "resposta_api")]
    pub response: ApiOutcome,
    #[serde(rename = "metadados")]
    pub metadata: LogMetadata,
}

impl EmissionLog {
    pub fn new(
        timestamp: impl Into<String>,
        environment: Environment,
        dry_run: bool,
        request: &EmissionRequest,
        dps_id: &DpsId,
        response: ApiOutcome,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            environment,
            dry_run,
            provider: request.provider.clone(),
            customer: request.customer.clone(),
            service: request.service.clone(),
            value: request.value,
            issued_at: request.issued_at,
            dps_id: dps_id.as_str().to_string(),
            response,
            metadata: LogMetadata::default(),
        }
    }

    /// Pretty JSON, parent directories created.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NfseError> {
        save_template(self, path)
    }

    pub fn file_name(&self) -> String {
        artifact_name(
            &self.timestamp,
            self.provider.document(),
            self.customer.document(),
            "json",
        )
    }
}
