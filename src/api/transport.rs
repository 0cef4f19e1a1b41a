use serde::{Deserialize, Serialize};

use crate::core::{Environment, NfseError};
use crate::dps::{CodecError, decompress};

/// Access key returned by the dry-run transport.
pub const DRY_RUN_ACCESS_KEY: &str = "00000000000000000000000000000000000000000000000000";

/// Response body of `POST /nfse` and `GET /nfse/{chaveAcesso}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NfseReceipt {
    /// HTTP status of the response; not part of the body.
    #[serde(skip)]
    pub status: u16,
    #[serde(rename = "tipoAmbiente", default, skip_serializing_if = "Option::is_none")]
    pub environment: Option<u8>,
    #[serde(rename = "versaoAplicativo", default, skip_serializing_if = "Option::is_none")]
    pub app_version: Option<String>,
    #[serde(rename = "dataHoraProcessamento", default, skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<String>,
    #[serde(rename = "chaveAcesso", default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(rename = "nfseXmlGZipB64", default, skip_serializing_if = "Option::is_none")]
    pub nfse_xml_gzip_b64: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub dry_run: bool,
    /// Fields not modelled above (alerts, `idDps`, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NfseReceipt {
    /// Decoded NFS-e XML, or `None` when the response carries none.
    pub fn nfse_xml(&self) -> Result<Option<String>, CodecError> {
        match self.nfse_xml_gzip_b64.as_deref() {
            Some(payload) if !payload.trim().is_empty() => decompress(payload).map(Some),
            _ => Ok(None),
        }
    }
}

/// Operations of the NFS-e API.
pub trait NfseTransport {
    /// Submit a signed DPS, gzip+base64 encoded.
    fn emit(&self, compressed_dps: &str) -> Result<NfseReceipt, NfseError>;

    /// Fetch an issued NFS-e by its access key.
    fn query(&self, access_key: &str) -> Result<NfseReceipt, NfseError>;

    /// Download the DANFSe PDF of an issued NFS-e.
    fn download_danfse(&self, access_key: &str) -> Result<Vec<u8>, NfseError>;
}

/// Simulated API: emission always succeeds, nothing is sent.
#[derive(Debug, Clone, Copy, Default)]
pub struct DryRunTransport {
    pub environment: Environment,
}

impl DryRunTransport {
    pub fn new(environment: Environment) -> Self {
        Self { environment }
    }

    fn unavailable(what: &str) -> NfseError {
        NfseError::Api {
            status: None,
            message: format!("{what} is not available in dry-run mode"),
        }
    }
}

impl NfseTransport for DryRunTransport {
    fn emit(&self, compressed_dps: &str) -> Result<NfseReceipt, NfseError> {
        tracing::warn!(
            payload_len = compressed_dps.len(),
            "dry run: DPS not sent to the API"
        );
        Ok(NfseReceipt {
            status: 201,
            environment: Some(self.environment.tp_amb()),
            app_version: Some("simulado".into()),
            processed_at: Some("2024-01-01T00:00:00-03:00".into()),
            access_key: Some(DRY_RUN_ACCESS_KEY.into()),
            nfse_xml_gzip_b64: Some(String::new()),
            dry_run: true,
            extra: serde_json::Map::new(),
        })
    }

    fn query(&self, _access_key: &str) -> Result<NfseReceipt, NfseError> {
        Err(Self::unavailable("NFS-e query"))
    }

    fn download_danfse(&self, _access_key: &str) -> Result<Vec<u8>, NfseError> {
        Err(Self::unavailable("DANFSe download"))
    }
}
