use std::time::Duration;

use reqwest::blocking::{Client, Response};
use secrecy::ExposeSecret;
use serde::Serialize;

use super::Verbosity;
use super::transport::{NfseReceipt, NfseTransport};
use crate::core::{Config, NfseError};
use crate::sign::SigningMaterial;

#[derive(Serialize)]
struct EmitRequest<'a> {
    dps: &'a str,
}

/// mTLS client for the national API.
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    timeout: u64,
    verbosity: Verbosity,
}

impl HttpTransport {
    /// Build a client for the configured environment, authenticating with
    /// the certificate of `material`.
    pub fn new(
        config: &Config,
        material: &SigningMaterial,
        verbosity: Verbosity,
    ) -> Result<Self, NfseError> {
        let identity = reqwest::Identity::from_pem(material.pem_bundle().expose_secret())
            .map_err(|e| NfseError::Certificate(format!("cannot build TLS identity: {e}")))?;
        let client = Client::builder()
            .identity(identity)
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .map_err(|e| NfseError::Api {
                status: None,
                message: format!("cannot build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            base_url: config.api_url().to_string(),
            timeout: config.timeout,
            verbosity,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn network_error(&self, e: reqwest::Error) -> NfseError {
        let message = if e.is_timeout() {
            format!("API did not respond within {} seconds", self.timeout)
        } else if e.is_connect() {
            format!("cannot connect to the API: {e}")
        } else {
            format!("network error: {e}")
        };
        NfseError::Api {
            status: None,
            message,
        }
    }

    /// Read the body and fail on non-success statuses.
    fn body(&self, response: Response, accepted: &[u16]) -> Result<(u16, String), NfseError> {
        let status = response.status().as_u16();
        let body = response.text().map_err(|e| self.network_error(e))?;
        if self.verbosity.is_verbose() {
            tracing::debug!(status, body = %body, "API response");
        }
        if !accepted.contains(&status) {
            return Err(NfseError::Api {
                status: Some(status),
                message: error_message(&body),
            });
        }
        Ok((status, body))
    }

    fn receipt(status: u16, body: &str) -> Result<NfseReceipt, NfseError> {
        let mut receipt: NfseReceipt = serde_json::from_str(body).map_err(|e| NfseError::Api {
            status: Some(status),
            message: format!("unexpected response body: {e}"),
        })?;
        receipt.status = status;
        Ok(receipt)
    }
}

impl NfseTransport for HttpTransport {
    fn emit(&self, compressed_dps: &str) -> Result<NfseReceipt, NfseError> {
        let url = format!("{}/nfse", self.base_url);
        tracing::info!(url = %url, "sending DPS");
        let response = self
            .client
            .post(&url)
            .json(&EmitRequest {
                dps: compressed_dps,
            })
            .send()
            .map_err(|e| self.network_error(e))?;
        let (status, body) = self.body(response, &[200, 201])?;
        Self::receipt(status, &body)
    }

    fn query(&self, access_key: &str) -> Result<NfseReceipt, NfseError> {
        let url = format!("{}/nfse/{access_key}", self.base_url);
        tracing::info!(url = %url, "querying NFS-e");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.network_error(e))?;
        let (status, body) = self.body(response, &[200])?;
        Self::receipt(status, &body)
    }

    fn download_danfse(&self, access_key: &str) -> Result<Vec<u8>, NfseError> {
        let url = format!("{}/danfse/{access_key}", self.base_url);
        tracing::info!(url = %url, "downloading DANFSe");
        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|e| self.network_error(e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().unwrap_or_default();
            return Err(NfseError::Api {
                status: Some(status),
                message: error_message(&body),
            });
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let pdf = response.bytes().map_err(|e| self.network_error(e))?.to_vec();
        if !is_pdf(&content_type, &pdf) {
            return Err(NfseError::Api {
                status: Some(status),
                message: format!("response is not a PDF (Content-Type: {content_type})"),
            });
        }
        Ok(pdf)
    }
}

/// `mensagem` of a JSON error body, else the raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("mensagem").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

fn is_pdf(content_type: &str, body: &[u8]) -> bool {
    content_type.to_ascii_lowercase().contains("pdf") || body.starts_with(b"%PDF")
}
