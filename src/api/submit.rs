use std::fs;
use std::path::{Path, PathBuf};

use super::log::{ApiOutcome, EmissionLog, artifact_name};
use super::transport::{NfseReceipt, NfseTransport};
use crate::core::{Config, DpsId, EmissionRequest, NfseError};
use crate::dps::compress_str;

/// Write `contents` to `path`, creating parent directories.
pub fn write_artifact(path: &Path, contents: impl AsRef<[u8]>) -> Result<(), NfseError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, contents)?;
    tracing::info!(path = %path.display(), "saved");
    Ok(())
}

/// One signed DPS on its way to the API, with the artifacts it leaves in
/// the working directory:
///
/// - `dps/{name}.xml`: the signed DPS
/// - `dps/{name}.b64`: the gzip+base64 payload as sent
/// - `logs/{name}.json`: the [`EmissionLog`]
/// - `nfse/{name}.xml`: the issued NFS-e, when the API returns one
#[derive(Debug, Clone, Copy)]
pub struct Submission<'a> {
    pub dir: &'a Path,
    pub timestamp: &'a str,
    pub request: &'a EmissionRequest,
    pub id: &'a DpsId,
}

impl Submission<'_> {
    pub fn artifact_path(&self, folder: &str, extension: &str) -> PathBuf {
        self.dir.join(folder).join(artifact_name(
            self.timestamp,
            self.request.provider.document(),
            self.request.customer.document(),
            extension,
        ))
    }

    /// Save the signed XML and its payload, send it, and log the outcome.
    ///
    /// Once the API accepts the DPS its number is consumed: `config` is
    /// advanced and saved to `config_path` before anything else can fail.
    /// Failures to store the log or the returned NFS-e are reported as
    /// warnings.
    pub fn submit(
        &self,
        signed_xml: &str,
        transport: &dyn NfseTransport,
        config: &mut Config,
        config_path: &Path,
    ) -> Result<NfseReceipt, NfseError> {
        let payload = compress_str(signed_xml)?;
        write_artifact(&self.artifact_path("dps", "xml"), signed_xml)?;
        write_artifact(&self.artifact_path("dps", "b64"), &payload)?;

        let result = transport.emit(&payload);
        let accepted = result.is_ok();
        if accepted {
            config.advance_number()?;
        }

        let log = EmissionLog::new(
            self.timestamp,
            config.environment,
            config.dry_run,
            self.request,
            self.id,
            ApiOutcome::from_result(&result),
        );
        let log_path = self.dir.join("logs").join(log.file_name());
        if let Err(e) = log.save(&log_path) {
            tracing::warn!(path = %log_path.display(), "cannot save emission log: {e}");
        }

        if accepted {
            config.save(config_path)?;
        }
        let receipt = result?;

        if !receipt.dry_run {
            self.save_nfse(&receipt);
        }
        Ok(receipt)
    }

    fn save_nfse(&self, receipt: &NfseReceipt) {
        let path = self.artifact_path("nfse", "xml");
        match receipt.nfse_xml() {
            Ok(Some(xml)) => {
                if let Err(e) = write_artifact(&path, xml) {
                    tracing::warn!(path = %path.display(), "cannot save NFS-e: {e}");
                }
            }
            Ok(None) => tracing::warn!("API response carries no NFS-e XML"),
            Err(e) => tracing::warn!("cannot decode NFS-e from API response: {e}"),
        }
    }
}
