use std::fmt;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use rsa::pkcs1::{DecodeRsaPrivateKey, DecodeRsaPublicKey};
use rsa::pkcs8::DecodePrivateKey;
use rsa::{RsaPrivateKey, RsaPublicKey};
use secrecy::{ExposeSecret, Secret, SecretVec};

use super::SigningError;
use super::certificate::CertificateInfo;

/// RSA private key plus certificate chain, kept in memory only.
///
/// The original PEM bundle is retained for the mTLS identity.
pub struct SigningMaterial {
    bundle: SecretVec<u8>,
    key: RsaPrivateKey,
    certificate: Vec<u8>,
    chain: Vec<Vec<u8>>,
}

impl SigningMaterial {
    /// Load from a PEM bundle holding one unencrypted private key
    /// (`PRIVATE KEY` or `RSA PRIVATE KEY`) and at least one certificate.
    ///
    /// The signing certificate is the one whose public key matches the
    /// private key; the remaining certificates form the chain.
    pub fn from_pem(pem_bundle: &[u8]) -> Result<Self, SigningError> {
        let blocks = pem::parse_many(pem_bundle)
            .map_err(|e| SigningError::Key(format!("PEM parse error: {e}")))?;

        let mut key = None;
        let mut certificates = Vec::new();
        for block in blocks {
            let tag = block.tag().to_string();
            match tag.as_str() {
                "PRIVATE KEY" => {
                    let der: SecretVec<u8> = Secret::new(block.into_contents());
                    key = Some(
                        RsaPrivateKey::from_pkcs8_der(der.expose_secret())
                            .map_err(|e| SigningError::Key(e.to_string()))?,
                    );
                }
                "RSA PRIVATE KEY" => {
                    let der: SecretVec<u8> = Secret::new(block.into_contents());
                    key = Some(
                        RsaPrivateKey::from_pkcs1_der(der.expose_secret())
                            .map_err(|e| SigningError::Key(e.to_string()))?,
                    );
                }
                "ENCRYPTED PRIVATE KEY" => {
                    return Err(SigningError::Key(
                        "encrypted private keys are not supported".into(),
                    ));
                }
                "CERTIFICATE" => certificates.push(block.into_contents()),
                other => tracing::debug!(tag = other, "skipping PEM block"),
            }
        }

        let key = key.ok_or_else(|| SigningError::Key("no private key in PEM bundle".into()))?;
        if certificates.is_empty() {
            return Err(SigningError::Certificate(
                "no certificate in PEM bundle".into(),
            ));
        }

        let public = key.to_public_key();
        let leaf = certificates
            .iter()
            .position(|der| public_key_of(der).is_ok_and(|pk| pk == public))
            .ok_or_else(|| {
                SigningError::Certificate("no certificate matches the private key".into())
            })?;
        let certificate = certificates.remove(leaf);

        Ok(Self {
            bundle: Secret::new(pem_bundle.to_vec()),
            key,
            certificate,
            chain: certificates,
        })
    }

    /// The PEM bundle this material was loaded from.
    pub fn pem_bundle(&self) -> &SecretVec<u8> {
        &self.bundle
    }

    /// DER of the signing certificate.
    pub fn certificate_der(&self) -> &[u8] {
        &self.certificate
    }

    /// Base64 DER of the signing certificate, as written to `X509Certificate`.
    pub fn certificate_base64(&self) -> String {
        STANDARD.encode(&self.certificate)
    }

    /// DER of the intermediate and root certificates, in bundle order.
    pub fn chain(&self) -> &[Vec<u8>] {
        &self.chain
    }

    pub fn info(&self) -> Result<CertificateInfo, SigningError> {
        CertificateInfo::from_der(&self.certificate)
    }

    pub(crate) fn private_key(&self) -> &RsaPrivateKey {
        &self.key
    }
}

impl fmt::Debug for SigningMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SigningMaterial")
            .field("key", &"[REDACTED]")
            .field("certificate_len", &self.certificate.len())
            .field("chain_len", &self.chain.len())
            .finish()
    }
}

/// RSA public key of a DER certificate.
pub(crate) fn public_key_of(certificate_der: &[u8]) -> Result<RsaPublicKey, SigningError> {
    let (_, cert) = x509_parser::parse_x509_certificate(certificate_der)
        .map_err(|e| SigningError::Certificate(format!("X.509 parse error: {e}")))?;
    RsaPublicKey::from_pkcs1_der(&cert.public_key().subject_public_key.data)
        .map_err(|e| SigningError::Certificate(format!("certificate key is not RSA: {e}")))
}
