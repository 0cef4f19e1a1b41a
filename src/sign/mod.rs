//! Enveloped XML-DSig signatures for DPS documents.
//!
//! Signing material is an RSA private key plus its X.509 certificate chain,
//! loaded from a PEM bundle ([`PemFile`]) or, with feature `pkcs12`, from a
//! PKCS#12 archive ([`Pkcs12File`]). The `Signature` element written by
//! [`DpsSigner`] carries no namespace prefix.

mod c14n;
mod certificate;
mod material;
mod signer;

use rsa::Pkcs1v15Sign;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use thiserror::Error;

pub use crate::core::DigestAlgorithm;
use crate::core::NfseError;

pub use certificate::*;
pub use material::*;
pub use signer::*;

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SigningError {
    #[error("invalid private key: {0}")]
    Key(String),

    #[error("invalid certificate: {0}")]
    Certificate(String),

    #[error("document cannot be signed: {0}")]
    Document(String),

    #[error("RSA operation failed: {0}")]
    Crypto(String),

    #[error("signature verification failed: {0}")]
    Verification(String),
}

impl From<SigningError> for NfseError {
    fn from(err: SigningError) -> Self {
        match err {
            SigningError::Certificate(msg) => NfseError::Certificate(msg),
            other => NfseError::Signing(other.to_string()),
        }
    }
}

impl DigestAlgorithm {
    pub fn hash(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha1 => Sha1::digest(data).to_vec(),
            Self::Sha256 => Sha256::digest(data).to_vec(),
        }
    }

    fn padding(self) -> Pkcs1v15Sign {
        match self {
            Self::Sha1 => Pkcs1v15Sign::new::<Sha1>(),
            Self::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uris_round_trip() {
        for alg in [DigestAlgorithm::Sha1, DigestAlgorithm::Sha256] {
            assert_eq!(DigestAlgorithm::from_digest_uri(alg.digest_uri()), Some(alg));
            assert_eq!(DigestAlgorithm::from_signature_uri(alg.signature_uri()), Some(alg));
        }
        assert_eq!(DigestAlgorithm::from_digest_uri("urn:md5"), None);
    }

    #[test]
    fn hash_lengths() {
        assert_eq!(DigestAlgorithm::Sha1.hash(b"dps").len(), 20);
        assert_eq!(DigestAlgorithm::Sha256.hash(b"dps").len(), 32);
    }

    #[test]
    fn certificate_errors_keep_their_category() {
        let err: NfseError = SigningError::Certificate("expired".into()).into();
        assert_eq!(err.exit_code(), 2);
        assert!(matches!(err, NfseError::Certificate(_)));
    }
}
