//! Transport encoding of DPS and NFS-e documents: gzip, then standard base64.

use std::io::{Read, Write};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use flate2::Compression;
use flate2::bufread::GzDecoder;
use flate2::write::GzEncoder;
use thiserror::Error;

use super::tree::Element;
use crate::core::NfseError;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("gzip stream error: {0}")]
    Gzip(#[from] std::io::Error),

    #[error("{0} bytes of trailing data after the gzip stream")]
    TrailingData(usize),

    #[error("decompressed payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

impl From<CodecError> for NfseError {
    fn from(err: CodecError) -> Self {
        NfseError::Codec(err.to_string())
    }
}

/// Serialize `document` with its XML declaration, gzip it and base64-encode
/// the result.
pub fn compress(document: &Element) -> Result<String, CodecError> {
    compress_str(&document.to_xml())
}

/// Gzip and base64-encode an already serialized document.
pub fn compress_str(xml: &str) -> Result<String, CodecError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(xml.as_bytes())?;
    let gz = encoder.finish()?;
    Ok(STANDARD.encode(gz))
}

/// Reverse of [`compress`]: base64-decode, gunzip and read as UTF-8.
///
/// The payload must hold exactly one gzip member.
pub fn decompress(payload: &str) -> Result<String, CodecError> {
    let gz = STANDARD.decode(payload.trim())?;
    let mut decoder = GzDecoder::new(gz.as_slice());
    let mut raw = Vec::new();
    decoder.read_to_end(&mut raw)?;
    let rest = decoder.into_inner();
    if !rest.is_empty() {
        return Err(CodecError::TrailingData(rest.len()));
    }
    Ok(String::from_utf8(raw)?)
}
