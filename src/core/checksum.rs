//! Modulus-11 check digits for Brazilian taxpayer identifiers.
//!
//! - CNPJ: 14 digits identifying an organization.
//! - CPF: 11 digits identifying an individual.
//!
//! Both carry two trailing check digits. Non-digit characters are stripped
//! before verification, so formatted inputs such as `11.222.333/0001-81`
//! are accepted.

use std::fmt;

use thiserror::Error;

const CNPJ_WEIGHTS_FIRST: [u32; 12] = [5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CNPJ_WEIGHTS_SECOND: [u32; 13] = [6, 5, 4, 3, 2, 9, 8, 7, 6, 5, 4, 3, 2];
const CPF_WEIGHTS_FIRST: [u32; 9] = [10, 9, 8, 7, 6, 5, 4, 3, 2];
const CPF_WEIGHTS_SECOND: [u32; 10] = [11, 10, 9, 8, 7, 6, 5, 4, 3, 2];

/// Kind of taxpayer registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaxIdKind {
    Cnpj,
    Cpf,
}

impl TaxIdKind {
    /// Number of digits including the two check digits.
    pub fn digit_count(self) -> usize {
        match self {
            Self::Cnpj => 14,
            Self::Cpf => 11,
        }
    }

    /// Registration-type flag used in the DPS identifier (1 = CNPJ, 2 = CPF).
    pub fn dps_flag(self) -> char {
        match self {
            Self::Cnpj => '1',
            Self::Cpf => '2',
        }
    }

    fn weights(self) -> (&'static [u32], &'static [u32]) {
        match self {
            Self::Cnpj => (&CNPJ_WEIGHTS_FIRST, &CNPJ_WEIGHTS_SECOND),
            Self::Cpf => (&CPF_WEIGHTS_FIRST, &CPF_WEIGHTS_SECOND),
        }
    }
}

impl fmt::Display for TaxIdKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cnpj => f.write_str("CNPJ"),
            Self::Cpf => f.write_str("CPF"),
        }
    }
}

/// Reason a CNPJ or CPF was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChecksumError {
    #[error("{kind} must have {expected} digits, got {actual}")]
    Length {
        kind: TaxIdKind,
        expected: usize,
        actual: usize,
    },

    #[error("{kind} with all digits identical is invalid")]
    RepeatedDigits { kind: TaxIdKind },

    #[error("{kind} check digits do not match (expected {expected}, got {actual})")]
    CheckDigits {
        kind: TaxIdKind,
        expected: String,
        actual: String,
    },
}

/// Validate a CNPJ.
///
/// ```
/// use nfse::core::validate_cnpj;
///
/// assert!(validate_cnpj("11222333000181").is_ok());
/// assert!(validate_cnpj("11.222.333/0001-81").is_ok());
/// assert!(validate_cnpj("11111111111111").is_err());
/// ```
pub fn validate_cnpj(value: &str) -> Result<(), ChecksumError> {
    verify(TaxIdKind::Cnpj, value)
}

/// Validate a CPF.
pub fn validate_cpf(value: &str) -> Result<(), ChecksumError> {
    verify(TaxIdKind::Cpf, value)
}

pub fn is_valid_cnpj(value: &str) -> bool {
    validate_cnpj(value).is_ok()
}

pub fn is_valid_cpf(value: &str) -> bool {
    validate_cpf(value).is_ok()
}

/// Compute the two check digits for a base number (12 digits for CNPJ, 9 for CPF).
///
/// Returns `None` if `base` does not have exactly the right number of digits.
pub fn check_digits(kind: TaxIdKind, base: &str) -> Option<[u32; 2]> {
    let mut digits = digits_of(base);
    if digits.len() != kind.digit_count() - 2 {
        return None;
    }
    let (first, second) = kind.weights();
    let d1 = digit_for(&digits, first);
    digits.push(d1);
    let d2 = digit_for(&digits, second);
    Some([d1, d2])
}

fn verify(kind: TaxIdKind, value: &str) -> Result<(), ChecksumError> {
    let digits = digits_of(value);
    let expected_len = kind.digit_count();
    if digits.len() != expected_len {
        return Err(ChecksumError::Length {
            kind,
            expected: expected_len,
            actual: digits.len(),
        });
    }

    if digits.iter().all(|d| *d == digits[0]) {
        return Err(ChecksumError::RepeatedDigits { kind });
    }

    let (first, second) = kind.weights();
    let d1 = digit_for(&digits[..expected_len - 2], first);
    let d2 = digit_for(&digits[..expected_len - 1], second);
    let actual = [digits[expected_len - 2], digits[expected_len - 1]];
    if [d1, d2] != actual {
        return Err(ChecksumError::CheckDigits {
            kind,
            expected: format!("{d1}{d2}"),
            actual: format!("{}{}", actual[0], actual[1]),
        });
    }
    Ok(())
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

// remainder < 2 -> 0, otherwise 11 - remainder
fn digit_for(digits: &[u32], weights: &[u32]) -> u32 {
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    let remainder = sum % 11;
    if remainder < 2 { 0 } else { 11 - remainder }
}
