use std::fmt;

use super::error::NfseError;
use super::types::Provider;
use super::validation::is_numeric_code;

/// Length of a DPS identifier without the `DPS` prefix.
pub const DPS_ID_LEN: usize = 42;

const SERIES_WIDTH: usize = 5;
const NUMBER_WIDTH: usize = 15;
const REGISTRATION_WIDTH: usize = 14;

/// DPS identifier: municipality (7) + registration type (1) + registration (14)
/// + series (5) + number (15).
///
/// The `Id` attribute of `infDPS` is this value prefixed with `DPS`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DpsId(String);

impl DpsId {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value of the `infDPS/@Id` attribute.
    pub fn attribute(&self) -> String {
        format!("DPS{}", self.0)
    }

    /// Trailing 15 digits: the DPS number.
    pub fn number_part(&self) -> &str {
        &self.0[DPS_ID_LEN - NUMBER_WIDTH..]
    }
}

impl fmt::Display for DpsId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generate the deterministic 42-character DPS identifier.
///
/// ```
/// use nfse::core::*;
///
/// let provider = Provider {
///     cnpj: Some("11222333000181".into()),
///     municipality: "3550308".into(),
///     ..Default::default()
/// };
/// let id = generate_dps_id(&provider, 1, 1).unwrap();
/// assert_eq!(id.as_str(), "355030811122233300018100001000000000000001");
/// ```
pub fn generate_dps_id(provider: &Provider, series: u32, number: u64) -> Result<DpsId, NfseError> {
    if !is_numeric_code(&provider.municipality, 7) {
        return Err(NfseError::Builder(format!(
            "provider municipality '{}' must have 7 digits",
            provider.municipality
        )));
    }

    let (kind, registration) = provider
        .tax_id()
        .ok_or_else(|| NfseError::Builder("provider has neither CNPJ nor CPF".into()))?;
    if !is_numeric_code(registration, kind.digit_count()) {
        return Err(NfseError::Builder(format!(
            "provider {kind} '{registration}' must have {} digits",
            kind.digit_count()
        )));
    }

    let series = padded(series.into(), SERIES_WIDTH, "series")?;
    let number = padded(number, NUMBER_WIDTH, "DPS number")?;

    let id = format!(
        "{}{}{:0>width$}{series}{number}",
        provider.municipality,
        kind.dps_flag(),
        registration,
        width = REGISTRATION_WIDTH
    );
    debug_assert_eq!(id.len(), DPS_ID_LEN);
    Ok(DpsId(id))
}

fn padded(value: u64, width: usize, what: &str) -> Result<String, NfseError> {
    let s = format!("{value:0>width$}");
    if s.len() > width {
        return Err(NfseError::Builder(format!(
            "{what} {value} does not fit in {width} digits"
        )));
    }
    Ok(s)
}

/// DPS number sequence within one series.
///
/// The national API rejects reused numbers, so the sequence only moves forward.
#[derive(Debug, Clone)]
pub struct DpsSequence {
    series: u32,
    next_number: u64,
}

impl DpsSequence {
    /// Create a sequence starting at 1.
    pub fn new(series: u32) -> Self {
        Self {
            series,
            next_number: 1,
        }
    }

    /// Create a sequence continuing from a given number.
    pub fn starting_at(series: u32, next_number: u64) -> Self {
        Self {
            series,
            next_number,
        }
    }

    pub fn series(&self) -> u32 {
        self.series
    }

    /// Preview the next number without consuming it.
    pub fn peek(&self) -> u64 {
        self.next_number
    }

    /// Consume the next number.
    pub fn next_number(&mut self) -> Result<u64, NfseError> {
        let num = self.next_number;
        self.next_number = num
            .checked_add(1)
            .ok_or_else(|| NfseError::Builder(format!("DPS number {num} cannot be incremented")))?;
        Ok(num)
    }

    /// Skip ahead after a number was used elsewhere.
    pub fn advance_to(&mut self, next_number: u64) -> Result<(), NfseError> {
        if next_number < self.next_number {
            return Err(NfseError::Builder(format!(
                "next DPS number {next_number} must not be lower than current {}",
                self.next_number
            )));
        }
        self.next_number = next_number;
        Ok(())
    }
}
