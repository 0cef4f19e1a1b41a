//! Per-emission inputs: service value and emission timestamp.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use rust_decimal::Decimal;

use super::error::ValidationError;
use super::types::{Customer, Provider, Service};

/// Brasília time (UTC-3), used for every DPS timestamp.
pub const BRASILIA_OFFSET_SECS: i32 = -3 * 3600;

/// Everything needed to assemble one DPS apart from its identifier and settings.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissionRequest {
    pub provider: Provider,
    pub customer: Customer,
    pub service: Service,
    /// `vServ`: service value, strictly positive.
    pub value: Decimal,
    /// `dhEmi`: emission timestamp.
    pub issued_at: DateTime<FixedOffset>,
}

impl EmissionRequest {
    /// `dCompet`: competence date, the Brasília date of the emission timestamp.
    pub fn competence(&self) -> NaiveDate {
        to_brasilia(self.issued_at).date_naive()
    }
}

/// The same instant expressed in Brasília time.
pub fn to_brasilia(ts: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    match FixedOffset::east_opt(BRASILIA_OFFSET_SECS) {
        Some(tz) => ts.with_timezone(&tz),
        None => ts,
    }
}

/// Parse an emission date given as `YYYY-MM-DD`, `DD/MM/YYYY`, or a full
/// RFC 3339 timestamp.
///
/// Plain dates become midnight in Brasília time (`-03:00`); timestamps in
/// other offsets are converted to it.
///
/// ```
/// use nfse::core::parse_emission_date;
///
/// let ts = parse_emission_date("15/01/2024").unwrap();
/// assert_eq!(ts.to_rfc3339(), "2024-01-15T00:00:00-03:00");
/// ```
pub fn parse_emission_date(input: &str) -> Result<DateTime<FixedOffset>, ValidationError> {
    let input = input.trim();
    let date = if input.len() == 10 && input.as_bytes()[4] == b'-' {
        NaiveDate::parse_from_str(input, "%Y-%m-%d").ok()
    } else if input.len() == 10 && input.as_bytes()[2] == b'/' {
        NaiveDate::parse_from_str(input, "%d/%m/%Y").ok()
    } else {
        return DateTime::parse_from_rfc3339(input)
            .map(to_brasilia)
            .map_err(|_| invalid_date(input));
    };

    let date = date.ok_or_else(|| invalid_date(input))?;
    FixedOffset::east_opt(BRASILIA_OFFSET_SECS)
        .and_then(|tz| tz.from_local_datetime(&date.and_time(NaiveTime::MIN)).single())
        .ok_or_else(|| invalid_date(input))
}

fn invalid_date(input: &str) -> ValidationError {
    ValidationError::new(
        "dhEmi",
        format!("invalid date '{input}', expected YYYY-MM-DD or DD/MM/YYYY"),
    )
}

/// Parse a strictly positive service value, accepting `,` or `.` as the
/// decimal separator.
pub fn parse_service_value(input: &str) -> Result<Decimal, ValidationError> {
    let input = input.trim();
    let invalid = || ValidationError::new("vServ", format!("invalid service value '{input}'"));
    if input.contains(',') && input.contains('.') {
        return Err(invalid());
    }
    let value = Decimal::from_str(&input.replace(',', ".")).map_err(|_| invalid())?;
    if value <= Decimal::ZERO {
        return Err(ValidationError::new(
            "vServ",
            format!("service value must be greater than zero, got {value}"),
        ));
    }
    Ok(value)
}
