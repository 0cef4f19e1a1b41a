//! Fiscal rules that span several DPS fields.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::error::ValidationError;
use super::service_codes::{
    CUSTOMER_MUNICIPALITY_CODE, is_rate_floor_exempt, is_taxed_at_service_location,
};
use super::types::{SimplesOption, TaxRegime};

pub const RULE_RATE_CEILING: &str = "NFSE-ALIQ-MAX";
pub const RULE_RATE_FLOOR: &str = "NFSE-ALIQ-MIN";
pub const RULE_INCIDENCE: &str = "NFSE-INCID";
pub const RULE_IBSCBS: &str = "NFSE-IBSCBS";

/// Thresholds of the fiscal rule engine.
///
/// The default reflects LC 116/2003 (ISSQN between 2% and 5%) and the tax
/// reform schedule making the IBSCBS group mandatory from 2027-01-01.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FiscalPolicy {
    /// Highest ISSQN rate in percent.
    pub rate_ceiling: Decimal,
    /// Lowest ISSQN rate in percent, unless the service code is exempt.
    pub rate_floor: Decimal,
    /// First competence date on which every provider must send IBSCBS.
    pub ibscbs_mandatory_from: NaiveDate,
}

impl Default for FiscalPolicy {
    fn default() -> Self {
        Self {
            rate_ceiling: dec!(5.0),
            rate_floor: dec!(2.0),
            ibscbs_mandatory_from: NaiveDate::from_ymd_opt(2027, 1, 1).unwrap_or(NaiveDate::MAX),
        }
    }
}

/// Where ISSQN incidence was decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncidenceRule {
    CustomerMunicipality,
    ServiceLocation,
    ProviderMunicipality,
}

impl IncidenceRule {
    /// Pick the rule for a national service code.
    pub fn for_service(code: &str) -> Self {
        if code == CUSTOMER_MUNICIPALITY_CODE {
            Self::CustomerMunicipality
        } else if is_taxed_at_service_location(code) {
            Self::ServiceLocation
        } else {
            Self::ProviderMunicipality
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::CustomerMunicipality => "customer municipality",
            Self::ServiceLocation => "service location",
            Self::ProviderMunicipality => "provider municipality",
        }
    }
}

/// Municipalities taking part in the incidence decision.
#[derive(Debug, Clone, Copy)]
pub struct Municipalities<'a> {
    pub service_location: &'a str,
    pub provider: &'a str,
    pub customer: &'a str,
}

impl FiscalPolicy {
    pub fn check_rate_ceiling(&self, rate: Decimal) -> Result<(), ValidationError> {
        if rate > self.rate_ceiling {
            return Err(ValidationError::with_rule(
                "aliquota",
                format!(
                    "ISSQN rate {rate}% exceeds the maximum of {}%",
                    self.rate_ceiling
                ),
                RULE_RATE_CEILING,
            ));
        }
        Ok(())
    }

    pub fn check_rate_floor(&self, rate: Decimal, service_code: &str) -> Result<(), ValidationError> {
        if rate < self.rate_floor && !is_rate_floor_exempt(service_code) {
            return Err(ValidationError::with_rule(
                "aliquota",
                format!(
                    "ISSQN rate {rate}% is below the minimum of {}% for service {service_code}",
                    self.rate_floor
                ),
                RULE_RATE_FLOOR,
            ));
        }
        Ok(())
    }

    /// Check that `incidence` is the municipality the service code demands.
    pub fn check_incidence_location(
        &self,
        service_code: &str,
        incidence: &str,
        places: Municipalities<'_>,
    ) -> Result<(), ValidationError> {
        let rule = IncidenceRule::for_service(service_code);
        let expected = match rule {
            IncidenceRule::CustomerMunicipality => places.customer,
            IncidenceRule::ServiceLocation => places.service_location,
            IncidenceRule::ProviderMunicipality => places.provider,
        };
        if incidence != expected {
            return Err(ValidationError::with_rule(
                "cLocIncid",
                format!(
                    "service {service_code} is taxed at the {}: expected {expected}, got {incidence}",
                    rule.label()
                ),
                RULE_INCIDENCE,
            ));
        }
        Ok(())
    }

    /// Whether the IBSCBS group must be present for this regime and competence date.
    pub fn ibscbs_required(&self, regime: &TaxRegime, competence: NaiveDate) -> bool {
        competence >= self.ibscbs_mandatory_from
            || regime.simples() == Some(SimplesOption::NotOpted)
    }

    pub fn check_ibscbs_required(
        &self,
        regime: &TaxRegime,
        competence: NaiveDate,
        has_ibscbs: bool,
    ) -> Result<(), ValidationError> {
        if has_ibscbs || !self.ibscbs_required(regime, competence) {
            return Ok(());
        }
        let reason = if competence >= self.ibscbs_mandatory_from {
            format!("mandatory for every provider from {}", self.ibscbs_mandatory_from)
        } else {
            "mandatory for providers not opted into Simples Nacional".to_string()
        };
        Err(ValidationError::with_rule(
            "ibscbs",
            format!("IBSCBS group is {reason} (competence {competence})"),
            RULE_IBSCBS,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn regime(option: u8) -> TaxRegime {
        TaxRegime {
            simples_option: option,
            ..TaxRegime::default()
        }
    }

    const PLACES: Municipalities<'static> = Municipalities {
        service_location: "3304557",
        provider: "3550308",
        customer: "4106902",
    };

    #[test]
    fn rate_ceiling() {
        let policy = FiscalPolicy::default();
        assert!(policy.check_rate_ceiling(dec!(5.0)).is_ok());
        let err = policy.check_rate_ceiling(dec!(5.01)).unwrap_err();
        assert_eq!(err.rule.as_deref(), Some(RULE_RATE_CEILING));
    }

    #[test]
    fn rate_floor_with_exceptions() {
        let policy = FiscalPolicy::default();
        assert!(policy.check_rate_floor(dec!(1.9), "010101").is_err());
        assert!(policy.check_rate_floor(dec!(1.9), "042201").is_ok());
        assert!(policy.check_rate_floor(dec!(2.0), "010101").is_ok());
        assert!(policy.check_rate_floor(dec!(2.0), "042201").is_ok());
    }

    #[test]
    fn incidence_customer_municipality() {
        let policy = FiscalPolicy::default();
        assert!(policy.check_incidence_location("170501", "4106902", PLACES).is_ok());
        let err = policy
            .check_incidence_location("170501", "3550308", PLACES)
            .unwrap_err();
        assert!(err.message.contains("expected 4106902"));
        assert!(err.message.contains("got 3550308"));
    }

    #[test]
    fn incidence_service_location() {
        let policy = FiscalPolicy::default();
        assert!(policy.check_incidence_location("070201", "3304557", PLACES).is_ok());
        assert!(policy.check_incidence_location("070201", "3550308", PLACES).is_err());
    }

    #[test]
    fn incidence_provider_municipality() {
        let policy = FiscalPolicy::default();
        assert!(policy.check_incidence_location("010101", "3550308", PLACES).is_ok());
        assert!(policy.check_incidence_location("010101", "3304557", PLACES).is_err());
    }

    #[test]
    fn ibscbs_transition() {
        let policy = FiscalPolicy::default();
        for option in [1, 2, 3] {
            assert!(
                policy
                    .check_ibscbs_required(&regime(option), date(2027, 1, 1), false)
                    .is_err()
            );
        }
        assert!(
            policy
                .check_ibscbs_required(&regime(1), date(2026, 12, 31), false)
                .is_err()
        );
        assert!(
            policy
                .check_ibscbs_required(&regime(3), date(2026, 12, 31), false)
                .is_ok()
        );
        assert!(
            policy
                .check_ibscbs_required(&regime(1), date(2027, 6, 1), true)
                .is_ok()
        );
    }

    #[test]
    fn custom_policy_thresholds() {
        let policy = FiscalPolicy {
            rate_ceiling: dec!(3.0),
            ..FiscalPolicy::default()
        };
        assert!(policy.check_rate_ceiling(dec!(4.0)).is_err());
    }
}
