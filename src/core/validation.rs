use rust_decimal::Decimal;

use super::checksum::{TaxIdKind, validate_cnpj, validate_cpf};
use super::emission::EmissionRequest;
use super::error::ValidationError;
use super::rules::{FiscalPolicy, Municipalities};
use super::types::*;

/// Check that a field is exactly `len` ASCII digits.
pub fn is_numeric_code(value: &str, len: usize) -> bool {
    value.len() == len && value.bytes().all(|b| b.is_ascii_digit())
}

fn require_text(value: &str, field: &str, label: &str, errors: &mut Vec<ValidationError>) {
    if value.trim().is_empty() {
        errors.push(ValidationError::new(field, format!("{label} is required")));
    }
}

fn require_code(value: &str, len: usize, field: &str, errors: &mut Vec<ValidationError>) {
    if value.is_empty() {
        errors.push(ValidationError::new(field, "is required"));
    } else if !is_numeric_code(value, len) {
        errors.push(ValidationError::new(
            field,
            format!("must have exactly {len} numeric digits, got '{value}'"),
        ));
    }
}

/// Identifier duality, then type-and-length, then check digits.
fn validate_tax_id(cnpj: Option<&str>, cpf: Option<&str>, errors: &mut Vec<ValidationError>) {
    let cnpj = cnpj.filter(|v| !v.is_empty());
    let cpf = cpf.filter(|v| !v.is_empty());

    match (cnpj, cpf) {
        (None, None) => {
            errors.push(ValidationError::new("CNPJ", "either CNPJ or CPF is required"));
            return;
        }
        (Some(_), Some(_)) => {
            errors.push(ValidationError::new(
                "CNPJ",
                "only one of CNPJ or CPF may be informed",
            ));
        }
        _ => {}
    }

    for (kind, value) in [(TaxIdKind::Cnpj, cnpj), (TaxIdKind::Cpf, cpf)] {
        let Some(value) = value else { continue };
        let field = kind.to_string();
        if !is_numeric_code(value, kind.digit_count()) {
            errors.push(ValidationError::new(
                field,
                format!(
                    "must have exactly {} numeric digits, got '{value}'",
                    kind.digit_count()
                ),
            ));
            continue;
        }
        let checked = match kind {
            TaxIdKind::Cnpj => validate_cnpj(value),
            TaxIdKind::Cpf => validate_cpf(value),
        };
        if let Err(e) = checked {
            errors.push(ValidationError::new(field, e.to_string()));
        }
    }
}

fn nest(errors: Vec<ValidationError>, parent: &str, into: &mut Vec<ValidationError>) {
    into.extend(errors.into_iter().map(|e| e.nested(parent)));
}

impl Address {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        require_text(&self.street, "xLgr", "street", &mut errors);
        require_text(&self.number, "nro", "number", &mut errors);
        require_text(&self.district, "xBairro", "neighborhood", &mut errors);
        require_code(&self.municipality, 7, "cMun", &mut errors);
        require_code(&self.postal_code, 8, "CEP", &mut errors);
        errors
    }
}

impl TaxRegime {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.simples().is_none() {
            errors.push(ValidationError::new(
                "opSimpNac",
                format!("must be 1, 2 or 3, got {}", self.simples_option),
            ));
        }

        if !matches!(self.special_regime, 0..=6 | 9) {
            errors.push(ValidationError::new(
                "regEspTrib",
                format!("must be 0, 1-6 or 9, got {}", self.special_regime),
            ));
        }

        if let Some(apportionment) = self.simples_apportionment {
            if self.simples() != Some(SimplesOption::MeEpp) {
                errors.push(ValidationError::new(
                    "regApTribSN",
                    format!(
                        "only allowed when opSimpNac is 3, but opSimpNac is {}",
                        self.simples_option
                    ),
                ));
            } else if !(1..=3).contains(&apportionment) {
                errors.push(ValidationError::new(
                    "regApTribSN",
                    format!("must be 1, 2 or 3, got {apportionment}"),
                ));
            }
        }

        errors
    }
}

impl Provider {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        validate_tax_id(self.cnpj.as_deref(), self.cpf.as_deref(), &mut errors);
        require_text(&self.name, "xNome", "name", &mut errors);
        require_code(&self.municipality, 7, "cMun", &mut errors);
        nest(self.tax_regime.validate(), "regTrib", &mut errors);
        errors
    }
}

impl Customer {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        validate_tax_id(self.cnpj.as_deref(), self.cpf.as_deref(), &mut errors);
        require_text(&self.name, "xNome", "name", &mut errors);
        if let Some(address) = &self.address {
            nest(address.validate(), "end", &mut errors);
        }
        errors
    }
}

impl Ibscbs {
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.ibs_amount.is_none() && self.cbs_amount.is_none() {
            errors.push(ValidationError::new(
                "vIBS",
                "at least one of vIBS or vCBS must be informed",
            ));
        }

        for (field, amount) in [("vIBS", self.ibs_amount), ("vCBS", self.cbs_amount)] {
            if let Some(v) = amount
                && v < Decimal::ZERO
            {
                errors.push(ValidationError::new(
                    field,
                    format!("must not be negative, got {v}"),
                ));
            }
        }

        let hundred = Decimal::ONE_HUNDRED;
        for (field, rate) in [("aliqIBS", self.ibs_rate), ("aliqCBS", self.cbs_rate)] {
            if let Some(r) = rate
                && (r < Decimal::ZERO || r > hundred)
            {
                errors.push(ValidationError::new(
                    field,
                    format!("must be between 0 and 100, got {r}"),
                ));
            }
        }

        errors
    }
}

impl Service {
    /// Validate against the default [`FiscalPolicy`].
    pub fn validate(&self) -> Vec<ValidationError> {
        self.validate_with(&FiscalPolicy::default())
    }

    pub fn validate_with(&self, policy: &FiscalPolicy) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        require_text(&self.description, "xDescServ", "service description", &mut errors);
        require_code(&self.national_code, 6, "cTribNac", &mut errors);
        require_code(&self.location, 7, "cLocPrestacao", &mut errors);

        if let Some(code) = &self.municipal_code
            && !is_numeric_code(code, 3)
        {
            errors.push(ValidationError::new(
                "cTribMun",
                format!("must have exactly 3 numeric digits, got '{code}'"),
            ));
        }

        if let Some(rate) = self.rate {
            if let Err(e) = policy.check_rate_ceiling(rate) {
                errors.push(e);
            }
            if let Err(e) = policy.check_rate_floor(rate, &self.national_code) {
                errors.push(e);
            }
        }

        if let Some(group) = &self.ibscbs {
            nest(group.validate(), "ibscbs", &mut errors);
        }

        errors
    }
}

/// Validate a complete emission: every entity, the value, and the
/// cross-field fiscal rules.
///
/// Returns all validation errors found (not just the first). Entity errors
/// are prefixed with `prest.`, `toma.` and `serv.`.
pub fn validate_emission(request: &EmissionRequest, policy: &FiscalPolicy) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    nest(request.provider.validate(), "prest", &mut errors);
    nest(request.customer.validate(), "toma", &mut errors);
    nest(request.service.validate_with(policy), "serv", &mut errors);

    if request.value <= Decimal::ZERO {
        errors.push(ValidationError::new(
            "vServ",
            format!("service value must be greater than zero, got {}", request.value),
        ));
    }

    // ISSQN is declared where the service is performed
    let service = &request.service;
    let places = Municipalities {
        service_location: &service.location,
        provider: &request.provider.municipality,
        customer: request
            .customer
            .municipality_or(&request.provider.municipality),
    };
    if let Err(e) = policy.check_incidence_location(&service.national_code, &service.location, places)
    {
        errors.push(e);
    }

    if let Err(e) = policy.check_ibscbs_required(
        &request.provider.tax_regime,
        request.competence(),
        service.ibscbs.is_some(),
    ) {
        errors.push(e);
    }

    errors
}
