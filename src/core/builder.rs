use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;

use super::emission::{EmissionRequest, to_brasilia};
use super::error::NfseError;
use super::rules::FiscalPolicy;
use super::types::*;
use super::validation;

/// Builder for a validated [`EmissionRequest`].
///
/// ```
/// use nfse::core::*;
/// use rust_decimal_macros::dec;
///
/// let request = EmissionRequestBuilder::new(dec!(1500.00), parse_emission_date("2024-01-15").unwrap())
///     .provider(ProviderBuilder::new("ACME Servicos", "3550308")
///         .cnpj("11222333000181")
///         .tax_regime(TaxRegime { simples_option: 3, simples_apportionment: None, special_regime: 0 })
///         .build())
///     .customer(CustomerBuilder::new("Cliente SA").cnpj("12345678000195").build())
///     .service(ServiceBuilder::new("Consultoria em TI", "010101", "3550308").build())
///     .build()
///     .unwrap();
///
/// assert_eq!(request.competence().to_string(), "2024-01-15");
/// ```
pub struct EmissionRequestBuilder {
    value: Decimal,
    issued_at: DateTime<FixedOffset>,
    provider: Option<Provider>,
    customer: Option<Customer>,
    service: Option<Service>,
    policy: FiscalPolicy,
}

impl EmissionRequestBuilder {
    /// `issued_at` is stored in Brasília time.
    pub fn new(value: Decimal, issued_at: DateTime<FixedOffset>) -> Self {
        Self {
            value,
            issued_at: to_brasilia(issued_at),
            provider: None,
            customer: None,
            service: None,
            policy: FiscalPolicy::default(),
        }
    }

    pub fn provider(mut self, provider: Provider) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn customer(mut self, customer: Customer) -> Self {
        self.customer = Some(customer);
        self
    }

    pub fn service(mut self, service: Service) -> Self {
        self.service = Some(service);
        self
    }

    /// Override the fiscal thresholds used for validation.
    pub fn policy(mut self, policy: FiscalPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build and validate. Returns every validation error found.
    pub fn build(self) -> Result<EmissionRequest, NfseError> {
        let provider = self
            .provider
            .ok_or_else(|| NfseError::Builder("provider is required".into()))?;
        let customer = self
            .customer
            .ok_or_else(|| NfseError::Builder("customer is required".into()))?;
        let service = self
            .service
            .ok_or_else(|| NfseError::Builder("service is required".into()))?;

        let request = EmissionRequest {
            provider,
            customer,
            service,
            value: self.value,
            issued_at: self.issued_at,
        };

        let errors = validation::validate_emission(&request, &self.policy);
        if !errors.is_empty() {
            return Err(NfseError::Validation(errors));
        }
        Ok(request)
    }
}

/// Builder for [`Provider`]. Defaults to a regime not opted into Simples Nacional.
pub struct ProviderBuilder {
    provider: Provider,
}

impl ProviderBuilder {
    pub fn new(name: impl Into<String>, municipality: impl Into<String>) -> Self {
        Self {
            provider: Provider {
                name: name.into(),
                municipality: municipality.into(),
                ..Provider::default()
            },
        }
    }

    pub fn cnpj(mut self, cnpj: impl Into<String>) -> Self {
        self.provider.cnpj = Some(cnpj.into());
        self
    }

    pub fn cpf(mut self, cpf: impl Into<String>) -> Self {
        self.provider.cpf = Some(cpf.into());
        self
    }

    pub fn municipal_registration(mut self, im: impl Into<String>) -> Self {
        self.provider.municipal_registration = Some(im.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.provider.email = Some(email.into());
        self
    }

    pub fn tax_regime(mut self, regime: TaxRegime) -> Self {
        self.provider.tax_regime = regime;
        self
    }

    pub fn build(self) -> Provider {
        self.provider
    }
}

pub struct CustomerBuilder {
    customer: Customer,
}

impl CustomerBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            customer: Customer {
                name: name.into(),
                ..Customer::default()
            },
        }
    }

    pub fn cnpj(mut self, cnpj: impl Into<String>) -> Self {
        self.customer.cnpj = Some(cnpj.into());
        self
    }

    pub fn cpf(mut self, cpf: impl Into<String>) -> Self {
        self.customer.cpf = Some(cpf.into());
        self
    }

    pub fn email(mut self, email: impl Into<String>) -> Self {
        self.customer.email = Some(email.into());
        self
    }

    pub fn address(mut self, address: Address) -> Self {
        self.customer.address = Some(address);
        self
    }

    pub fn build(self) -> Customer {
        self.customer
    }
}

pub struct AddressBuilder {
    address: Address,
}

impl AddressBuilder {
    pub fn new(municipality: impl Into<String>, postal_code: impl Into<String>) -> Self {
        Self {
            address: Address {
                municipality: municipality.into(),
                postal_code: postal_code.into(),
                ..Address::default()
            },
        }
    }

    pub fn street(mut self, street: impl Into<String>, number: impl Into<String>) -> Self {
        self.address.street = street.into();
        self.address.number = number.into();
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.address.district = district.into();
        self
    }

    pub fn build(self) -> Address {
        self.address
    }
}

pub struct ServiceBuilder {
    service: Service,
}

impl ServiceBuilder {
    pub fn new(
        description: impl Into<String>,
        national_code: impl Into<String>,
        location: impl Into<String>,
    ) -> Self {
        Self {
            service: Service {
                description: description.into(),
                national_code: national_code.into(),
                location: location.into(),
                ..Service::default()
            },
        }
    }

    pub fn municipal_code(mut self, code: impl Into<String>) -> Self {
        self.service.municipal_code = Some(code.into());
        self
    }

    pub fn nbs_code(mut self, code: impl Into<String>) -> Self {
        self.service.nbs_code = Some(code.into());
        self
    }

    pub fn internal_code(mut self, code: impl Into<String>) -> Self {
        self.service.internal_code = Some(code.into());
        self
    }

    pub fn rate(mut self, rate: Decimal) -> Self {
        self.service.rate = Some(rate);
        self
    }

    pub fn ibscbs(mut self, group: Ibscbs) -> Self {
        self.service.ibscbs = Some(group);
        self
    }

    pub fn build(self) -> Service {
        self.service
    }
}
