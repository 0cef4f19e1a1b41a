//! Core DPS types, validation and numbering.
//!
//! This module provides the document model of the national NFS-e standard
//! (provider, customer, service, tax regime), CNPJ/CPF check digits and the
//! fiscal rule engine.

mod builder;
pub mod checksum;
mod config;
mod emission;
mod error;
mod numbering;
pub mod rules;
pub mod service_codes;
mod template;
mod types;
mod validation;

pub use builder::*;
pub use checksum::{
    ChecksumError, TaxIdKind, check_digits, is_valid_cnpj, is_valid_cpf, validate_cnpj,
    validate_cpf,
};
pub use config::*;
pub use emission::*;
pub use error::*;
pub use numbering::*;
pub use rules::{FiscalPolicy, IncidenceRule, Municipalities};
pub use template::save_template;
pub use types::*;
pub use validation::*;
