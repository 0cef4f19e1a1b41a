//! # nfse
//!
//! Brazilian NFS-e (Nota Fiscal de Serviço eletrônica, national standard):
//! validation, DPS assembly, XML-DSig signing, transport encoding and the
//! client for the national API.
//!
//! All monetary values use [`rust_decimal::Decimal`], never floating point.
//!
//! ## Quick Start
//!
//! ```rust
//! use nfse::core::*;
//! use rust_decimal_macros::dec;
//!
//! let request = EmissionRequestBuilder::new(dec!(1500), parse_emission_date("15/01/2024").unwrap())
//!     .provider(ProviderBuilder::new("ACME Servicos", "3550308")
//!         .cnpj("11222333000181")
//!         .tax_regime(TaxRegime { simples_option: 3, simples_apportionment: None, special_regime: 0 })
//!         .build())
//!     .customer(CustomerBuilder::new("Cliente SA").cpf("52998224725").build())
//!     .service(ServiceBuilder::new("Consultoria em TI", "010101", "3550308").build())
//!     .build();
//!
//! assert!(request.is_ok());
//! assert!(is_valid_cnpj("11222333000181"));
//! assert!(!is_valid_cpf("11111111111"));
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Document model, CNPJ/CPF check digits, fiscal rules, numbering, config |
//! | `dps` (default) | DPS XML assembly, parsing, import, gzip+base64 codec |
//! | `sign` (default) | Enveloped XML-DSig (RSA, SHA-256 or SHA-1), certificate inspection |
//! | `pkcs12` | PKCS#12 certificate loading through OpenSSL |
//! | `api` | mTLS client for the national API, dry-run transport, emission log |
//! | `cli` | The `nfse` binary |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "dps")]
pub mod dps;

#[cfg(feature = "sign")]
pub mod sign;

#[cfg(feature = "api")]
pub mod api;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
