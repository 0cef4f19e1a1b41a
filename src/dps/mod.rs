//! DPS XML: assembly, parsing, import and transport encoding.
//!
//! ```
//! use nfse::core::*;
//! use nfse::dps::*;
//! use rust_decimal_macros::dec;
//!
//! let request = EmissionRequestBuilder::new(dec!(1500), parse_emission_date("2024-01-15").unwrap())
//!     .provider(ProviderBuilder::new("ACME Servicos", "3550308")
//!         .cnpj("11222333000181")
//!         .tax_regime(TaxRegime { simples_option: 3, simples_apportionment: None, special_regime: 0 })
//!         .build())
//!     .customer(CustomerBuilder::new("Cliente SA").cnpj("12345678000195").build())
//!     .service(ServiceBuilder::new("Consultoria em TI", "010101", "3550308").build())
//!     .build()
//!     .unwrap();
//!
//! let settings = Config::default().dps_settings();
//! let id = generate_dps_id(&request.provider, settings.series, settings.number).unwrap();
//! let dps = build_dps(&request, &id, &settings).unwrap();
//!
//! let inf = dps.child("infDPS").unwrap();
//! assert_eq!(inf.child_text("tpAmb").as_deref(), Some("2"));
//! assert_eq!(inf.child("valores").unwrap().child_text("vServ").as_deref(), Some("1500.00"));
//!
//! let packed = compress(&dps).unwrap();
//! assert_eq!(decompress(&packed).unwrap(), dps.to_xml());
//! ```

mod assemble;
pub mod codec;
mod import;
mod parse;
pub mod tree;

pub use assemble::{DPS_VERSION, NFSE_NAMESPACE, build_dps, format_amount, format_timestamp};
pub use codec::{CodecError, compress, compress_str, decompress};
pub use import::{ImportedTemplates, import_nfse, import_templates};
pub use parse::parse_xml;
pub use tree::{Element, Node, Scope, XML_DECLARATION};
