use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::checksum::TaxIdKind;

/// Target NFS-e environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Environment {
    /// Live environment; documents have legal effect.
    #[serde(rename = "producao")]
    Production,
    /// Restricted production (test) environment.
    #[default]
    #[serde(rename = "producaorestrita")]
    Restricted,
}

impl Environment {
    /// `tpAmb` value: 1 = production, 2 = restricted.
    pub fn tp_amb(self) -> u8 {
        match self {
            Self::Production => 1,
            Self::Restricted => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "producao",
            Self::Restricted => "producaorestrita",
        }
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "producao" => Ok(Self::Production),
            "producaorestrita" => Ok(Self::Restricted),
            other => Err(format!(
                "unknown environment '{other}' (expected 'producao' or 'producaorestrita')"
            )),
        }
    }
}

/// Digest used for the XML-DSig reference and the RSA signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DigestAlgorithm {
    Sha1,
    #[default]
    Sha256,
}

impl DigestAlgorithm {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    pub fn digest_uri(self) -> &'static str {
        match self {
            Self::Sha1 => "http://www.w3.org/2000/09/xmldsig#sha1",
            Self::Sha256 => "http://www.w3.org/2001/04/xmlenc#sha256",
        }
    }

    pub fn signature_uri(self) -> &'static str {
        match self {
            Self::Sha1 => "http://www.w3.org/2000/09/xmldsig#rsa-sha1",
            Self::Sha256 => "http://www.w3.org/2001/04/xmldsig-more#rsa-sha256",
        }
    }

    pub fn from_digest_uri(uri: &str) -> Option<Self> {
        [Self::Sha1, Self::Sha256]
            .into_iter()
            .find(|alg| alg.digest_uri() == uri)
    }

    pub fn from_signature_uri(uri: &str) -> Option<Self> {
        [Self::Sha1, Self::Sha256]
            .into_iter()
            .find(|alg| alg.signature_uri() == uri)
    }
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "").as_str() {
            "sha1" => Ok(Self::Sha1),
            "sha256" => Ok(Self::Sha256),
            _ => Err(format!("unknown digest '{s}' (expected 'sha256' or 'sha1')")),
        }
    }
}

/// `end`: national address of a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// `xLgr`: street.
    #[serde(rename = "xLgr", default)]
    pub street: String,
    /// `nro`: building number.
    #[serde(rename = "nro", default)]
    pub number: String,
    /// `xBairro`: neighborhood.
    #[serde(rename = "xBairro", default)]
    pub district: String,
    /// `cMun`: 7-digit IBGE municipality code.
    #[serde(rename = "cMun", default)]
    pub municipality: String,
    /// `CEP`: 8-digit postal code.
    #[serde(rename = "CEP", default)]
    pub postal_code: String,
}

/// `opSimpNac`: Simples Nacional option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SimplesOption {
    /// 1: not opted in.
    NotOpted = 1,
    /// 2: micro-entrepreneur (MEI).
    Mei = 2,
    /// 3: micro or small company (ME/EPP).
    MeEpp = 3,
}

/// `regTrib`: provider tax regime.
///
/// Codes are kept as received so that out-of-range values can be reported
/// by validation instead of failing deserialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxRegime {
    /// `opSimpNac`: 1 = not opted, 2 = MEI, 3 = ME/EPP.
    #[serde(rename = "opSimpNac")]
    pub simples_option: u8,
    /// `regApTribSN`: Simples Nacional apportionment, only with `opSimpNac` = 3.
    #[serde(rename = "regApTribSN", default, skip_serializing_if = "Option::is_none")]
    pub simples_apportionment: Option<u8>,
    /// `regEspTrib`: special regime, 0 = none, 1-6 or 9.
    #[serde(rename = "regEspTrib", default)]
    pub special_regime: u8,
}

impl Default for TaxRegime {
    fn default() -> Self {
        Self {
            simples_option: SimplesOption::NotOpted as u8,
            simples_apportionment: None,
            special_regime: 0,
        }
    }
}

impl TaxRegime {
    pub fn simples(&self) -> Option<SimplesOption> {
        match self.simples_option {
            1 => Some(SimplesOption::NotOpted),
            2 => Some(SimplesOption::Mei),
            3 => Some(SimplesOption::MeEpp),
            _ => None,
        }
    }
}

/// `prest`: the service provider issuing the DPS.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    #[serde(rename = "CNPJ", default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(rename = "CPF", default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    /// `xNome`: legal name.
    #[serde(rename = "xNome", default)]
    pub name: String,
    /// `cMun`: 7-digit IBGE municipality code.
    #[serde(rename = "cMun", default)]
    pub municipality: String,
    /// `IM`: municipal registration.
    #[serde(rename = "IM", default, skip_serializing_if = "Option::is_none")]
    pub municipal_registration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "regTrib", default)]
    pub tax_regime: TaxRegime,
}

/// `toma`: the customer receiving the service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(rename = "CNPJ", default, skip_serializing_if = "Option::is_none")]
    pub cnpj: Option<String>,
    #[serde(rename = "CPF", default, skip_serializing_if = "Option::is_none")]
    pub cpf: Option<String>,
    #[serde(rename = "xNome", default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "end", default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
}

/// `IBSCBS`: supplementary tax group introduced by the tax reform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ibscbs {
    #[serde(rename = "vIBS", default, skip_serializing_if = "Option::is_none")]
    pub ibs_amount: Option<Decimal>,
    #[serde(rename = "vCBS", default, skip_serializing_if = "Option::is_none")]
    pub cbs_amount: Option<Decimal>,
    /// `aliqIBS`: percentage in [0, 100].
    #[serde(rename = "aliqIBS", default, skip_serializing_if = "Option::is_none")]
    pub ibs_rate: Option<Decimal>,
    /// `aliqCBS`: percentage in [0, 100].
    #[serde(rename = "aliqCBS", default, skip_serializing_if = "Option::is_none")]
    pub cbs_rate: Option<Decimal>,
}

/// `serv`: the service being invoiced.
///
/// Value and emission date are per-emission inputs, never part of a template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    /// `xDescServ`: free-text description.
    #[serde(rename = "xDescServ", default)]
    pub description: String,
    /// `cTribNac`: 6-digit national service code.
    #[serde(rename = "cTribNac", default)]
    pub national_code: String,
    /// `cLocPrestacao`: 7-digit municipality where the service is performed.
    #[serde(rename = "cLocPrestacao", default)]
    pub location: String,
    /// `cTribMun`: 3-digit municipal service code.
    #[serde(rename = "cTribMun", default, skip_serializing_if = "Option::is_none")]
    pub municipal_code: Option<String>,
    /// `cNBS`: NBS classification.
    #[serde(rename = "cNBS", default, skip_serializing_if = "Option::is_none")]
    pub nbs_code: Option<String>,
    /// `cIntContrib`: taxpayer's internal service code.
    #[serde(rename = "cIntContrib", default, skip_serializing_if = "Option::is_none")]
    pub internal_code: Option<String>,
    /// ISSQN rate in percent.
    #[serde(rename = "aliquota", default, skip_serializing_if = "Option::is_none")]
    pub rate: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ibscbs: Option<Ibscbs>,
}

fn tax_id<'a>(cnpj: &'a Option<String>, cpf: &'a Option<String>) -> Option<(TaxIdKind, &'a str)> {
    match (cnpj.as_deref(), cpf.as_deref()) {
        (Some(v), _) if !v.is_empty() => Some((TaxIdKind::Cnpj, v)),
        (_, Some(v)) if !v.is_empty() => Some((TaxIdKind::Cpf, v)),
        _ => None,
    }
}

impl Provider {
    /// The registration carried by this provider (CNPJ takes precedence).
    pub fn tax_id(&self) -> Option<(TaxIdKind, &str)> {
        tax_id(&self.cnpj, &self.cpf)
    }

    /// Registration digits, or an empty string when none is set.
    pub fn document(&self) -> &str {
        self.tax_id().map(|(_, v)| v).unwrap_or_default()
    }
}

impl Customer {
    pub fn tax_id(&self) -> Option<(TaxIdKind, &str)> {
        tax_id(&self.cnpj, &self.cpf)
    }

    pub fn document(&self) -> &str {
        self.tax_id().map(|(_, v)| v).unwrap_or_default()
    }

    /// Municipality used for incidence checks: the address, else the provider's.
    pub fn municipality_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.address
            .as_ref()
            .map(|a| a.municipality.as_str())
            .filter(|m| !m.is_empty())
            .unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_round_trip() {
        assert_eq!("producao".parse::<Environment>(), Ok(Environment::Production));
        assert_eq!(Environment::Restricted.to_string(), "producaorestrita");
        assert_eq!(Environment::Production.tp_amb(), 1);
        assert_eq!(Environment::default().tp_amb(), 2);
        assert!("homologacao".parse::<Environment>().is_err());
    }

    #[test]
    fn provider_json_uses_tag_names() {
        let json = r#"{
            "CNPJ": "11222333000181",
            "xNome": "ACME Servicos",
            "cMun": "3550308",
            "regTrib": {"opSimpNac": 3, "regApTribSN": 1, "regEspTrib": 0}
        }"#;
        let provider: Provider = serde_json::from_str(json).unwrap();
        assert_eq!(provider.tax_id(), Some((TaxIdKind::Cnpj, "11222333000181")));
        assert_eq!(provider.tax_regime.simples(), Some(SimplesOption::MeEpp));
        assert_eq!(provider.tax_regime.simples_apportionment, Some(1));

        let out = serde_json::to_value(&provider).unwrap();
        assert!(out.get("CPF").is_none());
        assert_eq!(out["regTrib"]["opSimpNac"], 3);
    }

    #[test]
    fn null_apportionment_is_none() {
        let json = r#"{"opSimpNac": 1, "regEspTrib": 0, "regApTribSN": null}"#;
        let regime: TaxRegime = serde_json::from_str(json).unwrap();
        assert_eq!(regime, TaxRegime::default());
    }

    #[test]
    fn customer_municipality_fallback() {
        let mut customer = Customer {
            cpf: Some("52998224725".into()),
            name: "Maria".into(),
            ..Default::default()
        };
        assert_eq!(customer.municipality_or("3550308"), "3550308");
        customer.address = Some(Address {
            municipality: "3304557".into(),
            ..Default::default()
        });
        assert_eq!(customer.municipality_or("3550308"), "3304557");
        assert_eq!(customer.document(), "52998224725");
    }

    #[test]
    fn service_decimal_accepts_numbers_and_strings() {
        let json = r#"{"xDescServ": "x", "cTribNac": "010101", "cLocPrestacao": "3550308",
                       "aliquota": 2.5, "ibscbs": {"vIBS": "10.00"}}"#;
        let service: Service = serde_json::from_str(json).unwrap();
        assert_eq!(service.rate, Some(Decimal::new(25, 1)));
        assert_eq!(
            service.ibscbs.unwrap().ibs_amount,
            Some(Decimal::new(1000, 2))
        );
    }
}
