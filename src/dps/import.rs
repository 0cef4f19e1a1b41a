//! Read Provider, Customer and Service templates back out of an issued NFS-e
//! or a DPS document.

use std::path::{Path, PathBuf};

use super::assemble::NFSE_NAMESPACE;
use super::parse::parse_xml;
use super::tree::{Element, Scope};
use crate::core::*;

/// Templates recovered from one document.
#[derive(Debug, Clone, PartialEq)]
pub struct ImportedTemplates {
    pub provider: Provider,
    pub customer: Customer,
    pub service: Service,
}

impl ImportedTemplates {
    /// Write the three templates under `base` as
    /// `prestadores/prestador_{ts}.json`, `tomadores/tomador_{ts}.json` and
    /// `servicos/servico_{ts}.json`. Returns the paths in that order.
    pub fn save_all(&self, base: &Path, timestamp: &str) -> Result<[PathBuf; 3], NfseError> {
        let paths = [
            base.join("prestadores").join(format!("prestador_{timestamp}.json")),
            base.join("tomadores").join(format!("tomador_{timestamp}.json")),
            base.join("servicos").join(format!("servico_{timestamp}.json")),
        ];
        self.provider.save(&paths[0])?;
        self.customer.save(&paths[1])?;
        self.service.save(&paths[2])?;
        Ok(paths)
    }
}

/// Import templates from an NFS-e (`infNFSe`) or DPS (`infDPS`) document.
///
/// Elements are matched by local name within `default_namespace`; elements
/// with no namespace at all are accepted too.
pub fn import_templates(xml: &str, default_namespace: &str) -> Result<ImportedTemplates, NfseError> {
    let root = parse_xml(xml)?;
    let reader = NamespacedReader {
        namespace: default_namespace,
    };
    let top = Located {
        element: &root,
        scope: Scope::default().with(&root),
    };

    let info = reader
        .find(&top, "infNFSe", true)
        .or_else(|| reader.find(&top, "infDPS", true))
        .ok_or_else(|| missing("infNFSe or infDPS"))?;

    let prest = reader.find(&info, "prest", false).ok_or_else(|| missing("prest"))?;
    let toma = reader.find(&info, "toma", false).ok_or_else(|| missing("toma"))?;
    let serv = reader.find(&info, "serv", false).ok_or_else(|| missing("serv"))?;

    let provider = reader.provider(&info, &prest)?;
    let customer = reader.customer(&toma);
    let service = reader.service(&serv);

    tracing::debug!(
        provider = provider.document(),
        customer = customer.document(),
        service = %service.national_code,
        "imported templates"
    );

    Ok(ImportedTemplates {
        provider,
        customer,
        service,
    })
}

/// Import using the national NFS-e namespace.
pub fn import_nfse(xml: &str) -> Result<ImportedTemplates, NfseError> {
    import_templates(xml, NFSE_NAMESPACE)
}

fn missing(what: &str) -> NfseError {
    NfseError::Xml(format!("element {what} not found"))
}

/// An element together with the namespace scope in effect inside it.
struct Located<'a> {
    element: &'a Element,
    scope: Scope,
}

struct NamespacedReader<'n> {
    namespace: &'n str,
}

impl NamespacedReader<'_> {
    fn matches(&self, element: &Element, scope: &Scope, local: &str) -> bool {
        element.local_name() == local
            && scope
                .namespace_of(element)
                .is_none_or(|uri| uri == self.namespace)
    }

    /// First matching descendant, optionally considering `from` itself.
    fn find<'a>(&self, from: &Located<'a>, local: &str, include_self: bool) -> Option<Located<'a>> {
        if include_self && self.matches(from.element, &from.scope, local) {
            return Some(Located {
                element: from.element,
                scope: from.scope.clone(),
            });
        }
        let pred = |e: &Element, scope: &Scope| self.matches(e, scope, local);
        from.element
            .elements()
            .find_map(|child| child.find_with_scope(&from.scope, &pred))
            .map(|(element, inherited)| Located {
                element,
                scope: inherited.with(element),
            })
    }

    /// Direct child only.
    fn child<'a>(&self, parent: &Located<'a>, local: &str) -> Option<Located<'a>> {
        parent.element.elements().find_map(|element| {
            let scope = parent.scope.with(element);
            self.matches(element, &scope, local)
                .then_some(Located { element, scope })
        })
    }

    fn text(&self, parent: &Located<'_>, local: &str) -> Option<String> {
        self.child(parent, local)
            .map(|c| c.element.text().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    fn number(&self, parent: &Located<'_>, local: &str) -> Result<Option<u8>, NfseError> {
        self.text(parent, local)
            .map(|v| {
                v.parse::<u8>()
                    .map_err(|_| NfseError::Xml(format!("{local} is not a number: {v}")))
            })
            .transpose()
    }

    fn provider(&self, info: &Located<'_>, prest: &Located<'_>) -> Result<Provider, NfseError> {
        let cnpj = self.text(prest, "CNPJ");
        let cpf = if cnpj.is_none() { self.text(prest, "CPF") } else { None };

        let municipality = self
            .text(prest, "cMun")
            .or_else(|| {
                let end = self.child(prest, "end")?;
                let end_nac = self.child(&end, "endNac")?;
                self.text(&end_nac, "cMun")
            })
            .or_else(|| {
                let loc = self.find(info, "cLocEmi", false)?;
                Some(loc.element.text().trim().to_string())
            })
            .unwrap_or_default();

        let tax_regime = match self.child(prest, "regTrib") {
            Some(reg) => TaxRegime {
                simples_option: self.number(&reg, "opSimpNac")?.unwrap_or(1),
                simples_apportionment: self.number(&reg, "regApTribSN")?,
                special_regime: self.number(&reg, "regEspTrib")?.unwrap_or(0),
            },
            None => TaxRegime::default(),
        };

        Ok(Provider {
            cnpj,
            cpf,
            name: self.text(prest, "xNome").unwrap_or_default(),
            municipality,
            municipal_registration: self.text(prest, "IM"),
            email: self.text(prest, "email"),
            tax_regime,
        })
    }

    fn customer(&self, toma: &Located<'_>) -> Customer {
        let cnpj = self.text(toma, "CNPJ");
        let cpf = if cnpj.is_none() { self.text(toma, "CPF") } else { None };

        let address = self.child(toma, "end").map(|end| {
            let end_nac = self.child(&end, "endNac");
            let national = |local: &str| {
                self.text(&end, local)
                    .or_else(|| end_nac.as_ref().and_then(|n| self.text(n, local)))
                    .unwrap_or_default()
            };
            Address {
                street: self.text(&end, "xLgr").unwrap_or_default(),
                number: self.text(&end, "nro").unwrap_or_default(),
                district: self.text(&end, "xBairro").unwrap_or_default(),
                municipality: national("cMun"),
                postal_code: national("CEP"),
            }
        });

        Customer {
            cnpj,
            cpf,
            name: self.text(toma, "xNome").unwrap_or_default(),
            email: self.text(toma, "email"),
            address,
        }
    }

    fn service(&self, serv: &Located<'_>) -> Service {
        let c_serv = self.child(serv, "cServ");
        let codes = c_serv.as_ref().unwrap_or(serv);
        let location = match self.child(serv, "locPrest") {
            Some(loc) => self.text(&loc, "cLocPrestacao"),
            None => self.text(serv, "cLocPrestacao"),
        };

        Service {
            description: self.text(codes, "xDescServ").unwrap_or_default(),
            national_code: self.text(codes, "cTribNac").unwrap_or_default(),
            location: location.unwrap_or_default(),
            municipal_code: self.text(codes, "cTribMun"),
            nbs_code: self.text(codes, "cNBS"),
            internal_code: self
                .text(codes, "cIntContrib")
                .or_else(|| self.text(serv, "cIntContrib")),
            rate: None,
            ibscbs: None,
        }
    }
}
