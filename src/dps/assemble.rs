use chrono::{DateTime, FixedOffset};
use rust_decimal::{Decimal, RoundingStrategy};

use super::tree::Element;
use crate::core::*;

/// Namespace of the national NFS-e schemas.
pub const NFSE_NAMESPACE: &str = "http://www.sped.fazenda.gov.br/nfse";

/// Layout version written to `DPS/@versao`.
pub const DPS_VERSION: &str = "1.01";

/// `tpEmit`: DPS issued by the provider.
const ISSUER_PROVIDER: &str = "1";

/// Format an amount with exactly two decimals, rounding half away from zero.
pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// `dhEmi` format: `YYYY-MM-DDTHH:MM:SS-03:00`.
pub fn format_timestamp(ts: &DateTime<FixedOffset>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S%:z").to_string()
}

/// Assemble the unsigned DPS tree.
///
/// Element order follows the DPS schema; absent optional values are omitted.
/// `id` must have been generated for the same series and number as `settings`.
pub fn build_dps(
    request: &EmissionRequest,
    id: &DpsId,
    settings: &DpsSettings,
) -> Result<Element, NfseError> {
    let expected = generate_dps_id(&request.provider, settings.series, settings.number)?;
    if &expected != id {
        return Err(NfseError::Builder(format!(
            "DPS id {id} does not match provider, series {} and number {}",
            settings.series, settings.number
        )));
    }

    let mut inf = Element::new("infDPS").with_attr("Id", id.attribute());
    inf.add_text("tpAmb", settings.environment.tp_amb().to_string())
        .add_text("dhEmi", format_timestamp(&request.issued_at))
        .add_text("verAplic", &settings.app_version)
        .add_text("serie", settings.series.to_string())
        .add_text("nDPS", settings.number.to_string())
        .add_text("dCompet", request.competence().format("%Y-%m-%d").to_string())
        .add_text("tpEmit", ISSUER_PROVIDER)
        .add_text("cLocEmi", &request.provider.municipality);

    inf.push(provider_element(&request.provider)?)
        .push(customer_element(&request.customer)?)
        .push(service_element(&request.service))
        .push(values_element(request.value, request.service.ibscbs.as_ref()));

    let mut dps = Element::new("DPS")
        .with_namespace("", NFSE_NAMESPACE)
        .with_attr("versao", DPS_VERSION);
    dps.push(inf);

    tracing::debug!(id = %id, environment = %settings.environment, "assembled DPS");
    Ok(dps)
}

fn push_tax_id(
    element: &mut Element,
    tax_id: Option<(TaxIdKind, &str)>,
    who: &str,
) -> Result<(), NfseError> {
    let (kind, value) =
        tax_id.ok_or_else(|| NfseError::Builder(format!("{who} has neither CNPJ nor CPF")))?;
    element.add_text(&kind.to_string(), value);
    Ok(())
}

fn provider_element(provider: &Provider) -> Result<Element, NfseError> {
    let mut prest = Element::new("prest");
    push_tax_id(&mut prest, provider.tax_id(), "provider")?;
    prest
        .add_opt_text("IM", provider.municipal_registration.as_deref())
        .add_text("xNome", &provider.name)
        .add_opt_text("email", provider.email.as_deref());

    let regime = &provider.tax_regime;
    let mut reg_trib = Element::new("regTrib");
    reg_trib.add_text("opSimpNac", regime.simples_option.to_string());
    if let Some(apportionment) = regime.simples_apportionment {
        reg_trib.add_text("regApTribSN", apportionment.to_string());
    }
    reg_trib.add_text("regEspTrib", regime.special_regime.to_string());
    prest.push(reg_trib);

    Ok(prest)
}

fn customer_element(customer: &Customer) -> Result<Element, NfseError> {
    let mut toma = Element::new("toma");
    push_tax_id(&mut toma, customer.tax_id(), "customer")?;
    toma.add_text("xNome", &customer.name);

    if let Some(address) = &customer.address {
        let mut end_nac = Element::new("endNac");
        end_nac
            .add_text("cMun", &address.municipality)
            .add_text("CEP", &address.postal_code);
        let mut end = Element::new("end");
        end.push(end_nac)
            .add_text("xLgr", &address.street)
            .add_text("nro", &address.number)
            .add_text("xBairro", &address.district);
        toma.push(end);
    }

    toma.add_opt_text("email", customer.email.as_deref());
    Ok(toma)
}

fn service_element(service: &Service) -> Element {
    let mut loc_prest = Element::new("locPrest");
    loc_prest.add_text("cLocPrestacao", &service.location);

    let mut c_serv = Element::new("cServ");
    c_serv
        .add_text("cTribNac", &service.national_code)
        .add_opt_text("cTribMun", service.municipal_code.as_deref())
        .add_text("xDescServ", &service.description)
        .add_opt_text("cNBS", service.nbs_code.as_deref())
        .add_opt_text("cIntContrib", service.internal_code.as_deref());

    let mut serv = Element::new("serv");
    serv.push(loc_prest).push(c_serv);
    serv
}

fn values_element(value: Decimal, ibscbs: Option<&Ibscbs>) -> Element {
    let mut valores = Element::new("valores");
    valores.add_text("vServ", format_amount(value));

    if let Some(group) = ibscbs {
        let mut el = Element::new("IBSCBS");
        for (name, amount) in [
            ("vIBS", group.ibs_amount),
            ("vCBS", group.cbs_amount),
            ("aliqIBS", group.ibs_rate),
            ("aliqCBS", group.cbs_rate),
        ] {
            if let Some(amount) = amount {
                el.add_text(name, format_amount(amount));
            }
        }
        valores.push(el);
    }

    valores
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn amounts_have_two_decimals() {
        assert_eq!(format_amount(dec!(1500)), "1500.00");
        assert_eq!(format_amount(dec!(1500.0)), "1500.00");
        assert_eq!(format_amount(dec!(49.9)), "49.90");
        assert_eq!(format_amount(dec!(0.005)), "0.01");
        assert_eq!(format_amount(dec!(2.345)), "2.35");
    }

    #[test]
    fn timestamp_keeps_offset() {
        let ts = parse_emission_date("2024-01-15").unwrap();
        assert_eq!(format_timestamp(&ts), "2024-01-15T00:00:00-03:00");
    }
}
