//! XML-DSig signing, verification and certificate loading.
//!
//! Run with: `cargo test --test sign_tests`
//! PKCS#12 tests need `--features pkcs12`.

#![cfg(feature = "sign")]

use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use nfse::core::*;
use nfse::dps::*;
use nfse::sign::*;
use rust_decimal_macros::dec;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

fn material(name: &str) -> SigningMaterial {
    PemFile::new(fixture(name)).load().unwrap()
}

fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()
}

fn unsigned_dps() -> Element {
    let request =
        EmissionRequestBuilder::new(dec!(250.75), parse_emission_date("2024-03-01").unwrap())
            .provider(Provider::load(fixture("prestador.json")).unwrap())
            .customer(Customer::load(fixture("tomador.json")).unwrap())
            .service(Service::load(fixture("servico.json")).unwrap())
            .build()
            .unwrap();
    let settings = Config::default().dps_settings();
    let id = generate_dps_id(&request.provider, settings.series, settings.number).unwrap();
    build_dps(&request, &id, &settings).unwrap()
}

fn signed_dps(digest: DigestAlgorithm) -> Element {
    let m = material("icp_bundle.pem");
    let mut dps = unsigned_dps();
    DpsSigner::new(&m).digest(digest).sign(&mut dps).unwrap();
    dps
}

// --- Signature structure ---

#[test]
fn signature_is_last_child_without_prefix() {
    let dps = signed_dps(DigestAlgorithm::Sha256);
    let last = dps.elements().last().unwrap();
    assert_eq!(last.name, "Signature");
    assert_eq!(
        last.namespaces,
        [(String::new(), XMLDSIG_NAMESPACE.to_string())]
    );

    let xml = dps.to_xml();
    assert!(!xml.contains("ds:"));
    assert!(xml.contains(r#"<Signature xmlns="http://www.w3.org/2000/09/xmldsig#">"#));
}

#[test]
fn reference_points_at_inf_dps() {
    let dps = signed_dps(DigestAlgorithm::Sha256);
    let id = dps.child("infDPS").unwrap().attr("Id").unwrap().to_string();
    let signed_info = dps.descendant("SignedInfo").unwrap();
    let reference = signed_info.child("Reference").unwrap();

    assert_eq!(reference.attr("URI"), Some(format!("#{id}").as_str()));
    let transforms: Vec<_> = reference
        .child("Transforms")
        .unwrap()
        .elements()
        .map(|t| t.attr("Algorithm").unwrap())
        .collect();
    assert_eq!(transforms, [ENVELOPED_SIGNATURE, C14N_ALGORITHM]);
    assert_eq!(
        signed_info
            .child("CanonicalizationMethod")
            .unwrap()
            .attr("Algorithm"),
        Some(C14N_ALGORITHM)
    );
    assert_eq!(
        reference.child("DigestMethod").unwrap().attr("Algorithm"),
        Some("http://www.w3.org/2001/04/xmlenc#sha256")
    );
}

#[test]
fn embeds_signing_certificate() {
    let m = material("icp_bundle.pem");
    let mut dps = unsigned_dps();
    DpsSigner::new(&m).sign(&mut dps).unwrap();
    assert_eq!(
        dps.descendant("X509Certificate").unwrap().text(),
        m.certificate_base64()
    );
}

// --- Verification ---

#[test]
fn sha256_signature_verifies() {
    let dps = signed_dps(DigestAlgorithm::Sha256);
    verify_dps(&dps).unwrap();
    verify_xml(&dps.to_xml()).unwrap();
}

#[test]
fn sha1_signature_verifies() {
    let dps = signed_dps(DigestAlgorithm::Sha1);
    let method = dps.descendant("SignatureMethod").unwrap();
    assert_eq!(
        method.attr("Algorithm"),
        Some("http://www.w3.org/2000/09/xmldsig#rsa-sha1")
    );
    verify_xml(&dps.to_xml()).unwrap();
}

#[test]
fn signature_survives_transport_encoding() {
    let dps = signed_dps(DigestAlgorithm::Sha256);
    let payload = compress(&dps).unwrap();
    verify_xml(&decompress(&payload).unwrap()).unwrap();
}

#[test]
fn tampered_content_is_detected() {
    let xml = signed_dps(DigestAlgorithm::Sha256).to_xml();
    let tampered = xml.replace("<vServ>250.75</vServ>", "<vServ>25.75</vServ>");
    assert_ne!(tampered, xml);
    let err = verify_xml(&tampered).unwrap_err();
    assert!(err.to_string().contains("digest"));
}

#[test]
fn comments_are_outside_the_signed_content() {
    let xml = signed_dps(DigestAlgorithm::Sha256).to_xml();
    let annotated = xml.replacen("<tpAmb>", "<!-- ambiente --><tpAmb>", 1);
    assert_ne!(annotated, xml);
    verify_xml(&annotated).unwrap();
}

#[test]
fn processing_instructions_are_signed_content() {
    let xml = signed_dps(DigestAlgorithm::Sha256).to_xml();
    let annotated = xml.replacen("<tpAmb>", "<?audit ok?><tpAmb>", 1);
    let err = verify_xml(&annotated).unwrap_err();
    assert!(err.to_string().contains("digest"));
}

#[test]
fn reformatted_attributes_still_verify() {
    let xml = signed_dps(DigestAlgorithm::Sha256).to_xml();
    let id = parse_xml(&xml)
        .unwrap()
        .child("infDPS")
        .unwrap()
        .attr("Id")
        .unwrap()
        .to_string();
    let requoted = xml.replacen(&format!(r#"Id="{id}""#), &format!("Id='{id}'"), 1);
    assert_ne!(requoted, xml);
    verify_xml(&requoted).unwrap();
}

#[test]
fn tampered_signed_info_is_detected() {
    let mut dps = signed_dps(DigestAlgorithm::Sha256);
    let signature = dps.child_mut("Signature").unwrap();
    let reference = signature
        .child_mut("SignedInfo")
        .unwrap()
        .child_mut("Reference")
        .unwrap();
    reference.attributes = vec![("URI".into(), "#elsewhere".into())];
    assert!(verify_dps(&dps).is_err());
}

#[test]
fn signing_twice_is_rejected() {
    let m = material("icp_bundle.pem");
    let mut dps = signed_dps(DigestAlgorithm::Sha256);
    let err = DpsSigner::new(&m).sign(&mut dps).unwrap_err();
    assert!(matches!(err, SigningError::Document(_)));
}

#[test]
fn documents_without_inf_dps_are_rejected() {
    let m = material("icp_bundle.pem");
    let mut other = Element::new("NFSe");
    other.add_text("x", "1");
    assert!(DpsSigner::new(&m).sign(&mut other).is_err());

    let unsigned = unsigned_dps().to_xml();
    let err = verify_xml(&unsigned).unwrap_err();
    assert!(matches!(err, NfseError::Signing(_)));
}

#[test]
fn sign_xml_accepts_serialized_documents() {
    let m = material("icp_bundle.pem");
    let signed = DpsSigner::new(&m).sign_xml(&unsigned_dps().to_xml()).unwrap();
    assert!(signed.starts_with(XML_DECLARATION));
    verify_xml(&signed).unwrap();
}

// --- End to end ---

#[test]
fn not_opted_provider_builds_signs_and_round_trips() {
    let request = EmissionRequest {
        provider: ProviderBuilder::new("Servicos Gerais LTDA", "3550308")
            .cnpj("11222333000181")
            .tax_regime(TaxRegime {
                simples_option: 1,
                simples_apportionment: None,
                special_regime: 0,
            })
            .build(),
        customer: CustomerBuilder::new("Cliente SA").cnpj("12345678000195").build(),
        service: ServiceBuilder::new("Desenvolvimento de software", "010101", "3550308").build(),
        value: parse_service_value("1500.00").unwrap(),
        issued_at: parse_emission_date("2024-01-15").unwrap(),
    };
    assert!(request.provider.validate().is_empty());
    assert!(request.customer.validate().is_empty());
    assert!(request.service.validate().is_empty());
    assert!(request.service.ibscbs.is_none());

    let config = Config::default();
    assert_eq!(config.environment, Environment::Restricted);
    let settings = config.dps_settings();
    let id = generate_dps_id(&request.provider, settings.series, settings.number).unwrap();
    let mut dps = build_dps(&request, &id, &settings).unwrap();

    let inf = dps.child("infDPS").unwrap();
    assert_eq!(inf.child_text("tpAmb").as_deref(), Some("2"));
    assert_eq!(inf.child_text("dCompet").as_deref(), Some("2024-01-15"));
    assert_eq!(
        inf.child("valores").unwrap().child_text("vServ").as_deref(),
        Some("1500.00")
    );
    assert_eq!(
        inf.descendant("opSimpNac").map(Element::text).as_deref(),
        Some("1")
    );
    assert!(inf.descendant("IBSCBS").is_none());

    let m = material("icp_bundle.pem");
    DpsSigner::new(&m).digest(config.digest).sign(&mut dps).unwrap();
    let signed = dps.to_xml();
    verify_xml(&signed).unwrap();
    assert_eq!(decompress(&compress_str(&signed).unwrap()).unwrap(), signed);

    // the fiscal rules still flag the missing group before emission
    let errors = validate_emission(&request, &FiscalPolicy::default());
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].rule.as_deref(), Some("NFSE-IBSCBS"));
}

#[test]
fn configured_digest_reaches_the_signature() {
    let config: Config = serde_json::from_str(r#"{"algoritmo_digest": "sha1"}"#).unwrap();
    let m = material("icp_bundle.pem");
    let mut dps = unsigned_dps();
    DpsSigner::new(&m).digest(config.digest).sign(&mut dps).unwrap();

    let reference = dps.descendant("Reference").unwrap();
    assert_eq!(
        reference.child("DigestMethod").unwrap().attr("Algorithm"),
        Some("http://www.w3.org/2000/09/xmldsig#sha1")
    );
    assert_eq!(
        dps.descendant("SignatureMethod").unwrap().attr("Algorithm"),
        Some("http://www.w3.org/2000/09/xmldsig#rsa-sha1")
    );
    verify_dps(&dps).unwrap();
}

// --- Signing material ---

#[test]
fn leaf_is_selected_by_key() {
    let pkcs8 = material("icp_bundle.pem");
    let pkcs1 = material("icp_bundle_pkcs1.pem");
    assert_eq!(pkcs8.certificate_der(), pkcs1.certificate_der());
    assert_eq!(pkcs1.chain().len(), 1);
    assert_eq!(pkcs1.info().unwrap().holder, "EMPRESA TESTE LTDA:11222333000181");
}

#[test]
fn debug_output_is_redacted() {
    let m = material("icp_bundle.pem");
    let debug = format!("{m:?}");
    assert!(debug.contains("REDACTED"));
    assert!(!debug.contains("PRIVATE"));
}

#[test]
fn bundles_without_key_or_certificate_fail() {
    let pem = std::fs::read_to_string(fixture("icp_bundle.pem")).unwrap();
    let certs_start = pem.find("-----BEGIN CERTIFICATE-----").unwrap();
    assert!(matches!(
        SigningMaterial::from_pem(pem[certs_start..].as_bytes()),
        Err(SigningError::Key(_))
    ));

    let key_end = pem.find("-----END PRIVATE KEY-----").unwrap() + "-----END PRIVATE KEY-----".len();
    assert!(matches!(
        SigningMaterial::from_pem(pem[..key_end].as_bytes()),
        Err(SigningError::Certificate(_))
    ));

    let missing = PemFile::new(fixture("missing.pem")).load().unwrap_err();
    assert!(matches!(missing, NfseError::Certificate(_)));
}

// --- Certificate checks ---

#[test]
fn icp_brasil_certificate_is_usable() {
    let info = material("icp_bundle.pem").info().unwrap();
    assert!(info.is_icp_brasil());
    assert_eq!(info.issuer, "AC Teste NFSe v1");
    assert_eq!(info.issuer_organization.as_deref(), Some("ICP-Brasil"));
    info.ensure_usable(at(2027, 1, 1)).unwrap();
    // inside the warning window: still usable
    info.ensure_usable(at(2036, 10, 1)).unwrap();
}

#[test]
fn expired_certificate_is_rejected() {
    let info = material("icp_bundle.pem").info().unwrap();
    let now = at(2037, 1, 1);
    assert!(info.is_expired(now));
    assert!(info.days_to_expiry(now) < 0);
    let err = info.ensure_usable(now).unwrap_err();
    assert_eq!(
        err.to_string(),
        "certificate error: certificate expired on 11/10/2036"
    );
}

#[test]
fn foreign_certificate_is_rejected() {
    let info = material("foreign_bundle.pem").info().unwrap();
    assert_eq!(info.issuer, "Acme Test CA");
    assert!(!info.is_icp_brasil());
    assert!(matches!(
        info.ensure_usable(at(2027, 1, 1)),
        Err(NfseError::Certificate(_))
    ));
}

#[test]
fn issuer_markers() {
    let mut info = material("foreign_bundle.pem").info().unwrap();
    info.issuer_unit = Some("Bureau ITI".into());
    assert!(info.is_icp_brasil());
    info.issuer_unit = Some("Digital Security".into());
    info.issuer = "Certisign AC Raiz".into();
    assert!(info.is_icp_brasil());
    info.issuer = "Unitize".into();
    assert!(!info.is_icp_brasil());
}

// --- PKCS#12 ---

#[cfg(feature = "pkcs12")]
#[test]
fn pkcs12_matches_pem_bundle() {
    let p12 = Pkcs12File::new(fixture("certificado.pfx"), fixture("certificado.secret"))
        .load()
        .unwrap();
    let pem = material("icp_bundle.pem");
    assert_eq!(p12.certificate_der(), pem.certificate_der());
    assert_eq!(p12.chain().len(), 1);

    let mut dps = unsigned_dps();
    DpsSigner::new(&p12).sign(&mut dps).unwrap();
    verify_dps(&dps).unwrap();
}

#[cfg(feature = "pkcs12")]
#[test]
fn pkcs12_wrong_password() {
    let dir = tempfile::tempdir().unwrap();
    let secret = dir.path().join("wrong.secret");
    std::fs::write(&secret, "not-the-password\n").unwrap();
    let err = Pkcs12File::new(fixture("certificado.pfx"), &secret)
        .load()
        .unwrap_err();
    assert!(err.to_string().contains("wrong certificate password"));
}
