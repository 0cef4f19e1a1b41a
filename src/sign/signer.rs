use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use libxml::tree::Node;

use super::c14n;
use super::material::{SigningMaterial, public_key_of};
use super::{DigestAlgorithm, SigningError};
use crate::core::NfseError;
use crate::dps::{Element, parse_xml};

pub const XMLDSIG_NAMESPACE: &str = "http://www.w3.org/2000/09/xmldsig#";
pub const C14N_ALGORITHM: &str = "http://www.w3.org/TR/2001/REC-xml-c14n-20010315";
pub const ENVELOPED_SIGNATURE: &str = "http://www.w3.org/2000/09/xmldsig#enveloped-signature";

const DS_PREFIX: &str = "ds";
const SIGNED_ELEMENT: &str = "infDPS";

/// Signs DPS documents with an enveloped XML-DSig signature.
///
/// ```no_run
/// use nfse::sign::{CertificateSource, DigestAlgorithm, DpsSigner, PemFile};
/// # fn main() -> Result<(), nfse::NfseError> {
/// let material = PemFile::new("cert/certificado.pem").load()?;
/// let mut dps = nfse::dps::parse_xml(&std::fs::read_to_string("dps.xml")?)?;
/// DpsSigner::new(&material).digest(DigestAlgorithm::Sha256).sign(&mut dps)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct DpsSigner<'m> {
    material: &'m SigningMaterial,
    digest: DigestAlgorithm,
}

impl<'m> DpsSigner<'m> {
    pub fn new(material: &'m SigningMaterial) -> Self {
        Self {
            material,
            digest: DigestAlgorithm::default(),
        }
    }

    pub fn digest(mut self, digest: DigestAlgorithm) -> Self {
        self.digest = digest;
        self
    }

    /// Append a `Signature` over `infDPS` as the last child of `document`,
    /// which must be the document root. `document` is left untouched on error.
    pub fn sign(&self, document: &mut Element) -> Result<(), SigningError> {
        if document
            .elements()
            .any(|e| e.local_name() == "Signature")
        {
            return Err(SigningError::Document("document is already signed".into()));
        }

        let id = document
            .descendant(SIGNED_ELEMENT)
            .ok_or_else(|| SigningError::Document(format!("no {SIGNED_ELEMENT} element")))?
            .attr("Id")
            .ok_or_else(|| SigningError::Document(format!("{SIGNED_ELEMENT} has no Id")))?
            .to_string();

        let unsigned = c14n::parse_document(&document.to_xml())?;
        let target = c14n::find_element(&c14n::root_of(&unsigned)?, &|n: &Node| {
            n.get_name() == SIGNED_ELEMENT
        })
        .ok_or_else(|| SigningError::Document(format!("no {SIGNED_ELEMENT} element")))?;
        let referenced = c14n::canonicalize(&target)?;
        let digest_value = STANDARD.encode(self.digest.hash(referenced.as_bytes()));

        let mut signature = self.template(&id, &digest_value);
        signature.strip_namespace_prefix(DS_PREFIX);
        let mut signed = document.clone();
        signed.push(signature);

        let with_template = c14n::parse_document(&signed.to_xml())?;
        let signed_info = c14n::find_element(&c14n::root_of(&with_template)?, &is_signature)
            .and_then(|sig| c14n::child_element(&sig, "SignedInfo"))
            .ok_or_else(|| SigningError::Document("signature template has no SignedInfo".into()))?;
        let signed_info = c14n::canonicalize(&signed_info)?;

        let value = self
            .material
            .private_key()
            .sign(
                self.digest.padding(),
                &self.digest.hash(signed_info.as_bytes()),
            )
            .map_err(|e| SigningError::Crypto(e.to_string()))?;

        signed
            .child_mut("Signature")
            .and_then(|sig| sig.child_mut("SignatureValue"))
            .ok_or_else(|| SigningError::Document("signature template has no SignatureValue".into()))?
            .set_text(STANDARD.encode(value));
        *document = signed;

        tracing::debug!(id = %id, digest = ?self.digest, "signed DPS");
        Ok(())
    }

    /// Parse, sign and serialize with the XML declaration.
    pub fn sign_xml(&self, xml: &str) -> Result<String, NfseError> {
        let mut document = parse_xml(xml)?;
        self.sign(&mut document)?;
        Ok(document.to_xml())
    }

    fn template(&self, id: &str, digest_value: &str) -> Element {
        let ds = |name: &str| Element::new(format!("{DS_PREFIX}:{name}"));

        let mut transforms = ds("Transforms");
        transforms
            .push(ds("Transform").with_attr("Algorithm", ENVELOPED_SIGNATURE))
            .push(ds("Transform").with_attr("Algorithm", C14N_ALGORITHM));

        let mut reference = ds("Reference").with_attr("URI", format!("#{id}"));
        reference
            .push(transforms)
            .push(ds("DigestMethod").with_attr("Algorithm", self.digest.digest_uri()))
            .push(ds("DigestValue").with_text(digest_value));

        let mut signed_info = ds("SignedInfo");
        signed_info
            .push(ds("CanonicalizationMethod").with_attr("Algorithm", C14N_ALGORITHM))
            .push(ds("SignatureMethod").with_attr("Algorithm", self.digest.signature_uri()))
            .push(reference);

        let mut x509_data = ds("X509Data");
        x509_data.push(ds("X509Certificate").with_text(self.material.certificate_base64()));
        let mut key_info = ds("KeyInfo");
        key_info.push(x509_data);

        let mut signature = ds("Signature").with_namespace(DS_PREFIX, XMLDSIG_NAMESPACE);
        signature
            .push(signed_info)
            .push(ds("SignatureValue"))
            .push(key_info);
        signature
    }
}

fn is_signature(node: &Node) -> bool {
    node.get_name() == "Signature"
        && c14n::namespace_of(node).as_deref() == Some(XMLDSIG_NAMESPACE)
}

/// Check the enveloped signature of a DPS tree: the reference digest and
/// the RSA signature against the embedded certificate.
pub fn verify_dps(document: &Element) -> Result<(), SigningError> {
    verify_document(&document.to_xml())
}

/// Parse and verify a signed DPS document.
///
/// The check runs on `xml` as written, so comments and processing
/// instructions are canonicalized the way the signer saw them.
pub fn verify_xml(xml: &str) -> Result<(), NfseError> {
    Ok(verify_document(xml)?)
}

fn verify_document(xml: &str) -> Result<(), SigningError> {
    let fail = |msg: &str| SigningError::Verification(msg.to_string());

    let document = c14n::parse_document(xml)?;
    let signature = c14n::find_element(&c14n::root_of(&document)?, &is_signature)
        .ok_or_else(|| fail("no Signature element"))?;
    let signed_info =
        c14n::child_element(&signature, "SignedInfo").ok_or_else(|| fail("no SignedInfo"))?;

    let algorithm_of = |parent: &Node, name: &str| {
        c14n::child_element(parent, name)
            .and_then(|e| e.get_property("Algorithm"))
            .ok_or_else(|| fail(&format!("no {name} algorithm")))
    };
    let signature_alg =
        DigestAlgorithm::from_signature_uri(&algorithm_of(&signed_info, "SignatureMethod")?)
            .ok_or_else(|| fail("unsupported signature method"))?;

    let reference =
        c14n::child_element(&signed_info, "Reference").ok_or_else(|| fail("no Reference"))?;
    let digest_alg = DigestAlgorithm::from_digest_uri(&algorithm_of(&reference, "DigestMethod")?)
        .ok_or_else(|| fail("unsupported digest method"))?;
    let uri = reference.get_property("URI").unwrap_or_default();
    let id = uri
        .strip_prefix('#')
        .ok_or_else(|| fail("reference URI is not a same-document fragment"))?;

    let enveloped = c14n::without_elements(&document, &is_signature)?;
    let target = c14n::find_element(&c14n::root_of(&enveloped)?, &|n: &Node| {
        n.get_property("Id").as_deref() == Some(id)
    })
    .ok_or_else(|| fail(&format!("referenced element #{id} not found")))?;
    let expected_digest =
        STANDARD.encode(digest_alg.hash(c14n::canonicalize(&target)?.as_bytes()));
    let digest_value = c14n::child_element(&reference, "DigestValue")
        .map(|e| e.get_content().trim().to_string())
        .ok_or_else(|| fail("no DigestValue"))?;
    if digest_value != expected_digest {
        return Err(fail("digest of referenced element does not match"));
    }

    let decode = |node: Option<Node>, what: &str| {
        let text = node
            .map(|n| n.get_content())
            .ok_or_else(|| fail(&format!("no {what}")))?;
        let compact: String = text.split_whitespace().collect();
        STANDARD
            .decode(compact)
            .map_err(|e| fail(&format!("{what} is not base64: {e}")))
    };
    let signature_value = decode(
        c14n::child_element(&signature, "SignatureValue"),
        "SignatureValue",
    )?;
    let certificate = decode(
        c14n::child_element(&signature, "KeyInfo")
            .and_then(|k| c14n::child_element(&k, "X509Data"))
            .and_then(|d| c14n::child_element(&d, "X509Certificate")),
        "X509Certificate",
    )?;

    let public_key = public_key_of(&certificate)?;
    let signed = c14n::canonicalize(&signed_info)?;
    public_key
        .verify(
            signature_alg.padding(),
            &signature_alg.hash(signed.as_bytes()),
            &signature_value,
        )
        .map_err(|_| fail("RSA signature does not match SignedInfo"))
}
