use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};

use super::tree::{Element, Node};
use crate::core::NfseError;

fn xml_err(e: impl std::fmt::Display) -> NfseError {
    NfseError::Xml(format!("XML parse error: {e}"))
}

/// Parse an XML document into an [`Element`] tree.
///
/// Whitespace is kept as text. Comments, processing instructions and the
/// XML declaration are dropped; signature checks parse the raw document
/// with libxml instead.
pub fn parse_xml(xml: &str) -> Result<Element, NfseError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => {
                stack.push(start_element(e)?);
            }
            Ok(Event::Empty(ref e)) => {
                let element = start_element(e)?;
                close(element, &mut stack, &mut root)?;
            }
            Ok(Event::End(_)) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| xml_err("unexpected closing tag"))?;
                close(element, &mut stack, &mut root)?;
            }
            Ok(Event::Text(ref e)) => {
                if let Some(parent) = stack.last_mut() {
                    let text = e.unescape().map_err(xml_err)?;
                    push_text(parent, &normalize_newlines(&text));
                }
            }
            Ok(Event::CData(ref e)) => {
                if let Some(parent) = stack.last_mut() {
                    let text = std::str::from_utf8(e).map_err(xml_err)?;
                    push_text(parent, &normalize_newlines(text));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(xml_err(e)),
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(xml_err("unexpected end of document"));
    }
    root.ok_or_else(|| xml_err("document has no root element"))
}

fn start_element(e: &BytesStart<'_>) -> Result<Element, NfseError> {
    let name = std::str::from_utf8(e.name().as_ref())
        .map_err(xml_err)?
        .to_string();
    let mut element = Element::new(name);

    for attr in e.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = std::str::from_utf8(attr.key.as_ref()).map_err(xml_err)?;
        let value = attr.unescape_value().map_err(xml_err)?.to_string();
        if key == "xmlns" {
            element.namespaces.push((String::new(), value));
        } else if let Some(prefix) = key.strip_prefix("xmlns:") {
            element.namespaces.push((prefix.to_string(), value));
        } else {
            element.attributes.push((key.to_string(), value));
        }
    }

    Ok(element)
}

fn close(
    element: Element,
    stack: &mut [Element],
    root: &mut Option<Element>,
) -> Result<(), NfseError> {
    match stack.last_mut() {
        Some(parent) => {
            parent.children.push(Node::Element(element));
        }
        None if root.is_none() => *root = Some(element),
        None => return Err(xml_err("multiple root elements")),
    }
    Ok(())
}

fn push_text(parent: &mut Element, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(Node::Text(last)) = parent.children.last_mut() {
        last.push_str(text);
    } else {
        parent.children.push(Node::Text(text.to_string()));
    }
}

// XML end-of-line handling: CRLF and lone CR become LF.
fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n").replace('\r', "\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaces_and_attributes() {
        let xml = r#"<?xml version="1.0"?><DPS xmlns="urn:n" versao="1.01"><infDPS Id="X"><a>1 &amp; 2</a><b/></infDPS></DPS>"#;
        let root = parse_xml(xml).unwrap();
        assert_eq!(root.name, "DPS");
        assert_eq!(root.namespaces, vec![(String::new(), "urn:n".to_string())]);
        assert_eq!(root.attr("versao"), Some("1.01"));
        let inf = root.child("infDPS").unwrap();
        assert_eq!(inf.child_text("a").as_deref(), Some("1 & 2"));
        assert!(inf.child("b").is_some());
    }

    #[test]
    fn serialized_output_reparses_identically() {
        let xml = r#"<r xmlns:p="urn:p"><p:x a="1">t&lt;</p:x></r>"#;
        let root = parse_xml(xml).unwrap();
        let out = root.to_xml();
        assert!(out.ends_with(xml));
        assert_eq!(parse_xml(&out).unwrap(), root);
    }

    #[test]
    fn malformed_documents_fail() {
        assert!(matches!(parse_xml("<a><b></a>"), Err(NfseError::Xml(_))));
        assert!(parse_xml("").is_err());
        assert!(parse_xml("<a></a><b></b>").is_err());
    }
}
