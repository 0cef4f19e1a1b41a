//! In-memory XML tree used to assemble DPS documents.
//!
//! Serialization goes through `quick_xml::Writer` without indentation, so the
//! serialized bytes are the bytes that get signed and sent.

use std::collections::BTreeMap;

use quick_xml::Writer;
use quick_xml::escape::partial_escape;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};

/// XML declaration prepended by [`Element::to_xml`].
pub const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
}

/// An XML element.
///
/// `name` is the qualified name as written (`ds:Signature`, `infDPS`).
/// Namespace declarations are kept apart from ordinary attributes; the
/// default namespace uses the empty prefix.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub name: String,
    pub namespaces: Vec<(String, String)>,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<Node>,
}

/// Namespace bindings in scope at some point of the tree (prefix -> URI).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Scope(BTreeMap<String, String>);

impl Scope {
    /// Bindings visible inside `element`.
    pub fn with(&self, element: &Element) -> Scope {
        let mut map = self.0.clone();
        for (prefix, uri) in &element.namespaces {
            map.insert(prefix.clone(), uri.clone());
        }
        Scope(map)
    }

    /// URI bound to `prefix` (`""` for the default namespace).
    pub fn resolve(&self, prefix: &str) -> Option<&str> {
        self.0
            .get(prefix)
            .map(String::as_str)
            .filter(|uri| !uri.is_empty())
    }

    /// Namespace URI of an element name in this scope.
    pub fn namespace_of(&self, element: &Element) -> Option<&str> {
        self.resolve(element.prefix().unwrap_or(""))
    }
}

impl Element {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Declare a namespace (`""` prefix for the default namespace).
    pub fn with_namespace(mut self, prefix: impl Into<String>, uri: impl Into<String>) -> Self {
        self.namespaces.push((prefix.into(), uri.into()));
        self
    }

    pub fn with_attr(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push((name.into(), value.into()));
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.set_text(text);
        self
    }

    /// Replace all children with a single text node.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.children = vec![Node::Text(text.into())];
    }

    /// Append a child element.
    pub fn push(&mut self, child: Element) -> &mut Self {
        self.children.push(Node::Element(child));
        self
    }

    /// Append `<name>text</name>`.
    pub fn add_text(&mut self, name: &str, text: impl Into<String>) -> &mut Self {
        self.children
            .push(Node::Element(Element::new(name).with_text(text)));
        self
    }

    /// Append `<name>text</name>` only when a value is present.
    pub fn add_opt_text(&mut self, name: &str, text: Option<&str>) -> &mut Self {
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            self.add_text(name, text);
        }
        self
    }

    pub fn prefix(&self) -> Option<&str> {
        self.name.split_once(':').map(|(p, _)| p)
    }

    pub fn local_name(&self) -> &str {
        self.name.split_once(':').map_or(self.name.as_str(), |(_, l)| l)
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Concatenated direct text content.
    pub fn text(&self) -> String {
        self.children
            .iter()
            .filter_map(|n| match n {
                Node::Text(t) => Some(t.as_str()),
                Node::Element(_) => None,
            })
            .collect()
    }

    pub fn elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    pub fn elements_mut(&mut self) -> impl Iterator<Item = &mut Element> {
        self.children.iter_mut().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            Node::Text(_) => None,
        })
    }

    /// First direct child with this local name.
    pub fn child(&self, local_name: &str) -> Option<&Element> {
        self.elements().find(|e| e.local_name() == local_name)
    }

    pub fn child_mut(&mut self, local_name: &str) -> Option<&mut Element> {
        self.elements_mut().find(|e| e.local_name() == local_name)
    }

    /// Trimmed text of a direct child, `None` when absent or empty.
    pub fn child_text(&self, local_name: &str) -> Option<String> {
        self.child(local_name)
            .map(|e| e.text().trim().to_string())
            .filter(|t| !t.is_empty())
    }

    /// Depth-first search for the first element matching `pred`.
    ///
    /// The predicate sees each element with the namespace scope in effect
    /// inside it. The returned scope is the one inherited from ancestors.
    pub fn find_with_scope<'a, F>(
        &'a self,
        inherited: &Scope,
        pred: &F,
    ) -> Option<(&'a Element, Scope)>
    where
        F: Fn(&Element, &Scope) -> bool,
    {
        let scope = inherited.with(self);
        if pred(self, &scope) {
            return Some((self, inherited.clone()));
        }
        self.elements()
            .find_map(|child| child.find_with_scope(&scope, pred))
    }

    /// First descendant (or self) with this local name.
    pub fn descendant(&self, local_name: &str) -> Option<&Element> {
        let pred = |e: &Element, _: &Scope| e.local_name() == local_name;
        self.find_with_scope(&Scope::default(), &pred).map(|(e, _)| e)
    }

    /// Rewrite `prefix:Name` elements to `Name` and turn `xmlns:prefix` into
    /// the default namespace declaration, recursively.
    pub fn strip_namespace_prefix(&mut self, prefix: &str) {
        let qualified = format!("{prefix}:");
        if let Some(local) = self.name.strip_prefix(&qualified) {
            self.name = local.to_string();
        }
        for (p, _) in &mut self.namespaces {
            if p == prefix {
                p.clear();
            }
        }
        for child in self.elements_mut() {
            child.strip_namespace_prefix(prefix);
        }
    }

    /// Serialize as a standalone document: XML declaration, no indentation,
    /// no self-closing tags.
    pub fn to_xml(&self) -> String {
        let mut writer = Writer::new(Vec::new());
        // writing into a Vec cannot fail
        let _ = writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))
            .and_then(|()| self.write(&mut writer));
        String::from_utf8_lossy(&writer.into_inner()).into_owned()
    }

    fn write(&self, writer: &mut Writer<Vec<u8>>) -> std::io::Result<()> {
        let mut start = BytesStart::new(self.name.as_str());
        for (prefix, uri) in &self.namespaces {
            let key = if prefix.is_empty() {
                "xmlns".to_string()
            } else {
                format!("xmlns:{prefix}")
            };
            start.push_attribute((key.as_str(), uri.as_str()));
        }
        for (name, value) in &self.attributes {
            start.push_attribute((name.as_str(), value.as_str()));
        }
        writer.write_event(Event::Start(start))?;

        for child in &self.children {
            match child {
                Node::Text(text) => writer.write_event(Event::Text(BytesText::from_escaped(
                    partial_escape(text.as_str()),
                )))?,
                Node::Element(e) => e.write(writer)?,
            }
        }

        writer.write_event(Event::End(BytesEnd::new(self.name.as_str())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NS: &str = "http://www.sped.fazenda.gov.br/nfse";

    fn body(el: &Element) -> String {
        el.to_xml()[XML_DECLARATION.len()..].to_string()
    }

    #[test]
    fn no_self_closing_and_attribute_order_kept() {
        let el = Element::new("a").with_attr("z", "1").with_attr("b", "2");
        assert_eq!(body(&el), r#"<a z="1" b="2"></a>"#);
        assert!(el.to_xml().starts_with(XML_DECLARATION));
    }

    #[test]
    fn escapes_text_and_attributes() {
        let el = Element::new("x")
            .with_attr("v", "a\"b<")
            .with_text("1 < 2 & 3 > 2 \"ok\"");
        assert_eq!(
            body(&el),
            "<x v=\"a&quot;b&lt;\">1 &lt; 2 &amp; 3 &gt; 2 \"ok\"</x>"
        );
    }

    #[test]
    fn namespaces_written_where_declared() {
        let mut inf = Element::new("infDPS").with_attr("Id", "DPS1");
        inf.add_text("tpAmb", "2");
        let mut root = Element::new("DPS")
            .with_namespace("", NS)
            .with_attr("versao", "1.01");
        root.push(inf);

        assert_eq!(
            body(&root),
            format!(
                r#"<DPS xmlns="{NS}" versao="1.01"><infDPS Id="DPS1"><tpAmb>2</tpAmb></infDPS></DPS>"#
            )
        );

        let (inf, scope) = root
            .find_with_scope(&Scope::default(), &|e: &Element, _: &Scope| {
                e.attr("Id").is_some()
            })
            .unwrap();
        assert_eq!(inf.name, "infDPS");
        assert_eq!(scope.resolve(""), Some(NS));
    }

    #[test]
    fn strips_prefix_structurally() {
        let mut info = Element::new("ds:SignedInfo");
        info.push(Element::new("ds:Reference").with_attr("URI", "#x"));
        let mut sig = Element::new("ds:Signature").with_namespace("ds", "urn:dsig");
        sig.push(info);
        sig.strip_namespace_prefix("ds");

        assert_eq!(sig.name, "Signature");
        assert_eq!(sig.namespaces, vec![(String::new(), "urn:dsig".to_string())]);
        assert_eq!(
            body(&sig),
            r##"<Signature xmlns="urn:dsig"><SignedInfo><Reference URI="#x"></Reference></SignedInfo></Signature>"##
        );
    }

    #[test]
    fn optional_text_skipped_when_absent() {
        let mut el = Element::new("prest");
        el.add_opt_text("IM", None).add_opt_text("email", Some("a@b.c"));
        assert_eq!(el.elements().count(), 1);
        assert_eq!(el.child_text("email").as_deref(), Some("a@b.c"));
    }
}
