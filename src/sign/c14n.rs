//! Canonical XML 1.0 through libxml2.
//!
//! Signing and verification both canonicalize from the serialized document,
//! so comments are dropped and processing instructions are kept exactly as
//! libxml2 renders them.

use libxml::parser::{Parser, ParserOptions};
use libxml::tree::{Document, Node, c14n};

use super::SigningError;

fn c14n_options() -> c14n::CanonicalizationOptions {
    c14n::CanonicalizationOptions {
        mode: c14n::CanonicalizationMode::Canonical1_0,
        inclusive_ns_prefixes: vec![],
        with_comments: false,
    }
}

/// Strict parse: no error recovery, no network access, whitespace kept.
pub(crate) fn parse_document(xml: &str) -> Result<Document, SigningError> {
    let options = ParserOptions {
        recover: false,
        no_net: true,
        no_blanks: false,
        ..ParserOptions::default()
    };
    Parser::default()
        .parse_string_with_options(xml, options)
        .map_err(|e| SigningError::Document(format!("failed to parse xml: {e:?}")))
}

/// Inclusive C14N of the subtree rooted at `node`, with the namespaces it
/// inherits rendered on the apex.
pub(crate) fn canonicalize(node: &Node) -> Result<String, SigningError> {
    let mut node = node.clone();
    node.canonicalize(c14n_options())
        .map_err(|e| SigningError::Document(format!("failed to canonicalize xml: {e:?}")))
}

/// Depth-first search for the first element (or `node` itself) matching `pred`.
pub(crate) fn find_element<F>(node: &Node, pred: &F) -> Option<Node>
where
    F: Fn(&Node) -> bool,
{
    if pred(node) {
        return Some(node.clone());
    }
    node.get_child_elements()
        .iter()
        .find_map(|child| find_element(child, pred))
}

pub(crate) fn child_element(node: &Node, local_name: &str) -> Option<Node> {
    node.get_child_elements()
        .into_iter()
        .find(|e| e.get_name() == local_name)
}

pub(crate) fn namespace_of(node: &Node) -> Option<String> {
    node.get_namespace().map(|ns| ns.get_href())
}

pub(crate) fn root_of(document: &Document) -> Result<Node, SigningError> {
    document
        .get_root_element()
        .ok_or_else(|| SigningError::Document("document has no root element".into()))
}

/// Copy of `document` with every element matching `pred` removed (the
/// enveloped-signature transform).
pub(crate) fn without_elements<F>(document: &Document, pred: &F) -> Result<Document, SigningError>
where
    F: Fn(&Node) -> bool,
{
    let copy = document
        .dup()
        .map_err(|e| SigningError::Document(format!("failed to duplicate xml: {e:?}")))?;
    let root = root_of(&copy)?;
    while let Some(mut node) = find_element(&root, pred) {
        if node == root {
            return Err(SigningError::Document(
                "cannot remove the document element".into(),
            ));
        }
        node.unlink();
    }
    Ok(copy)
}
