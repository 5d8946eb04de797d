//! Inbound HTML rewriting: make every link open in a new browsing context.
//!
//! Message bodies are displayed inside an iframe on the inbox page; an
//! anchor without a target would navigate the frame away from the inbox.

use kuchiki::NodeRef;
use kuchiki::traits::*;

use crate::error::SanitizeError;

const ANCHOR_TARGET: &str = "_blank";

/// Set `target="_blank"` on every `<a>` element.
///
/// Fragments come back as fragments: the parser's implied `<html>`, `<head>`
/// and `<body>` wrappers are dropped again on output. Input that is already a
/// complete document is serialized as a document. Applying this twice yields
/// the same bytes as applying it once.
pub fn rewrite_anchor_targets(html: &str) -> Result<String, SanitizeError> {
    if html.is_empty() {
        return Ok(String::new());
    }

    let document = kuchiki::parse_html().one(html);

    let anchors: Vec<_> = document
        .select("a")
        .map_err(|()| SanitizeError::Selector("a".into()))?
        .collect();
    for anchor in anchors {
        anchor
            .attributes
            .borrow_mut()
            .insert("target", ANCHOR_TARGET.to_string());
    }

    let mut out = Vec::with_capacity(html.len() + 32);
    if is_full_document(html) {
        document.serialize(&mut out)?;
    } else {
        serialize_fragment(&document, &mut out)?;
    }

    Ok(String::from_utf8(out)?)
}

/// Serialize without the implied `<html>`, `<head>` and `<body>` wrappers.
///
/// Comments outside the wrappers (before the first element or after the body)
/// stay where they were. Leading `<style>`/`<meta>` of a fragment are hoisted
/// into `<head>` by the parser, so head content is emitted before the body.
fn serialize_fragment(document: &NodeRef, out: &mut Vec<u8>) -> Result<(), SanitizeError> {
    for node in document.children() {
        if node.as_element().is_none() {
            node.serialize(out)?;
            continue;
        }
        for section in node.children() {
            if section.as_element().is_none() {
                section.serialize(out)?;
                continue;
            }
            for child in section.children() {
                child.serialize(out)?;
            }
        }
    }
    Ok(())
}

/// True when the first token after whitespace and comments opens a document:
/// a doctype or an `<html>` start tag.
fn is_full_document(html: &str) -> bool {
    let mut rest = html.trim_start();
    while let Some(comment) = rest.strip_prefix("<!--") {
        let Some(end) = comment.find("-->") else {
            return false;
        };
        rest = comment[end + 3..].trim_start();
    }

    let lead: String = rest.chars().take(9).collect::<String>().to_ascii_lowercase();
    if lead.starts_with("<!doctype") {
        return true;
    }
    lead.strip_prefix("<html").is_some_and(|after| {
        after
            .chars()
            .next()
            .is_some_and(|c| c == '>' || c == '/' || c.is_ascii_whitespace())
    })
}
