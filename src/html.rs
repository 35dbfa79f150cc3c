//! Lenient HTML parsing into a xot tree.
//!
//! The tree-sitter HTML grammar recovers from malformed markup (unclosed
//! tags, stray end tags, bad nesting) instead of rejecting it, so a
//! best-effort tree can always be attempted. A builder walks the parse tree
//! and constructs xot elements, attributes, text, and comments; doctypes and
//! erroneous end tags are dropped.

use std::collections::HashMap;

use tree_sitter::Node as TsNode;
use xot::{NameId, Node as XotNode, Xot};

use crate::Error;

/// Parse HTML source into `xot`, returning the new document node.
///
/// A single top-level element becomes the root. Multiple top-level elements
/// are wrapped in a synthesized `html` element. Input with no element at all
/// fails with [`Error::NoRootElement`].
pub(crate) fn parse_into(xot: &mut Xot, source: &str) -> Result<XotNode, Error> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&tree_sitter_html::LANGUAGE.into())
        .map_err(|e| Error::Parse(e.to_string()))?;
    let tree = parser
        .parse(source, None)
        .ok_or_else(|| Error::Parse("html parser produced no tree".to_string()))?;

    let mut builder = HtmlBuilder {
        xot,
        source,
        name_cache: HashMap::new(),
    };
    builder.build_document(tree.root_node())
}

/// Builds a xot tree from a tree-sitter HTML parse tree.
struct HtmlBuilder<'a> {
    xot: &'a mut Xot,
    source: &'a str,
    name_cache: HashMap<String, NameId>,
}

impl HtmlBuilder<'_> {
    fn get_name(&mut self, name: &str) -> NameId {
        if let Some(&id) = self.name_cache.get(name) {
            id
        } else {
            let id = self.xot.add_name(name);
            self.name_cache.insert(name.to_string(), id);
            id
        }
    }

    fn text(&self, node: TsNode) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    fn build_document(&mut self, document: TsNode) -> Result<XotNode, Error> {
        let top_level: Vec<TsNode> = named_children(document)
            .into_iter()
            .filter(|n| is_element_kind(n.kind()))
            .collect();

        let root = match top_level.len() {
            0 => return Err(Error::NoRootElement),
            1 => self
                .build_element(top_level[0])
                .map_err(|e| Error::Parse(e.to_string()))?
                .ok_or(Error::NoRootElement)?,
            _ => {
                // No single root in the input; synthesize one.
                let html_name = self.get_name("html");
                let wrapper = self.xot.new_element(html_name);
                self.build_children(&named_children(document), None, wrapper)
                    .map_err(|e| Error::Parse(e.to_string()))?;
                wrapper
            }
        };

        self.xot
            .new_document_with_element(root)
            .map_err(|e| Error::Parse(e.to_string()))
    }

    /// Build a run of sibling content nodes into `parent`.
    ///
    /// The grammar's `text` and `entity` tokens exclude the whitespace
    /// around them, so the gaps between consecutive children are read back
    /// from the source and emitted as text; `prev_end` is the byte offset
    /// content starts at (the end of the start tag, if any).
    fn build_children(
        &mut self,
        children: &[TsNode],
        mut prev_end: Option<usize>,
        parent: XotNode,
    ) -> Result<(), xot::Error> {
        for &child in children {
            if let Some(prev) = prev_end {
                let gap = self.source.get(prev..child.start_byte()).unwrap_or("");
                if !gap.is_empty() && gap.chars().all(char::is_whitespace) {
                    let text_node = self.xot.new_text(gap);
                    self.xot.append(parent, text_node)?;
                }
            }
            self.build_content(child, parent)?;
            prev_end = Some(child.end_byte());
        }
        Ok(())
    }

    /// Build one content node (element, text, entity, comment) into `parent`.
    fn build_content(&mut self, node: TsNode, parent: XotNode) -> Result<(), xot::Error> {
        match node.kind() {
            kind if is_element_kind(kind) => {
                if let Some(element) = self.build_element(node)? {
                    self.xot.append(parent, element)?;
                }
            }
            "text" | "raw_text" => {
                let text = self.text(node).to_string();
                let text_node = self.xot.new_text(&text);
                self.xot.append(parent, text_node)?;
            }
            "entity" => {
                let decoded = decode_entity(self.text(node));
                let text_node = self.xot.new_text(&decoded);
                self.xot.append(parent, text_node)?;
            }
            "comment" => {
                let raw = self.text(node);
                let body = raw
                    .strip_prefix("<!--")
                    .and_then(|s| s.strip_suffix("-->"))
                    .unwrap_or(raw)
                    .to_string();
                let comment = self.xot.new_comment(&body);
                self.xot.append(parent, comment)?;
            }
            // Salvage whatever parses inside unrecognized regions.
            "ERROR" => {
                for child in named_children(node) {
                    self.build_content(child, parent)?;
                }
            }
            // doctype, erroneous_end_tag
            _ => {}
        }
        Ok(())
    }

    /// Build an `element`, `script_element`, or `style_element` node.
    ///
    /// Returns `None` when recovery produced an element with no usable start
    /// tag.
    fn build_element(&mut self, node: TsNode) -> Result<Option<XotNode>, xot::Error> {
        let Some(tag) = named_children(node)
            .into_iter()
            .find(|n| matches!(n.kind(), "start_tag" | "self_closing_tag"))
        else {
            return Ok(None);
        };

        let Some(tag_name) = named_children(tag)
            .into_iter()
            .find(|n| n.kind() == "tag_name")
        else {
            return Ok(None);
        };
        let name = self.text(tag_name).to_lowercase();
        let name_id = self.get_name(&name);
        let element = self.xot.new_element(name_id);

        for attribute in named_children(tag) {
            if attribute.kind() == "attribute" {
                if let Some((attr_name, value)) = self.parse_attribute(attribute) {
                    let attr_id = self.get_name(&attr_name);
                    self.xot.attributes_mut(element).insert(attr_id, value);
                }
            }
        }

        let content: Vec<TsNode> = named_children(node)
            .into_iter()
            .filter(|n| {
                !matches!(
                    n.kind(),
                    "start_tag" | "self_closing_tag" | "end_tag" | "erroneous_end_tag"
                )
            })
            .collect();
        self.build_children(&content, Some(tag.end_byte()), element)?;

        Ok(Some(element))
    }

    /// Extract `(name, value)` from an `attribute` node. A bare attribute
    /// gets an empty value.
    fn parse_attribute(&mut self, attribute: TsNode) -> Option<(String, String)> {
        let mut name = None;
        let mut value = String::new();
        for child in named_children(attribute) {
            match child.kind() {
                "attribute_name" => name = Some(self.text(child).to_lowercase()),
                "attribute_value" => value = decode_entities(self.text(child)),
                "quoted_attribute_value" => {
                    if let Some(inner) = named_children(child)
                        .into_iter()
                        .find(|n| n.kind() == "attribute_value")
                    {
                        value = decode_entities(self.text(inner));
                    }
                }
                _ => {}
            }
        }
        name.map(|n| (n, value))
    }
}

fn is_element_kind(kind: &str) -> bool {
    matches!(kind, "element" | "script_element" | "style_element")
}

fn named_children(node: TsNode) -> Vec<TsNode> {
    let mut cursor = node.walk();
    let children = node.named_children(&mut cursor).collect();
    children
}

/// Decode one entity reference (`&amp;`, `&#65;`, `&#x41;`).
///
/// Unknown references come back unchanged; a lenient parse keeps what it
/// cannot interpret.
fn decode_entity(entity: &str) -> String {
    let Some(body) = entity.strip_prefix('&').and_then(|s| s.strip_suffix(';')) else {
        return entity.to_string();
    };
    let decoded = match body {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            if let Some(num) = body.strip_prefix("#x").or_else(|| body.strip_prefix("#X")) {
                u32::from_str_radix(num, 16).ok().and_then(char::from_u32)
            } else if let Some(num) = body.strip_prefix('#') {
                num.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                None
            }
        }
    };
    match decoded {
        Some(c) => c.to_string(),
        None => entity.to_string(),
    }
}

/// Decode every entity reference inside a string.
fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';') {
            Some(end) => {
                out.push_str(&decode_entity(&tail[..=end]));
                rest = &tail[end + 1..];
            }
            None => {
                out.push_str(tail);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> Result<(Xot, XotNode), Error> {
        let mut xot = Xot::new();
        let doc = parse_into(&mut xot, source)?;
        Ok((xot, doc))
    }

    fn root_tag(xot: &Xot, doc: XotNode) -> String {
        let root = xot.document_element(doc).unwrap();
        let element = xot.element(root).unwrap();
        xot.local_name_str(element.name()).to_string()
    }

    #[test]
    fn test_well_formed() {
        let (xot, doc) = parse("<div><p>hello</p></div>").unwrap();
        assert_eq!(root_tag(&xot, doc), "div");
        let root = xot.document_element(doc).unwrap();
        assert_eq!(xot.string_value(root), "hello");
    }

    #[test]
    fn test_recovers_unclosed_tags() {
        let (xot, doc) = parse("<div><p>one<p>two</div>").unwrap();
        assert_eq!(root_tag(&xot, doc), "div");
        let root = xot.document_element(doc).unwrap();
        assert_eq!(xot.string_value(root), "onetwo");
    }

    #[test]
    fn test_multiple_roots_wrapped() {
        let (xot, doc) = parse("<p>one</p><p>two</p>").unwrap();
        assert_eq!(root_tag(&xot, doc), "html");
        let root = xot.document_element(doc).unwrap();
        assert_eq!(xot.children(root).count(), 2);
    }

    #[test]
    fn test_no_elements_fails() {
        assert!(matches!(parse("just text"), Err(Error::NoRootElement)));
        assert!(matches!(parse(""), Err(Error::NoRootElement)));
    }

    #[test]
    fn test_doctype_skipped() {
        let (xot, doc) = parse("<!DOCTYPE html><div>x</div>").unwrap();
        assert_eq!(root_tag(&xot, doc), "div");
    }

    #[test]
    fn test_attributes() {
        let (xot, doc) = parse(r#"<div id="main" hidden data-x=raw>x</div>"#).unwrap();
        let root = xot.document_element(doc).unwrap();
        let attrs = xot.attributes(root);
        let mut pairs: Vec<(String, String)> = attrs
            .iter()
            .map(|(id, v)| (xot.local_name_str(id).to_string(), v.to_string()))
            .collect();
        pairs.sort();
        assert_eq!(
            pairs,
            vec![
                ("data-x".to_string(), "raw".to_string()),
                ("hidden".to_string(), String::new()),
                ("id".to_string(), "main".to_string()),
            ]
        );
    }

    #[test]
    fn test_tag_names_lowercased() {
        let (xot, doc) = parse("<DIV>x</DIV>").unwrap();
        assert_eq!(root_tag(&xot, doc), "div");
    }

    #[test]
    fn test_entities_decoded() {
        let (xot, doc) = parse("<p>a &amp; b &#x41;</p>").unwrap();
        let root = xot.document_element(doc).unwrap();
        assert_eq!(xot.string_value(root), "a & b A");
    }

    #[test]
    fn test_whitespace_between_content_kept() {
        let (xot, doc) = parse("<p>hello <b>world</b> again</p>").unwrap();
        let root = xot.document_element(doc).unwrap();
        assert_eq!(xot.string_value(root), "hello world again");
    }

    #[test]
    fn test_decode_entity_unknown_kept() {
        assert_eq!(decode_entity("&bogus;"), "&bogus;");
        assert_eq!(decode_entity("&#xZZ;"), "&#xZZ;");
    }

    #[test]
    fn test_decode_entities_in_attribute_values() {
        assert_eq!(decode_entities("a&amp;b&lt;c"), "a&b<c");
        assert_eq!(decode_entities("no refs"), "no refs");
        assert_eq!(decode_entities("dangling &amp"), "dangling &amp");
    }

    #[test]
    fn test_script_raw_text() {
        let (xot, doc) = parse("<div><script>if (a < b) go()</script></div>").unwrap();
        let root = xot.document_element(doc).unwrap();
        let script = xot.children(root).next().unwrap();
        assert_eq!(xot.string_value(script), "if (a < b) go()");
    }
}
