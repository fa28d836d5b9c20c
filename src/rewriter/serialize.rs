//! Serialization of a parsed document with pending edits applied.

use std::collections::{HashMap, HashSet};

use ego_tree::{NodeId, NodeRef};
use scraper::{Html, node::Node};

/// HTML5 void elements that must not have a closing tag.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose text children are written out without escaping.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "xmp", "iframe", "noembed", "noframes", "plaintext", "noscript",
];

/// Mutations collected during the rewrite walk, keyed by node.
///
/// The parsed tree itself is never modified; edits are applied while
/// writing it back out.
#[derive(Debug, Default)]
pub(crate) struct Edits {
    removed: HashSet<NodeId>,
    attrs: HashMap<NodeId, Vec<(&'static str, String)>>,
}

impl Edits {
    /// Drop the node and its whole subtree from the output.
    pub(crate) fn remove(&mut self, id: NodeId) {
        self.removed.insert(id);
    }

    /// Override (or add) an attribute on an element.
    pub(crate) fn set_attr(&mut self, id: NodeId, name: &'static str, value: impl Into<String>) {
        let value = value.into();
        let overrides = self.attrs.entry(id).or_default();
        match overrides.iter_mut().find(|slot| slot.0 == name) {
            Some(slot) => slot.1 = value,
            None => overrides.push((name, value)),
        }
    }
}

pub(crate) fn serialize_tree(html: &Html, edits: &Edits) -> String {
    let mut out = String::new();
    serialize_node(html.tree.root(), edits, false, &mut out);
    out
}

fn serialize_node(node: NodeRef<Node>, edits: &Edits, raw_text: bool, out: &mut String) {
    let id = node.id();
    if edits.removed.contains(&id) {
        return;
    }

    match node.value() {
        Node::Document | Node::Fragment => {
            for child in node.children() {
                serialize_node(child, edits, false, out);
            }
        }
        Node::Doctype(doctype) => {
            out.push_str("<!DOCTYPE ");
            out.push_str(doctype.name());
            let (public_id, system_id) = (doctype.public_id(), doctype.system_id());
            if !public_id.is_empty() {
                out.push_str(&format!(" PUBLIC \"{public_id}\""));
                if !system_id.is_empty() {
                    out.push_str(&format!(" \"{system_id}\""));
                }
            } else if !system_id.is_empty() {
                out.push_str(&format!(" SYSTEM \"{system_id}\""));
            }
            out.push('>');
        }
        Node::Element(el) => {
            let tag = el.name();
            out.push('<');
            out.push_str(tag);

            let overrides = edits.attrs.get(&id);
            let override_for = |name: &str| {
                overrides.and_then(|o| o.iter().find(|slot| slot.0 == name).map(|slot| &slot.1))
            };
            for (k, v) in el.attrs() {
                let v = override_for(k).map(String::as_str).unwrap_or(v);
                push_attr(out, k, v);
            }
            for (k, v) in overrides.into_iter().flatten() {
                if el.attr(k).is_none() {
                    push_attr(out, k, v);
                }
            }
            out.push('>');

            if VOID_ELEMENTS.contains(&tag) {
                return;
            }

            let raw = RAW_TEXT_ELEMENTS.contains(&tag);
            for child in node.children() {
                serialize_node(child, edits, raw, out);
            }

            out.push_str("</");
            out.push_str(tag);
            out.push('>');
        }
        Node::Text(text) => {
            if raw_text {
                out.push_str(text.as_ref());
            } else {
                escape_into(out, text.as_ref(), false);
            }
        }
        Node::Comment(comment) => {
            out.push_str("<!--");
            out.push_str(comment.as_ref());
            out.push_str("-->");
        }
        _ => {}
    }
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    out.push(' ');
    out.push_str(name);
    out.push_str("=\"");
    escape_into(out, value, true);
    out.push('"');
}

fn escape_into(out: &mut String, text: &str, attr_mode: bool) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '\u{a0}' => out.push_str("&nbsp;"),
            '"' if attr_mode => out.push_str("&quot;"),
            '<' if !attr_mode => out.push_str("&lt;"),
            '>' if !attr_mode => out.push_str("&gt;"),
            c => out.push(c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn first_element(html: &Html, tag: &str) -> NodeId {
        html.tree
            .root()
            .descendants()
            .find(|n| matches!(n.value(), Node::Element(el) if el.name() == tag))
            .unwrap()
            .id()
    }

    #[test]
    fn unedited_document_keeps_structure() {
        let html = Html::parse_document("<!doctype html><p class=\"x\">Hi</p>");
        let out = serialize_tree(&html, &Edits::default());
        assert!(out.starts_with("<!DOCTYPE html>"));
        assert!(out.contains(r#"<p class="x">Hi</p>"#));
    }

    #[test]
    fn legacy_doctype_keeps_identifiers() {
        let html = Html::parse_document(concat!(
            r#"<!DOCTYPE HTML PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "#,
            r#""http://www.w3.org/TR/html4/loose.dtd"><p>x</p>"#,
        ));
        let out = serialize_tree(&html, &Edits::default());
        assert!(out.starts_with(concat!(
            r#"<!DOCTYPE html PUBLIC "-//W3C//DTD HTML 4.01 Transitional//EN" "#,
            r#""http://www.w3.org/TR/html4/loose.dtd">"#,
        )));

        let html = Html::parse_document(r#"<!DOCTYPE html SYSTEM "about:legacy-compat"><p>x</p>"#);
        let out = serialize_tree(&html, &Edits::default());
        assert!(out.starts_with(r#"<!DOCTYPE html SYSTEM "about:legacy-compat">"#));
    }

    #[test]
    fn removed_subtree_is_skipped() {
        let html = Html::parse_document("<div><span>gone</span></div><p>kept</p>");
        let mut edits = Edits::default();
        edits.remove(first_element(&html, "div"));
        let out = serialize_tree(&html, &edits);
        assert!(!out.contains("gone"));
        assert!(out.contains("<p>kept</p>"));
    }

    #[test]
    fn attribute_overrides_replace_and_append() {
        let html = Html::parse_document(r#"<a href="x" id="y">L</a>"#);
        let a = first_element(&html, "a");
        let mut edits = Edits::default();
        edits.set_attr(a, "href", "/one");
        edits.set_attr(a, "href", "/two");
        edits.set_attr(a, "target", "_self");
        let out = serialize_tree(&html, &edits);
        assert!(out.contains(r#"href="/two""#));
        assert!(out.contains(r#"id="y""#));
        assert!(out.contains(r#"target="_self""#));
        assert!(!out.contains(r#"href="x""#));
        assert_eq!(out.matches("href=").count(), 1);
    }

    #[test]
    fn text_and_attributes_are_escaped() {
        let html = Html::parse_document(r#"<p title="a&quot;b">1 &lt; 2 &amp; 3</p>"#);
        let out = serialize_tree(&html, &Edits::default());
        assert!(out.contains(r#"title="a&quot;b""#));
        assert!(out.contains("1 &lt; 2 &amp; 3"));
    }

    #[test]
    fn script_text_is_raw() {
        let html = Html::parse_document("<script>if (a < b && c) {}</script>");
        let out = serialize_tree(&html, &Edits::default());
        assert!(out.contains("<script>if (a < b && c) {}</script>"));
    }

    #[test]
    fn void_elements_have_no_closing_tag() {
        let html = Html::parse_document(r#"<p>a<br>b<img src="/x.png"></p>"#);
        let out = serialize_tree(&html, &Edits::default());
        assert!(!out.contains("</br>"));
        assert!(!out.contains("</img>"));
    }
}
