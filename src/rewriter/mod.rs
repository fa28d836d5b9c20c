//! Markup rewriting that keeps every navigation target on this origin.
//!
//! [`Rewriter::rewrite`] parses a fetched page, walks its elements and
//! applies one rule per element kind:
//!
//! - `<base>` -- removed.
//! - `<a>`/`<area>` -- `href` becomes `/itemsale/{id}` when allowed, `/error`
//!   otherwise; `target` is forced to `_self`.
//! - `<form>` -- allowed actions become `/itemsale/{id}`; foreign actions are
//!   neutralized to `/error`. Both get `method="get"`. Empty and same-origin
//!   actions are left alone.
//! - `<script src>` -- removed unless the source is a same-origin path.
//!   Inline scripts are not touched.

mod policy;
mod serialize;

use std::borrow::Cow;

use encoding_rs::{Encoding, UTF_8};
use scraper::Html;
use scraper::node::Node;

use self::policy::ElementKind;
use self::serialize::{Edits, serialize_tree};
use crate::error::{ProxyError, Result};
use crate::matcher::AllowList;

/// Counts of what a single rewrite pass changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RewriteSummary {
    pub bases_removed: usize,
    pub anchors_allowed: usize,
    pub anchors_neutralized: usize,
    pub forms_allowed: usize,
    pub forms_neutralized: usize,
    pub scripts_removed: usize,
}

/// Stateless HTML rewriter bound to one [`AllowList`].
///
/// # Example
///
/// ```
/// use itemsale_proxy::{AllowList, Rewriter};
///
/// let rewriter = Rewriter::new(AllowList::new("rolimons.com").unwrap());
/// let out = rewriter.rewrite(r#"<a href="https://evil.example/x">Go</a>"#);
/// assert!(out.contains(r#"href="/error""#));
/// ```
#[derive(Clone, Debug)]
pub struct Rewriter {
    allow: AllowList,
}

impl Rewriter {
    pub fn new(allow: AllowList) -> Self {
        Self { allow }
    }

    pub fn allow_list(&self) -> &AllowList {
        &self.allow
    }

    /// Rewrite an HTML document. Malformed markup is recovered by the parser.
    pub fn rewrite(&self, html: &str) -> String {
        self.rewrite_with_summary(html).0
    }

    /// Rewrite a raw response body.
    ///
    /// `charset` is the label from the upstream `Content-Type`; without one the
    /// body must be UTF-8. Fails with [`ProxyError::InvalidInput`] for unknown
    /// labels and for bytes that are malformed in the declared encoding.
    pub fn rewrite_body(&self, body: &[u8], charset: Option<&str>) -> Result<String> {
        let html = decode_body(body, charset)?;
        Ok(self.rewrite(&html))
    }

    /// Rewrite a document and report what was changed.
    pub fn rewrite_with_summary(&self, html: &str) -> (String, RewriteSummary) {
        let document = Html::parse_document(html);
        let mut edits = Edits::default();
        let mut summary = RewriteSummary::default();

        for node in document.tree.root().descendants() {
            let Node::Element(el) = node.value() else {
                continue;
            };
            if let Some(kind) = ElementKind::of(el.name()) {
                kind.apply(node.id(), el, &self.allow, &mut edits, &mut summary);
            }
        }

        tracing::debug!(?summary, "Rewrote document");
        (serialize_tree(&document, &edits), summary)
    }
}

fn decode_body<'a>(body: &'a [u8], charset: Option<&str>) -> Result<Cow<'a, str>> {
    let encoding = match charset {
        Some(label) => Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| {
            ProxyError::InvalidInput(format!("unsupported charset {label:?}"))
        })?,
        None => UTF_8,
    };
    if encoding == UTF_8 {
        return std::str::from_utf8(body)
            .map(Cow::Borrowed)
            .map_err(|e| ProxyError::InvalidInput(format!("body is not UTF-8: {e}")));
    }
    encoding
        .decode_without_bom_handling_and_without_replacement(body)
        .ok_or_else(|| {
            ProxyError::InvalidInput(format!("body is not valid {}", encoding.name()))
        })
}
