//! Per-element rewrite rules, dispatched on the element's tag.

use ego_tree::NodeId;
use scraper::node::Element;

use super::RewriteSummary;
use super::serialize::Edits;
use crate::matcher::{AllowList, ERROR_PATH, is_same_origin_path};

/// Navigation target forced on every hyperlink so clicks stay in the frame.
const SAME_FRAME: &str = "_self";

/// Read-only method forced on rewritten forms.
const SAFE_METHOD: &str = "get";

/// The element types the rewriter acts on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ElementKind {
    Base,
    Anchor,
    Form,
    Script,
}

impl ElementKind {
    /// Dispatch table from tag name to rule. Everything else passes through.
    pub(crate) fn of(tag: &str) -> Option<Self> {
        match tag {
            "base" => Some(Self::Base),
            "a" | "area" => Some(Self::Anchor),
            "form" => Some(Self::Form),
            "script" => Some(Self::Script),
            _ => None,
        }
    }

    pub(crate) fn apply(
        self,
        id: NodeId,
        el: &Element,
        allow: &AllowList,
        edits: &mut Edits,
        summary: &mut RewriteSummary,
    ) {
        match self {
            Self::Base => {
                edits.remove(id);
                summary.bases_removed += 1;
            }
            Self::Anchor => rewrite_anchor(id, el, allow, edits, summary),
            Self::Form => rewrite_form(id, el, allow, edits, summary),
            Self::Script => match el.attr("src") {
                Some(src) if !is_same_origin_path(src) => {
                    edits.remove(id);
                    summary.scripts_removed += 1;
                }
                _ => {}
            },
        }
    }
}

fn rewrite_anchor(
    id: NodeId,
    el: &Element,
    allow: &AllowList,
    edits: &mut Edits,
    summary: &mut RewriteSummary,
) {
    let target = match allow.extract_id(el.attr("href")) {
        Some(item) => {
            summary.anchors_allowed += 1;
            item.path()
        }
        None => {
            summary.anchors_neutralized += 1;
            ERROR_PATH.to_string()
        }
    };
    edits.set_attr(id, "href", target);
    edits.set_attr(id, "target", SAME_FRAME);
}

fn rewrite_form(
    id: NodeId,
    el: &Element,
    allow: &AllowList,
    edits: &mut Edits,
    summary: &mut RewriteSummary,
) {
    let action = el.attr("action").unwrap_or_default();

    if let Some(item) = allow.extract_id(Some(action)) {
        edits.set_attr(id, "action", item.path());
        edits.set_attr(id, "method", SAFE_METHOD);
        summary.forms_allowed += 1;
    } else if !action.trim().is_empty() && !is_same_origin_path(action) {
        edits.set_attr(id, "action", ERROR_PATH);
        edits.set_attr(id, "method", SAFE_METHOD);
        summary.forms_neutralized += 1;
    }
}
