//! Allow-list matching for outbound references.
//!
//! Exactly one resource shape may be exposed to the client: the item-sale page
//! of the upstream site, addressed by a numeric id. [`AllowList`] decides
//! whether a raw `href`/`action` value points at such a page and extracts the
//! id when it does.

use std::fmt;

use regex::Regex;
use url::Url;

use crate::error::{ProxyError, Result};

/// Same-origin path that disallowed references are rewritten to.
pub const ERROR_PATH: &str = "/error";

/// Placeholder origin relative values are resolved against.
const LOCAL_ORIGIN: &str = "http://same-origin.invalid/";

/// Numeric identifier of an item-sale page.
///
/// Always non-empty and made only of ASCII decimal digits.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ItemId(String);

impl ItemId {
    /// Validate a raw id, e.g. a path parameter.
    ///
    /// Returns `None` unless every character is an ASCII digit.
    pub fn parse(raw: &str) -> Option<Self> {
        if !raw.is_empty() && raw.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self(raw.to_string()))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The same-origin path serving this item, `/itemsale/{id}`.
    pub fn path(&self) -> String {
        format!("/itemsale/{}", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compiled predicate for the single permitted reference pattern.
///
/// Accepts a bare `/itemsale/<digits>` path or the same path prefixed with
/// `http(s)://[www.]<host>`, with an optional trailing slash. Scheme and host
/// compare case-insensitively.
///
/// # Example
///
/// ```
/// use itemsale_proxy::AllowList;
///
/// let allow = AllowList::new("rolimons.com").unwrap();
/// assert!(allow.is_allowed(Some("https://www.rolimons.com/itemsale/4512")));
/// assert!(!allow.is_allowed(Some("/itemsale/abc")));
/// assert_eq!(allow.extract_id(Some("/itemsale/77/")).unwrap().as_str(), "77");
/// ```
#[derive(Clone, Debug)]
pub struct AllowList {
    pattern: Regex,
}

impl AllowList {
    /// Compile the matcher for the given upstream host (without `www.`).
    pub fn new(host: &str) -> Result<Self> {
        let host = host.trim().trim_start_matches("www.");
        if host.is_empty() {
            return Err(ProxyError::Config("upstream host is empty".into()));
        }
        let pattern = format!(
            r"^(?:(?i:https?://(?:www\.)?{}))?/itemsale/([0-9]+)/?$",
            regex::escape(host)
        );
        let pattern = Regex::new(&pattern).map_err(|e| ProxyError::Config(e.to_string()))?;
        Ok(Self { pattern })
    }

    /// Returns `true` if `href` references an allowed item-sale page.
    pub fn is_allowed(&self, href: Option<&str>) -> bool {
        self.extract_id(href).is_some()
    }

    /// Extract the item id from an allowed reference.
    ///
    /// Returns `None` for absent, empty, or non-matching input.
    pub fn extract_id(&self, href: Option<&str>) -> Option<ItemId> {
        let caps = self.pattern.captures(href?)?;
        ItemId::parse(caps.get(1)?.as_str())
    }
}

/// Returns `true` if `value` is a path on this origin.
///
/// The value is read the way a browser's URL parser reads it: ASCII tab and
/// newlines are dropped and leading C0 controls and spaces are trimmed. It must
/// then start with `/` and still resolve to this origin, which rules out
/// `//host/...`, `/\host/...` and their whitespace-smuggled variants.
pub fn is_same_origin_path(value: &str) -> bool {
    let cleaned: String = value
        .chars()
        .filter(|c| !matches!(c, '\t' | '\n' | '\r'))
        .collect();
    let cleaned = cleaned.trim_start_matches(|c: char| c <= ' ');
    if !cleaned.starts_with('/') {
        return false;
    }
    let Ok(base) = Url::parse(LOCAL_ORIGIN) else {
        return false;
    };
    base.join(cleaned)
        .is_ok_and(|resolved| resolved.origin() == base.origin())
}
