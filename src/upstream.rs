//! Single-attempt fetch client for the upstream site.

use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use reqwest::header::CONTENT_TYPE;
use url::Url;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::matcher::ItemId;

/// The upstream pages the proxy is willing to fetch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpstreamPage {
    /// The market-activity listing.
    MarketActivity,
    /// One item-sale page.
    ItemSale(ItemId),
}

impl UpstreamPage {
    /// Path of the page relative to the upstream root.
    pub fn path(&self) -> String {
        match self {
            UpstreamPage::MarketActivity => "marketactivity".to_string(),
            UpstreamPage::ItemSale(id) => format!("itemsale/{id}"),
        }
    }
}

/// A fetched HTML body and the charset its `Content-Type` declared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedPage {
    pub body: Vec<u8>,
    pub charset: Option<String>,
}

/// Pull the `charset` parameter out of a `Content-Type` value.
fn charset_from_content_type(content_type: &str) -> Option<String> {
    static CHARSET_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let re = CHARSET_RE
        .get_or_init(|| Regex::new(r#"(?i)charset\s*=\s*"?([^";,\s]+)"?"#).ok())
        .as_ref()?;
    let charset = re.captures(content_type)?.get(1)?.as_str().trim();
    (!charset.is_empty()).then(|| charset.to_ascii_lowercase())
}

/// HTTP client bound to one upstream base URL.
///
/// Every call makes at most one request, bounded by the configured timeout.
#[derive(Clone, Debug)]
pub struct UpstreamClient {
    client: Client,
    base: Url,
    max_body_bytes: usize,
}

impl UpstreamClient {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.fetch_timeout())
            .user_agent(config.user_agent());
        if !config.system_proxy() {
            builder = builder.no_proxy();
        }
        let client = builder
            .build()
            .map_err(|e| ProxyError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base: config.upstream().clone(),
            max_body_bytes: config.max_body_bytes(),
        })
    }

    /// Absolute URL of `page` on the upstream site.
    pub fn url_for(&self, page: &UpstreamPage) -> Result<Url> {
        self.base
            .join(&page.path())
            .map_err(|e| ProxyError::Config(format!("cannot join upstream URL: {e}")))
    }

    /// Fetch the raw HTML body of `page`.
    ///
    /// Bodies larger than the configured cap are abandoned with
    /// [`ProxyError::UpstreamTooLarge`] as soon as the cap is crossed.
    pub async fn fetch_page(&self, page: &UpstreamPage) -> Result<FetchedPage> {
        let url = self.url_for(page)?;
        tracing::debug!("Fetching {url}");

        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| ProxyError::UpstreamFetch {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProxyError::UpstreamStatus {
                url: url.to_string(),
                status,
            });
        }

        let mut charset = None;
        if let Some(content_type) = response.headers().get(CONTENT_TYPE) {
            let content_type = content_type.to_str().unwrap_or_default();
            if !content_type.to_ascii_lowercase().contains("html") {
                return Err(ProxyError::InvalidInput(format!(
                    "upstream {url} returned non-HTML content type {content_type:?}"
                )));
            }
            charset = charset_from_content_type(content_type);
        }

        let too_large = || ProxyError::UpstreamTooLarge {
            url: url.to_string(),
            limit: self.max_body_bytes,
        };
        if response
            .content_length()
            .is_some_and(|len| len > self.max_body_bytes as u64)
        {
            return Err(too_large());
        }

        let mut body = Vec::new();
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|source| ProxyError::UpstreamFetch {
                url: url.to_string(),
                source,
            })?
        {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(too_large());
            }
            body.extend_from_slice(&chunk);
        }
        tracing::debug!("Fetched {} bytes from {url}", body.len());
        Ok(FetchedPage { body, charset })
    }
}
