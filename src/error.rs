//! Error types for the `itemsale_proxy` crate.

/// All errors that can occur while serving a proxied page.
///
/// None of these are ever rendered to the client; the request boundary maps
/// every variant onto the static error page.
#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    /// The upstream request failed at the transport level or timed out.
    #[error("Upstream fetch of {url} failed: {source}")]
    UpstreamFetch {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The upstream answered with a non-success status.
    #[error("Upstream {url} returned status {status}")]
    UpstreamStatus {
        url: String,
        status: reqwest::StatusCode,
    },

    /// The upstream body exceeded the configured size cap.
    #[error("Upstream {url} sent more than {limit} bytes")]
    UpstreamTooLarge { url: String, limit: usize },

    /// The document handed to the rewriter was not usable HTML text.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// The builder or command-line configuration is invalid.
    #[error("Config error: {0}")]
    Config(String),

    /// Binding or serving the listener failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProxyError {
    /// Returns `true` for failures caused by the upstream site rather than
    /// by this process.
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            ProxyError::UpstreamFetch { .. }
                | ProxyError::UpstreamStatus { .. }
                | ProxyError::UpstreamTooLarge { .. }
        )
    }
}

/// A type alias for `Result<T, ProxyError>`.
pub type Result<T> = std::result::Result<T, ProxyError>;
