//! Builder for the proxy's deployment configuration.

use std::net::SocketAddr;
use std::time::Duration;

use url::Url;

use crate::error::{ProxyError, Result};

/// Default upstream site.
pub const DEFAULT_UPSTREAM: &str = "https://www.rolimons.com";

/// Default listen address.
pub const DEFAULT_LISTEN: &str = "127.0.0.1:3000";

/// Default cap on an upstream response body (8 MiB).
pub const DEFAULT_MAX_BODY_BYTES: usize = 8 * 1024 * 1024;

/// Validated configuration passed into server construction.
#[derive(Clone, Debug)]
pub struct ProxyConfig {
    upstream: Url,
    listen: SocketAddr,
    fetch_timeout: Duration,
    user_agent: String,
    system_proxy: bool,
    max_body_bytes: usize,
}

impl ProxyConfig {
    /// Start a [`ProxyConfigBuilder`] with defaults.
    pub fn builder() -> ProxyConfigBuilder {
        ProxyConfigBuilder::new()
    }

    pub fn upstream(&self) -> &Url {
        &self.upstream
    }

    /// Upstream host with any leading `www.` removed.
    ///
    /// An explicit non-default port is kept as `host:port`.
    pub fn upstream_host(&self) -> String {
        let host = self.upstream.host_str().unwrap_or_default();
        let host = host.strip_prefix("www.").unwrap_or(host);
        match self.upstream.port() {
            Some(port) => format!("{host}:{port}"),
            None => host.to_string(),
        }
    }

    pub fn listen(&self) -> SocketAddr {
        self.listen
    }

    pub fn fetch_timeout(&self) -> Duration {
        self.fetch_timeout
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Whether upstream fetches honour `HTTP(S)_PROXY` from the environment.
    pub fn system_proxy(&self) -> bool {
        self.system_proxy
    }

    /// Largest upstream body that will be buffered for rewriting.
    pub fn max_body_bytes(&self) -> usize {
        self.max_body_bytes
    }
}

/// Fluent builder for [`ProxyConfig`].
///
/// # Example
///
/// ```
/// use itemsale_proxy::ProxyConfig;
/// use std::time::Duration;
///
/// let config = ProxyConfig::builder()
///     .upstream("https://www.rolimons.com")
///     .listen("0.0.0.0:8080")
///     .port(9000)
///     .fetch_timeout(Duration::from_secs(5))
///     .build()
///     .unwrap();
/// assert_eq!(config.upstream_host(), "rolimons.com");
/// assert_eq!(config.listen().port(), 9000);
/// ```
pub struct ProxyConfigBuilder {
    upstream: String,
    listen: String,
    port: Option<u16>,
    fetch_timeout: Duration,
    user_agent: String,
    system_proxy: bool,
    max_body_bytes: usize,
}

impl ProxyConfigBuilder {
    /// Create a new builder with sensible defaults.
    ///
    /// Defaults: upstream `https://www.rolimons.com`, listen `127.0.0.1:3000`,
    /// fetch timeout 10 s, body cap 8 MiB, system proxy honoured.
    pub fn new() -> Self {
        Self {
            upstream: DEFAULT_UPSTREAM.to_string(),
            listen: DEFAULT_LISTEN.to_string(),
            port: None,
            fetch_timeout: Duration::from_secs(10),
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
            system_proxy: true,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }

    /// Base URL of the proxied site.
    pub fn upstream(mut self, url: impl Into<String>) -> Self {
        self.upstream = url.into();
        self
    }

    /// Socket address to listen on.
    pub fn listen(mut self, addr: impl Into<String>) -> Self {
        self.listen = addr.into();
        self
    }

    /// Override only the port of the listen address.
    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    /// Upper bound on a single upstream fetch.
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// `User-Agent` header sent upstream.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Route upstream fetches through the environment's proxy settings.
    pub fn system_proxy(mut self, enabled: bool) -> Self {
        self.system_proxy = enabled;
        self
    }

    /// Maximum upstream body size in bytes.
    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    /// Validate and produce the [`ProxyConfig`].
    pub fn build(self) -> Result<ProxyConfig> {
        let upstream = Url::parse(&self.upstream)
            .map_err(|e| ProxyError::Config(format!("invalid upstream {:?}: {e}", self.upstream)))?;
        if !matches!(upstream.scheme(), "http" | "https") {
            return Err(ProxyError::Config(format!(
                "upstream must be http or https, got {}",
                upstream.scheme()
            )));
        }
        if upstream.host_str().is_none_or(str::is_empty) {
            return Err(ProxyError::Config("upstream has no host".into()));
        }

        let mut listen: SocketAddr = self
            .listen
            .parse()
            .map_err(|e| ProxyError::Config(format!("invalid listen address {:?}: {e}", self.listen)))?;
        if let Some(port) = self.port {
            listen.set_port(port);
        }

        if self.fetch_timeout.is_zero() {
            return Err(ProxyError::Config("fetch timeout must be non-zero".into()));
        }
        if self.max_body_bytes == 0 {
            return Err(ProxyError::Config("body size cap must be non-zero".into()));
        }

        Ok(ProxyConfig {
            upstream,
            listen,
            fetch_timeout: self.fetch_timeout,
            user_agent: self.user_agent,
            system_proxy: self.system_proxy,
            max_body_bytes: self.max_body_bytes,
        })
    }
}

impl Default for ProxyConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
