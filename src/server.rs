//! HTTP surface of the proxy.
//!
//! - `GET /`                -- embedded page hosting the viewer iframe
//! - `GET /marketactivity`  -- rewritten market-activity listing
//! - `GET /itemsale/{id}`   -- rewritten item-sale page (digits only)
//! - `GET /error`           -- static error page
//!
//! Any other path gets the static error page with `404 Not Found`.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::get;
use tokio::net::TcpListener;

use crate::config::ProxyConfig;
use crate::error::{ProxyError, Result};
use crate::matcher::{AllowList, ERROR_PATH, ItemId};
use crate::rewriter::Rewriter;
use crate::upstream::{UpstreamClient, UpstreamPage};

/// Static error body returned for every failure.
pub const ERROR_PAGE: &str = include_str!("../assets/error.html");

/// Embedded viewer page.
const INDEX_PAGE: &str = include_str!("../assets/index.html");

/// Shared, read-only state for all handlers.
pub struct AppState {
    client: UpstreamClient,
    rewriter: Rewriter,
}

impl AppState {
    pub fn new(config: &ProxyConfig) -> Result<Self> {
        let allow = AllowList::new(&config.upstream_host())?;
        Ok(Self {
            client: UpstreamClient::new(config)?,
            rewriter: Rewriter::new(allow),
        })
    }
}

/// Build the axum router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/marketactivity", get(market_activity))
        .route("/itemsale/{id}", get(item_sale))
        .route(ERROR_PATH, get(error_handler))
        .fallback(not_found)
        .with_state(state)
}

/// A bound, not yet running proxy server.
pub struct ProxyServer {
    listener: TcpListener,
    state: Arc<AppState>,
}

impl ProxyServer {
    /// Bind the configured listen address.
    pub async fn bind(config: &ProxyConfig) -> Result<Self> {
        let state = Arc::new(AppState::new(config)?);
        let listener = TcpListener::bind(config.listen()).await?;
        Ok(Self { listener, state })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve requests until `shutdown` resolves.
    pub async fn run(self, shutdown: impl Future<Output = ()> + Send + 'static) -> Result<()> {
        let addr = self.local_addr()?;
        tracing::info!("Proxy listening on http://{addr}");
        axum::serve(self.listener, router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("Proxy shut down");
        Ok(())
    }
}

/// `GET /`
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_PAGE)
}

/// `GET /error`
async fn error_handler() -> Html<&'static str> {
    Html(ERROR_PAGE)
}

async fn not_found() -> (StatusCode, Html<&'static str>) {
    (StatusCode::NOT_FOUND, Html(ERROR_PAGE))
}

/// `GET /marketactivity`
async fn market_activity(State(state): State<Arc<AppState>>) -> Response {
    proxy_page(&state, UpstreamPage::MarketActivity).await
}

/// `GET /itemsale/{id}`
///
/// Anything but ASCII digits, including ids that do not percent-decode to
/// UTF-8, is redirected to the error page without touching the upstream.
async fn item_sale(
    State(state): State<Arc<AppState>>,
    id: std::result::Result<Path<String>, PathRejection>,
) -> Response {
    match id.as_ref().ok().and_then(|Path(raw)| ItemId::parse(raw)) {
        Some(id) => proxy_page(&state, UpstreamPage::ItemSale(id)).await,
        None => {
            match &id {
                Ok(Path(raw)) => tracing::debug!("Rejected item id {raw:?}"),
                Err(rejection) => tracing::debug!("Rejected item id: {rejection}"),
            }
            Redirect::to(ERROR_PATH).into_response()
        }
    }
}

async fn proxy_page(state: &AppState, page: UpstreamPage) -> Response {
    let result = async {
        let fetched = state.client.fetch_page(&page).await?;
        state
            .rewriter
            .rewrite_body(&fetched.body, fetched.charset.as_deref())
    }
    .await;

    match result {
        Ok(html) => Html(html).into_response(),
        Err(e) => error_response(&e),
    }
}

fn error_response(err: &ProxyError) -> Response {
    let status = if err.is_upstream() {
        tracing::warn!("Upstream failure: {err}");
        StatusCode::BAD_GATEWAY
    } else {
        tracing::error!("Request failed: {err}");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Html(ERROR_PAGE)).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{Request, header};
    use tower::ServiceExt as _;

    use super::*;

    fn test_state(upstream: &str) -> Arc<AppState> {
        let config = ProxyConfig::builder()
            .upstream(upstream)
            .system_proxy(false)
            .build()
            .unwrap();
        Arc::new(AppState::new(&config).unwrap())
    }

    async fn get_response(app: Router, uri: &str) -> (StatusCode, header::HeaderMap, String) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let resp = app.into_service().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), 1024 * 1024)
            .await
            .unwrap();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn index_hosts_viewer_iframe() {
        let app = router(test_state("https://www.rolimons.com"));
        let (status, headers, body) = get_response(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
        assert!(body.contains(r#"<iframe src="/marketactivity""#));
    }

    #[tokio::test]
    async fn error_page_is_static() {
        let app = router(test_state("https://www.rolimons.com"));
        let (status, _, body) = get_response(app, "/error").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, ERROR_PAGE);
    }

    #[tokio::test]
    async fn non_digit_item_redirects_to_error() {
        let app = router(test_state("https://www.rolimons.com"));
        for uri in [
            "/itemsale/abc",
            "/itemsale/12a",
            "/itemsale/%2e%2e",
            "/itemsale/%ff",
            "/itemsale/%31%ff",
        ] {
            let (status, headers, _) = get_response(app.clone(), uri).await;
            assert_eq!(status, StatusCode::SEE_OTHER, "{uri}");
            assert_eq!(headers[header::LOCATION], "/error");
        }
    }

    #[tokio::test]
    async fn unreachable_upstream_returns_static_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let app = router(test_state(&format!("http://{addr}")));
        let (status, _, body) = get_response(app, "/marketactivity").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, ERROR_PAGE);
    }

    #[tokio::test]
    async fn unknown_route_is_not_found() {
        let app = router(test_state("https://www.rolimons.com"));
        for uri in ["/api/activity", "/itemsale/", "/itemsale/1/extra"] {
            let (status, headers, body) = get_response(app.clone(), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(headers[header::CONTENT_TYPE], "text/html; charset=utf-8");
            assert_eq!(body, ERROR_PAGE);
        }
    }
}
