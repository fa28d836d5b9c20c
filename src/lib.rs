//! # itemsale_proxy
//!
//! A minimal reverse proxy that serves pages of one upstream site to an
//! embedded viewer while keeping every navigation same-origin.
//!
//! ## Overview
//!
//! Each request fetches one upstream page with [`UpstreamClient`], passes the
//! HTML through the [`Rewriter`] and returns the result. The rewriter consults
//! an [`AllowList`] that recognises exactly one reference shape, the
//! item-sale page `/itemsale/<digits>`:
//!
//! - allowed links and form targets become same-origin `/itemsale/{id}` paths;
//! - every other link, and every foreign form target, points at `/error`;
//! - `<base>` elements and off-origin `<script src>` elements are dropped.
//!
//! Nothing is cached and no state is shared between requests.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use itemsale_proxy::{ProxyConfig, ProxyServer};
//!
//! # async fn example() -> itemsale_proxy::Result<()> {
//! let config = ProxyConfig::builder()
//!     .upstream("https://www.rolimons.com")
//!     .listen("127.0.0.1:3000")
//!     .build()?;
//!
//! let server = ProxyServer::bind(&config).await?;
//! server
//!     .run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     })
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod matcher;
pub mod rewriter;
pub mod server;
pub mod upstream;

pub use config::{ProxyConfig, ProxyConfigBuilder};
pub use error::{ProxyError, Result};
pub use matcher::{AllowList, ERROR_PATH, ItemId, is_same_origin_path};
pub use rewriter::{RewriteSummary, Rewriter};
pub use server::{AppState, ERROR_PAGE, ProxyServer, router};
pub use upstream::{FetchedPage, UpstreamClient, UpstreamPage};
