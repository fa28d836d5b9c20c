use std::time::Duration;

use clap::Parser;
use itemsale_proxy::config::{DEFAULT_LISTEN, DEFAULT_MAX_BODY_BYTES, DEFAULT_UPSTREAM};
use itemsale_proxy::{ProxyConfig, ProxyServer};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "itemsale_proxy")]
#[command(about = "Same-origin rewriting proxy for item-sale pages")]
#[command(version)]
struct Cli {
    /// Address to listen on
    #[arg(long, env = "LISTEN_ADDR", default_value = DEFAULT_LISTEN)]
    listen: String,

    /// Port to listen on, overriding the port in --listen
    #[arg(long, env = "PORT")]
    port: Option<u16>,

    /// Base URL of the upstream site
    #[arg(long, env = "UPSTREAM_BASE", default_value = DEFAULT_UPSTREAM)]
    upstream: String,

    /// Upstream fetch timeout in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value = "10")]
    timeout_secs: u64,

    /// Largest upstream body accepted, in bytes
    #[arg(long, env = "UPSTREAM_MAX_BODY_BYTES", default_value_t = DEFAULT_MAX_BODY_BYTES)]
    max_body_bytes: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let mut builder = ProxyConfig::builder()
        .listen(cli.listen)
        .upstream(cli.upstream)
        .fetch_timeout(Duration::from_secs(cli.timeout_secs))
        .max_body_bytes(cli.max_body_bytes);
    if let Some(port) = cli.port {
        builder = builder.port(port);
    }
    let config = builder.build()?;

    tracing::info!("Proxying {}", config.upstream());
    let server = ProxyServer::bind(&config).await?;
    println!("Open http://{}/ in your browser", server.local_addr()?);

    server
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl-C: {e}");
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down...");
        })
        .await?;
    Ok(())
}
