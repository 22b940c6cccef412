//! Pagefabric - Dynamic SEO Page Rendering Core
//!
//! Main entry point: loads configuration, assembles the `AppContext`,
//! and serves the HTTP surface.

use std::net::SocketAddr;
use std::panic;

use pagefabric::config::AppConfig;
use pagefabric::context::AppContext;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("pagefabric fatal error:");
        eprintln!("{panic_info}");
        if let Some(location) = panic_info.location() {
            eprintln!("location: {}:{}:{}", location.file(), location.line(), location.column());
        }
    }));

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .json()
        .init();

    tracing::info!(
        version = pagefabric::VERSION,
        name = pagefabric::NAME,
        "starting pagefabric"
    );

    let config = AppConfig::from_env();
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;

    let ctx = AppContext::build(config).await?;
    let app = pagefabric::api::build_router(ctx);

    tracing::info!(%addr, "listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
