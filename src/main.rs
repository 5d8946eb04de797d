use std::sync::Arc;

use anyhow::Context;
use burner_mail::blacklist::SenderBlacklist;
use burner_mail::config::ServerConfig;
use burner_mail::metrics::IncomingEmailMetrics;
use burner_mail::providers::{ProviderDeps, create_provider, spawn_route_sweeper};
use burner_mail::server::host_router;
use burner_mail::store::InMemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let config = ServerConfig::from_env().context("failed to load configuration")?;

    eprintln!("📮 burner-mail v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Website: {}", config.website_addr);
    eprintln!("   Listening: http://0.0.0.0:{}", config.port);
    eprintln!("   Blacklist entries: {}", config.blacklisted.len());

    let store = Arc::new(InMemoryStore::new());
    let metrics = Arc::new(IncomingEmailMetrics::new());
    let blacklist = Arc::new(SenderBlacklist::new(config.blacklisted.clone()));

    let provider = create_provider(&config.provider)?;
    let webhook = provider.start(ProviderDeps {
        website_addr: config.website_addr.clone(),
        store,
        blacklist,
        metrics: Arc::clone(&metrics),
    })?;

    let app = host_router(provider.name(), webhook, metrics);

    let sweeper = spawn_route_sweeper(Arc::clone(&provider), config.sweep_interval);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .with_context(|| format!("failed to bind port {}", config.port))?;
    tracing::info!(port = config.port, provider = provider.name(), "Server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    sweeper.abort();
    provider.stop().await?;
    tracing::info!("Shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
