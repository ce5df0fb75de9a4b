mod config;
mod routes;

use std::sync::Arc;

use anyhow::{Context, Result};
use extract::TaskAnalyzer;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use config::{LogFormat, WebConfig};
use routes::AppState;

fn init_tracing(format: LogFormat) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("web=info,extract=info,tower_http=info"));

    let builder = tracing_subscriber::fmt().with_env_filter(env_filter);
    match format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for Ctrl+C");
        return;
    }
    tracing::info!("Shutdown requested, cancelling in-flight analysis");
    shutdown.cancel();
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = WebConfig::from_env().context("Failed to load configuration")?;
    init_tracing(config.log_format);

    let analyzer = TaskAnalyzer::from_config(&config.analyzer)
        .context("Failed to create analysis client")?;

    let shutdown = CancellationToken::new();
    let state = Arc::new(AppState::new(analyzer, shutdown.clone()));

    let app = routes::router(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        endpoint = %state.analyzer.endpoint(),
        temperature = config.analyzer.temperature,
        "Server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("Server error")?;

    Ok(())
}
