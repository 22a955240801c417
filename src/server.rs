//! Daemon bootstrap: configuration load, registry construction, polling
//! engine startup, and the REST server with graceful shutdown.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::rest::{self, AppState};
use crate::config;
use crate::domain::poller;
use crate::domain::registry::{Registry, RegistryOptions};

pub struct ServeOptions {
    pub service_config: PathBuf,
    pub node_config: PathBuf,
    pub bind: String,
    pub log_level: String,
}

pub async fn run(options: ServeOptions) -> Result<()> {
    // Init tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&options.log_level));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = env!("CARGO_PKG_VERSION"), "orchestrator daemon starting");

    // Load both configuration documents, writing defaults back if needed
    let nodes = config::load_nodes(&options.node_config)?;
    let services = config::load_services(&options.service_config, &options.bind)?;

    let (registry, events) = Registry::new(RegistryOptions {
        nodes,
        services,
        node_config_path: Some(options.node_config.clone()),
        service_config_path: Some(options.service_config.clone()),
        ..Default::default()
    })
    .context("building registry from configuration")?;

    // Single consumer merging status events into the registry
    tokio::spawn(poller::consume(registry.clone(), events));

    // Best-effort connectivity probes, then one polling task per service
    registry.connect_all().await;
    registry.start_all().await;

    let app = rest::router(AppState {
        registry: registry.clone(),
    })
    .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&options.bind)
        .await
        .with_context(|| format!("binding to {}", options.bind))?;

    info!(addr = %options.bind, "HTTP server listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server error")?;

    info!("orchestrator daemon stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => { info!("Received Ctrl+C, shutting down"); },
        _ = terminate => { info!("Received SIGTERM, shutting down"); },
    }
}
