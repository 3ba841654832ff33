use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use snowdash_core::{
    load_config, validate_config, BroadcastChangeBus, ChangeBus, DataOrchestrator, DurableCache,
    FreshnessPolicy, ServiceNowClient, SourceOfTruth, SqliteDurableCache,
};
use snowdash_server::{api::create_router, purge::spawn_purge_task, state::AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("SNOWDASH_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    info!("Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);
    info!("ServiceNow instance: {}", config.servicenow.instance_url);

    // Create SQLite durable cache
    let cache = Arc::new(
        SqliteDurableCache::new(&config.database.path)
            .context("Failed to create durable cache")?,
    );
    info!("Durable cache initialized");

    // Create ServiceNow client
    let source: Arc<dyn SourceOfTruth> = Arc::new(
        ServiceNowClient::new(config.servicenow.clone())
            .context("Failed to create ServiceNow client")?,
    );

    // Create change bus if enabled
    let change_bus = if config.change_bus.enabled {
        info!(
            "Change bus enabled (capacity: {})",
            config.change_bus.capacity
        );
        Some(Arc::new(BroadcastChangeBus::new(config.change_bus.capacity)))
    } else {
        info!("Change bus disabled in config");
        None
    };

    let orchestrator = Arc::new(DataOrchestrator::new(
        Arc::clone(&cache) as Arc<dyn DurableCache>,
        source,
        change_bus
            .as_ref()
            .map(|bus| Arc::clone(bus) as Arc<dyn ChangeBus>),
        FreshnessPolicy::new(config.freshness.clone()),
        config.cache.clone(),
    ));
    info!("Data orchestrator initialized");

    // Periodic purge of expired rows
    let purge_handle = if config.cache.purge_interval_secs > 0 {
        info!(
            "Cache purge every {}s",
            config.cache.purge_interval_secs
        );
        Some(spawn_purge_task(
            Arc::clone(&cache),
            Duration::from_secs(config.cache.purge_interval_secs),
        ))
    } else {
        info!("Cache purge disabled");
        None
    };

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        orchestrator,
        change_bus.clone(),
    ));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");

    if let Some(handle) = purge_handle {
        handle.abort();
        info!("Cache purge stopped");
    }

    if let Some(bus) = change_bus {
        bus.close();
        info!("Change bus closed");
    }

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
