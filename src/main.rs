//! Nimbus server: sharing API and WebDAV endpoints.
//!
//! Main entry point that wires all crates together and starts the servers.

mod apps;

use std::sync::Arc;

use tokio::sync::watch;
use tracing;
use tracing_subscriber::{EnvFilter, fmt};

use nimbus_bootstrap::Coordinator;
use nimbus_core::config::AppConfig;
use nimbus_core::error::AppError;
use nimbus_database::DatabasePool;
use nimbus_database::repositories::{PgPropertyStore, PgSystemTagMapper, PgTagStore};
use nimbus_dav::{DavListener, DavServices, ServerFactory};
use nimbus_service::{Backends, L10nFactory, LogMailer, ShareNotifier, ShareProvider};

#[tokio::main]
async fn main() {
    let config = match load_configuration() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(config).await {
        tracing::error!("Server error: {}", e);
        std::process::exit(1);
    }
}

/// Load configuration from `config/` and the environment.
fn load_configuration() -> Result<AppConfig, AppError> {
    let env = std::env::var("NIMBUS_ENV").unwrap_or_else(|_| "development".to_string());
    AppConfig::load(&env)
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .init();
        }
    }
}

async fn run(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting Nimbus v{}", env!("CARGO_PKG_VERSION"));

    // ── Step 1: App bootstrap ────────────────────────────────────
    let mut coordinator = Coordinator::new();
    for app in apps::builtin_apps(&config.sharing) {
        coordinator.register_app(app)?;
    }
    coordinator.run_registration()?;
    tracing::info!(
        apps = coordinator.containers().len(),
        "App registration complete"
    );

    // ── Step 2: Database connection + migrations ─────────────────
    let db = DatabasePool::open(&config.database).await?;
    let backends = Backends::postgres(&db);

    // ── Step 3: Sharing ──────────────────────────────────────────
    let notifier = Arc::new(ShareNotifier::new(
        Arc::clone(&backends.users),
        Arc::new(LogMailer),
        L10nFactory::new(),
        config.mail.clone(),
        config.server.public_url.clone(),
    ));
    let shares = Arc::new(ShareProvider::new(
        backends.clone(),
        config.sharing.clone(),
        notifier,
    ));

    // ── Step 4: Shutdown channel ─────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Step 5: WebDAV listener ──────────────────────────────────
    let dav_handle = if config.dav.enabled {
        let pool = db.pool().clone();
        let services = DavServices::new(
            config.dav.clone(),
            config.sharing.clone(),
            Arc::clone(&shares),
            Arc::clone(&backends.users),
            Arc::clone(&backends.nodes),
            Arc::new(PgPropertyStore::new(pool.clone())),
            Arc::new(PgTagStore::new(pool.clone())),
            Arc::new(PgSystemTagMapper::new(pool)),
        );
        let listener = DavListener::new(ServerFactory::new(services));
        let dav_cancel = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = listener.start(dav_cancel).await {
                tracing::error!("WebDAV listener error: {}", e);
            }
        }))
    } else {
        tracing::info!("WebDAV listener disabled");
        None
    };

    // ── Step 6: HTTP API ─────────────────────────────────────────
    let state = nimbus_api::AppState::new(config, backends, shares);
    let mut api = tokio::spawn(nimbus_api::serve(state, shutdown_rx));

    let finished = tokio::select! {
        result = &mut api => Some(result),
        _ = shutdown_signal() => {
            tracing::info!("Shutdown signal received, starting graceful shutdown...");
            None
        }
    };
    let _ = shutdown_tx.send(true);

    // ── Step 7: Wait for background tasks ────────────────────────
    let api_result = match finished {
        Some(result) => result,
        None => api.await,
    };
    if let Some(handle) = dav_handle {
        let _ = tokio::time::timeout(std::time::Duration::from_secs(10), handle).await;
    }
    db.close().await;

    match api_result {
        Ok(result) => result?,
        Err(e) => tracing::error!("API task failed: {}", e),
    }
    tracing::info!("Nimbus shut down gracefully");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
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
