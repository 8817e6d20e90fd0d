//! Quotation ledger server entry point.

use std::sync::Arc;

use anyhow::Context;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use quote_ledger::cache::AppCache;
use quote_ledger::config::Config;
use quote_ledger::ledger::{LedgerPolicy, LedgerService};
use quote_ledger::store::{LedgerStore, MemoryStore, PgStore};
use quote_ledger::{app, AppState};

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
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

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_addr = %config.bind_addr,
        markup_percent = %config.default_terms.markup_percent,
        gst_percent = %config.default_terms.gst_percent,
        rounding_unit = %config.default_terms.rounding_unit,
        require_verification = config.require_verification,
        "Starting quote-ledger"
    );

    let store: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.db_max_connections, config.db_acquire_timeout)
                .await
                .context("Failed to connect to database")?;
            store
                .run_migrations()
                .await
                .context("Failed to run migrations")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    if config.credentials.is_empty() {
        tracing::warn!("API_TOKENS is empty, every authenticated request will be rejected");
    }

    let policy = LedgerPolicy {
        default_terms: config.default_terms,
        require_verification: config.require_verification,
    };
    let ledger = LedgerService::new(store, AppCache::new(), policy);
    let state = AppState::new(ledger, config.credentials.clone());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!("Listening on {}", config.bind_addr);

    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Service shutdown complete");
    Ok(())
}
