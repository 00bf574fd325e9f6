//! Mbuli's Feast Storefront - shop, checkout and delivery-fee service.
//!
//! This binary serves the JSON API on port 3000.
//!
//! # Architecture
//!
//! - Axum web framework with a JSON API
//! - `PostgreSQL` store, or an embedded in-memory store seeded with the
//!   catalogue when no database URL is configured
//! - Claude for driving-distance lookups behind the delivery-fee estimator
//! - Sentry and `tracing` for error tracking and structured logs

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;

use sentry::integrations::tracing as sentry_tracing;
use thiserror::Error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mbuli_storefront::claude::{ClaudeClient, ClaudeDistanceResolver, ClaudeError};
use mbuli_storefront::config::{ConfigError, StorefrontConfig};
use mbuli_storefront::db::{self, MemoryStore, PgStore, Store};
use mbuli_storefront::state::AppState;

/// Errors that stop the server from starting or running.
#[derive(Debug, Error)]
enum StartupError {
    #[error("failed to load configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to create database pool: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to create Claude client: {0}")]
    Claude(#[from] ClaudeError),
    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Initialize Sentry error tracking and return guard that must be kept alive.
fn init_sentry(config: &StorefrontConfig) -> Option<sentry::ClientInitGuard> {
    let dsn = config.sentry_dsn.as_ref()?;

    let guard = sentry::init((
        dsn.as_str(),
        sentry::ClientOptions {
            release: sentry::release_name!(),
            environment: config
                .sentry_environment
                .clone()
                .map(std::borrow::Cow::Owned),
            sample_rate: config.sentry_sample_rate,
            traces_sample_rate: config.sentry_traces_sample_rate,
            attach_stacktrace: true,
            ..Default::default()
        },
    ));

    tracing::info!("Sentry initialized");
    Some(guard)
}

/// Filter tracing events to Sentry event types.
fn sentry_event_filter(metadata: &tracing::Metadata<'_>) -> sentry_tracing::EventFilter {
    match *metadata.level() {
        tracing::Level::ERROR | tracing::Level::WARN => sentry_tracing::EventFilter::Event,
        tracing::Level::INFO | tracing::Level::DEBUG => sentry_tracing::EventFilter::Breadcrumb,
        _ => sentry_tracing::EventFilter::Ignore,
    }
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    // Configuration is needed before Sentry and tracing exist
    let config = match StorefrontConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            #[allow(clippy::print_stderr)]
            {
                eprintln!("Failed to load configuration: {e}");
            }
            return std::process::ExitCode::FAILURE;
        }
    };

    // Initialize Sentry (must be done before tracing subscriber)
    let _sentry_guard = init_sentry(&config);

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mbuli_storefront=info,tower_http=debug".into());

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer().event_filter(sentry_event_filter))
        .init();

    match run(config).await {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Storefront stopped");
            std::process::ExitCode::FAILURE
        }
    }
}

async fn run(config: StorefrontConfig) -> Result<(), StartupError> {
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = db::create_pool(url).await?;
            tracing::info!("Database pool created");
            // NOTE: Migrations are NOT run automatically on startup.
            // Run them explicitly via: cargo run -p mbuli-cli -- migrate
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("No database URL configured, using the in-memory store");
            Arc::new(MemoryStore::with_products(db::seed::catalogue()))
        }
    };

    let client = ClaudeClient::new(&config.claude)?;
    tracing::info!(model = client.model(), "Distance resolver ready");
    let resolver = Arc::new(ClaudeDistanceResolver::new(client));

    let state = AppState::new(&config, store, resolver);

    let app = mbuli_storefront::app(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction());

    let addr = config.socket_addr();
    tracing::info!("storefront listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
