//! callscore-api - call scoring service
//!
//! Accepts sales-call audio, transcripts, manual entries and roleplay
//! sessions, scores them in the background and serves monthly figures.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use callscore_api::services::{HttpScoringEngine, HttpTranscriber, LocalTextExtractor, UsageLedger};
use callscore_api::{AppState, Collaborators, ServiceSettings};
use callscore_common::config::{resolve_secret, RootFolderInitializer, RootFolderResolver, TomlConfig};

const SCORING_API_KEY_ENV: &str = "CALLSCORE_SCORING_API_KEY";
const TRANSCRIPTION_API_KEY_ENV: &str = "CALLSCORE_TRANSCRIPTION_API_KEY";

/// Command-line arguments for callscore-api
#[derive(Parser, Debug)]
#[command(name = "callscore-api")]
#[command(about = "Sales call scoring service")]
#[command(version)]
struct Args {
    /// Root folder holding the database
    #[arg(short, long)]
    root_folder: Option<PathBuf>,

    /// Config file (defaults to ~/.config/callscore/config.toml)
    #[arg(short, long, env = "CALLSCORE_CONFIG")]
    config: Option<PathBuf>,

    /// Listen address, overrides the config file
    #[arg(short, long, env = "CALLSCORE_BIND_ADDRESS")]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = TomlConfig::load_or_default(args.config.as_deref());

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting callscore-api {}", env!("CARGO_PKG_VERSION"));

    let root_folder = RootFolderResolver::new("callscore-api")
        .with_cli_arg(args.root_folder)
        .with_toml_config(&config)
        .resolve();
    let initializer = RootFolderInitializer::new(root_folder);
    initializer
        .ensure_directory_exists()
        .context("Failed to initialize root folder")?;

    let db_path = initializer.database_path();
    info!("Database: {}", db_path.display());
    let db = callscore_common::db::init_database(&db_path)
        .await
        .context("Failed to open database")?;

    let subscription_mode = config
        .resolve_subscription_mode()
        .context("Invalid subscription mode")?;
    info!("Subscription mode: {}", subscription_mode.as_str());
    let settings = ServiceSettings::from_config(&config, subscription_mode)
        .context("Invalid figures configuration")?;

    let scoring = HttpScoringEngine::from_config(
        &config.scoring,
        resolve_secret(SCORING_API_KEY_ENV, config.scoring.api_key.as_deref()),
    )
    .context("Failed to build scoring client")?;
    if !scoring.is_configured() {
        warn!("scoring.base_url not set: every analysis will fail until it is configured");
    }

    let transcriber = HttpTranscriber::from_config(
        &config.transcription,
        resolve_secret(TRANSCRIPTION_API_KEY_ENV, config.transcription.api_key.as_deref()),
    )
    .context("Failed to build transcription client")?;
    if !transcriber.is_configured() {
        warn!("transcription.base_url not set: audio uploads will fail until it is configured");
    }

    let collaborators = Collaborators {
        scoring: Arc::new(scoring),
        transcriber: Arc::new(transcriber),
        extractor: Arc::new(LocalTextExtractor),
        admission: Arc::new(UsageLedger::new(db.clone(), config.usage.monthly_call_limit)),
    };

    let state = AppState::new(db.clone(), collaborators, settings);
    let app = callscore_api::build_router(state);

    let bind_address = args.bind.unwrap_or_else(|| config.bind_address().to_string());
    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind to {}", bind_address))?;
    info!("Listening on http://{}", bind_address);
    info!("Health check: http://{}/health", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Give in-flight analyses a moment to commit before the pool closes
    tokio::time::sleep(Duration::from_millis(250)).await;
    db.close().await;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        _ = ctrl_c => info!("Received Ctrl+C, shutting down"),
        _ = terminate => info!("Received SIGTERM, shutting down"),
    }
}
