use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dialer_core::{
    load_config, validate_config, ActivityStore, CallSessionController, CampaignController,
    DispositionRecorder, SimulatedLine, SqliteActivityStore, SqliteTargetStore, TargetStore,
    TelephonyBackend, TelephonyLine,
};
use dialer_server::api::{create_router, spawn_campaign_feed, ws::HEARTBEAT_INTERVAL, WsBroadcaster};
use dialer_server::state::AppState;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {}", e);
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
    let config_path = std::env::var("DIALER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(
        "Dialer {} starting (config hash {})",
        VERSION,
        &config_hash[..16]
    );
    info!("Database path: {:?}", config.database.path);
    info!(
        "Grace interval: {}ms, settle delay: {}ms, skip do-not-call: {}",
        config.campaign.grace_interval_ms,
        config.campaign.settle_delay_ms,
        config.campaign.skip_do_not_call
    );

    // Create SQLite activity store
    let activity_store: Arc<dyn ActivityStore> = Arc::new(
        SqliteActivityStore::new(&config.database.path)
            .context("Failed to create activity store")?,
    );
    info!("Activity store initialized");

    // Create SQLite target store
    let target_store: Arc<dyn TargetStore> = Arc::new(
        SqliteTargetStore::new(&config.database.path).context("Failed to create target store")?,
    );
    info!("Target store initialized");

    // Create telephony line
    let line: Arc<dyn TelephonyLine> = match config.telephony.backend {
        TelephonyBackend::Simulated => {
            info!(
                "Using simulated telephony line (ring {}ms, talk {}ms, answer: {})",
                config.telephony.simulated.ring_ms,
                config.telephony.simulated.talk_ms,
                config.telephony.simulated.answer
            );
            Arc::new(SimulatedLine::new(config.telephony.simulated.clone()))
        }
    };

    // Create campaign engine
    let session = CallSessionController::new(line);
    let recorder = DispositionRecorder::new(Arc::clone(&activity_store));
    let controller = CampaignController::spawn(
        config.campaign.clone(),
        session,
        recorder,
        Some(Arc::clone(&target_store)),
    );
    info!("Campaign engine started");

    // Push campaign progress to WebSocket clients
    let ws_broadcaster = WsBroadcaster::default();
    let feed_handle = spawn_campaign_feed(
        controller.watch(),
        ws_broadcaster.clone(),
        HEARTBEAT_INTERVAL,
    );

    // Create app state
    let state = Arc::new(AppState::new(
        config.clone(),
        controller.clone(),
        activity_store,
        target_store,
        ws_broadcaster,
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

    // Hang up any active call before exiting
    info!("Server shutting down...");
    if let Err(e) = controller.shutdown().await {
        warn!("Campaign engine did not shut down cleanly: {}", e);
    }
    feed_handle.abort();
    info!("Campaign engine stopped");

    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
