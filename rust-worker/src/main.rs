//! Outreach Web - tracking pixel server.
//!
//! Serves `GET /track?email=...` and records opens in the recipient store.
//! When `DISPATCH_INTERVAL_SECS` is set the dispatcher also runs here on
//! that interval, sharing the store and row locks with the tracker.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::{net::TcpListener, signal, time::MissedTickBehavior};
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use outreach::web::router;
use outreach::{
    sender_from_config, AppState, Config, Dispatcher, JsonFileStore, OpenTracker, RecipientStore,
    RowLocks,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("web_server_starting");

    // Load configuration
    let config = Config::from_env();
    info!(
        port = config.port,
        store_path = %config.recipient_store_path.display(),
        debounce_secs = config.debounce_secs,
        dispatch_interval_secs = ?config.dispatch_interval_secs,
        "config_loaded"
    );

    let store: Arc<dyn RecipientStore> = Arc::new(JsonFileStore::new(&config.recipient_store_path));
    let locks = RowLocks::new();

    let tracker = OpenTracker::new(Arc::clone(&store), locks.clone(), config.debounce());
    let state = AppState::new(tracker);

    if let Some(interval_secs) = config.dispatch_interval_secs {
        let tracking_base =
            Url::parse(&config.tracking_base_url).context("Invalid TRACKING_BASE_URL")?;
        let sender = sender_from_config(&config).context("Failed to build mail sender")?;
        let dispatcher = Dispatcher::new(
            Arc::clone(&store),
            sender,
            locks.clone(),
            tracking_base,
            config.send_delay(),
        );
        tokio::spawn(dispatch_loop(dispatcher, Duration::from_secs(interval_secs)));
    }

    let app = router(state);

    // Bind to address
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    info!(address = %addr, "web_server_listening");

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("web_server_shutdown_complete");

    Ok(())
}

/// Run the dispatcher forever, one batch per tick.
///
/// Runs never overlap: a tick that arrives mid-run is delayed.
async fn dispatch_loop(dispatcher: Dispatcher, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(interval_secs = every.as_secs(), "dispatch_loop_started");

    loop {
        ticker.tick().await;
        match dispatcher.run().await {
            Ok(summary) => info!(
                sent = summary.sent,
                failed = summary.failed,
                stop = ?summary.stop,
                "dispatch_tick_complete"
            ),
            Err(e) => error!(error = %e, "dispatch_tick_failed"),
        }
    }
}

/// Create a future that completes when a shutdown signal is received.
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
        _ = ctrl_c => info!("Received SIGINT"),
        _ = terminate => info!("Received SIGTERM"),
    }

    info!("web_server_shutting_down");
}
