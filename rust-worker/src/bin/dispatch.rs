//! Outreach Dispatch - one-shot campaign batch.
//!
//! Sends to every pending row of the recipient store once and exits. Meant
//! to be triggered by an external scheduler such as cron. Do not point it
//! at a store the web binary is dispatching from in-process.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use url::Url;

use outreach::{sender_from_config, Config, Dispatcher, JsonFileStore, RowLocks};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured JSON logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().json().flatten_event(true))
        .init();

    info!("dispatch_starting");

    let config = Config::from_env();
    info!(
        store_path = %config.recipient_store_path.display(),
        alias_count = config.sender_aliases.len(),
        daily_send_limit = config.daily_send_limit,
        send_delay_ms = config.send_delay_ms,
        mail_provider = ?config.mail_provider,
        "config_loaded"
    );

    let tracking_base =
        Url::parse(&config.tracking_base_url).context("Invalid TRACKING_BASE_URL")?;
    let sender = sender_from_config(&config).context("Failed to build mail sender")?;
    let store = Arc::new(JsonFileStore::new(&config.recipient_store_path));

    let dispatcher = Dispatcher::new(store, sender, RowLocks::new(), tracking_base, config.send_delay());

    let summary = dispatcher.run().await.context("Dispatch run failed")?;

    info!(
        sent = summary.sent,
        failed = summary.failed,
        stop = ?summary.stop,
        "dispatch_complete"
    );

    Ok(())
}
