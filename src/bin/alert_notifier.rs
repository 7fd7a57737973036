//! Entry point for the `alert-notifier` process.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Loading (and if needed migrating) the subscriber registry
//! - Binding the alert bus and serving until interrupted, restarting the
//!   serving loop after unexpected failures
//!
//! # Environment Variables
//! - `TELEGRAM_BOT_TOKEN` (**required**) – bot credentials
//! - `BUS_ENDPOINT` (optional) – alert bus address (default: `127.0.0.1:5556`)
//! - `SUBSCRIBERS_FILE` / `LEGACY_SUBSCRIBERS_FILE` (optional) – registry files
//! - `ORANGEBOX_LOG_LEVEL` (optional) – log verbosity (default: `info`)
use std::sync::Arc;

use anyhow::{Context, Result};
use dotenvy::dotenv;

use orangebox_safety::config;
use orangebox_safety::logging::init_tracing;
use orangebox_safety::notify::TelegramBot;
use orangebox_safety::registry::SubscriberRegistry;
use orangebox_safety::service::{greeting, NotifierService};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_notifier_from_env()?;
    cfg.log_config();

    let registry = SubscriberRegistry::open(&cfg.subscribers_file, &cfg.legacy_subscribers_file)
        .await
        .with_context(|| {
            format!(
                "Failed to load subscriber registry '{}'",
                cfg.subscribers_file.display()
            )
        })?;

    let bot = TelegramBot::new(&cfg.api_url, &cfg.bot_token);
    let service = NotifierService::new(
        cfg.bus_endpoint.clone(),
        cfg.poll_timeout(),
        Arc::new(registry),
        Arc::new(bot),
    );

    service.run_until_interrupted(Some(greeting())).await;

    Ok(())
}
