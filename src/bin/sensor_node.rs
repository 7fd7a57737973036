//! Entry point for the `sensor-node` process.
//!
//! Startup sequence:
//! - Loading configuration from environment variables or `.env`
//! - Initializing structured logging/tracing
//! - Connecting to the alert bus (a missing notifier is tolerated)
//! - Running the read/check/publish loop until interrupted
//!
//! # Environment Variables
//! - `SAMPLER_CMD` (**required**) – sampler printing `voltage,current,temperature`
//! - `BUS_ENDPOINT` (optional) – alert bus address (default: `127.0.0.1:5556`)
//! - `SAMPLE_INTERVAL_SECS` (optional) – seconds between readings (default: 5)
//! - `SHUTDOWN_SCRIPT` (optional) – run once on critical battery
//! - `ORANGEBOX_LOG_LEVEL` (optional) – log verbosity (default: `info`)
use anyhow::{anyhow, Result};
use dotenvy::dotenv;

use orangebox_safety::bus::AlertPublisher;
use orangebox_safety::config;
use orangebox_safety::logging::init_tracing;
use orangebox_safety::node::{CommandSource, ScriptShutdown, SensorNode};

// ---

#[tokio::main]
async fn main() -> Result<()> {
    // ---
    dotenv().ok();
    init_tracing();

    let cfg = config::load_sensor_from_env()?;
    cfg.log_config();

    let source = CommandSource::from_command_line(&cfg.sampler_cmd)
        .ok_or_else(|| anyhow!("SAMPLER_CMD must not be empty"))?;
    let shutdown = ScriptShutdown::new(&cfg.shutdown_script);
    let publisher = AlertPublisher::connect(cfg.bus_endpoint.clone()).await;

    SensorNode::new(source, shutdown, publisher, cfg.sample_interval())
        .run()
        .await;

    Ok(())
}
