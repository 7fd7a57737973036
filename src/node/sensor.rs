use std::time::Duration;

use chrono::Utc;

use crate::bus::AlertPublisher;
use crate::monitor::{Evaluation, SafetyMonitor};
use crate::Reading;

use super::{ReadingSource, ShutdownAction};

// ---

/// The sensor process: read, check, publish, sleep.
pub struct SensorNode<S, A> {
    // ---
    source: S,
    shutdown: A,
    monitor: SafetyMonitor,
    publisher: AlertPublisher,
    interval: Duration,
}

impl<S: ReadingSource, A: ShutdownAction> SensorNode<S, A> {
    // ---
    pub fn new(source: S, shutdown: A, publisher: AlertPublisher, interval: Duration) -> Self {
        Self {
            source,
            shutdown,
            monitor: SafetyMonitor::default(),
            publisher,
            interval,
        }
    }

    pub fn monitor(&self) -> &SafetyMonitor {
        &self.monitor
    }

    /// One loop iteration without the sleep.
    ///
    /// A failed read is replaced by an all-zero reading that only reaches the
    /// temperature guard; the voltage and current windows keep their last good
    /// samples. Alerts are published before the shutdown action runs so
    /// subscribers hear about it first.
    pub async fn tick(&mut self) -> Evaluation {
        // ---
        let eval = match self.source.read().await {
            Ok(reading) => {
                tracing::debug!(
                    "Reading: {:.2} V, {:.1} mA, {:.2} °C",
                    reading.voltage,
                    reading.current,
                    reading.temperature
                );
                self.monitor.evaluate(&reading)
            }
            Err(e) => {
                tracing::warn!("Sensor read failed, skipping battery checks: {}", e);
                self.monitor
                    .evaluate_temperature_only(&Reading::zeroed(Utc::now()))
            }
        };
        for alert in &eval.alerts {
            self.publisher.publish(alert).await;
        }
        if eval.shutdown {
            self.shutdown.trigger();
        }
        eval
    }

    /// Loop until Ctrl-C, then release the bus socket.
    pub async fn run(mut self) {
        // ---
        tracing::info!(
            "Sensor node started, sampling every {:?}, publishing to {}",
            self.interval,
            self.publisher.endpoint()
        );

        let sig = tokio::signal::ctrl_c();
        tokio::pin!(sig);

        loop {
            self.tick().await;

            tokio::select! {
                biased;
                _ = &mut sig => {
                    tracing::info!("Interrupt received, stopping sensor node");
                    break;
                }
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        self.publisher.close().await;
    }
}
