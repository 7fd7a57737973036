//! Safety checks run by the sensor node on every tick.
//!
//! Gateway for the sibling modules (EMBP): callers only see the re-exports
//! below, never the individual files.

mod current;
mod safety;
mod temperature;
mod voltage;

pub use current::{ChargingState, CurrentAnomalyDetector, DEFAULT_MAX_CURRENT, LONG_WINDOW, SHORT_WINDOW};
pub use safety::{Evaluation, SafetyMonitor, CRIT_ALERT, CURRENT_ALERT};
pub use temperature::{TemperatureGuard, DEFAULT_MAX_TEMP};
pub use voltage::{VoltageState, VoltageStateMachine, VoltageThresholds, VOLTAGE_WINDOW};
