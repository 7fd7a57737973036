//! Safety monitoring and alert distribution for the OrangeBox sensing node.
//!
//! Two processes share this crate:
//! - `sensor-node` reads battery voltage, charging current and enclosure
//!   temperature, runs the safety checks in [`monitor`], publishes alerts on
//!   the [`bus`] and runs the shutdown script when the battery turns critical
//! - `alert-notifier` binds the bus, relays alerts to chat subscribers
//!   according to their preferences in the [`registry`], and handles the
//!   subscription commands
//!
//! Modules follow the Explicit Module Boundary Pattern (EMBP): each directory
//! module is a gateway that re-exports what its siblings offer.

pub mod bus;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod monitor;
pub mod node;
pub mod notify;
pub mod registry;
pub mod service;

pub use config::{NotifierConfig, SensorConfig};
pub use models::{Alert, AlertCategory, Reading};
