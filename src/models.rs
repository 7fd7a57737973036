//! Simple data models shared by the sensor node and the notifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---

/// One sample from the external sampler, consumed by a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    // ---
    pub timestamp: DateTime<Utc>,
    /// Battery bus voltage in volts.
    pub voltage: f64,
    /// Battery charging current in mA.
    pub current: f64,
    /// Enclosure temperature in °C.
    pub temperature: f64,
}

impl Reading {
    // ---
    pub fn new(timestamp: DateTime<Utc>, voltage: f64, current: f64, temperature: f64) -> Self {
        Self {
            timestamp,
            voltage,
            current,
            temperature,
        }
    }

    /// Substitute reading used when the sampler fails.
    pub fn zeroed(timestamp: DateTime<Utc>) -> Self {
        Self::new(timestamp, 0.0, 0.0, 0.0)
    }
}

/// Delivery class of an alert.
///
/// Subscribers can opt out of `Warning` alerts; `Info` alerts reach everyone
/// who is subscribed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertCategory {
    Info,
    Warning,
}

/// A human-readable alert travelling over the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    // ---
    pub category: AlertCategory,
    pub text: String,
}

impl Alert {
    // ---
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            category: AlertCategory::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            category: AlertCategory::Warning,
            text: text.into(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.category == AlertCategory::Warning
    }

    /// Encode as a single wire line, without the trailing newline.
    pub fn to_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Decode a wire line.
    ///
    /// Lines that are not a JSON alert are taken verbatim as `Info` text so
    /// plain-string publishers still get relayed. Blank lines yield `None`.
    pub fn from_line(line: &str) -> Option<Self> {
        // ---
        let line = line.trim_end_matches(&['\r', '\n'][..]);
        if line.trim().is_empty() {
            return None;
        }
        match serde_json::from_str::<Alert>(line) {
            Ok(alert) => Some(alert),
            Err(_) => Some(Alert::info(line)),
        }
    }
}
