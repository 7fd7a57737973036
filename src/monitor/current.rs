//! Long-horizon charging-current anomaly detection.
//!
//! A healthy battery draws less and less current as it fills up. A charging
//! current that stays above `max_current` for the whole long window (twelve
//! hourly averages by default) points at a charging fault.
//!
//! The short window is a running filter over raw samples; the long window
//! receives the short window's mean at most once per `min_wait`.

use std::collections::VecDeque;

use chrono::{DateTime, Duration, Utc};

// ---

pub const SHORT_WINDOW: usize = 12;
pub const LONG_WINDOW: usize = 12;

/// Default interval between two long-window entries.
pub fn default_min_wait() -> Duration {
    Duration::hours(1)
}

/// Default current limit in mA.
pub const DEFAULT_MAX_CURRENT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChargingState {
    Default,
    Charging,
    Danger,
}

#[derive(Debug)]
pub struct CurrentAnomalyDetector {
    // ---
    short: VecDeque<f64>,
    long: VecDeque<f64>,
    last_sample_time: Option<DateTime<Utc>>,
    min_wait: Duration,
    max_current: f64,
}

impl Default for CurrentAnomalyDetector {
    fn default() -> Self {
        Self::new(default_min_wait(), DEFAULT_MAX_CURRENT)
    }
}

fn push_bounded(buf: &mut VecDeque<f64>, capacity: usize, value: f64) {
    if buf.len() == capacity {
        buf.pop_front();
    }
    buf.push_back(value);
}

impl CurrentAnomalyDetector {
    // ---
    pub fn new(min_wait: Duration, max_current: f64) -> Self {
        Self {
            short: VecDeque::with_capacity(SHORT_WINDOW),
            long: VecDeque::with_capacity(LONG_WINDOW),
            last_sample_time: None,
            min_wait,
            max_current,
        }
    }

    /// Record a raw current sample taken at `now`.
    pub fn update(&mut self, value: f64, now: DateTime<Utc>) {
        // ---
        push_bounded(&mut self.short, SHORT_WINDOW, value);

        let due = match self.last_sample_time {
            None => true,
            Some(last) => now - last >= self.min_wait,
        };
        if due {
            let mean = self.short.iter().sum::<f64>() / self.short.len() as f64;
            push_bounded(&mut self.long, LONG_WINDOW, mean);
            self.last_sample_time = Some(now);
            tracing::debug!("Charging current long-window sample: {:.1} mA", mean);
        }
    }

    /// Classify the current windows.
    ///
    /// Reporting `Danger` zeroes the oldest long-window entry. Until the next
    /// long-window sample pushes that zero out, further checks fall back to
    /// `Charging`/`Default`, so `Danger` fires at most once per `min_wait`.
    pub fn check(&mut self) -> ChargingState {
        // ---
        let mut state = if self.short.iter().sum::<f64>() > 0.0 {
            ChargingState::Charging
        } else {
            ChargingState::Default
        };

        if self.long.len() == LONG_WINDOW && self.long.iter().all(|&v| v > self.max_current) {
            state = ChargingState::Danger;
            if let Some(oldest) = self.long.front_mut() {
                *oldest = 0.0;
            }
        }

        state
    }
}
