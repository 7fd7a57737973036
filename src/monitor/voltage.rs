//! Hysteretic battery-voltage classifier.
//!
//! Every transition is judged against the whole sliding window of the most
//! recent samples, so a single noisy reading can neither escalate nor recover
//! the state. The window is evaluated over whatever it currently holds: a
//! freshly started machine can escalate before the window has filled up, and
//! an empty window satisfies every condition.

use std::collections::VecDeque;

// ---

/// Number of voltage samples the classifier looks at.
pub const VOLTAGE_WINDOW: usize = 10;

/// Battery state. `Crit` is latched: nothing brings it back to `Ok` short of a
/// process restart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoltageState {
    Ok,
    Low1,
    Low2,
    Crit,
}

/// Threshold table in volts, kept apart from the state identities.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageThresholds {
    // ---
    pub crit: f64,
    pub low1: f64,
    pub low2: f64,
    pub recover: f64,
}

impl Default for VoltageThresholds {
    fn default() -> Self {
        Self {
            crit: 3.5,
            low1: 3.7,
            low2: 3.6,
            recover: 3.8,
        }
    }
}

#[derive(Debug)]
pub struct VoltageStateMachine {
    // ---
    window: VecDeque<f64>,
    thresholds: VoltageThresholds,
    state: VoltageState,
}

impl Default for VoltageStateMachine {
    fn default() -> Self {
        Self::new(VoltageThresholds::default())
    }
}

impl VoltageStateMachine {
    // ---
    pub fn new(thresholds: VoltageThresholds) -> Self {
        Self {
            window: VecDeque::with_capacity(VOLTAGE_WINDOW),
            thresholds,
            state: VoltageState::Ok,
        }
    }

    /// Start from a given state, e.g. to resume after a known LOW1 period.
    pub fn with_state(mut self, state: VoltageState) -> Self {
        self.state = state;
        self
    }

    pub fn state(&self) -> VoltageState {
        self.state
    }

    pub fn thresholds(&self) -> &VoltageThresholds {
        &self.thresholds
    }

    /// Record a sample, evicting the oldest once the window is full.
    pub fn update(&mut self, value: f64) {
        // ---
        if self.window.len() == VOLTAGE_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(value);
    }

    /// Re-evaluate the state against the current window.
    ///
    /// Returns whether the state differs from the previous call, together
    /// with the resulting state.
    pub fn check(&mut self) -> (bool, VoltageState) {
        // ---
        let t = self.thresholds;
        let previous = self.state;

        let next = if self.all(|v| v < t.crit) {
            VoltageState::Crit
        } else if previous == VoltageState::Ok && self.all(|v| v < t.low1) {
            VoltageState::Low1
        } else if previous == VoltageState::Low1 && self.all(|v| v < t.low2) {
            VoltageState::Low2
        } else if matches!(previous, VoltageState::Low1 | VoltageState::Low2)
            && self.all(|v| v > t.recover)
        {
            VoltageState::Ok
        } else {
            previous
        };

        if next != previous {
            tracing::info!("Battery voltage state {:?} -> {:?}", previous, next);
        }
        self.state = next;
        (next != previous, next)
    }

    fn all(&self, pred: impl Fn(f64) -> bool) -> bool {
        self.window.iter().all(|&v| pred(v))
    }
}
