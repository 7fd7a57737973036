//! Per-tick composition of the three safety checks.

use crate::{Alert, Reading};

use super::current::{ChargingState, CurrentAnomalyDetector};
use super::temperature::TemperatureGuard;
use super::voltage::{VoltageState, VoltageStateMachine};

// ---

pub const CRIT_ALERT: &str = "Battery Voltage Is Critically Low. Shutting Down!";
pub const CURRENT_ALERT: &str = "Battery Charging Current Is Unexpectedly High!";

/// Result of evaluating one reading.
#[derive(Debug, Default, PartialEq)]
pub struct Evaluation {
    // ---
    /// Alerts in publish order.
    pub alerts: Vec<Alert>,
    /// Set exactly once, on the tick that enters `Crit`.
    pub shutdown: bool,
}

#[derive(Debug, Default)]
pub struct SafetyMonitor {
    // ---
    voltage: VoltageStateMachine,
    current: CurrentAnomalyDetector,
    temperature: TemperatureGuard,
}

impl SafetyMonitor {
    // ---
    pub fn new(
        voltage: VoltageStateMachine,
        current: CurrentAnomalyDetector,
        temperature: TemperatureGuard,
    ) -> Self {
        Self {
            voltage,
            current,
            temperature,
        }
    }

    pub fn voltage_state(&self) -> VoltageState {
        self.voltage.state()
    }

    /// Feed one reading through voltage, current and temperature checks, in
    /// that order.
    pub fn evaluate(&mut self, reading: &Reading) -> Evaluation {
        // ---
        let mut eval = Evaluation::default();
        self.check_battery(reading, &mut eval);
        self.check_temperature(reading, &mut eval);
        eval
    }

    /// Run only the temperature guard.
    ///
    /// Used when the sensor read failed: a substituted sample must not enter
    /// the voltage or current windows, where a zero voltage would latch CRIT.
    pub fn evaluate_temperature_only(&mut self, reading: &Reading) -> Evaluation {
        // ---
        let mut eval = Evaluation::default();
        self.check_temperature(reading, &mut eval);
        eval
    }

    fn check_battery(&mut self, reading: &Reading, eval: &mut Evaluation) {
        // ---
        self.voltage.update(reading.voltage);
        let (changed, level) = self.voltage.check();
        if changed {
            let thresholds = self.voltage.thresholds();
            match level {
                VoltageState::Crit => {
                    eval.alerts.push(Alert::info(CRIT_ALERT));
                    eval.shutdown = true;
                }
                VoltageState::Low1 => eval.alerts.push(Alert::warning(format!(
                    "Battery Voltage Is Low (<= {} V).",
                    thresholds.low1
                ))),
                VoltageState::Low2 => eval.alerts.push(Alert::warning(format!(
                    "Battery Voltage Is Low (<= {} V).",
                    thresholds.low2
                ))),
                VoltageState::Ok => {}
            }
        }

        self.current.update(reading.current, reading.timestamp);
        if self.current.check() == ChargingState::Danger {
            tracing::warn!("Charging current above limit for the whole long window");
            eval.alerts.push(Alert::warning(CURRENT_ALERT));
        }
    }

    fn check_temperature(&mut self, reading: &Reading, eval: &mut Evaluation) {
        // ---
        if !self
            .temperature
            .check(reading.temperature, reading.timestamp)
        {
            eval.alerts.push(Alert::warning(format!(
                "Temperature Inside The Box Is High! ({} °C)",
                reading.temperature
            )));
        }
    }
}
