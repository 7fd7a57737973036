//! Cooldown-gated enclosure temperature check.

use chrono::{DateTime, Duration, Utc};

// ---

pub const DEFAULT_MAX_TEMP: f64 = 60.0;

pub fn default_cooldown() -> Duration {
    Duration::hours(3)
}

#[derive(Debug)]
pub struct TemperatureGuard {
    // ---
    last_alert_time: Option<DateTime<Utc>>,
    cooldown: Duration,
    max_temp: f64,
}

impl Default for TemperatureGuard {
    fn default() -> Self {
        Self::new(default_cooldown(), DEFAULT_MAX_TEMP)
    }
}

impl TemperatureGuard {
    // ---
    pub fn new(cooldown: Duration, max_temp: f64) -> Self {
        Self {
            last_alert_time: None,
            cooldown,
            max_temp,
        }
    }

    /// Returns `false` when an over-temperature alert should fire.
    ///
    /// The first call only arms the cooldown timer. Over-temperature inside
    /// the cooldown is dropped, not deferred.
    pub fn check(&mut self, value: f64, now: DateTime<Utc>) -> bool {
        // ---
        let last = *self.last_alert_time.get_or_insert(now);

        if now - last > self.cooldown && value > self.max_temp {
            self.last_alert_time = Some(now);
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    // ---
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_first_check_never_alerts() {
        // ---
        let mut guard = TemperatureGuard::default();
        assert!(guard.check(70.0, t0()));

        let mut guard = TemperatureGuard::default();
        assert!(guard.check(50.0, t0()));
    }

    #[test]
    fn test_alert_then_cooldown() {
        // ---
        let mut guard = TemperatureGuard::default();
        assert!(guard.check(70.0, t0()));
        assert!(!guard.check(70.0, t0() + Duration::hours(4)));
        assert!(guard.check(70.0, t0() + Duration::hours(5)));
        assert!(!guard.check(70.0, t0() + Duration::hours(7) + Duration::seconds(1)));
    }

    #[test]
    fn test_normal_temperature_after_cooldown() {
        // ---
        let mut guard = TemperatureGuard::default();
        assert!(guard.check(20.0, t0()));
        assert!(guard.check(50.0, t0() + Duration::hours(2)));
        assert!(guard.check(60.0, t0() + Duration::hours(4)));
    }

    #[test]
    fn test_cooldown_boundary_is_exclusive() {
        // ---
        let mut guard = TemperatureGuard::default();
        assert!(guard.check(65.0, t0()));
        assert!(guard.check(65.0, t0() + Duration::hours(3)));
        assert!(!guard.check(65.0, t0() + Duration::hours(3) + Duration::seconds(1)));
    }
}
