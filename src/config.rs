//! Inactivity monitor configuration.

use crate::database::Database;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Configuration for one monitor instance.
///
/// Immutable once handed to [`SessionMonitor::start`](crate::monitor::SessionMonitor::start);
/// a new configuration means starting the monitor again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorConfig {
    /// Total idle budget in minutes. Non-positive disables the monitor.
    pub timeout_minutes: f64,

    /// How long before expiry the warning fires, in minutes.
    pub warning_minutes: f64,

    /// Whether monitoring is on at all.
    pub enabled: bool,

    /// How often the shared activity timestamp is re-read (default: 10s).
    #[serde(default = "default_drift_poll_secs")]
    pub drift_poll_secs: u64,

    /// Minimum spacing between two activity signals (default: 1000ms).
    #[serde(default = "default_activity_throttle_ms")]
    pub activity_throttle_ms: u64,
}

fn default_drift_poll_secs() -> u64 {
    10
}

fn default_activity_throttle_ms() -> u64 {
    1000
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 30.0,
            warning_minutes: 5.0,
            enabled: true,
            drift_poll_secs: default_drift_poll_secs(),
            activity_throttle_ms: default_activity_throttle_ms(),
        }
    }
}

impl MonitorConfig {
    /// Creates a config with the default polling and throttling intervals.
    pub fn new(timeout_minutes: f64, warning_minutes: f64, enabled: bool) -> Self {
        Self {
            timeout_minutes,
            warning_minutes,
            enabled,
            ..Default::default()
        }
    }

    /// Loads the config from the settings table.
    ///
    /// Missing or unparsable values fall back to their defaults individually.
    pub fn from_database(db: &Database) -> Self {
        let defaults = Self::default();
        Self {
            timeout_minutes: setting(db, "session_timeout_minutes")
                .unwrap_or(defaults.timeout_minutes),
            warning_minutes: setting(db, "session_warning_minutes")
                .unwrap_or(defaults.warning_minutes),
            enabled: setting(db, "session_monitor_enabled").unwrap_or(defaults.enabled),
            drift_poll_secs: setting(db, "drift_poll_interval_secs")
                .unwrap_or(defaults.drift_poll_secs),
            activity_throttle_ms: setting(db, "activity_throttle_ms")
                .unwrap_or(defaults.activity_throttle_ms),
        }
    }

    /// True when timers should be scheduled at all.
    pub fn is_active(&self) -> bool {
        self.enabled && self.timeout_minutes.is_finite() && self.timeout_minutes > 0.0
    }

    /// Delay from the last reset until the session expires.
    pub fn timeout_delay(&self) -> Option<Duration> {
        if !self.is_active() {
            return None;
        }
        minutes(self.timeout_minutes)
    }

    /// Delay from the last reset until the expiry warning.
    ///
    /// `None` when no warning should be scheduled, including the
    /// `warning_minutes >= timeout_minutes` case. A zero warning also means
    /// none: it would fire together with the timeout.
    pub fn warning_delay(&self) -> Option<Duration> {
        if !self.is_active()
            || !self.warning_minutes.is_finite()
            || self.warning_minutes <= 0.0
            || self.warning_minutes >= self.timeout_minutes
        {
            return None;
        }
        minutes(self.timeout_minutes - self.warning_minutes)
    }

    pub fn drift_poll_interval(&self) -> Duration {
        Duration::from_secs(self.drift_poll_secs.max(1))
    }

    pub fn activity_throttle(&self) -> Duration {
        Duration::from_millis(self.activity_throttle_ms)
    }
}

fn minutes(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value * 60.0).ok()
}

/// Checks that `value` parses as the type stored under `key`.
///
/// Keys this module does not read are accepted as-is.
pub fn is_valid_setting(key: &str, value: &str) -> bool {
    let value = value.trim();
    match key {
        "session_timeout_minutes" | "session_warning_minutes" => {
            value.parse::<f64>().is_ok_and(f64::is_finite)
        }
        "session_monitor_enabled" => value.parse::<bool>().is_ok(),
        "drift_poll_interval_secs" | "activity_throttle_ms" => value.parse::<u64>().is_ok(),
        _ => true,
    }
}

fn setting<T: FromStr>(db: &Database, key: &str) -> Option<T> {
    match db.get_config(key) {
        Ok(value) => value.and_then(|v| v.trim().parse().ok()),
        Err(e) => {
            tracing::warn!(?e, key, "Failed to read setting, using default");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MonitorConfig::default();
        assert!(config.is_active());
        assert_eq!(config.timeout_delay(), Some(Duration::from_secs(30 * 60)));
        assert_eq!(config.warning_delay(), Some(Duration::from_secs(25 * 60)));
        assert_eq!(config.drift_poll_interval(), Duration::from_secs(10));
        assert_eq!(config.activity_throttle(), Duration::from_secs(1));
    }

    #[test]
    fn test_non_positive_timeout_disables() {
        for timeout in [0.0, -5.0, f64::NAN] {
            let config = MonitorConfig::new(timeout, 1.0, true);
            assert!(!config.is_active());
            assert_eq!(config.timeout_delay(), None);
            assert_eq!(config.warning_delay(), None);
        }
    }

    #[test]
    fn test_disabled_flag() {
        let config = MonitorConfig::new(10.0, 1.0, false);
        assert!(!config.is_active());
        assert_eq!(config.timeout_delay(), None);
    }

    #[test]
    fn test_warning_skipped_when_not_before_timeout() {
        assert_eq!(MonitorConfig::new(10.0, 10.0, true).warning_delay(), None);
        assert_eq!(MonitorConfig::new(10.0, 15.0, true).warning_delay(), None);
        assert_eq!(MonitorConfig::new(10.0, 0.0, true).warning_delay(), None);

        let config = MonitorConfig::new(10.0, 15.0, true);
        assert_eq!(config.timeout_delay(), Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_deserialize_camel_case_with_defaults() {
        let config: MonitorConfig =
            serde_json::from_str(r#"{"timeoutMinutes": 10, "warningMinutes": 1, "enabled": true}"#)
                .unwrap();
        assert_eq!(config, MonitorConfig::new(10.0, 1.0, true));
    }

    #[test]
    fn test_setting_validation() {
        assert!(is_valid_setting("session_timeout_minutes", " 12.5 "));
        assert!(!is_valid_setting("session_timeout_minutes", "abc"));
        assert!(!is_valid_setting("session_warning_minutes", "NaN"));
        assert!(is_valid_setting("session_monitor_enabled", "false"));
        assert!(!is_valid_setting("session_monitor_enabled", "yes"));
        assert!(!is_valid_setting("activity_throttle_ms", "-1"));
        assert!(is_valid_setting("unknown_key", "anything"));
    }

    #[test]
    fn test_from_database() {
        let db = Database::open_in_memory().unwrap();
        db.set_config("session_timeout_minutes", "15").unwrap();
        db.set_config("session_warning_minutes", "garbage").unwrap();
        db.set_config("session_monitor_enabled", "false").unwrap();

        let config = MonitorConfig::from_database(&db);
        assert_eq!(config.timeout_minutes, 15.0);
        assert_eq!(config.warning_minutes, 5.0);
        assert!(!config.enabled);
        assert_eq!(config.drift_poll_secs, 10);
    }
}
