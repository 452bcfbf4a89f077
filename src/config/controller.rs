//! # Controller Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::*;
use std::time::Duration;

/// Controller-level configuration
///
/// All settings have defaults and can be overridden via environment variables.
/// The deployment populates them from a ConfigMap using `envFrom`.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Name of the `ArgoAddon` object holding the addon settings
    pub setting_name: String,
    /// Deadline of a single reconciliation pass (seconds)
    pub reconcile_timeout_secs: u64,
    /// Periodic resync interval after a successful pass (seconds)
    pub resync_interval_secs: u64,
    /// Requeue interval after a failed settings reconciliation (seconds)
    pub reconciliation_error_requeue_secs: u64,
    /// Attempts for conflict retries and token polling
    pub retry_steps: u32,
    /// First retry delay (milliseconds)
    pub retry_initial_ms: u64,
    /// Growth factor between retry delays
    pub retry_factor: f64,
    /// Retry delay cap (milliseconds)
    pub retry_max_ms: u64,
    /// Minimum error backoff for tenant reconciliation (minutes)
    pub error_backoff_min_minutes: u64,
    /// Maximum error backoff for tenant reconciliation (minutes)
    pub error_backoff_max_minutes: u64,
    /// Delay before a failed watch stream is restarted (seconds)
    pub watch_restart_delay_secs: u64,
    /// Port of the metrics and health server
    pub metrics_port: u16,
    /// How long to wait for the metrics server to come up (seconds)
    pub server_startup_timeout_secs: u64,
    /// Poll interval while waiting for the metrics server (milliseconds)
    pub server_poll_interval_ms: u64,
    /// Log format (json, text)
    pub log_format: String,
    /// Maximum concurrent tenant reconciliations
    pub max_concurrent_reconciliations: u16,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            setting_name: DEFAULT_SETTING_NAME.to_string(),
            reconcile_timeout_secs: DEFAULT_RECONCILE_TIMEOUT_SECS,
            resync_interval_secs: DEFAULT_RESYNC_INTERVAL_SECS,
            reconciliation_error_requeue_secs: DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            retry_steps: DEFAULT_RETRY_STEPS,
            retry_initial_ms: DEFAULT_RETRY_INITIAL_MS,
            retry_factor: DEFAULT_RETRY_FACTOR,
            retry_max_ms: DEFAULT_RETRY_MAX_MS,
            error_backoff_min_minutes: DEFAULT_ERROR_BACKOFF_MIN_MINUTES,
            error_backoff_max_minutes: DEFAULT_ERROR_BACKOFF_MAX_MINUTES,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            server_startup_timeout_secs: DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            server_poll_interval_ms: DEFAULT_SERVER_POLL_INTERVAL_MS,
            log_format: "json".to_string(),
            max_concurrent_reconciliations: DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        Self {
            setting_name: env_var_or_default_str("SETTING_NAME", DEFAULT_SETTING_NAME),
            reconcile_timeout_secs: env_var_or_default(
                "RECONCILE_TIMEOUT_SECS",
                DEFAULT_RECONCILE_TIMEOUT_SECS,
            ),
            resync_interval_secs: env_var_or_default(
                "RESYNC_INTERVAL_SECS",
                DEFAULT_RESYNC_INTERVAL_SECS,
            ),
            reconciliation_error_requeue_secs: env_var_or_default(
                "RECONCILIATION_ERROR_REQUEUE_SECS",
                DEFAULT_RECONCILIATION_ERROR_REQUEUE_SECS,
            ),
            retry_steps: env_var_or_default("RETRY_STEPS", DEFAULT_RETRY_STEPS),
            retry_initial_ms: env_var_or_default("RETRY_INITIAL_MS", DEFAULT_RETRY_INITIAL_MS),
            retry_factor: env_var_or_default("RETRY_FACTOR", DEFAULT_RETRY_FACTOR),
            retry_max_ms: env_var_or_default("RETRY_MAX_MS", DEFAULT_RETRY_MAX_MS),
            error_backoff_min_minutes: env_var_or_default(
                "ERROR_BACKOFF_MIN_MINUTES",
                DEFAULT_ERROR_BACKOFF_MIN_MINUTES,
            ),
            error_backoff_max_minutes: env_var_or_default(
                "ERROR_BACKOFF_MAX_MINUTES",
                DEFAULT_ERROR_BACKOFF_MAX_MINUTES,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            server_startup_timeout_secs: env_var_or_default(
                "SERVER_STARTUP_TIMEOUT_SECS",
                DEFAULT_SERVER_STARTUP_TIMEOUT_SECS,
            ),
            server_poll_interval_ms: env_var_or_default(
                "SERVER_POLL_INTERVAL_MS",
                DEFAULT_SERVER_POLL_INTERVAL_MS,
            ),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
            max_concurrent_reconciliations: env_var_or_default(
                "MAX_CONCURRENT_RECONCILIATIONS",
                DEFAULT_MAX_CONCURRENT_RECONCILIATIONS,
            ),
        }
    }

    /// Get reconciliation pass deadline
    pub fn reconcile_timeout(&self) -> Duration {
        Duration::from_secs(self.reconcile_timeout_secs)
    }

    /// Get resync interval
    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.resync_interval_secs)
    }

    /// Get reconciliation error requeue duration
    pub fn reconciliation_error_requeue_duration(&self) -> Duration {
        Duration::from_secs(self.reconciliation_error_requeue_secs)
    }

    /// Get watch restart delay duration
    pub fn watch_restart_delay_duration(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.setting_name, "default");
        assert_eq!(config.retry_steps, 4);
        assert_eq!(config.retry_initial_ms, 10);
        assert!((config.retry_factor - 5.0).abs() < f64::EPSILON);
        assert_eq!(config.resync_interval(), Duration::from_secs(300));
        assert!(config.json_logs());
    }

    #[test]
    fn test_unparsable_env_value_falls_back() {
        assert_eq!(
            env_var_or_default("CAPSULE_ARGO_ADDON_TEST_UNSET_NUMBER", 7_u32),
            7
        );
        assert_eq!(
            env_var_or_default_str("CAPSULE_ARGO_ADDON_TEST_UNSET_STRING", "fallback"),
            "fallback"
        );
    }
}
