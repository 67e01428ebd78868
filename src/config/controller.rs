//! # Controller Configuration
//!
//! Controller-level settings loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

/// How a reconciliation behaves when another pass already holds the sync lock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockPolicy {
    /// Give up immediately and requeue after a short delay
    NonBlocking,
    /// Wait for the running pass to finish
    #[default]
    Blocking,
}

impl FromStr for LockPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "non-blocking" | "nonblocking" | "try" => Ok(Self::NonBlocking),
            "blocking" | "wait" => Ok(Self::Blocking),
            other => Err(format!("unknown sync lock policy '{other}'")),
        }
    }
}

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Requeue interval after a fully synchronized pass (seconds)
    pub reconcile_interval_secs: u64,
    /// Requeue interval after a pass that left failed properties behind (seconds)
    pub failed_sync_requeue_secs: u64,
    /// Behavior when the global sync lock is held by another pass
    pub lock_policy: LockPolicy,
    /// Requeue delay when the lock is busy or a pass was interrupted (seconds)
    pub lock_busy_requeue_secs: u64,
    /// Deadline for one synchronization pass (seconds)
    pub sync_pass_timeout_secs: u64,
    /// Fibonacci backoff bounds for run-level errors (seconds)
    pub error_backoff_min_secs: u64,
    pub error_backoff_max_secs: u64,
    /// Watch stream restart delay after unknown errors (seconds)
    pub watch_restart_delay_secs: u64,
    /// GitHub REST base URL (GitHub Enterprise Server installs override this)
    pub github_api_url: String,
    /// Attempts per GitHub operation, including the first
    pub github_max_attempts: u32,
    /// First 5xx backoff delay (milliseconds)
    pub github_initial_backoff_ms: u64,
    /// Longest rate-limit wait accepted before failing the property (seconds)
    pub github_max_rate_limit_wait_secs: u64,
    /// Per-request timeout (seconds)
    pub github_request_timeout_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz`
    pub metrics_port: u16,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        use crate::constants::*;
        Self {
            reconcile_interval_secs: DEFAULT_RECONCILE_INTERVAL_SECS,
            failed_sync_requeue_secs: DEFAULT_FAILED_SYNC_REQUEUE_SECS,
            lock_policy: LockPolicy::default(),
            lock_busy_requeue_secs: DEFAULT_SYNC_LOCK_BUSY_REQUEUE_SECS,
            sync_pass_timeout_secs: DEFAULT_SYNC_PASS_TIMEOUT_SECS,
            error_backoff_min_secs: DEFAULT_ERROR_BACKOFF_MIN_SECS,
            error_backoff_max_secs: DEFAULT_ERROR_BACKOFF_MAX_SECS,
            watch_restart_delay_secs: DEFAULT_WATCH_RESTART_DELAY_SECS,
            github_api_url: DEFAULT_GITHUB_API_URL.to_string(),
            github_max_attempts: DEFAULT_GITHUB_MAX_ATTEMPTS,
            github_initial_backoff_ms: DEFAULT_GITHUB_INITIAL_BACKOFF_MS,
            github_max_rate_limit_wait_secs: DEFAULT_GITHUB_MAX_RATE_LIMIT_WAIT_SECS,
            github_request_timeout_secs: DEFAULT_GITHUB_REQUEST_TIMEOUT_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            log_level: "INFO".to_string(),
            log_format: "json".to_string(),
            log_enable_color: false,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    pub fn from_env() -> Self {
        use crate::constants::*;
        Self {
            reconcile_interval_secs: env_var_or_default(
                "RECONCILE_INTERVAL_SECS",
                DEFAULT_RECONCILE_INTERVAL_SECS,
            ),
            failed_sync_requeue_secs: env_var_or_default(
                "FAILED_SYNC_REQUEUE_SECS",
                DEFAULT_FAILED_SYNC_REQUEUE_SECS,
            ),
            lock_policy: env_var_or_default("SYNC_LOCK_POLICY", LockPolicy::default()),
            lock_busy_requeue_secs: env_var_or_default(
                "SYNC_LOCK_BUSY_REQUEUE_SECS",
                DEFAULT_SYNC_LOCK_BUSY_REQUEUE_SECS,
            ),
            sync_pass_timeout_secs: env_var_or_default(
                "SYNC_PASS_TIMEOUT_SECS",
                DEFAULT_SYNC_PASS_TIMEOUT_SECS,
            ),
            error_backoff_min_secs: env_var_or_default(
                "ERROR_BACKOFF_MIN_SECS",
                DEFAULT_ERROR_BACKOFF_MIN_SECS,
            ),
            error_backoff_max_secs: env_var_or_default(
                "ERROR_BACKOFF_MAX_SECS",
                DEFAULT_ERROR_BACKOFF_MAX_SECS,
            ),
            watch_restart_delay_secs: env_var_or_default(
                "WATCH_RESTART_DELAY_SECS",
                DEFAULT_WATCH_RESTART_DELAY_SECS,
            ),
            github_api_url: env_var_or_default_str("GITHUB_API_URL", DEFAULT_GITHUB_API_URL),
            github_max_attempts: env_var_or_default(
                "GITHUB_MAX_ATTEMPTS",
                DEFAULT_GITHUB_MAX_ATTEMPTS,
            ),
            github_initial_backoff_ms: env_var_or_default(
                "GITHUB_INITIAL_BACKOFF_MS",
                DEFAULT_GITHUB_INITIAL_BACKOFF_MS,
            ),
            github_max_rate_limit_wait_secs: env_var_or_default(
                "GITHUB_MAX_RATE_LIMIT_WAIT_SECS",
                DEFAULT_GITHUB_MAX_RATE_LIMIT_WAIT_SECS,
            ),
            github_request_timeout_secs: env_var_or_default(
                "GITHUB_REQUEST_TIMEOUT_SECS",
                DEFAULT_GITHUB_REQUEST_TIMEOUT_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "json"),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", false),
        }
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn failed_sync_requeue(&self) -> Duration {
        Duration::from_secs(self.failed_sync_requeue_secs)
    }

    pub fn lock_busy_requeue(&self) -> Duration {
        Duration::from_secs(self.lock_busy_requeue_secs)
    }

    pub fn sync_pass_timeout(&self) -> Duration {
        Duration::from_secs(self.sync_pass_timeout_secs)
    }

    pub fn watch_restart_delay(&self) -> Duration {
        Duration::from_secs(self.watch_restart_delay_secs)
    }

    pub fn github_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.github_initial_backoff_ms)
    }

    pub fn github_max_rate_limit_wait(&self) -> Duration {
        Duration::from_secs(self.github_max_rate_limit_wait_secs)
    }

    pub fn github_request_timeout(&self) -> Duration {
        Duration::from_secs(self.github_request_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| {
            let v_lower = v.to_lowercase();
            v_lower == "true" || v_lower == "1" || v_lower == "yes" || v_lower == "on"
        })
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
