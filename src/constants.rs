//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! environment variables where applicable.

/// Default HTTP server port for metrics and health probes
pub const DEFAULT_METRICS_PORT: u16 = 8081;

/// Default HTTP server startup timeout (how long to wait for server to be ready)
pub const DEFAULT_SERVER_STARTUP_TIMEOUT_SECS: u64 = 10;

/// Default HTTP server readiness poll interval
pub const DEFAULT_SERVER_POLL_INTERVAL_MS: u64 = 50;

/// Requeue interval after a fully synchronized pass (seconds)
pub const DEFAULT_RECONCILE_INTERVAL_SECS: u64 = 600;

/// Requeue interval after a pass with failed properties or configuration errors (seconds)
pub const DEFAULT_FAILED_SYNC_REQUEUE_SECS: u64 = 60;

/// Requeue delay when the sync lock is busy or a pass was interrupted (seconds)
pub const DEFAULT_SYNC_LOCK_BUSY_REQUEUE_SECS: u64 = 5;

/// Deadline for a single synchronization pass (seconds)
pub const DEFAULT_SYNC_PASS_TIMEOUT_SECS: u64 = 300;

/// Fibonacci backoff bounds for run-level reconciliation errors (seconds)
pub const DEFAULT_ERROR_BACKOFF_MIN_SECS: u64 = 60;
pub const DEFAULT_ERROR_BACKOFF_MAX_SECS: u64 = 600;

/// Default delay before restarting a watch stream after unknown errors (seconds)
pub const DEFAULT_WATCH_RESTART_DELAY_SECS: u64 = 5;

/// Public GitHub REST endpoint
pub const DEFAULT_GITHUB_API_URL: &str = "https://api.github.com";

/// REST API version pinned through the `X-GitHub-Api-Version` header
pub const GITHUB_API_VERSION: &str = "2022-11-28";

/// Attempts per GitHub operation, including the first one
pub const DEFAULT_GITHUB_MAX_ATTEMPTS: u32 = 3;

/// First backoff delay after a 5xx response (milliseconds), doubled per attempt
pub const DEFAULT_GITHUB_INITIAL_BACKOFF_MS: u64 = 1000;

/// Longest rate-limit wait the client accepts before surfacing the failure (seconds)
pub const DEFAULT_GITHUB_MAX_RATE_LIMIT_WAIT_SECS: u64 = 300;

/// Per-request timeout against the GitHub API (seconds)
pub const DEFAULT_GITHUB_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Field manager used for status patches
pub const FIELD_MANAGER: &str = "github-actions-sync-controller";

/// Condition type carried by both custom resources
pub const SYNCED_CONDITION: &str = "Synced";

/// `Synced` condition reasons
pub mod reasons {
    pub const SYNCED: &str = "Synced";
    pub const SYNC_FAILED: &str = "SyncFailed";
    pub const INTERRUPTED: &str = "Interrupted";
    pub const INVALID_REPOSITORY: &str = "InvalidRepository";
    pub const REFERENCE_NOT_FOUND: &str = "ReferenceNotFound";
    pub const SOURCE_NOT_FOUND: &str = "SourceNotFound";
    pub const NO_REPOSITORIES: &str = "NoRepositories";
    pub const RECONCILE_ERROR: &str = "ReconcileError";
}
