//! # Types
//!
//! Core types for the reconciler.

use crate::config::{ControllerConfig, LockPolicy};
use crate::controller::backoff::FibonacciBackoff;
use crate::observability::metrics;
use crate::provider::ActionsApi;
use crate::store::{ClusterStore, StoreError};
use crate::sync::{BufferBuildError, SyncError};
use kube_runtime::controller::Action;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, MutexGuard};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Run-level failures. These go to the error policy; property failures never do.
#[derive(Debug, Error)]
pub enum ReconcilerError {
    #[error("cluster store error: {0}")]
    Store(#[from] StoreError),
    #[error("source data unavailable: {0}")]
    SourceUnavailable(#[from] BufferBuildError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// How a pass ended, for requeue scheduling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Everything in sync
    Synced,
    /// Failed properties, repositories or configuration errors
    Failed,
    /// Cancelled by the pass deadline or shutdown
    Interrupted,
    /// Another pass held the sync lock
    LockBusy,
}

impl PassOutcome {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PassOutcome::Synced => "timer-based",
            PassOutcome::Failed => "sync-failed",
            PassOutcome::Interrupted => "interrupted",
            PassOutcome::LockBusy => "lock-busy",
        }
    }
}

/// Backoff state for a specific resource
/// Tracks error count and backoff calculator for progressive retries
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub backoff: FibonacciBackoff,
    pub error_count: u32,
}

impl BackoffState {
    pub fn new(min_secs: u64, max_secs: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_secs, max_secs),
            error_count: 0,
        }
    }

    pub fn increment_error(&mut self) {
        self.error_count += 1;
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
        self.backoff.reset();
    }
}

pub struct Reconciler {
    pub store: Arc<dyn ClusterStore>,
    pub api: Arc<dyn ActionsApi>,
    pub config: ControllerConfig,
    /// Cancelled on SIGINT/SIGTERM; every pass deadline is a child of it
    pub shutdown: CancellationToken,
    // Backoff state per resource (identified by kind/name)
    pub backoff_states: Mutex<HashMap<String, BackoffState>>,
    sync_lock: AsyncMutex<()>,
}

impl std::fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reconciler")
            .field("config", &self.config)
            .field("shutdown", &self.shutdown.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl Reconciler {
    pub fn new(
        store: Arc<dyn ClusterStore>,
        api: Arc<dyn ActionsApi>,
        config: ControllerConfig,
    ) -> Self {
        Self {
            store,
            api,
            config,
            shutdown: CancellationToken::new(),
            backoff_states: Mutex::new(HashMap::new()),
            sync_lock: AsyncMutex::new(()),
        }
    }

    /// Acquire the process-wide sync lock according to the configured policy.
    ///
    /// `None` means the lock is busy and the policy is non-blocking.
    pub async fn acquire_sync_lock(&self) -> Option<MutexGuard<'_, ()>> {
        match self.config.lock_policy {
            LockPolicy::NonBlocking => self.sync_lock.try_lock().ok(),
            LockPolicy::Blocking => Some(self.sync_lock.lock().await),
        }
    }

    /// Map a pass outcome to the next reconciliation.
    pub fn requeue(&self, outcome: PassOutcome) -> Action {
        let delay = match outcome {
            PassOutcome::Synced => self.config.reconcile_interval(),
            PassOutcome::Failed => self.config.failed_sync_requeue(),
            PassOutcome::Interrupted | PassOutcome::LockBusy => self.config.lock_busy_requeue(),
        };
        metrics::increment_requeues_total(outcome.as_str());
        Action::requeue(delay)
    }

    /// Backoff key for a resource, e.g. `GithubSyncRepo/widgets`
    pub fn backoff_key(kind: &str, name: &str) -> String {
        format!("{kind}/{name}")
    }

    /// Next error backoff for `key`, advancing its sequence.
    pub fn next_error_backoff(&self, key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states.entry(key.to_string()).or_insert_with(|| {
                    BackoffState::new(
                        self.config.error_backoff_min_secs,
                        self.config.error_backoff_max_secs,
                    )
                });
                state.increment_error();
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using minimum backoff", e);
                (Duration::from_secs(self.config.error_backoff_min_secs), 0)
            }
        }
    }

    /// Forget the error history of `key` after a successful reconciliation.
    pub fn reset_backoff(&self, key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            if let Some(state) = states.get_mut(key) {
                state.reset();
            }
        }
    }
}

/// Cancellation for one pass: fires on shutdown or when the pass timeout elapses.
#[derive(Debug)]
pub struct PassDeadline {
    token: CancellationToken,
    timer: JoinHandle<()>,
}

impl PassDeadline {
    pub fn start(shutdown: &CancellationToken, timeout: Duration) -> Self {
        let token = shutdown.child_token();
        let timer = tokio::spawn({
            let token = token.clone();
            async move {
                tokio::time::sleep(timeout).await;
                warn!(
                    timeout_secs = timeout.as_secs(),
                    "⏱️  Synchronization pass deadline reached, cancelling"
                );
                token.cancel();
            }
        });
        Self { token, timer }
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for PassDeadline {
    fn drop(&mut self) {
        self.timer.abort();
    }
}
