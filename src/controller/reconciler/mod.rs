//! # Reconciler
//!
//! Reconciliation coordinator for `GithubActionSecretsSync` and
//! `GithubSyncRepo` resources.
//!
//! Every pass runs under one process-wide lock, so no two passes ever race on
//! the same repository or the same status record. The lock guard is scoped to
//! the pass and released on every exit path.
//!
//! ## Reconciliation Flow
//!
//! 1. Acquire the sync lock (or requeue when busy under the non-blocking policy)
//! 2. Re-read the resource; a deleted resource is a no-op
//! 3. Build the sync buffer from the referenced Secrets and ConfigMaps
//! 4. Run the synchronization engine over the target repositories
//! 5. Persist status and map the outcome to a requeue

pub mod reconcile;
pub mod types;

pub use reconcile::{reconcile_sync_config, reconcile_sync_repo};
pub use types::{BackoffState, PassDeadline, PassOutcome, Reconciler, ReconcilerError};
