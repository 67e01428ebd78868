//! # Prelude
//!
//! Re-exports commonly used types and traits for convenience.
//!
//! ```rust
//! use github_actions_sync_controller::prelude::*;
//! ```

// CRD types - most commonly used
pub use crate::crd::*;

// Remote API seam and the GitHub implementation
pub use crate::provider::github::{GithubClient, GithubCredentials, RetryPolicy};
pub use crate::provider::{ActionsApi, ApiError};

// Collaborator interfaces against the cluster
pub use crate::store::{
    BundleKind, BundleSource, ClusterStore, KeyedBundle, RepositoryCatalog, StatusStore,
    StoreError,
};

// Synchronization core
pub use crate::sync::{
    build_sync_buffer, fingerprint, BufferBuildError, Fingerprint, PropertyKind, PropertyOutcome,
    PropertySyncState, PropertyValue, SourceIdentity, SyncBuffer, SyncEngine, SyncError,
    SyncReport, TargetRepository,
};

// Reconciler types - core controller functionality
pub use crate::controller::reconciler::{
    reconcile_sync_config, reconcile_sync_repo, BackoffState, Reconciler, ReconcilerError,
};

// Config types
pub use crate::config::{ControllerConfig, LockPolicy};
