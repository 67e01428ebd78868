//! # Synchronization Core
//!
//! Collects desired values into a [`SyncBuffer`], decides per repository and per
//! property whether GitHub needs a write, performs it and records the outcome.
//!
//! ## Module Structure
//!
//! - `fingerprint.rs` - FNV-1a change-detection hash
//! - `buffer.rs` - Sync buffer grouped by kind, source configuration and name
//! - `builder.rs` - Fills the buffer from Secrets and ConfigMaps
//! - `repository.rs` - `owner/name` parsing
//! - `state.rs` - Per-property outcomes and attempt counters
//! - `engine.rs` - The per-repository, per-property synchronization loop

mod buffer;
mod builder;
mod engine;
mod fingerprint;
mod repository;
mod state;

pub use buffer::{PropertyKind, PropertyValue, SourceIdentity, SyncBuffer};
pub use builder::{build_sync_buffer, BufferBuildError};
pub use engine::{RepositoryReport, RepositoryVerdict, SyncEngine, SyncError, SyncReport};
pub use fingerprint::{fingerprint, Fingerprint};
pub use repository::{RepositoryParseError, TargetRepository};
pub use state::{PropertyOutcome, PropertySyncState, SyncAttempts, SyncAttemptsByKind};
