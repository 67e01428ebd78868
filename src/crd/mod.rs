//! # Custom Resource Definitions
//!
//! CRD types for the GitHub Actions Sync Controller.
//!
//! ## Module Structure
//!
//! - `spec.rs` - `GithubActionSecretsSync` and `GithubSyncRepo` specifications
//! - `status.rs` - Status types, conditions and per-property sync records

mod spec;
mod status;

pub use spec::*;
pub use status::*;
