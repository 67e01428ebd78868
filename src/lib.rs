//! GitHub Actions Sync Controller Library
//!
//! Keeps GitHub Actions secrets and variables in sync with values held in
//! Kubernetes Secrets and ConfigMaps, driven by `GithubActionSecretsSync` and
//! `GithubSyncRepo` resources.
//!
//! ## Quick Start
//!
//! ```rust
//! use github_actions_sync_controller::prelude::*;
//! ```

pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod store;
pub mod sync;
