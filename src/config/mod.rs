//! # Configuration
//!
//! Controller settings loaded from environment variables, and GitHub
//! credential resolution from command line flags.

mod controller;
mod github;

pub use controller::{ControllerConfig, LockPolicy};
pub use github::resolve_credentials;
