//! # Controller
//!
//! - `backoff`: Fibonacci backoff for run-level reconciliation errors
//! - `reconciler`: Reconciliation coordinator for both custom resources
//! - `server`: HTTP server for metrics and health checks

pub mod backoff;
pub mod reconciler;
pub mod server;
