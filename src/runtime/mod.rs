//! # Runtime
//!
//! Process wiring around the reconciler.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server, clients and reconciler
//! - `watch_loop`: one `kube_runtime` controller per custom resource
//! - `error_policy`: backoff for reconciliation errors, watch stream error classification

pub mod error_policy;
pub mod initialization;
pub mod watch_loop;
