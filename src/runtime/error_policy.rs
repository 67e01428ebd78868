//! # Error Policy
//!
//! Error handling and backoff logic for the controller watch loop.

use crate::controller::reconciler::{Reconciler, ReconcilerError};
use crate::observability::metrics;
use kube::{Resource, ResourceExt};
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Handle reconciliation errors with per-resource Fibonacci backoff
///
/// Each resource keeps its own sequence so one broken resource does not slow
/// down the others. The sequence restarts after the next successful pass.
pub fn handle_reconciliation_error<K>(
    obj: Arc<K>,
    error: &ReconcilerError,
    ctx: Arc<Reconciler>,
) -> Action
where
    K: Resource<DynamicType = ()>,
{
    let kind = K::kind(&());
    let name = obj.name_any();

    let error_span = tracing::span!(
        tracing::Level::ERROR,
        "controller.watch.reconciliation_error",
        resource.kind = %kind,
        resource.name = %name,
        error = %error
    );
    let _error_guard = error_span.enter();

    error!("Reconciliation error for {}/{}: {:?}", kind, name, error);
    metrics::increment_reconciliation_errors(&kind);

    let (backoff, error_count) =
        ctx.next_error_backoff(&Reconciler::backoff_key(&kind, &name));

    info!(
        "🔄 Retrying with Fibonacci backoff: {}s (error count: {})",
        backoff.as_secs(),
        error_count
    );

    metrics::increment_requeues_total("error-backoff");
    Action::requeue(backoff)
}

/// How the watch loop should react to a stream error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchErrorClass {
    /// RBAC revoked or token expired
    Unauthorized,
    /// Resource version too old, the watch restarts
    Expired,
    /// API server storage reinitializing or throttling
    Throttled,
    /// Object or CRD missing
    NotFound,
    Unknown,
}

/// Classify a controller stream error from its debug rendering.
///
/// 404 is checked before 401 since not-found chains may also mention `WatchFailed`.
pub fn classify_watch_error(error_string: &str) -> WatchErrorClass {
    let is_not_found = error_string.contains("ObjectNotFound")
        || error_string.contains("404")
        || error_string.contains("not found");
    let is_401 = error_string.contains("401") || error_string.contains("Unauthorized");
    let is_410 = error_string.contains("410")
        || error_string.contains("too old resource version")
        || error_string.contains("Expired")
        || error_string.contains("Gone");
    let is_429 = error_string.contains("429")
        || error_string.contains("storage is (re)initializing")
        || error_string.contains("TooManyRequests");

    if is_401 && !is_not_found {
        WatchErrorClass::Unauthorized
    } else if is_410 {
        WatchErrorClass::Expired
    } else if is_429 {
        WatchErrorClass::Throttled
    } else if is_not_found {
        WatchErrorClass::NotFound
    } else {
        WatchErrorClass::Unknown
    }
}

/// Log a watch stream error and wait as its class requires.
pub async fn handle_watch_stream_error(error_string: &str, restart_delay: Duration) {
    let class = classify_watch_error(error_string);
    match class {
        WatchErrorClass::Unauthorized => {
            error!(
                "❌ Watch authentication failed (401 Unauthorized) - RBAC may have been revoked or token expired"
            );
            error!("   Verify the ClusterRole grants get/list/watch on githubactionsecretssyncs and githubsyncrepoes");
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorClass::Expired => {
            warn!(error_type = "410", "watch.error.resource_version_expired");
        }
        WatchErrorClass::Throttled => {
            warn!(
                "API server throttling or reinitializing (429), backing off for {}s",
                restart_delay.as_secs()
            );
            tokio::time::sleep(restart_delay).await;
        }
        WatchErrorClass::NotFound => {
            warn!(
                "Resource not found (404) - this may be normal if it was deleted or the CRD is missing. Error: {}",
                error_string
            );
        }
        WatchErrorClass::Unknown => {
            error!("Controller stream error: {}", error_string);
            tokio::time::sleep(restart_delay).await;
        }
    }
}
