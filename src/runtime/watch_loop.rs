//! # Watch Loop
//!
//! Runs one `kube_runtime` controller per custom resource. Both share the
//! reconciler, and therefore its sync lock.

use crate::controller::reconciler::reconcile::{SYNC_CONFIG_KIND, SYNC_REPO_KIND};
use crate::controller::reconciler::{
    reconcile_sync_config, reconcile_sync_repo, Reconciler, ReconcilerError,
};
use crate::controller::server::ServerState;
use crate::crd::{GithubActionSecretsSync, GithubSyncRepo};
use crate::runtime::error_policy::{handle_reconciliation_error, handle_watch_stream_error};
use futures::StreamExt;
use kube::api::Api;
use kube::{Client, Resource, ResourceExt};
use kube_runtime::controller::{Action, Error as ControllerError};
use kube_runtime::reflector::ObjectRef;
use kube_runtime::{watcher, Controller};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Run both controllers until SIGINT/SIGTERM, restarting them when their
/// streams end unexpectedly.
pub async fn run_watch_loop(
    client: Client,
    reconciler: Arc<Reconciler>,
    server_state: Arc<ServerState>,
) -> Result<(), anyhow::Error> {
    let configs: Api<GithubActionSecretsSync> = Api::all(client.clone());
    let repositories: Api<GithubSyncRepo> = Api::all(client);
    let restart_delay = reconciler.config.watch_restart_delay();
    let shutdown = reconciler.shutdown.clone();

    tokio::spawn({
        let shutdown = shutdown.clone();
        let server_state = Arc::clone(&server_state);
        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
                return;
            }
            info!("Received shutdown signal (SIGINT/SIGTERM), initiating graceful shutdown...");
            server_state.set_ready(false);
            // Interrupts the running pass at its next suspension point
            shutdown.cancel();
        }
    });

    loop {
        info!("Starting controller watch loop...");

        let config_controller =
            Controller::new(configs.clone(), watcher::Config::default().any_semantic())
                .shutdown_on_signal()
                .run(
                    |obj, ctx| async move {
                        let name = obj.name_any();
                        let result = reconcile_sync_config(&name, Arc::clone(&ctx)).await;
                        reset_backoff_on_success(&ctx, SYNC_CONFIG_KIND, &name, &result);
                        result
                    },
                    handle_reconciliation_error::<GithubActionSecretsSync>,
                    Arc::clone(&reconciler),
                )
                .for_each(|event| log_controller_event(event, restart_delay));

        let repo_controller =
            Controller::new(repositories.clone(), watcher::Config::default().any_semantic())
                .shutdown_on_signal()
                .run(
                    |obj, ctx| async move {
                        let name = obj.name_any();
                        let result = reconcile_sync_repo(&name, Arc::clone(&ctx)).await;
                        reset_backoff_on_success(&ctx, SYNC_REPO_KIND, &name, &result);
                        result
                    },
                    handle_reconciliation_error::<GithubSyncRepo>,
                    Arc::clone(&reconciler),
                )
                .for_each(|event| log_controller_event(event, restart_delay));

        tokio::join!(config_controller, repo_controller);

        tokio::select! {
            () = shutdown.cancelled() => break,
            () = tokio::time::sleep(restart_delay) => {
                warn!("Controller watch stream ended, restarted after {}s", restart_delay.as_secs());
            }
        }
    }

    info!("Controller stopped gracefully");
    Ok(())
}

fn reset_backoff_on_success(
    ctx: &Reconciler,
    kind: &str,
    name: &str,
    result: &Result<Action, ReconcilerError>,
) {
    if result.is_ok() {
        ctx.reset_backoff(&Reconciler::backoff_key(kind, name));
    }
}

async fn log_controller_event<K, E>(
    event: Result<(ObjectRef<K>, Action), ControllerError<ReconcilerError, E>>,
    restart_delay: Duration,
) where
    K: Resource,
    E: Debug,
{
    match event {
        Ok((object, action)) => {
            debug!(resource = %object.name, ?action, "watch.event.success");
        }
        // Already logged and scheduled by the error policy
        Err(ControllerError::ReconcilerFailed(error, _)) => {
            debug!(error = %error, "Reconciliation failed");
        }
        Err(error) => handle_watch_stream_error(&format!("{error:?}"), restart_delay).await,
    }
}
