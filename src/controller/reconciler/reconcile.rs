//! # Reconcile
//!
//! Entry points called by the watch loop. Both re-read their resource under
//! the sync lock so they always work from the latest persisted status.
//!
//! Whichever resource triggered the pass, a repository is always pushed the
//! buffer built from every configuration it references, so both passes agree
//! on the desired value of each property.

use super::types::{PassDeadline, PassOutcome, Reconciler, ReconcilerError};
use crate::constants::reasons;
use crate::crd::{GithubActionSecretsSync, GithubSyncRepo};
use crate::observability::metrics;
use crate::sync::{
    build_sync_buffer, RepositoryReport, RepositoryVerdict, SyncAttemptsByKind, SyncBuffer,
    SyncEngine, SyncReport, TargetRepository,
};
use kube::ResourceExt;
use kube_runtime::controller::Action;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

pub const SYNC_CONFIG_KIND: &str = "GithubActionSecretsSync";
pub const SYNC_REPO_KIND: &str = "GithubSyncRepo";

/// Status to record for a pass and how to requeue it
#[derive(Debug, Clone)]
struct PassSummary {
    outcome: PassOutcome,
    reason: &'static str,
    message: String,
}

impl PassSummary {
    fn synced(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            outcome: PassOutcome::Synced,
            reason,
            message: message.into(),
        }
    }

    fn failed(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            outcome: PassOutcome::Failed,
            reason,
            message: message.into(),
        }
    }

    fn is_synced(&self) -> bool {
        self.outcome == PassOutcome::Synced
    }

    /// Aggregate of an engine run over `total` repositories
    fn from_report(report: &SyncReport, total: usize) -> Self {
        if report.incomplete {
            Self {
                outcome: PassOutcome::Interrupted,
                reason: reasons::INTERRUPTED,
                message: format!(
                    "Synchronization interrupted after {}/{total} repositories",
                    report.repositories.len()
                ),
            }
        } else if report.any_failed() {
            Self::failed(
                reasons::SYNC_FAILED,
                format!("{}/{total} repositories failed to synchronize", report.failed()),
            )
        } else {
            Self::synced(
                reasons::SYNCED,
                format!("Synchronized {}/{total} repositories", report.synced()),
            )
        }
    }
}

fn outcome_of(report: &SyncReport) -> PassOutcome {
    if report.incomplete {
        PassOutcome::Interrupted
    } else if report.any_failed() {
        PassOutcome::Failed
    } else {
        PassOutcome::Synced
    }
}

/// Reconcile one `GithubActionSecretsSync`: synchronize every repository that
/// references it.
pub async fn reconcile_sync_config(
    name: &str,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let span = info_span!("reconcile.sync_config", resource.name = name);
    run_locked(SYNC_CONFIG_KIND, &ctx, sync_config_pass(name, &ctx))
        .instrument(span)
        .await
}

/// Reconcile one `GithubSyncRepo`: push every referenced configuration to it.
pub async fn reconcile_sync_repo(
    name: &str,
    ctx: Arc<Reconciler>,
) -> Result<Action, ReconcilerError> {
    let span = info_span!("reconcile.sync_repo", resource.name = name);
    run_locked(SYNC_REPO_KIND, &ctx, sync_repo_pass(name, &ctx))
        .instrument(span)
        .await
}

/// Run `pass` under the sync lock, with reconciliation metrics.
async fn run_locked<F>(kind: &str, ctx: &Reconciler, pass: F) -> Result<Action, ReconcilerError>
where
    F: std::future::Future<Output = Result<Action, ReconcilerError>>,
{
    metrics::increment_reconciliations(kind);

    let Some(_guard) = ctx.acquire_sync_lock().await else {
        info!("🔒 Sync lock busy, requeueing");
        metrics::increment_sync_lock_busy();
        return Ok(ctx.requeue(PassOutcome::LockBusy));
    };

    let start = Instant::now();
    let result = pass.await;
    metrics::observe_reconciliation_duration(kind, start.elapsed().as_secs_f64());
    result
}

async fn sync_config_pass(name: &str, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let Some(config) = ctx.store.get_sync_config(name).await? else {
        debug!("GithubActionSecretsSync no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    let deadline = PassDeadline::start(&ctx.shutdown, ctx.config.sync_pass_timeout());
    let result = push_sync_config(ctx, &config, deadline.token()).await;

    let summary = match &result {
        Ok(summary) => summary.clone(),
        Err(error) => PassSummary::failed(reasons::RECONCILE_ERROR, error.to_string()),
    };
    let mut status = config.status.clone().unwrap_or_default();
    status.set_synced(
        summary.is_synced(),
        summary.reason,
        summary.message.as_str(),
        config.metadata.generation,
    );
    let persisted = ctx.store.persist_sync_config_status(name, &status).await;

    let summary = result?;
    persisted?;

    if summary.is_synced() {
        info!(message = %summary.message, "✅ Configuration synchronized");
    } else {
        warn!(reason = summary.reason, message = %summary.message, "❌ Configuration not synchronized");
    }
    Ok(ctx.requeue(summary.outcome))
}

async fn push_sync_config(
    ctx: &Reconciler,
    config: &GithubActionSecretsSync,
    cancel: CancellationToken,
) -> Result<PassSummary, ReconcilerError> {
    let store = ctx.store.as_ref();

    // Source problems in this configuration stay on it, no repository is touched
    if let Err(error) = build_sync_buffer(store, std::slice::from_ref(config)).await {
        if error.is_transient() {
            return Err(error.into());
        }
        warn!(error = %error, "Cannot build sync buffer, no repository touched");
        return Ok(PassSummary::failed(
            reasons::SOURCE_NOT_FOUND,
            error.to_string(),
        ));
    }

    let repositories = store.list_repositories_referencing(&config.name_any()).await?;
    if repositories.is_empty() {
        return Ok(PassSummary::synced(
            reasons::NO_REPOSITORIES,
            "No repositories reference this configuration",
        ));
    }
    debug!(
        repositories = repositories.len(),
        properties = config.property_count(),
        "Synchronizing configuration"
    );

    let mut report = SyncReport::default();
    for repository in &repositories {
        if cancel.is_cancelled() {
            report.incomplete = true;
            break;
        }
        let single = sync_repository(ctx, repository, cancel.clone()).await?;
        report.incomplete |= single.incomplete;
        report.repositories.extend(single.repositories);
        if report.incomplete {
            break;
        }
    }
    Ok(PassSummary::from_report(&report, repositories.len()))
}

async fn sync_repo_pass(name: &str, ctx: &Reconciler) -> Result<Action, ReconcilerError> {
    let Some(repository) = ctx.store.get_repository(name).await? else {
        debug!("GithubSyncRepo no longer exists, nothing to do");
        return Ok(Action::await_change());
    };

    let deadline = PassDeadline::start(&ctx.shutdown, ctx.config.sync_pass_timeout());
    let report = sync_repository(ctx, &repository, deadline.token()).await?;
    Ok(ctx.requeue(outcome_of(&report)))
}

/// Push every configuration `repository` references to it. A configuration
/// problem is recorded on the repository without contacting GitHub.
async fn sync_repository(
    ctx: &Reconciler,
    repository: &GithubSyncRepo,
    cancel: CancellationToken,
) -> Result<SyncReport, ReconcilerError> {
    let rejection = match collect_repository_buffer(ctx, repository).await {
        Ok(Ok(buffer)) => {
            // The engine persists the repository status itself
            let report = SyncEngine::new(ctx.api.as_ref(), ctx.store.as_ref(), cancel)
                .synchronize(std::slice::from_ref(repository), &buffer)
                .await?;
            return Ok(report);
        }
        Ok(Err(rejection)) => Ok(rejection),
        Err(error) => Err(error),
    };

    let summary = match &rejection {
        Ok(summary) => summary.clone(),
        Err(error) => PassSummary::failed(reasons::RECONCILE_ERROR, error.to_string()),
    };
    warn!(reason = summary.reason, message = %summary.message, "❌ Repository not synchronized");

    let resource = repository.name_any();
    let mut status = repository.status.clone().unwrap_or_default();
    status.set_synced(
        false,
        summary.reason,
        summary.message.as_str(),
        repository.metadata.generation,
    );
    let persisted = ctx.store.persist_repository_status(&resource, &status).await;

    let summary = rejection?;
    persisted?;
    Ok(SyncReport {
        repositories: vec![RepositoryReport {
            resource,
            verdict: RepositoryVerdict::failed(summary.reason, summary.message),
            attempts: SyncAttemptsByKind::default(),
            interrupted: false,
        }],
        incomplete: false,
    })
}

/// Validate the repository and build one buffer from every configuration it
/// references. The inner `Err` is a configuration problem to record on the
/// repository without contacting GitHub.
async fn collect_repository_buffer(
    ctx: &Reconciler,
    repository: &GithubSyncRepo,
) -> Result<Result<SyncBuffer, PassSummary>, ReconcilerError> {
    if let Err(error) = TargetRepository::parse(&repository.spec.repository) {
        return Ok(Err(PassSummary::failed(
            reasons::INVALID_REPOSITORY,
            error.to_string(),
        )));
    }

    let mut configs = Vec::with_capacity(repository.spec.secrets_sync_refs.len());
    for reference in &repository.spec.secrets_sync_refs {
        match ctx.store.get_sync_config(reference).await? {
            Some(config) => configs.push(config),
            None => {
                return Ok(Err(PassSummary::failed(
                    reasons::REFERENCE_NOT_FOUND,
                    format!(
                        "failed to find referenced GithubActionSecretsSync '{reference}' within cluster"
                    ),
                )));
            }
        }
    }

    match build_sync_buffer(ctx.store.as_ref(), &configs).await {
        Ok(buffer) => Ok(Ok(buffer)),
        Err(error) if error.is_transient() => Err(error.into()),
        Err(error) => Ok(Err(PassSummary::failed(
            reasons::SOURCE_NOT_FOUND,
            error.to_string(),
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(verdicts: &[bool], incomplete: bool) -> SyncReport {
        SyncReport {
            repositories: verdicts
                .iter()
                .enumerate()
                .map(|(i, synced)| RepositoryReport {
                    resource: format!("repo-{i}"),
                    verdict: RepositoryVerdict {
                        synced: *synced,
                        reason: reasons::SYNCED,
                        message: String::new(),
                    },
                    attempts: SyncAttemptsByKind::default(),
                    interrupted: false,
                })
                .collect(),
            incomplete,
        }
    }

    #[test]
    fn test_summary_counts_repositories() {
        let summary = PassSummary::from_report(&report(&[true, true], false), 2);
        assert!(summary.is_synced());
        assert_eq!(summary.message, "Synchronized 2/2 repositories");

        let summary = PassSummary::from_report(&report(&[true, false, false], false), 3);
        assert_eq!(summary.outcome, PassOutcome::Failed);
        assert_eq!(summary.message, "2/3 repositories failed to synchronize");
    }

    #[test]
    fn test_interruption_wins_over_failures() {
        let partial = report(&[false], true);
        assert_eq!(outcome_of(&partial), PassOutcome::Interrupted);
        let summary = PassSummary::from_report(&partial, 4);
        assert_eq!(summary.outcome, PassOutcome::Interrupted);
        assert_eq!(
            summary.message,
            "Synchronization interrupted after 1/4 repositories"
        );
    }
}
