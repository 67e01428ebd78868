//! # Synchronization Engine
//!
//! For every target repository, in input order:
//!
//! 1. Parse `owner/name`; an invalid repository fails on its own and is skipped
//! 2. For secrets, then variables, compare each buffered property against the
//!    recorded outcome and call GitHub only when the fingerprint differs
//! 3. Record a `Synced` or `Failed` outcome per property; a failure never stops
//!    the remaining properties or repositories
//! 4. Forget the outcomes of properties no longer published to the repository
//! 5. Persist the repository status exactly once
//!
//! The buffer must hold every configuration the repository references.
//!
//! The pass stops at the next suspension point once its cancellation token
//! fires. Outcomes recorded so far are still persisted and the report is
//! flagged incomplete.

use super::buffer::{PropertyKind, PropertyValue, SyncBuffer};
use super::repository::TargetRepository;
use super::state::{PropertyOutcome, PropertySyncState, SyncAttemptsByKind};
use crate::constants::reasons;
use crate::crd::GithubSyncRepo;
use crate::observability::metrics;
use crate::provider::{ActionsApi, ApiError};
use crate::store::{StatusStore, StoreError};
use kube::ResourceExt;
use std::collections::BTreeMap;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("failed to persist status of GithubSyncRepo {resource}: {source}")]
    PersistStatus {
        resource: String,
        #[source]
        source: StoreError,
    },
}

/// Overall result for one repository in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryVerdict {
    pub synced: bool,
    pub reason: &'static str,
    pub message: String,
}

impl RepositoryVerdict {
    pub fn failed(reason: &'static str, message: impl Into<String>) -> Self {
        Self {
            synced: false,
            reason,
            message: message.into(),
        }
    }

    fn from_attempts(attempts: &SyncAttemptsByKind, interrupted: bool) -> Self {
        if interrupted {
            Self::failed(
                reasons::INTERRUPTED,
                format!("Synchronization interrupted ({attempts})"),
            )
        } else if attempts.any_failed() {
            Self::failed(
                reasons::SYNC_FAILED,
                format!("Failed to synchronize some properties ({attempts})"),
            )
        } else {
            Self {
                synced: true,
                reason: reasons::SYNCED,
                message: format!("All properties synced ({attempts})"),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct RepositoryReport {
    /// Name of the `GithubSyncRepo` resource
    pub resource: String,
    pub verdict: RepositoryVerdict,
    pub attempts: SyncAttemptsByKind,
    pub interrupted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    pub repositories: Vec<RepositoryReport>,
    /// The pass was cancelled before every property was attempted
    pub incomplete: bool,
}

impl SyncReport {
    pub fn synced(&self) -> usize {
        self.repositories.iter().filter(|r| r.verdict.synced).count()
    }

    pub fn failed(&self) -> usize {
        self.repositories.len() - self.synced()
    }

    pub fn any_failed(&self) -> bool {
        self.failed() > 0
    }

    pub fn repository(&self, resource: &str) -> Option<&RepositoryReport> {
        self.repositories.iter().find(|r| r.resource == resource)
    }
}

/// One synchronization pass over a set of repositories
pub struct SyncEngine<'a, S: ?Sized> {
    api: &'a dyn ActionsApi,
    statuses: &'a S,
    cancel: CancellationToken,
}

impl<S: ?Sized> std::fmt::Debug for SyncEngine<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}

impl<'a, S: StatusStore + ?Sized> SyncEngine<'a, S> {
    pub fn new(api: &'a dyn ActionsApi, statuses: &'a S, cancel: CancellationToken) -> Self {
        Self {
            api,
            statuses,
            cancel,
        }
    }

    /// Push `buffer` to every repository in `repositories`.
    ///
    /// Property failures are absorbed into the report; only a failure to
    /// persist a repository status aborts the pass.
    pub async fn synchronize(
        &self,
        repositories: &[GithubSyncRepo],
        buffer: &SyncBuffer,
    ) -> Result<SyncReport, SyncError> {
        self.api.begin_pass();
        let mut report = SyncReport::default();

        for repository in repositories {
            if self.cancel.is_cancelled() {
                report.incomplete = true;
                break;
            }
            let span = info_span!("sync.repository", resource = %repository.name_any());
            let outcome = self
                .synchronize_repository(repository, buffer)
                .instrument(span)
                .await?;
            let interrupted = outcome.interrupted;
            report.repositories.push(outcome);
            if interrupted {
                report.incomplete = true;
                break;
            }
        }

        if report.incomplete {
            warn!(
                attempted = report.repositories.len(),
                total = repositories.len(),
                "⏸️  Synchronization pass interrupted"
            );
        }
        Ok(report)
    }

    async fn synchronize_repository(
        &self,
        repository: &GithubSyncRepo,
        buffer: &SyncBuffer,
    ) -> Result<RepositoryReport, SyncError> {
        let resource = repository.name_any();
        let mut status = repository.status.clone().unwrap_or_default();
        let mut attempts = SyncAttemptsByKind::default();
        let mut interrupted = false;

        let verdict = match TargetRepository::parse(&repository.spec.repository) {
            Err(error) => {
                warn!(error = %error, "Skipping repository with invalid name");
                RepositoryVerdict::failed(reasons::INVALID_REPOSITORY, error.to_string())
            }
            Ok(target) => {
                let mut state = PropertySyncState::from_status(&status);
                interrupted = self
                    .push_properties(&target, repository, buffer, &mut state, &mut attempts)
                    .await;
                if !interrupted {
                    forget_unpublished(&mut state, buffer, repository);
                }
                state.write_into(&mut status);
                RepositoryVerdict::from_attempts(&attempts, interrupted)
            }
        };

        status.set_synced(
            verdict.synced,
            verdict.reason,
            verdict.message.clone(),
            repository.metadata.generation,
        );
        self.statuses
            .persist_repository_status(&resource, &status)
            .await
            .map_err(|source| SyncError::PersistStatus {
                resource: resource.clone(),
                source,
            })?;

        if verdict.synced {
            info!(summary = %attempts, writes = attempts.writes(), "✅ Repository synchronized");
        } else {
            warn!(reason = verdict.reason, message = %verdict.message, "❌ Repository not synchronized");
        }

        Ok(RepositoryReport {
            resource,
            verdict,
            attempts,
            interrupted,
        })
    }

    /// Returns `true` when the pass was cancelled before every property was attempted.
    async fn push_properties(
        &self,
        target: &TargetRepository,
        repository: &GithubSyncRepo,
        buffer: &SyncBuffer,
        state: &mut PropertySyncState,
        attempts: &mut SyncAttemptsByKind,
    ) -> bool {
        for kind in PropertyKind::ALL {
            for (name, value) in desired_properties(buffer, kind, repository) {
                if self.cancel.is_cancelled() {
                    return true;
                }
                let fingerprint = value.fingerprint();

                if state.is_synced(kind, name, fingerprint) {
                    let counters = attempts.get_mut(kind);
                    counters.total += 1;
                    counters.skipped += 1;
                    debug!(kind = %kind, name, "Unchanged, skipping");
                    metrics::record_property_sync(kind.as_str(), "skipped");
                    continue;
                }

                let result = tokio::select! {
                    biased;
                    () = self.cancel.cancelled() => None,
                    result = self.push(kind, target, name, value) => Some(result),
                };
                let Some(result) = result else {
                    return true;
                };

                let counters = attempts.get_mut(kind);
                counters.total += 1;
                match result {
                    Ok(()) => {
                        counters.succeeded += 1;
                        state.record(kind, name, PropertyOutcome::Synced(fingerprint));
                        info!(kind = %kind, name, "Property synchronized");
                        metrics::record_property_sync(kind.as_str(), "synced");
                    }
                    Err(error) => {
                        counters.failed += 1;
                        warn!(kind = %kind, name, error = %error, "Failed to synchronize property");
                        state.record(kind, name, PropertyOutcome::Failed(error.to_string()));
                        metrics::record_property_sync(kind.as_str(), "failed");
                    }
                }
            }
        }
        false
    }

    async fn push(
        &self,
        kind: PropertyKind,
        target: &TargetRepository,
        name: &str,
        value: &PropertyValue,
    ) -> Result<(), ApiError> {
        match kind {
            PropertyKind::Secret => self.api.upsert_secret(target, name, value.raw()).await,
            PropertyKind::Variable => {
                self.api
                    .upsert_variable(target, name, value.as_text()?)
                    .await
            }
        }
    }
}

/// Buffered properties of `kind` whose source configuration `repository`
/// references, by name. When two configurations publish the same name the
/// one ordered last wins.
fn desired_properties<'b>(
    buffer: &'b SyncBuffer,
    kind: PropertyKind,
    repository: &GithubSyncRepo,
) -> BTreeMap<&'b str, &'b PropertyValue> {
    buffer
        .properties(kind)
        .filter(|(source, _, _)| repository.references(&source.name))
        .map(|(_, name, value)| (name, value))
        .collect()
}

/// Drop recorded outcomes for names no referenced configuration publishes
/// any more. The remote values themselves are left in place.
fn forget_unpublished(
    state: &mut PropertySyncState,
    buffer: &SyncBuffer,
    repository: &GithubSyncRepo,
) {
    for kind in PropertyKind::ALL {
        let desired = desired_properties(buffer, kind, repository);
        let dropped = state.retain(kind, |name| desired.contains_key(name));
        if !dropped.is_empty() {
            debug!(kind = %kind, names = ?dropped, "Forgot outcomes of unpublished properties");
        }
    }
}
