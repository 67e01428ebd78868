//! # Per-Property Sync State
//!
//! The last outcome per property name, loaded from a repository's status at
//! the start of a pass and written back once at the end. This is the only
//! state that survives between passes.

use super::buffer::PropertyKind;
use super::fingerprint::Fingerprint;
use crate::crd::{GithubSyncRepoStatus, PropertySyncPhase, PropertySyncRecord};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyOutcome {
    Synced(Fingerprint),
    Failed(String),
}

impl PropertyOutcome {
    fn from_record(record: &PropertySyncRecord) -> Option<Self> {
        match record.phase {
            PropertySyncPhase::Synced => record.fingerprint.map(PropertyOutcome::Synced),
            PropertySyncPhase::Failed => Some(PropertyOutcome::Failed(
                record.message.clone().unwrap_or_default(),
            )),
        }
    }

    fn to_record(&self, last_transition_time: Option<String>) -> PropertySyncRecord {
        match self {
            PropertyOutcome::Synced(fingerprint) => PropertySyncRecord {
                phase: PropertySyncPhase::Synced,
                fingerprint: Some(*fingerprint),
                message: None,
                last_transition_time,
            },
            PropertyOutcome::Failed(message) => PropertySyncRecord {
                phase: PropertySyncPhase::Failed,
                fingerprint: None,
                message: Some(message.clone()),
                last_transition_time,
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertySyncState {
    secrets: BTreeMap<String, PropertyOutcome>,
    variables: BTreeMap<String, PropertyOutcome>,
}

impl PropertySyncState {
    pub fn from_status(status: &GithubSyncRepoStatus) -> Self {
        let load = |records: &BTreeMap<String, PropertySyncRecord>| {
            records
                .iter()
                .filter_map(|(name, record)| {
                    PropertyOutcome::from_record(record).map(|outcome| (name.clone(), outcome))
                })
                .collect::<BTreeMap<_, _>>()
        };
        Self {
            secrets: load(&status.secrets_sync_states),
            variables: load(&status.variables_sync_states),
        }
    }

    fn outcomes(&self, kind: PropertyKind) -> &BTreeMap<String, PropertyOutcome> {
        match kind {
            PropertyKind::Secret => &self.secrets,
            PropertyKind::Variable => &self.variables,
        }
    }

    fn outcomes_mut(&mut self, kind: PropertyKind) -> &mut BTreeMap<String, PropertyOutcome> {
        match kind {
            PropertyKind::Secret => &mut self.secrets,
            PropertyKind::Variable => &mut self.variables,
        }
    }

    pub fn outcome(&self, kind: PropertyKind, name: &str) -> Option<&PropertyOutcome> {
        self.outcomes(kind).get(name)
    }

    /// True only for a `Synced` outcome with the same fingerprint.
    pub fn is_synced(&self, kind: PropertyKind, name: &str, fingerprint: Fingerprint) -> bool {
        matches!(
            self.outcome(kind, name),
            Some(PropertyOutcome::Synced(recorded)) if *recorded == fingerprint
        )
    }

    /// Replace the outcome for `name`; the last outcome wins.
    pub fn record(&mut self, kind: PropertyKind, name: &str, outcome: PropertyOutcome) {
        self.outcomes_mut(kind).insert(name.to_string(), outcome);
    }

    /// Drop every outcome of `kind` whose name `keep` rejects. Returns the
    /// dropped names.
    pub fn retain<F>(&mut self, kind: PropertyKind, keep: F) -> Vec<String>
    where
        F: Fn(&str) -> bool,
    {
        let outcomes = self.outcomes_mut(kind);
        let dropped: Vec<String> = outcomes
            .keys()
            .filter(|name| !keep(name))
            .cloned()
            .collect();
        for name in &dropped {
            outcomes.remove(name);
        }
        dropped
    }

    /// Write outcomes into `status`. A record keeps its transition time when
    /// its outcome did not change.
    pub fn write_into(&self, status: &mut GithubSyncRepoStatus) {
        let now = chrono::Utc::now().to_rfc3339();
        let merge = |outcomes: &BTreeMap<String, PropertyOutcome>,
                     previous: &BTreeMap<String, PropertySyncRecord>| {
            outcomes
                .iter()
                .map(|(name, outcome)| {
                    let unchanged = previous.get(name).filter(|record| {
                        PropertyOutcome::from_record(record).as_ref() == Some(outcome)
                    });
                    let since = unchanged
                        .and_then(|record| record.last_transition_time.clone())
                        .unwrap_or_else(|| now.clone());
                    (name.clone(), outcome.to_record(Some(since)))
                })
                .collect::<BTreeMap<_, _>>()
        };
        status.secrets_sync_states = merge(&self.secrets, &status.secrets_sync_states);
        status.variables_sync_states = merge(&self.variables, &status.variables_sync_states);
    }
}

/// Attempt counters for one kind within one repository and one pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncAttempts {
    pub total: usize,
    pub skipped: usize,
    pub succeeded: usize,
    pub failed: usize,
}

impl SyncAttempts {
    /// Properties that are in sync after the pass
    pub fn in_sync(&self) -> usize {
        self.skipped + self.succeeded
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncAttemptsByKind {
    pub secrets: SyncAttempts,
    pub variables: SyncAttempts,
}

impl SyncAttemptsByKind {
    pub fn get(&self, kind: PropertyKind) -> &SyncAttempts {
        match kind {
            PropertyKind::Secret => &self.secrets,
            PropertyKind::Variable => &self.variables,
        }
    }

    pub fn get_mut(&mut self, kind: PropertyKind) -> &mut SyncAttempts {
        match kind {
            PropertyKind::Secret => &mut self.secrets,
            PropertyKind::Variable => &mut self.variables,
        }
    }

    pub fn any_failed(&self) -> bool {
        self.secrets.failed > 0 || self.variables.failed > 0
    }

    /// Remote writes performed in this pass
    pub fn writes(&self) -> usize {
        self.secrets.succeeded
            + self.secrets.failed
            + self.variables.succeeded
            + self.variables.failed
    }
}

impl fmt::Display for SyncAttemptsByKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{} secrets, {}/{} variables synced",
            self.secrets.in_sync(),
            self.secrets.total,
            self.variables.in_sync(),
            self.variables.total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_matching_synced_fingerprint_counts() {
        let mut state = PropertySyncState::default();
        assert!(!state.is_synced(PropertyKind::Secret, "TOKEN", 7));

        state.record(PropertyKind::Secret, "TOKEN", PropertyOutcome::Synced(7));
        assert!(state.is_synced(PropertyKind::Secret, "TOKEN", 7));
        assert!(!state.is_synced(PropertyKind::Secret, "TOKEN", 8));
        assert!(!state.is_synced(PropertyKind::Variable, "TOKEN", 7));

        state.record(
            PropertyKind::Secret,
            "TOKEN",
            PropertyOutcome::Failed("boom".to_string()),
        );
        assert!(!state.is_synced(PropertyKind::Secret, "TOKEN", 7));
    }

    #[test]
    fn test_status_round_trip_preserves_outcomes() {
        let mut state = PropertySyncState::default();
        state.record(PropertyKind::Secret, "TOKEN", PropertyOutcome::Synced(7));
        state.record(
            PropertyKind::Variable,
            "REGION",
            PropertyOutcome::Failed("HTTP 422".to_string()),
        );

        let mut status = GithubSyncRepoStatus::default();
        state.write_into(&mut status);
        assert_eq!(status.secrets_sync_states["TOKEN"].fingerprint, Some(7));
        assert_eq!(
            status.variables_sync_states["REGION"].message.as_deref(),
            Some("HTTP 422")
        );

        assert_eq!(PropertySyncState::from_status(&status), state);
    }

    #[test]
    fn test_unchanged_outcome_keeps_transition_time() {
        let mut status = GithubSyncRepoStatus::default();
        status.secrets_sync_states.insert(
            "TOKEN".to_string(),
            PropertySyncRecord {
                phase: PropertySyncPhase::Synced,
                fingerprint: Some(7),
                message: None,
                last_transition_time: Some("2024-01-01T00:00:00Z".to_string()),
            },
        );
        let mut state = PropertySyncState::from_status(&status);
        state.record(PropertyKind::Secret, "OTHER", PropertyOutcome::Synced(1));
        state.write_into(&mut status);

        assert_eq!(
            status.secrets_sync_states["TOKEN"].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
        assert!(status.secrets_sync_states["OTHER"].last_transition_time.is_some());
    }

    #[test]
    fn test_retain_drops_records_of_removed_properties() {
        let mut state = PropertySyncState::default();
        state.record(PropertyKind::Secret, "TOKEN", PropertyOutcome::Synced(7));
        state.record(PropertyKind::Secret, "OLD_TOKEN", PropertyOutcome::Synced(3));
        state.record(PropertyKind::Variable, "OLD_TOKEN", PropertyOutcome::Synced(1));

        let dropped = state.retain(PropertyKind::Secret, |name| name == "TOKEN");
        assert_eq!(dropped, vec!["OLD_TOKEN".to_string()]);
        assert!(state.outcome(PropertyKind::Secret, "OLD_TOKEN").is_none());
        assert!(state.is_synced(PropertyKind::Secret, "TOKEN", 7));
        assert!(state.is_synced(PropertyKind::Variable, "OLD_TOKEN", 1));

        let mut status = GithubSyncRepoStatus::default();
        status.secrets_sync_states.insert(
            "OLD_TOKEN".to_string(),
            PropertySyncRecord {
                phase: PropertySyncPhase::Synced,
                fingerprint: Some(3),
                message: None,
                last_transition_time: None,
            },
        );
        state.write_into(&mut status);
        assert_eq!(
            status.secrets_sync_states.keys().collect::<Vec<_>>(),
            vec!["TOKEN"]
        );
    }

    #[test]
    fn test_summary_counts_skipped_as_in_sync() {
        let mut attempts = SyncAttemptsByKind::default();
        let secrets = attempts.get_mut(PropertyKind::Secret);
        secrets.total = 3;
        secrets.skipped = 1;
        secrets.succeeded = 1;
        secrets.failed = 1;
        attempts.get_mut(PropertyKind::Variable).total = 1;
        attempts.get_mut(PropertyKind::Variable).succeeded = 1;

        assert!(attempts.any_failed());
        assert_eq!(attempts.writes(), 3);
        assert_eq!(attempts.to_string(), "2/3 secrets, 1/1 variables synced");
    }
}
