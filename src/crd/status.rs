//! # Status
//!
//! Status types for both resources. A `GithubSyncRepo` status also carries the
//! per-property sync records that let later passes skip unchanged values.

use crate::constants::SYNCED_CONDITION;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Status of a `GithubActionSecretsSync`
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GithubActionSecretsSyncStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
    /// Last time a pass finished for this configuration (RFC3339)
    #[serde(default)]
    pub last_sync_time: Option<String>,
    /// Last failure message, cleared on success
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Status of a `GithubSyncRepo`
#[derive(Debug, Clone, Deserialize, Serialize, Default, schemars::JsonSchema, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GithubSyncRepoStatus {
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub observed_generation: Option<i64>,
    #[serde(default)]
    pub last_sync_time: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Last outcome per GitHub secret name
    #[serde(default)]
    pub secrets_sync_states: BTreeMap<String, PropertySyncRecord>,
    /// Last outcome per GitHub variable name
    #[serde(default)]
    pub variables_sync_states: BTreeMap<String, PropertySyncRecord>,
}

/// Persisted outcome of the last write attempt for one property
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PropertySyncRecord {
    pub phase: PropertySyncPhase,
    /// FNV-1a fingerprint of the value written, set when `phase` is `Synced`
    #[serde(default)]
    pub fingerprint: Option<u32>,
    /// Error returned by GitHub, set when `phase` is `Failed`
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub last_transition_time: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
pub enum PropertySyncPhase {
    Synced,
    Failed,
}

#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub last_transition_time: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl Condition {
    pub fn synced(synced: bool, reason: &str, message: impl Into<String>) -> Self {
        Self {
            r#type: SYNCED_CONDITION.to_string(),
            status: if synced { "True" } else { "False" }.to_string(),
            last_transition_time: Some(chrono::Utc::now().to_rfc3339()),
            reason: Some(reason.to_string()),
            message: Some(message.into()),
        }
    }

    pub fn is_true(&self) -> bool {
        self.status == "True"
    }
}

/// Insert or replace the condition of the same type.
///
/// `lastTransitionTime` only moves when the condition status flips.
pub fn upsert_condition(conditions: &mut Vec<Condition>, mut condition: Condition) {
    match conditions.iter_mut().find(|c| c.r#type == condition.r#type) {
        Some(existing) => {
            if existing.status == condition.status {
                condition
                    .last_transition_time
                    .clone_from(&existing.last_transition_time);
            }
            *existing = condition;
        }
        None => conditions.push(condition),
    }
}

fn find_synced(conditions: &[Condition]) -> Option<&Condition> {
    conditions.iter().find(|c| c.r#type == SYNCED_CONDITION)
}

macro_rules! impl_synced_status {
    ($status:ty) => {
        impl $status {
            /// Record the outcome of a pass on the `Synced` condition.
            pub fn set_synced(
                &mut self,
                synced: bool,
                reason: &str,
                message: impl Into<String>,
                generation: Option<i64>,
            ) {
                let message = message.into();
                self.error_message = (!synced).then(|| message.clone());
                upsert_condition(
                    &mut self.conditions,
                    Condition::synced(synced, reason, message),
                );
                self.last_sync_time = Some(chrono::Utc::now().to_rfc3339());
                if generation.is_some() {
                    self.observed_generation = generation;
                }
            }

            pub fn synced_condition(&self) -> Option<&Condition> {
                find_synced(&self.conditions)
            }

            pub fn is_synced(&self) -> bool {
                self.synced_condition().is_some_and(Condition::is_true)
            }
        }
    };
}

impl_synced_status!(GithubActionSecretsSyncStatus);
impl_synced_status!(GithubSyncRepoStatus);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_condition_keeps_transition_time_when_status_unchanged() {
        let mut conditions = Vec::new();
        let mut first = Condition::synced(true, "Synced", "first");
        first.last_transition_time = Some("2024-01-01T00:00:00Z".to_string());
        upsert_condition(&mut conditions, first);

        upsert_condition(&mut conditions, Condition::synced(true, "Synced", "second"));
        assert_eq!(conditions.len(), 1);
        assert_eq!(conditions[0].message.as_deref(), Some("second"));
        assert_eq!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );

        upsert_condition(&mut conditions, Condition::synced(false, "Failed", "third"));
        assert_ne!(
            conditions[0].last_transition_time.as_deref(),
            Some("2024-01-01T00:00:00Z")
        );
    }

    #[test]
    fn test_set_synced_tracks_error_message() {
        let mut status = GithubSyncRepoStatus::default();
        status.set_synced(false, "InvalidRepository", "bad repo", Some(3));
        assert!(!status.is_synced());
        assert_eq!(status.error_message.as_deref(), Some("bad repo"));
        assert_eq!(status.observed_generation, Some(3));

        status.set_synced(true, "Synced", "ok", None);
        assert!(status.is_synced());
        assert!(status.error_message.is_none());
        assert_eq!(status.observed_generation, Some(3));
    }

    #[test]
    fn test_property_records_serialize_as_maps() {
        let mut status = GithubSyncRepoStatus::default();
        status.secrets_sync_states.insert(
            "TOKEN".to_string(),
            PropertySyncRecord {
                phase: PropertySyncPhase::Synced,
                fingerprint: Some(42),
                message: None,
                last_transition_time: None,
            },
        );
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["secretsSyncStates"]["TOKEN"]["phase"], "Synced");
        assert_eq!(json["secretsSyncStates"]["TOKEN"]["fingerprint"], 42);
    }
}
