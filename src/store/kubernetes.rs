//! # Kubernetes Store
//!
//! `ClusterStore` backed by the Kubernetes API.
//!
//! Statuses are written with server-side apply under a single field manager,
//! so per-property records left out of a status are removed from the object.

use super::{BundleKind, BundleSource, KeyedBundle, RepositoryCatalog, StatusStore, StoreError};
use crate::constants::FIELD_MANAGER;
use crate::crd::{
    GithubActionSecretsSync, GithubActionSecretsSyncStatus, GithubSyncRepo, GithubSyncRepoStatus,
    ResourceRef,
};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{ConfigMap, Secret};
use kube::api::{Api, ListParams, Patch, PatchParams};
use kube::{Client, Resource, ResourceExt};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;

#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl BundleSource for KubeStore {
    async fn fetch_bundle(
        &self,
        kind: BundleKind,
        reference: &ResourceRef,
    ) -> Result<KeyedBundle, StoreError> {
        debug!(kind = %kind, reference = %reference, "Fetching bundle");
        match kind {
            BundleKind::Secret => {
                let api: Api<Secret> = Api::namespaced(self.client.clone(), &reference.namespace);
                let secret = api
                    .get_opt(&reference.name)
                    .await?
                    .ok_or_else(|| StoreError::NotFound {
                        kind: "Secret",
                        name: reference.to_string(),
                    })?;
                Ok(secret
                    .data
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(key, value)| (key, value.0))
                    .collect())
            }
            BundleKind::ConfigMap => {
                let api: Api<ConfigMap> =
                    Api::namespaced(self.client.clone(), &reference.namespace);
                let config_map =
                    api.get_opt(&reference.name)
                        .await?
                        .ok_or_else(|| StoreError::NotFound {
                            kind: "ConfigMap",
                            name: reference.to_string(),
                        })?;
                let text = config_map
                    .data
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(key, value)| (key, value.into_bytes()));
                let binary = config_map
                    .binary_data
                    .unwrap_or_default()
                    .into_iter()
                    .map(|(key, value)| (key, value.0));
                Ok(text.chain(binary).collect())
            }
        }
    }
}

#[async_trait]
impl RepositoryCatalog for KubeStore {
    async fn list_repositories_referencing(
        &self,
        config_name: &str,
    ) -> Result<Vec<GithubSyncRepo>, StoreError> {
        let api: Api<GithubSyncRepo> = Api::all(self.client.clone());
        let mut repositories: Vec<GithubSyncRepo> = api
            .list(&ListParams::default())
            .await?
            .items
            .into_iter()
            .filter(|repo| repo.references(config_name))
            .collect();
        repositories.sort_by_key(|repo| repo.name_any());
        Ok(repositories)
    }

    async fn get_repository(&self, name: &str) -> Result<Option<GithubSyncRepo>, StoreError> {
        let api: Api<GithubSyncRepo> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }

    async fn get_sync_config(
        &self,
        name: &str,
    ) -> Result<Option<GithubActionSecretsSync>, StoreError> {
        let api: Api<GithubActionSecretsSync> = Api::all(self.client.clone());
        Ok(api.get_opt(name).await?)
    }
}

#[async_trait]
impl StatusStore for KubeStore {
    async fn persist_repository_status(
        &self,
        name: &str,
        status: &GithubSyncRepoStatus,
    ) -> Result<(), StoreError> {
        let api: Api<GithubSyncRepo> = Api::all(self.client.clone());
        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &status_apply_patch::<GithubSyncRepo, _>(status),
        )
        .await?;
        Ok(())
    }

    async fn persist_sync_config_status(
        &self,
        name: &str,
        status: &GithubActionSecretsSyncStatus,
    ) -> Result<(), StoreError> {
        let api: Api<GithubActionSecretsSync> = Api::all(self.client.clone());
        api.patch_status(
            name,
            &PatchParams::apply(FIELD_MANAGER).force(),
            &status_apply_patch::<GithubActionSecretsSync, _>(status),
        )
        .await?;
        Ok(())
    }
}

/// Server-side apply body carrying only `status`
fn status_apply_patch<K, S>(status: &S) -> Patch<Value>
where
    K: Resource<DynamicType = ()>,
    S: Serialize,
{
    Patch::Apply(json!({
        "apiVersion": K::api_version(&()),
        "kind": K::kind(&()),
        "status": status,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::{PropertySyncPhase, PropertySyncRecord};

    #[test]
    fn test_status_patch_is_a_full_apply_document() {
        let mut status = GithubSyncRepoStatus::default();
        status.secrets_sync_states.insert(
            "TOKEN".to_string(),
            PropertySyncRecord {
                phase: PropertySyncPhase::Synced,
                fingerprint: Some(7),
                message: None,
                last_transition_time: None,
            },
        );

        let Patch::Apply(body) = status_apply_patch::<GithubSyncRepo, _>(&status) else {
            panic!("status must be written with server-side apply");
        };
        assert_eq!(body["apiVersion"], "qalisa.github.io/v1alpha1");
        assert_eq!(body["kind"], "GithubSyncRepo");
        let records = body["status"]["secretsSyncStates"].as_object().unwrap();
        assert_eq!(records.keys().collect::<Vec<_>>(), vec!["TOKEN"]);
    }
}
