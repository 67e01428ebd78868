//! # Cluster Store
//!
//! The narrow interfaces the synchronization core needs from the cluster:
//! reading Secret/ConfigMap bundles, finding repository declarations and
//! writing status back. `KubeStore` implements them on top of `kube::Api`;
//! tests substitute in-memory fakes.

mod kubernetes;

pub use kubernetes::KubeStore;

use crate::crd::{
    GithubActionSecretsSync, GithubActionSecretsSyncStatus, GithubSyncRepo, GithubSyncRepoStatus,
    ResourceRef,
};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

/// Key/value content of a Secret or ConfigMap
pub type KeyedBundle = BTreeMap<String, Vec<u8>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BundleKind {
    Secret,
    ConfigMap,
}

impl fmt::Display for BundleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BundleKind::Secret => "secret",
            BundleKind::ConfigMap => "config map",
        })
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} '{name}' not found")]
    NotFound { kind: &'static str, name: String },
    #[error("Kubernetes API request failed: {0}")]
    Api(#[from] kube::Error),
    #[error("backing store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

#[async_trait]
pub trait BundleSource: Send + Sync {
    /// Fetch a Secret or ConfigMap as raw bytes per key.
    ///
    /// Fails with [`StoreError::NotFound`] when the object does not exist.
    async fn fetch_bundle(
        &self,
        kind: BundleKind,
        reference: &ResourceRef,
    ) -> Result<KeyedBundle, StoreError>;
}

#[async_trait]
pub trait RepositoryCatalog: Send + Sync {
    /// Repository declarations listing `config_name` in `secretsSyncRefs`, ordered by name.
    async fn list_repositories_referencing(
        &self,
        config_name: &str,
    ) -> Result<Vec<GithubSyncRepo>, StoreError>;

    /// `Ok(None)` when the declaration no longer exists.
    async fn get_repository(&self, name: &str) -> Result<Option<GithubSyncRepo>, StoreError>;

    /// `Ok(None)` when the configuration no longer exists.
    async fn get_sync_config(
        &self,
        name: &str,
    ) -> Result<Option<GithubActionSecretsSync>, StoreError>;
}

#[async_trait]
pub trait StatusStore: Send + Sync {
    async fn persist_repository_status(
        &self,
        name: &str,
        status: &GithubSyncRepoStatus,
    ) -> Result<(), StoreError>;

    async fn persist_sync_config_status(
        &self,
        name: &str,
        status: &GithubActionSecretsSyncStatus,
    ) -> Result<(), StoreError>;
}

/// Everything the reconciler needs from the cluster
pub trait ClusterStore: BundleSource + RepositoryCatalog + StatusStore {}

impl<T: BundleSource + RepositoryCatalog + StatusStore> ClusterStore for T {}
