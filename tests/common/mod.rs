//! Common test utilities
//!
//! In-memory stand-ins for the cluster and the GitHub API, plus builders for
//! the custom resources.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use github_actions_sync_controller::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, Once};
use tokio_util::sync::CancellationToken;

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        // The pact mock server may already have installed a process-wide provider
        if rustls::crypto::CryptoProvider::get_default().is_none() {
            rustls::crypto::ring::default_provider()
                .install_default()
                .expect("Failed to install rustls crypto provider");
        }
    });
}

pub fn secret_ref(namespace: &str, name: &str, key: &str, github_name: Option<&str>) -> SecretRef {
    SecretRef {
        secret_ref: ResourceRef {
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        key: key.to_string(),
        github_secret_name: github_name.map(ToString::to_string),
    }
}

pub fn variable_ref(
    namespace: &str,
    name: &str,
    key: &str,
    github_name: Option<&str>,
) -> VariableRef {
    VariableRef {
        config_map_ref: ResourceRef {
            name: name.to_string(),
            namespace: namespace.to_string(),
        },
        key: key.to_string(),
        github_variable_name: github_name.map(ToString::to_string),
    }
}

pub fn sync_config(
    name: &str,
    secrets: Vec<SecretRef>,
    variables: Vec<VariableRef>,
) -> GithubActionSecretsSync {
    let mut config = GithubActionSecretsSync::new(
        name,
        GithubActionSecretsSyncSpec { secrets, variables },
    );
    config.metadata.generation = Some(1);
    config
}

pub fn sync_repo(name: &str, repository: &str, refs: &[&str]) -> GithubSyncRepo {
    let mut repo = GithubSyncRepo::new(
        name,
        GithubSyncRepoSpec {
            repository: repository.to_string(),
            secrets_sync_refs: refs.iter().map(ToString::to_string).collect(),
        },
    );
    repo.metadata.generation = Some(1);
    repo
}

pub fn test_config(lock_policy: LockPolicy) -> ControllerConfig {
    ControllerConfig {
        lock_policy,
        ..ControllerConfig::default()
    }
}

#[derive(Default)]
struct ClusterState {
    secrets: HashMap<(String, String), KeyedBundle>,
    config_maps: HashMap<(String, String), KeyedBundle>,
    sync_configs: BTreeMap<String, GithubActionSecretsSync>,
    repositories: BTreeMap<String, GithubSyncRepo>,
    repository_status_writes: Vec<String>,
    config_status_writes: Vec<String>,
    unavailable: bool,
}

/// In-memory cluster. Status writes land on the stored resources, as the
/// status subresource would.
#[derive(Default)]
pub struct InMemoryCluster {
    state: Mutex<ClusterState>,
}

fn bundle(entries: &[(&str, &[u8])]) -> KeyedBundle {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_string(), value.to_vec()))
        .collect()
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_secret(&self, namespace: &str, name: &str, entries: &[(&str, &[u8])]) {
        self.state
            .lock()
            .unwrap()
            .secrets
            .insert((namespace.to_string(), name.to_string()), bundle(entries));
    }

    pub fn add_config_map(&self, namespace: &str, name: &str, entries: &[(&str, &[u8])]) {
        self.state
            .lock()
            .unwrap()
            .config_maps
            .insert((namespace.to_string(), name.to_string()), bundle(entries));
    }

    pub fn add_sync_config(&self, config: GithubActionSecretsSync) {
        let name = config.metadata.name.clone().unwrap();
        self.state.lock().unwrap().sync_configs.insert(name, config);
    }

    pub fn add_repository(&self, repository: GithubSyncRepo) {
        let name = repository.metadata.name.clone().unwrap();
        self.state
            .lock()
            .unwrap()
            .repositories
            .insert(name, repository);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    pub fn repository(&self, name: &str) -> GithubSyncRepo {
        self.state.lock().unwrap().repositories[name].clone()
    }

    /// Every stored repository, ordered by name
    pub fn repositories(&self) -> Vec<GithubSyncRepo> {
        self.state
            .lock()
            .unwrap()
            .repositories
            .values()
            .cloned()
            .collect()
    }

    pub fn repository_status(&self, name: &str) -> GithubSyncRepoStatus {
        self.repository(name).status.unwrap_or_default()
    }

    pub fn sync_config_status(&self, name: &str) -> GithubActionSecretsSyncStatus {
        self.state.lock().unwrap().sync_configs[name]
            .status
            .clone()
            .unwrap_or_default()
    }

    pub fn repository_status_writes(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .repository_status_writes
            .iter()
            .filter(|n| *n == name)
            .count()
    }

    pub fn sync_config_status_writes(&self, name: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .config_status_writes
            .iter()
            .filter(|n| *n == name)
            .count()
    }

    fn check_available(state: &ClusterState) -> Result<(), StoreError> {
        if state.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl BundleSource for InMemoryCluster {
    async fn fetch_bundle(
        &self,
        kind: BundleKind,
        reference: &ResourceRef,
    ) -> Result<KeyedBundle, StoreError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        let key = (reference.namespace.clone(), reference.name.clone());
        let bundles = match kind {
            BundleKind::Secret => &state.secrets,
            BundleKind::ConfigMap => &state.config_maps,
        };
        bundles.get(&key).cloned().ok_or_else(|| StoreError::NotFound {
            kind: match kind {
                BundleKind::Secret => "Secret",
                BundleKind::ConfigMap => "ConfigMap",
            },
            name: reference.to_string(),
        })
    }
}

#[async_trait]
impl RepositoryCatalog for InMemoryCluster {
    async fn list_repositories_referencing(
        &self,
        config_name: &str,
    ) -> Result<Vec<GithubSyncRepo>, StoreError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state
            .repositories
            .values()
            .filter(|r| r.references(config_name))
            .cloned()
            .collect())
    }

    async fn get_repository(&self, name: &str) -> Result<Option<GithubSyncRepo>, StoreError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state.repositories.get(name).cloned())
    }

    async fn get_sync_config(
        &self,
        name: &str,
    ) -> Result<Option<GithubActionSecretsSync>, StoreError> {
        let state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        Ok(state.sync_configs.get(name).cloned())
    }
}

#[async_trait]
impl StatusStore for InMemoryCluster {
    async fn persist_repository_status(
        &self,
        name: &str,
        status: &GithubSyncRepoStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        state.repository_status_writes.push(name.to_string());
        if let Some(repository) = state.repositories.get_mut(name) {
            repository.status = Some(status.clone());
        }
        Ok(())
    }

    async fn persist_sync_config_status(
        &self,
        name: &str,
        status: &GithubActionSecretsSyncStatus,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        Self::check_available(&state)?;
        state.config_status_writes.push(name.to_string());
        if let Some(config) = state.sync_configs.get_mut(name) {
            config.status = Some(status.clone());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    UpsertSecret {
        repository: String,
        name: String,
        value: Vec<u8>,
    },
    UpsertVariable {
        repository: String,
        name: String,
        value: String,
    },
    DeleteSecret {
        repository: String,
        name: String,
    },
    DeleteVariable {
        repository: String,
        name: String,
    },
}

impl ApiCall {
    pub fn repository(&self) -> &str {
        match self {
            ApiCall::UpsertSecret { repository, .. }
            | ApiCall::UpsertVariable { repository, .. }
            | ApiCall::DeleteSecret { repository, .. }
            | ApiCall::DeleteVariable { repository, .. } => repository,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ApiCall::UpsertSecret { name, .. }
            | ApiCall::UpsertVariable { name, .. }
            | ApiCall::DeleteSecret { name, .. }
            | ApiCall::DeleteVariable { name, .. } => name,
        }
    }
}

/// Records every call; fails or cancels on demand, keyed by property name.
#[derive(Default)]
pub struct RecordingApi {
    calls: Mutex<Vec<ApiCall>>,
    failures: Mutex<HashMap<String, (u16, String)>>,
    cancel_on: Mutex<Option<(String, CancellationToken)>>,
    passes: AtomicUsize,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer calls for `name` with an HTTP error from now on.
    pub fn fail(&self, name: &str, status: u16, message: &str) {
        self.failures
            .lock()
            .unwrap()
            .insert(name.to_string(), (status, message.to_string()));
    }

    pub fn heal(&self, name: &str) {
        self.failures.lock().unwrap().remove(name);
    }

    /// Cancel `token` while handling the call for `name`; the call itself succeeds.
    pub fn cancel_on(&self, name: &str, token: CancellationToken) {
        *self.cancel_on.lock().unwrap() = Some((name.to_string(), token));
    }

    pub fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn take_calls(&self) -> Vec<ApiCall> {
        std::mem::take(&mut *self.calls.lock().unwrap())
    }

    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    fn handle(&self, call: ApiCall) -> Result<(), ApiError> {
        let name = call.name().to_string();
        self.calls.lock().unwrap().push(call);

        if let Some((target, token)) = self.cancel_on.lock().unwrap().as_ref() {
            if *target == name {
                token.cancel();
            }
        }

        match self.failures.lock().unwrap().get(&name) {
            Some((status, message)) => Err(ApiError::Status {
                status: *status,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl ActionsApi for RecordingApi {
    async fn upsert_secret(
        &self,
        repository: &TargetRepository,
        name: &str,
        value: &[u8],
    ) -> Result<(), ApiError> {
        self.handle(ApiCall::UpsertSecret {
            repository: repository.to_string(),
            name: name.to_string(),
            value: value.to_vec(),
        })
    }

    async fn upsert_variable(
        &self,
        repository: &TargetRepository,
        name: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        self.handle(ApiCall::UpsertVariable {
            repository: repository.to_string(),
            name: name.to_string(),
            value: value.to_string(),
        })
    }

    async fn delete_secret(
        &self,
        repository: &TargetRepository,
        name: &str,
    ) -> Result<(), ApiError> {
        self.handle(ApiCall::DeleteSecret {
            repository: repository.to_string(),
            name: name.to_string(),
        })
    }

    async fn delete_variable(
        &self,
        repository: &TargetRepository,
        name: &str,
    ) -> Result<(), ApiError> {
        self.handle(ApiCall::DeleteVariable {
            repository: repository.to_string(),
            name: name.to_string(),
        })
    }

    fn begin_pass(&self) {
        self.passes.fetch_add(1, Ordering::SeqCst);
    }
}
