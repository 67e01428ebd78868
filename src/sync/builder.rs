//! # Sync Buffer Builder
//!
//! Reads the Secrets and ConfigMaps referenced by configurations and fills a
//! [`SyncBuffer`]. Each referenced object is fetched once per build, however
//! many keys are taken from it. A single missing object or key aborts the
//! whole build; no partially filled buffer is ever returned.

use super::buffer::{PropertyKind, PropertyValue, SourceIdentity, SyncBuffer};
use crate::crd::{GithubActionSecretsSync, ResourceRef};
use crate::store::{BundleKind, BundleSource, KeyedBundle, StoreError};
use kube::ResourceExt;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BufferBuildError {
    #[error("failed to get {kind} '{reference}': not found")]
    MissingBundle { kind: BundleKind, reference: String },
    #[error("key {key} not found in {kind} {reference}")]
    MissingKey {
        kind: BundleKind,
        key: String,
        reference: String,
    },
    #[error("failed to get {kind} '{reference}': {source}")]
    Store {
        kind: BundleKind,
        reference: String,
        #[source]
        source: StoreError,
    },
}

impl BufferBuildError {
    /// Backing-store failures, as opposed to missing objects or keys.
    pub fn is_transient(&self) -> bool {
        matches!(self, BufferBuildError::Store { .. })
    }
}

/// Build one buffer from every configuration in `configs`.
pub async fn build_sync_buffer<S>(
    source: &S,
    configs: &[GithubActionSecretsSync],
) -> Result<SyncBuffer, BufferBuildError>
where
    S: BundleSource + ?Sized,
{
    let mut bundles = BundleCache::new(source);
    let mut buffer = SyncBuffer::new();
    for config in configs {
        fill_from_config(&mut bundles, config, &mut buffer).await?;
        info!(
            config = %config.name_any(),
            properties = config.property_count(),
            "Sync buffer filled from configuration"
        );
    }
    Ok(buffer)
}

async fn fill_from_config<S>(
    bundles: &mut BundleCache<'_, S>,
    config: &GithubActionSecretsSync,
    buffer: &mut SyncBuffer,
) -> Result<(), BufferBuildError>
where
    S: BundleSource + ?Sized,
{
    let identity = SourceIdentity::of(config);

    for secret in &config.spec.secrets {
        let raw = bundles
            .key(BundleKind::Secret, &secret.secret_ref, &secret.key)
            .await?;
        let name = effective_name(secret.github_secret_name.as_deref(), &secret.key);
        debug!(config = %identity, secret = name, "Buffered secret");
        buffer.insert(
            PropertyKind::Secret,
            identity.clone(),
            name,
            PropertyValue::new(raw),
        );
    }

    for variable in &config.spec.variables {
        let raw = bundles
            .key(BundleKind::ConfigMap, &variable.config_map_ref, &variable.key)
            .await?;
        let name = effective_name(variable.github_variable_name.as_deref(), &variable.key);
        debug!(config = %identity, variable = name, "Buffered variable");
        buffer.insert(
            PropertyKind::Variable,
            identity.clone(),
            name,
            PropertyValue::new(raw),
        );
    }

    Ok(())
}

/// Bundles fetched so far in one build, by kind and `namespace/name`
struct BundleCache<'s, S: ?Sized> {
    source: &'s S,
    fetched: HashMap<(BundleKind, String), KeyedBundle>,
}

impl<'s, S> BundleCache<'s, S>
where
    S: BundleSource + ?Sized,
{
    fn new(source: &'s S) -> Self {
        Self {
            source,
            fetched: HashMap::new(),
        }
    }

    async fn key(
        &mut self,
        kind: BundleKind,
        reference: &ResourceRef,
        key: &str,
    ) -> Result<Vec<u8>, BufferBuildError> {
        let cache_key = (kind, reference.to_string());
        if !self.fetched.contains_key(&cache_key) {
            let bundle = self
                .source
                .fetch_bundle(kind, reference)
                .await
                .map_err(|source| match source {
                    StoreError::NotFound { .. } => BufferBuildError::MissingBundle {
                        kind,
                        reference: reference.to_string(),
                    },
                    other => BufferBuildError::Store {
                        kind,
                        reference: reference.to_string(),
                        source: other,
                    },
                })?;
            self.fetched.insert(cache_key.clone(), bundle);
        }

        self.fetched
            .get(&cache_key)
            .and_then(|bundle| bundle.get(key))
            .cloned()
            .ok_or_else(|| BufferBuildError::MissingKey {
                kind,
                key: key.to_string(),
                reference: reference.to_string(),
            })
    }
}

/// GitHub name for a property: the explicit override, else the source key.
fn effective_name<'a>(explicit: Option<&'a str>, key: &'a str) -> &'a str {
    explicit.filter(|name| !name.is_empty()).unwrap_or(key)
}
