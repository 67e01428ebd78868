//! # Resource Specs
//!
//! Both resources are cluster-scoped. A `GithubActionSecretsSync` names the
//! Secret and ConfigMap keys to publish; a `GithubSyncRepo` names one target
//! repository and the configurations it consumes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// GithubActionSecretsSync Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: qalisa.github.io/v1alpha1
/// kind: GithubActionSecretsSync
/// metadata:
///   name: deploy-credentials
/// spec:
///   secrets:
///     - secretRef:
///         name: registry
///         namespace: ci
///       key: TOKEN
///       githubSecretName: REGISTRY_TOKEN
///   variables:
///     - configMapRef:
///         name: cloud
///         namespace: ci
///       key: REGION
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GithubActionSecretsSync",
    group = "qalisa.github.io",
    version = "v1alpha1",
    status = "crate::crd::GithubActionSecretsSyncStatus",
    shortname = "gass",
    printcolumn = r#"{"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"Last Sync", "type":"string", "jsonPath":".status.lastSyncTime"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GithubActionSecretsSyncSpec {
    /// Secret keys published as GitHub Actions secrets
    #[serde(default)]
    pub secrets: Vec<SecretRef>,
    /// ConfigMap keys published as GitHub Actions variables
    #[serde(default)]
    pub variables: Vec<VariableRef>,
}

/// GithubSyncRepo Custom Resource Definition
///
/// # Example
///
/// ```yaml
/// apiVersion: qalisa.github.io/v1alpha1
/// kind: GithubSyncRepo
/// metadata:
///   name: widgets
/// spec:
///   repository: acme/widgets
///   secretsSyncRefs:
///     - deploy-credentials
/// ```
#[derive(kube::CustomResource, Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[kube(
    kind = "GithubSyncRepo",
    group = "qalisa.github.io",
    version = "v1alpha1",
    plural = "githubsyncrepoes",
    status = "crate::crd::GithubSyncRepoStatus",
    shortname = "gsr",
    printcolumn = r#"{"name":"Repository", "type":"string", "jsonPath":".spec.repository"}, {"name":"Synced", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].status"}, {"name":"Message", "type":"string", "jsonPath":".status.conditions[?(@.type==\"Synced\")].message"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct GithubSyncRepoSpec {
    /// Target repository in `owner/name` form
    pub repository: String,
    /// Names of the `GithubActionSecretsSync` resources published to this repository
    #[serde(default)]
    pub secrets_sync_refs: Vec<String>,
}

impl GithubSyncRepo {
    /// Whether this repository consumes the named configuration
    pub fn references(&self, config_name: &str) -> bool {
        self.spec.secrets_sync_refs.iter().any(|r| r == config_name)
    }
}

impl GithubActionSecretsSync {
    /// Number of properties this configuration declares
    pub fn property_count(&self) -> usize {
        self.spec.secrets.len() + self.spec.variables.len()
    }
}

/// Reference to a namespaced Secret or ConfigMap
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRef {
    pub name: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    "default".to_string()
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// One Secret key published as a GitHub Actions secret
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SecretRef {
    pub secret_ref: ResourceRef,
    pub key: String,
    /// Remote name; defaults to `key`
    #[serde(default)]
    pub github_secret_name: Option<String>,
}

/// One ConfigMap key published as a GitHub Actions variable
#[derive(Debug, Clone, Deserialize, Serialize, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VariableRef {
    pub config_map_ref: ResourceRef,
    pub key: String,
    /// Remote name; defaults to `key`
    #[serde(default)]
    pub github_variable_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    #[test]
    fn test_sync_config_deserializes_from_camel_case() {
        let spec: GithubActionSecretsSyncSpec = serde_json::from_value(serde_json::json!({
            "secrets": [{
                "secretRef": {"name": "registry", "namespace": "ci"},
                "key": "TOKEN",
                "githubSecretName": "REGISTRY_TOKEN"
            }],
            "variables": [{
                "configMapRef": {"name": "cloud"},
                "key": "REGION"
            }]
        }))
        .unwrap();

        assert_eq!(spec.secrets[0].secret_ref.to_string(), "ci/registry");
        assert_eq!(
            spec.secrets[0].github_secret_name.as_deref(),
            Some("REGISTRY_TOKEN")
        );
        assert_eq!(spec.variables[0].config_map_ref.namespace, "default");
        assert!(spec.variables[0].github_variable_name.is_none());
    }

    #[test]
    fn test_repo_references() {
        let repo = GithubSyncRepo::new(
            "widgets",
            GithubSyncRepoSpec {
                repository: "acme/widgets".to_string(),
                secrets_sync_refs: vec!["deploy".to_string()],
            },
        );
        assert!(repo.references("deploy"));
        assert!(!repo.references("other"));
    }

    #[test]
    fn test_crds_are_cluster_scoped() {
        assert_eq!(GithubActionSecretsSync::crd().spec.scope, "Cluster");
        let repo_crd = GithubSyncRepo::crd();
        assert_eq!(repo_crd.spec.scope, "Cluster");
        assert_eq!(repo_crd.spec.names.plural, "githubsyncrepoes");
    }
}
