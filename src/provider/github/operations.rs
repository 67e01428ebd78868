//! # Operations
//!
//! [`ActionsApi`] for [`GithubClient`]. Each operation is retried as a whole,
//! so a variable's PATCH and fallback POST are never split across attempts.

use super::requests::{PutSecretRequest, VariableRequest};
use super::seal::seal_secret;
use super::{repository_path, GithubClient};
use crate::provider::{ActionsApi, ApiError};
use crate::sync::TargetRepository;
use async_trait::async_trait;
use reqwest::Method;
use tracing::{debug, info_span, Instrument};

#[async_trait]
impl ActionsApi for GithubClient {
    async fn upsert_secret(
        &self,
        repository: &TargetRepository,
        name: &str,
        value: &[u8],
    ) -> Result<(), ApiError> {
        let span = info_span!(
            "github.secret.upsert",
            repository = %repository,
            secret.name = name
        );
        let path = repository_path(repository, &format!("secrets/{name}"));
        let path = path.as_str();

        self.retry
            .run("upsert_secret", move || async move {
                let key = self.public_key(repository).await?;
                let encrypted_value = seal_secret(value, &key.key)?;
                let body = serde_json::to_value(PutSecretRequest {
                    encrypted_value: &encrypted_value,
                    key_id: &key.key_id,
                })?;
                match self.send(Method::PUT, path, Some(body)).await {
                    Ok(_) => Ok(()),
                    Err(error) => {
                        // The key may have been rotated since it was cached
                        self.forget_public_key(repository);
                        Err(error)
                    }
                }
            })
            .instrument(span)
            .await
    }

    async fn upsert_variable(
        &self,
        repository: &TargetRepository,
        name: &str,
        value: &str,
    ) -> Result<(), ApiError> {
        let span = info_span!(
            "github.variable.upsert",
            repository = %repository,
            variable.name = name
        );
        let body = serde_json::to_value(VariableRequest { name, value })?;
        let item_path = repository_path(repository, &format!("variables/{name}"));
        let collection_path = repository_path(repository, "variables");
        let (body, item_path, collection_path) =
            (&body, item_path.as_str(), collection_path.as_str());

        self.retry
            .run("upsert_variable", move || async move {
                match self.send(Method::PATCH, item_path, Some(body.clone())).await {
                    Ok(_) => Ok(()),
                    Err(error) if error.is_not_found() => {
                        debug!(variable = name, "Variable does not exist yet, creating it");
                        self.send(Method::POST, collection_path, Some(body.clone()))
                            .await
                            .map(|_| ())
                    }
                    Err(error) => Err(error),
                }
            })
            .instrument(span)
            .await
    }

    async fn delete_secret(
        &self,
        repository: &TargetRepository,
        name: &str,
    ) -> Result<(), ApiError> {
        let span = info_span!(
            "github.secret.delete",
            repository = %repository,
            secret.name = name
        );
        let path = repository_path(repository, &format!("secrets/{name}"));
        self.delete_idempotent("delete_secret", &path)
            .instrument(span)
            .await
    }

    async fn delete_variable(
        &self,
        repository: &TargetRepository,
        name: &str,
    ) -> Result<(), ApiError> {
        let span = info_span!(
            "github.variable.delete",
            repository = %repository,
            variable.name = name
        );
        let path = repository_path(repository, &format!("variables/{name}"));
        self.delete_idempotent("delete_variable", &path)
            .instrument(span)
            .await
    }

    fn begin_pass(&self) {
        self.clear_public_keys();
    }
}

impl GithubClient {
    async fn delete_idempotent(&self, operation: &'static str, path: &str) -> Result<(), ApiError> {
        self.retry
            .run(operation, move || async move {
                match self.send(Method::DELETE, path, None).await {
                    Ok(_) => Ok(()),
                    Err(error) if error.is_not_found() => {
                        debug!(path, "Already absent on GitHub");
                        Ok(())
                    }
                    Err(error) => Err(error),
                }
            })
            .await
    }
}
