//! # Provider Modules
//!
//! The remote side of the synchronization: GitHub Actions secrets and
//! variables. The engine talks to [`ActionsApi`]; [`github::GithubClient`] is
//! the production implementation.

use crate::sync::TargetRepository;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

pub mod github;

/// Create-or-update and delete operations for repository-level Actions properties
#[async_trait]
pub trait ActionsApi: Send + Sync {
    /// Encrypt `value` under the repository public key and upsert the secret.
    async fn upsert_secret(
        &self,
        repository: &TargetRepository,
        name: &str,
        value: &[u8],
    ) -> Result<(), ApiError>;

    /// Update the variable, creating it when it does not exist yet.
    async fn upsert_variable(
        &self,
        repository: &TargetRepository,
        name: &str,
        value: &str,
    ) -> Result<(), ApiError>;

    /// Delete a secret. Deleting a missing secret succeeds.
    async fn delete_secret(&self, repository: &TargetRepository, name: &str)
        -> Result<(), ApiError>;

    /// Delete a variable. Deleting a missing variable succeeds.
    async fn delete_variable(
        &self,
        repository: &TargetRepository,
        name: &str,
    ) -> Result<(), ApiError>;

    /// Called once at the start of every synchronization pass.
    fn begin_pass(&self) {}
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("GitHub API returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("GitHub API rate limit exceeded (HTTP {status}): {message}")]
    RateLimited {
        status: u16,
        /// When the limit resets, if GitHub told us
        reset_at: Option<DateTime<Utc>>,
        message: String,
    },
    #[error("GitHub API request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("GitHub authentication failed: {0}")]
    Auth(String),
    #[error("invalid repository public key: {0}")]
    PublicKey(String),
    #[error("failed to encrypt secret value: {0}")]
    Encryption(String),
    #[error("variable value is not valid UTF-8: {0}")]
    InvalidVariableValue(#[from] std::str::Utf8Error),
    #[error("failed to encode request body: {0}")]
    Encode(#[from] serde_json::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } | ApiError::RateLimited { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }

    pub fn is_server_error(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status >= 500)
    }
}
