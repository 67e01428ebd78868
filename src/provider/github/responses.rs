//! # Response Types
//!
//! JSON bodies returned by the GitHub REST API.

use chrono::{DateTime, Utc};
use serde::Deserialize;

/// `GET /repos/{owner}/{repo}/actions/secrets/public-key`
#[derive(Debug, Clone, Deserialize)]
pub struct RepositoryPublicKey {
    pub key_id: String,
    /// Base64 of the 32-byte X25519 public key
    pub key: String,
}

/// `POST /app/installations/{installation_id}/access_tokens`
#[derive(Debug, Deserialize)]
pub struct InstallationTokenResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Error body shared by all endpoints
#[derive(Debug, Deserialize)]
pub struct GithubErrorResponse {
    pub message: String,
    #[serde(default)]
    pub documentation_url: Option<String>,
}
