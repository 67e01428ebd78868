//! GitHub Actions REST Client
//!
//! Repository-level secrets and variables over the GitHub REST API, using
//! reqwest with rustls.
//!
//! References:
//! - [Actions secrets](https://docs.github.com/en/rest/actions/secrets)
//! - [Actions variables](https://docs.github.com/en/rest/actions/variables)

mod auth;
mod operations;
mod requests;
mod responses;
mod retry;
mod seal;

pub use auth::GithubCredentials;
pub use requests::*;
pub use responses::*;
pub use retry::RetryPolicy;
pub use seal::{decode_public_key, seal_secret};

use crate::config::ControllerConfig;
use crate::constants::GITHUB_API_VERSION;
use crate::observability::metrics;
use crate::provider::ApiError;
use crate::sync::TargetRepository;
use auth::TokenProvider;
use chrono::Utc;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const USER_AGENT: &str = concat!("github-actions-sync-controller/", env!("CARGO_PKG_VERSION"));

/// GitHub Actions REST client
pub struct GithubClient {
    http_client: Client,
    base_url: String,
    auth: TokenProvider,
    retry: RetryPolicy,
    /// Repository public keys, valid for the current pass only
    public_keys: Mutex<HashMap<String, RepositoryPublicKey>>,
}

impl std::fmt::Debug for GithubClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GithubClient")
            .field("base_url", &self.base_url)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl GithubClient {
    /// Create a client against `base_url` (`https://api.github.com` or a GHES `/api/v3` root).
    pub fn new(
        base_url: impl Into<String>,
        credentials: GithubCredentials,
        retry: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http_client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(request_timeout)
            .build()?;

        info!(base_url = %base_url, credentials = ?credentials, "Initializing GitHub client");

        Ok(Self {
            http_client,
            base_url,
            auth: TokenProvider::new(credentials),
            retry,
            public_keys: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_config(
        config: &ControllerConfig,
        credentials: GithubCredentials,
    ) -> Result<Self, ApiError> {
        Self::new(
            config.github_api_url.clone(),
            credentials,
            RetryPolicy::from(config),
            config.github_request_timeout(),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one authenticated request. Non-2xx responses become [`ApiError`]s.
    pub(crate) async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<reqwest::Response, ApiError> {
        let token = self
            .auth
            .bearer_token(&self.http_client, &self.base_url)
            .await?;

        let mut request = self
            .http_client
            .request(method.clone(), format!("{}{path}", self.base_url))
            .bearer_auth(token.as_str())
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION);
        if let Some(body) = body {
            request = request.json(&body);
        }

        let start = Instant::now();
        let response = match request.send().await {
            Ok(response) => response,
            Err(error) => {
                metrics::record_github_request(
                    method.as_str(),
                    "error",
                    start.elapsed().as_secs_f64(),
                );
                return Err(error.into());
            }
        };
        let status = response.status();
        metrics::record_github_request(
            method.as_str(),
            status.as_str(),
            start.elapsed().as_secs_f64(),
        );
        debug!(method = %method, path, status = status.as_u16(), "GitHub API request");

        if status.is_success() {
            Ok(response)
        } else {
            Err(error_from_response(response).await)
        }
    }

    /// Public key used to seal secrets for `repository`, cached for the pass.
    pub(crate) async fn public_key(
        &self,
        repository: &TargetRepository,
    ) -> Result<RepositoryPublicKey, ApiError> {
        let cache_key = repository.to_string();
        if let Some(key) = self.cached_public_key(&cache_key) {
            return Ok(key);
        }

        let key: RepositoryPublicKey = self
            .send(
                Method::GET,
                &repository_path(repository, "secrets/public-key"),
                None,
            )
            .await?
            .json()
            .await?;
        debug!(repository = %repository, key_id = %key.key_id, "Fetched repository public key");

        if let Ok(mut keys) = self.public_keys.lock() {
            keys.insert(cache_key, key.clone());
        }
        Ok(key)
    }

    fn cached_public_key(&self, cache_key: &str) -> Option<RepositoryPublicKey> {
        self.public_keys.lock().ok()?.get(cache_key).cloned()
    }

    pub(crate) fn forget_public_key(&self, repository: &TargetRepository) {
        if let Ok(mut keys) = self.public_keys.lock() {
            keys.remove(&repository.to_string());
        }
    }

    pub(crate) fn clear_public_keys(&self) {
        if let Ok(mut keys) = self.public_keys.lock() {
            keys.clear();
        }
    }
}

/// `/repos/{owner}/{repo}/actions/{suffix}`
pub(crate) fn repository_path(repository: &TargetRepository, suffix: &str) -> String {
    format!(
        "/repos/{}/{}/actions/{suffix}",
        repository.organization, repository.name
    )
}

/// Turn a non-2xx response into an [`ApiError`], detecting rate limiting.
pub(crate) async fn error_from_response(response: reqwest::Response) -> ApiError {
    let status = response.status().as_u16();
    let rate_limit = retry::rate_limit_reset(status, response.headers(), Utc::now());
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<GithubErrorResponse>(&body)
        .map(|error| error.message)
        .unwrap_or(body);

    match rate_limit {
        Some(reset_at) => ApiError::RateLimited {
            status,
            reset_at,
            message,
        },
        None => ApiError::Status { status, message },
    }
}
