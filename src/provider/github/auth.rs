//! # GitHub Authentication
//!
//! Static tokens are used as-is. GitHub App credentials sign a short-lived
//! RS256 JWT, exchange it for an installation token and cache that token until
//! shortly before it expires.

use super::requests::AppClaims;
use super::responses::InstallationTokenResponse;
use crate::constants::GITHUB_API_VERSION;
use crate::provider::ApiError;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::header::ACCEPT;
use tokio::sync::Mutex;
use tracing::{debug, info};
use zeroize::Zeroizing;

/// Installation tokens are refreshed this many seconds before GitHub expires them
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

pub enum GithubCredentials {
    /// Personal access token or fine-grained token
    Token(Zeroizing<String>),
    /// GitHub App installation
    App {
        app_id: u64,
        installation_id: u64,
        /// PEM encoded RSA private key
        private_key: Zeroizing<Vec<u8>>,
    },
}

impl std::fmt::Debug for GithubCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GithubCredentials::Token(_) => f.debug_tuple("Token").field(&"***").finish(),
            GithubCredentials::App {
                app_id,
                installation_id,
                ..
            } => f
                .debug_struct("App")
                .field("app_id", app_id)
                .field("installation_id", installation_id)
                .field("private_key", &"***")
                .finish(),
        }
    }
}

struct CachedToken {
    token: Zeroizing<String>,
    expires_at: DateTime<Utc>,
}

pub(crate) struct TokenProvider {
    credentials: GithubCredentials,
    installation_token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for TokenProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenProvider")
            .field("credentials", &self.credentials)
            .finish_non_exhaustive()
    }
}

impl TokenProvider {
    pub(crate) fn new(credentials: GithubCredentials) -> Self {
        Self {
            credentials,
            installation_token: Mutex::new(None),
        }
    }

    /// Token for the `Authorization: Bearer` header.
    pub(crate) async fn bearer_token(
        &self,
        http: &reqwest::Client,
        base_url: &str,
    ) -> Result<Zeroizing<String>, ApiError> {
        let (app_id, installation_id, private_key) = match &self.credentials {
            GithubCredentials::Token(token) => return Ok(token.clone()),
            GithubCredentials::App {
                app_id,
                installation_id,
                private_key,
            } => (*app_id, *installation_id, private_key),
        };

        let mut cached = self.installation_token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at - Duration::seconds(TOKEN_REFRESH_MARGIN_SECS) > Utc::now() {
                return Ok(token.token.clone());
            }
            debug!("GitHub installation token is about to expire, refreshing");
        }

        let jwt = app_jwt(app_id, private_key, Utc::now())?;
        let url = format!(
            "{}/app/installations/{installation_id}/access_tokens",
            base_url.trim_end_matches('/')
        );
        let response = http
            .post(url)
            .bearer_auth(jwt.as_str())
            .header(ACCEPT, "application/vnd.github+json")
            .header("X-GitHub-Api-Version", GITHUB_API_VERSION)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(super::error_from_response(response).await);
        }
        let body: InstallationTokenResponse = response.json().await?;
        info!(
            installation_id,
            expires_at = %body.expires_at,
            "Obtained GitHub App installation token"
        );

        let token = Zeroizing::new(body.token);
        *cached = Some(CachedToken {
            token: token.clone(),
            expires_at: body.expires_at,
        });
        Ok(token)
    }
}

/// Sign the App JWT. `iat` is backdated a minute to absorb clock drift and
/// `exp` stays under GitHub's ten minute limit.
pub(crate) fn app_jwt(
    app_id: u64,
    private_key_pem: &[u8],
    now: DateTime<Utc>,
) -> Result<Zeroizing<String>, ApiError> {
    let key = EncodingKey::from_rsa_pem(private_key_pem)
        .map_err(|e| ApiError::Auth(format!("invalid GitHub App private key: {e}")))?;
    let claims = AppClaims {
        iat: (now - Duration::seconds(60)).timestamp(),
        exp: (now + Duration::minutes(9)).timestamp(),
        iss: app_id.to_string(),
    };
    jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
        .map(Zeroizing::new)
        .map_err(|e| ApiError::Auth(format!("failed to sign GitHub App JWT: {e}")))
}
