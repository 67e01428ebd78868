//! # GitHub Credentials
//!
//! Picks the authentication mode from the flags passed to the binary.
//! GitHub App credentials win over a static token when both are supplied.

use crate::provider::github::GithubCredentials;
use anyhow::{bail, Context, Result};
use std::path::Path;
use zeroize::Zeroizing;

/// Resolve GitHub credentials.
///
/// App mode requires all three of `app_id`, `installation_id` and
/// `private_key_path`; supplying only some of them is an error rather than a
/// silent fallback to the token.
pub fn resolve_credentials(
    token: Option<String>,
    app_id: Option<u64>,
    installation_id: Option<u64>,
    private_key_path: Option<&Path>,
) -> Result<GithubCredentials> {
    match (app_id, installation_id, private_key_path) {
        (Some(app_id), Some(installation_id), Some(path)) => {
            let private_key = std::fs::read(path).with_context(|| {
                format!("failed to read GitHub App private key from {}", path.display())
            })?;
            Ok(GithubCredentials::App {
                app_id,
                installation_id,
                private_key: Zeroizing::new(private_key),
            })
        }
        (None, None, None) => match token.filter(|t| !t.trim().is_empty()) {
            Some(token) => Ok(GithubCredentials::Token(Zeroizing::new(token))),
            None => bail!(
                "no GitHub credentials configured: set --github-token or the GitHub App flags"
            ),
        },
        _ => bail!(
            "incomplete GitHub App credentials: --github-app-id, --github-installation-id and --github-private-key-path are all required"
        ),
    }
}
