//! # Request Types
//!
//! JSON bodies sent to the GitHub REST API.
//!
//! - [Actions secrets](https://docs.github.com/en/rest/actions/secrets)
//! - [Actions variables](https://docs.github.com/en/rest/actions/variables)

use serde::Serialize;

/// Body of `PUT /repos/{owner}/{repo}/actions/secrets/{secret_name}`
#[derive(Debug, Serialize)]
pub struct PutSecretRequest<'a> {
    /// Base64 sealed box of the secret value
    pub encrypted_value: &'a str,
    /// Identifier of the public key the value was sealed with
    pub key_id: &'a str,
}

/// Body of both `PATCH .../actions/variables/{name}` and `POST .../actions/variables`
#[derive(Debug, Serialize)]
pub struct VariableRequest<'a> {
    pub name: &'a str,
    pub value: &'a str,
}

/// Claims of the JWT a GitHub App signs to request installation tokens
#[derive(Debug, Serialize)]
pub struct AppClaims {
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}
