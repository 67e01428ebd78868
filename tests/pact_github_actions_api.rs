//! Pact contract tests for the GitHub Actions secrets and variables API
//!
//! These tests define the contract between the controller and the GitHub REST
//! API. `GithubClient` is pointed at a Pact mock server so the requests it
//! actually builds are checked against the contract.

mod common;

use github_actions_sync_controller::prelude::*;
use pact_consumer::prelude::*;
use pact_consumer::{json_pattern, like};
use serde_json::json;
use std::time::Duration;
use zeroize::Zeroizing;

const CONSUMER: &str = "GitHub-Actions-Sync-Controller";
const PROVIDER: &str = "GitHub-Actions-API";
const TOKEN: &str = "ghp_contract_test_token";

/// Base64 of a valid 32-byte X25519 public key
const PUBLIC_KEY: &str = "AQIDBAUGBwgJCgsMDQ4PEBESExQVFhcYGRobHB0eHyA=";
const KEY_ID: &str = "568250167242549743";

fn client_for(mock_url: &str) -> GithubClient {
    common::init_rustls();
    GithubClient::new(
        mock_url,
        GithubCredentials::Token(Zeroizing::new(TOKEN.to_string())),
        RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(10),
            max_rate_limit_wait: Duration::from_secs(60),
        },
        Duration::from_secs(5),
    )
    .expect("Failed to build GitHub client")
}

fn widgets() -> TargetRepository {
    TargetRepository::parse("acme/widgets").unwrap()
}

#[tokio::test]
async fn test_github_upsert_secret_contract() {
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder
        .interaction("fetch the repository public key", "", |mut i| {
            i.given("repository acme/widgets exists");
            i.request
                .method("GET")
                .path("/repos/acme/widgets/actions/secrets/public-key")
                .header("authorization", format!("Bearer {TOKEN}"))
                .header("x-github-api-version", "2022-11-28");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "key_id": KEY_ID,
                    "key": PUBLIC_KEY
                }));
            i
        })
        .interaction("create or update a repository secret", "", |mut i| {
            i.given("repository acme/widgets exists");
            i.request
                .method("PUT")
                .path("/repos/acme/widgets/actions/secrets/TOKEN")
                .header("authorization", format!("Bearer {TOKEN}"))
                .header("content-type", "application/json")
                .json_body(json_pattern!({
                    "encrypted_value": like!("c2VhbGVkLWJveC1jaXBoZXJ0ZXh0"),
                    "key_id": KEY_ID
                }));
            i.response.status(201);
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    client
        .upsert_secret(&widgets(), "TOKEN", b"abc")
        .await
        .expect("Failed to upsert secret");
}

#[tokio::test]
async fn test_github_public_key_cached_within_pass() {
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder
        .interaction("fetch the repository public key once", "", |mut i| {
            i.given("repository acme/widgets exists");
            i.request
                .method("GET")
                .path("/repos/acme/widgets/actions/secrets/public-key");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "key_id": KEY_ID,
                    "key": PUBLIC_KEY
                }));
            i
        })
        .interaction("update the first secret", "", |mut i| {
            i.given("secret A exists");
            i.request
                .method("PUT")
                .path("/repos/acme/widgets/actions/secrets/A");
            i.response.status(204);
            i
        })
        .interaction("update the second secret", "", |mut i| {
            i.given("secret B exists");
            i.request
                .method("PUT")
                .path("/repos/acme/widgets/actions/secrets/B");
            i.response.status(204);
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    client.begin_pass();
    client
        .upsert_secret(&widgets(), "A", b"1")
        .await
        .expect("Failed to upsert secret A");
    client
        .upsert_secret(&widgets(), "B", b"2")
        .await
        .expect("Failed to upsert secret B");
}

#[tokio::test]
async fn test_github_update_variable_contract() {
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("update an existing repository variable", "", |mut i| {
        i.given("variable REGION exists");
        i.request
            .method("PATCH")
            .path("/repos/acme/widgets/actions/variables/REGION")
            .header("authorization", format!("Bearer {TOKEN}"))
            .json_body(json!({
                "name": "REGION",
                "value": "us-east-1"
            }));
        i.response.status(204);
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    client
        .upsert_variable(&widgets(), "REGION", "us-east-1")
        .await
        .expect("Failed to update variable");
}

#[tokio::test]
async fn test_github_create_variable_after_not_found_contract() {
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder
        .interaction("update a missing repository variable", "", |mut i| {
            i.given("variable REGION does not exist");
            i.request
                .method("PATCH")
                .path("/repos/acme/widgets/actions/variables/REGION")
                .json_body(json!({
                    "name": "REGION",
                    "value": "us-east-1"
                }));
            i.response
                .status(404)
                .header("content-type", "application/json")
                .json_body(json!({
                    "message": "Not Found",
                    "documentation_url": "https://docs.github.com/rest/actions/variables#update-a-repository-variable"
                }));
            i
        })
        .interaction("create a repository variable", "", |mut i| {
            i.given("variable REGION does not exist");
            i.request
                .method("POST")
                .path("/repos/acme/widgets/actions/variables")
                .json_body(json!({
                    "name": "REGION",
                    "value": "us-east-1"
                }));
            i.response.status(201);
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    client
        .upsert_variable(&widgets(), "REGION", "us-east-1")
        .await
        .expect("Failed to create variable");
}

#[tokio::test]
async fn test_github_delete_secret_contract() {
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("delete a repository secret", "", |mut i| {
        i.given("secret TOKEN exists");
        i.request
            .method("DELETE")
            .path("/repos/acme/widgets/actions/secrets/TOKEN");
        i.response.status(204);
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    client
        .delete_secret(&widgets(), "TOKEN")
        .await
        .expect("Failed to delete secret");
}

#[tokio::test]
async fn test_github_delete_missing_variable_is_success() {
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("delete a missing repository variable", "", |mut i| {
        i.given("variable REGION does not exist");
        i.request
            .method("DELETE")
            .path("/repos/acme/widgets/actions/variables/REGION");
        i.response
            .status(404)
            .header("content-type", "application/json")
            .json_body(json!({ "message": "Not Found" }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    client
        .delete_variable(&widgets(), "REGION")
        .await
        .expect("Deleting an absent variable should succeed");
}

#[tokio::test]
async fn test_github_validation_error_is_permanent() {
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("create a variable with an invalid name", "", |mut i| {
        i.given("repository acme/widgets exists");
        i.request
            .method("PATCH")
            .path("/repos/acme/widgets/actions/variables/GITHUB_REGION");
        i.response
            .status(422)
            .header("content-type", "application/json")
            .json_body(json!({
                "message": "Variable names must not start with GITHUB_"
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let error = client
        .upsert_variable(&widgets(), "GITHUB_REGION", "us-east-1")
        .await
        .expect_err("Validation errors must surface");

    match error {
        ApiError::Status { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "Variable names must not start with GITHUB_");
        }
        other => panic!("expected an HTTP status error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_github_rate_limit_beyond_wait_surfaces() {
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("delete a secret while rate limited", "", |mut i| {
        i.given("the primary rate limit is exhausted");
        i.request
            .method("DELETE")
            .path("/repos/acme/widgets/actions/secrets/TOKEN");
        i.response
            .status(403)
            .header("x-ratelimit-remaining", "0")
            .header("x-ratelimit-reset", "4102444800")
            .header("content-type", "application/json")
            .json_body(json!({ "message": "API rate limit exceeded" }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let error = client
        .delete_secret(&widgets(), "TOKEN")
        .await
        .expect_err("A reset beyond the wait limit must surface");

    assert!(matches!(
        error,
        ApiError::RateLimited {
            status: 403,
            reset_at: Some(_),
            ..
        }
    ));
}
