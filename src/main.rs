//! # GitHub Actions Sync Controller
//!
//! Kubernetes controller that publishes Secret and ConfigMap keys as GitHub
//! Actions secrets and variables.
//!
//! Controller settings come from environment variables (see
//! [`ControllerConfig::from_env`]); GitHub credentials come from the flags
//! below, each with an environment fallback.

use anyhow::Result;
use clap::Parser;
use github_actions_sync_controller::config::{resolve_credentials, ControllerConfig};
use github_actions_sync_controller::runtime::initialization::initialize;
use github_actions_sync_controller::runtime::watch_loop::run_watch_loop;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "github-actions-sync-controller", version, about, long_about = None)]
struct Args {
    /// GitHub App ID
    #[arg(long, env = "GITHUB_APP_ID")]
    github_app_id: Option<u64>,

    /// GitHub App installation ID
    #[arg(long, env = "GITHUB_INSTALLATION_ID")]
    github_installation_id: Option<u64>,

    /// Path to the GitHub App private key (PEM)
    #[arg(long, env = "GITHUB_PRIVATE_KEY_PATH")]
    github_private_key_path: Option<PathBuf>,

    /// Personal access or fine-grained token, used when no App credentials are given
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    github_token: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = ControllerConfig::from_env();

    let credentials = resolve_credentials(
        args.github_token,
        args.github_app_id,
        args.github_installation_id,
        args.github_private_key_path.as_deref(),
    )?;

    let init = initialize(config, credentials).await?;
    run_watch_loop(init.client, init.reconciler, init.server_state).await
}
