//! # Logging
//!
//! `tracing-subscriber` setup. `RUST_LOG` takes precedence over `LOG_LEVEL`;
//! `LOG_FORMAT=json` switches to one JSON object per line.

use crate::config::ControllerConfig;
use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

fn env_filter(config: &ControllerConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = config.log_level.to_lowercase();
        EnvFilter::new(format!(
            "github_actions_sync_controller={level},kube_runtime=warn,{level}"
        ))
    })
}

/// Install the global subscriber.
pub fn init_tracing(config: &ControllerConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(env_filter(config));

    let installed = if config.log_format.eq_ignore_ascii_case("json") {
        builder
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .try_init()
    } else {
        builder.with_ansi(config.log_enable_color).try_init()
    };

    installed.map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))
}
