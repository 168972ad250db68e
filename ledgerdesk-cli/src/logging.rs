use anyhow::{Result, anyhow};
use std::io::stderr;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// `RUST_LOG` wins over the configured level.
fn build_filter(level: &str) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level).map_err(|e| anyhow!("invalid log level '{level}': {e}")),
    }
}

pub fn setup_logging(level: &str, json: bool) -> Result<()> {
    // stdout carries command output (JSON/CSV), so logs go to stderr
    let filter = build_filter(level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let installed = if json {
        registry
            .with(fmt::layer().json().with_target(false).with_writer(stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(stderr))
            .try_init()
    };
    installed.map_err(|e| anyhow!("logging already initialised: {e}"))
}
