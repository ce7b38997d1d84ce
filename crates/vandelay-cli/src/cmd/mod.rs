pub mod command;
pub mod init;
pub mod plan;
pub mod validate;

use anyhow::Context;
use std::path::Path;
use vandelay_core::config::Config;

/// Load the config at `path` and overlay the process environment.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let mut config = Config::load(path)
        .with_context(|| format!("failed to load config from {}", path.display()))?;
    config.apply_env(|key| std::env::var(key).ok());
    tracing::debug!(path = %path.display(), mode = %config.mode, "config loaded");
    Ok(config)
}
