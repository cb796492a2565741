use std::path::{Path, PathBuf};

use anyhow::Context;
use plexus_core::WorkerConfig;

use super::cli::CliArgs;

/// Environment variable naming a config file when `--config` is absent.
pub(crate) const CONFIG_ENV: &str = "PLEXUS_CONFIG";

/// File config (if any), then CLI overrides, then validation.
pub(crate) fn load(args: &CliArgs) -> anyhow::Result<WorkerConfig> {
    let path = args
        .config
        .clone()
        .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));
    let mut config = match path {
        Some(path) => read_config(&path)?,
        None => WorkerConfig::default(),
    };
    apply_overrides(&mut config, args);
    config.validate().context("invalid worker configuration")?;
    Ok(config)
}

fn read_config(path: &Path) -> anyhow::Result<WorkerConfig> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read config '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Failed to parse config '{}'", path.display()))
}

fn apply_overrides(config: &mut WorkerConfig, args: &CliArgs) {
    if let Some(ms) = args.min_delay {
        config.min_delay_ms = ms;
    }
    if let Some(ms) = args.max_delay {
        config.max_delay_ms = ms;
    }
    if let Some(level) = args.warning_level {
        config.warning_level = level;
    }
}
