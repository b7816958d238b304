//! Utility functions for CLI commands.

use imgsim_cli::{load_config, Config};

use crate::Cli;

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    let cfg = load_config(cli.config.as_deref())?;
    match cfg.path() {
        Some(p) => tracing::debug!(path = %p.display(), "loaded config"),
        None => tracing::debug!("no config file, using defaults"),
    }
    Ok(cfg)
}

/// Prints a value as pretty JSON.
pub fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
