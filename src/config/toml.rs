//! TOML launch file parsing

use super::*;
use crate::config::cli::Cli;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

/// Parse TOML launch file
pub fn parse_toml_file(path: &Path) -> Result<LaunchFile> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_toml_string(&contents)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse TOML launch configuration from string
pub fn parse_toml_string(contents: &str) -> Result<LaunchFile> {
    let file: LaunchFile = ::toml::from_str(contents)
        .context("Failed to parse TOML configuration")?;

    Ok(file)
}

/// Merge CLI arguments with a launch file (CLI takes precedence)
pub fn merge_cli_with_config(cli: &Cli, file: Option<LaunchFile>) -> LaunchConfig {
    let mut config = file.map(|f| f.launch).unwrap_or_default();

    if let Some(np) = cli.np {
        config.np = np;
    }
    if let Some(base_port) = cli.base_port {
        config.base_port = base_port;
    }
    if let Some(port_range) = cli.port_range {
        config.port_range = port_range;
    }
    if let Some(timeout) = cli.connect_timeout_ms {
        config.connect_timeout_ms = timeout;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    config
}
