//! Effective configuration display.

use anyhow::{Context, Result};
use colored::Colorize;
use exthost_core::HostConfig;

pub fn show(config: &HostConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    let path = HostConfig::config_path();
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "defaults".to_string()
    };
    println!("{} {}", "# source:".dimmed(), source.dimmed());

    let rendered = toml::to_string_pretty(config).context("Failed to serialize config")?;
    print!("{}", rendered);
    Ok(())
}
