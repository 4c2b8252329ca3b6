//! Extension settings commands.
//!
//! Sensitive keys are rejected by the settings store; the error names the
//! environment variable to use instead.

use anyhow::{Context, Result};
use colored::Colorize;
use exthost_core::sensitive::{env_var_name, is_sensitive};
use exthost_core::{EnvSecrets, ExtensionIdentity, HostConfig, SettingsStore};
use std::sync::Arc;

use super::{display_value, parse_value};
use crate::cli::{SettingsAction, SettingsCommand};

/// Execute settings command.
pub async fn execute(cmd: SettingsCommand, config: &HostConfig) -> Result<()> {
    let store = open(&cmd.extension, config)?;

    match cmd.action {
        SettingsAction::List { json } => list(&store, &cmd.extension, json).await,
        SettingsAction::Get { key } => get(&store, &key).await,
        SettingsAction::Set { key, value } => set(&store, &key, &value).await,
        SettingsAction::Unset { key } => unset(&store, &key).await,
        SettingsAction::Reset => reset(&store, &cmd.extension).await,
    }
}

fn open(extension: &str, config: &HostConfig) -> Result<SettingsStore> {
    // Trust does not affect where settings live
    let identity = ExtensionIdentity::untrusted(extension).context("Invalid extension id")?;
    Ok(config
        .store_factory()
        .settings(&identity, None, Arc::new(EnvSecrets)))
}

async fn list(store: &SettingsStore, extension: &str, json: bool) -> Result<()> {
    let entries = store.get_all().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", format!("No settings stored for {}.", extension).yellow());
        return Ok(());
    }

    println!("{}", format!("Settings for {}", extension).bold());
    println!("{}", "═".repeat(60));
    for (key, value) in &entries {
        println!("  {} = {}", key.cyan(), display_value(value));
    }
    Ok(())
}

async fn get(store: &SettingsStore, key: &str) -> Result<()> {
    // Secrets resolved from the environment are never echoed
    if is_sensitive(key) && !store.has(key).await {
        let env_var = env_var_name(key);
        match store.get(key, None).await {
            Some(_) => println!("{} (set via {})", "********".dimmed(), env_var.cyan()),
            None => println!(
                "{} Not set. Provide it via the {} environment variable.",
                "!".yellow(),
                env_var.cyan()
            ),
        }
        return Ok(());
    }

    match store.get(key, None).await {
        Some(value) => println!("{}", display_value(&value)),
        None => println!("{}", "Not set.".yellow()),
    }
    Ok(())
}

async fn set(store: &SettingsStore, key: &str, raw: &str) -> Result<()> {
    store.set(key, parse_value(raw)).await?;
    store.flush().await.context("Failed to save settings")?;
    println!("{} Set {}", "✓".green(), key.cyan());
    Ok(())
}

async fn unset(store: &SettingsStore, key: &str) -> Result<()> {
    if !store.delete(key).await {
        println!("{} {} was not set", "!".yellow(), key.cyan());
        return Ok(());
    }
    store.flush().await.context("Failed to save settings")?;
    println!("{} Removed {}", "✓".green(), key.cyan());
    Ok(())
}

async fn reset(store: &SettingsStore, extension: &str) -> Result<()> {
    store.reset().await.context("Failed to reset settings")?;
    println!("{} Reset settings for {}", "✓".green(), extension.cyan());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn command(action: SettingsAction) -> SettingsCommand {
        SettingsCommand {
            extension: "weather".to_string(),
            action,
        }
    }

    #[tokio::test]
    async fn test_set_persists_and_rejects_secrets() {
        let temp = tempdir().unwrap();
        let config = HostConfig::new(temp.path());

        execute(
            command(SettingsAction::Set {
                key: "units".into(),
                value: "metric".into(),
            }),
            &config,
        )
        .await
        .unwrap();

        let err = execute(
            command(SettingsAction::Set {
                key: "apiKey".into(),
                value: "abc".into(),
            }),
            &config,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("API_KEY"));

        let store = open("weather", &config).unwrap();
        assert_eq!(store.get("units", None).await, Some(json!("metric")));
        assert!(!store.has("apiKey").await);
    }

    #[tokio::test]
    async fn test_rejects_traversal_id() {
        let temp = tempdir().unwrap();
        let config = HostConfig::new(temp.path());
        tokio_test::assert_err!(open("../etc", &config));
        tokio_test::assert_ok!(open("weather", &config));
    }
}
