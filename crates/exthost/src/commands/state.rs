//! Extension state commands.

use anyhow::{Context, Result};
use colored::Colorize;
use exthost_core::{ExtensionIdentity, HostConfig, StateStore};

use super::{display_value, parse_value};
use crate::cli::{StateAction, StateCommand};

/// Execute state command.
pub async fn execute(cmd: StateCommand, config: &HostConfig) -> Result<()> {
    let identity = ExtensionIdentity::untrusted(&cmd.extension).context("Invalid extension id")?;
    let store = config.store_factory().state(&identity);

    match cmd.action {
        StateAction::List { json } => list(&store, &cmd.extension, json).await,
        StateAction::Get { key } => get(&store, &key).await,
        StateAction::Set { key, value } => set(&store, &key, &value).await,
        StateAction::Delete { key } => delete(&store, &key).await,
    }
}

async fn list(store: &StateStore, extension: &str, json: bool) -> Result<()> {
    let entries = store.entries().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if entries.is_empty() {
        println!("{}", format!("No state stored for {}.", extension).yellow());
        return Ok(());
    }

    println!("{}", format!("State for {}", extension).bold());
    println!("{}", "═".repeat(60));
    for (key, value) in &entries {
        println!("  {} = {}", key.cyan(), display_value(value));
    }
    Ok(())
}

async fn get(store: &StateStore, key: &str) -> Result<()> {
    match store.get(key).await {
        Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        None => println!("{}", "Not set.".yellow()),
    }
    Ok(())
}

async fn set(store: &StateStore, key: &str, raw: &str) -> Result<()> {
    store.set(key, parse_value(raw)).await;
    store.flush().await.context("Failed to save state")?;
    println!("{} Set {}", "✓".green(), key.cyan());
    Ok(())
}

async fn delete(store: &StateStore, key: &str) -> Result<()> {
    if !store.delete(key).await {
        println!("{} {} was not set", "!".yellow(), key.cyan());
        return Ok(());
    }
    store.flush().await.context("Failed to save state")?;
    println!("{} Deleted {}", "✓".green(), key.cyan());
    Ok(())
}
