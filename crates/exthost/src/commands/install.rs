//! Package install, uninstall and update commands.
//!
//! Input is validated by the core installer before the package manager runs.

use anyhow::{Context, Result};
use colored::Colorize;
use exthost_core::{CommandOutput, HostConfig, Installer};

pub async fn install(spec: &str, config: &HostConfig) -> Result<()> {
    let installer = installer(config)?;
    let output = installer
        .install(spec)
        .await
        .with_context(|| format!("Failed to install '{}'", spec))?;

    report(&output);
    println!("{} Installed {}", "✓".green(), spec.trim().cyan());
    Ok(())
}

pub async fn uninstall(name: &str, config: &HostConfig) -> Result<()> {
    let installer = installer(config)?;
    let output = installer
        .uninstall(name)
        .await
        .with_context(|| format!("Failed to uninstall '{}'", name))?;

    report(&output);
    println!("{} Uninstalled {}", "✓".green(), name.cyan());
    Ok(())
}

pub async fn update(name: &str, config: &HostConfig) -> Result<()> {
    let installer = installer(config)?;
    let output = installer
        .update(name)
        .await
        .with_context(|| format!("Failed to update '{}'", name))?;

    report(&output);
    println!("{} Updated {}", "✓".green(), name.cyan());
    Ok(())
}

fn installer(config: &HostConfig) -> Result<Installer> {
    let installer_config = config.installer_config();
    std::fs::create_dir_all(&installer_config.extensions_dir).with_context(|| {
        format!(
            "Failed to create extensions directory {}",
            installer_config.extensions_dir.display()
        )
    })?;
    Ok(Installer::new(installer_config))
}

fn report(output: &CommandOutput) {
    let stdout = output.stdout.trim();
    if !stdout.is_empty() {
        println!("{}", stdout.dimmed());
    }
}
