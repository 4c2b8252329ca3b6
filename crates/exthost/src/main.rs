//! exthost - Extension host operator CLI
//!
//! Installs extension packages and inspects the settings and state the host
//! persists for each extension.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod cli;
mod commands;

use cli::{Cli, Commands};
use exthost_core::HostConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(
            EnvFilter::from_default_env()
                .add_directive("exthost=info".parse()?)
                .add_directive("exthost_core=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Load configuration
    let mut config = HostConfig::load().context("Failed to load configuration")?;
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    tracing::debug!("Using data directory {}", config.data_dir.display());

    // Execute command
    match cli.command {
        Commands::Install { spec } => commands::install::install(&spec, &config).await,
        Commands::Uninstall { name } => commands::install::uninstall(&name, &config).await,
        Commands::Update { name } => commands::install::update(&name, &config).await,
        Commands::Settings(cmd) => commands::settings::execute(cmd, &config).await,
        Commands::State(cmd) => commands::state::execute(cmd, &config).await,
        Commands::CheckKey { key, json } => commands::keys::check_key(&key, json),
        Commands::Config { json } => commands::config::show(&config, json),
        Commands::Version => {
            println!("exthost {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
