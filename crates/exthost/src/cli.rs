//! CLI argument definitions using clap derive macros.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Extension host CLI
///
/// Install extensions and inspect their persisted settings and state.
#[derive(Parser, Debug)]
#[command(name = "exthost")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Override the data directory
    #[arg(long, global = true, env = "EXTHOST_DIR")]
    pub data_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Install an extension package (name, name@version, or URL)
    Install {
        /// Package specification
        spec: String,
    },

    /// Uninstall an extension by name
    Uninstall {
        /// Extension name
        name: String,
    },

    /// Update an extension by name
    Update {
        /// Extension name
        name: String,
    },

    /// Extension settings (list, get, set, unset, reset)
    Settings(SettingsCommand),

    /// Extension state (list, get, set, delete)
    State(StateCommand),

    /// Check whether a setting key is treated as sensitive
    CheckKey {
        /// Setting key
        key: String,

        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the effective configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(short, long)]
        json: bool,
    },

    /// Show version
    Version,
}

// ─────────────────────────────────────────────────────────────────────────────
// Settings Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct SettingsCommand {
    /// Extension id
    pub extension: String,

    #[command(subcommand)]
    pub action: SettingsAction,
}

#[derive(Subcommand, Debug)]
pub enum SettingsAction {
    /// List stored settings
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Resolve one setting (stored value, then environment for sensitive keys)
    Get {
        key: String,
    },

    /// Store a setting. The value is parsed as JSON, falling back to a string.
    Set {
        key: String,
        value: String,
    },

    /// Remove a stored setting
    Unset {
        key: String,
    },

    /// Remove every stored setting
    Reset,
}

// ─────────────────────────────────────────────────────────────────────────────
// State Commands
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct StateCommand {
    /// Extension id
    pub extension: String,

    #[command(subcommand)]
    pub action: StateAction,
}

#[derive(Subcommand, Debug)]
pub enum StateAction {
    /// List stored state
    List {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Print one value
    Get {
        key: String,
    },

    /// Store a value. The value is parsed as JSON, falling back to a string.
    Set {
        key: String,
        value: String,
    },

    /// Delete a value
    Delete {
        key: String,
    },
}
