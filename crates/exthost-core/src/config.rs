//! Host configuration.
//!
//! Loaded with precedence:
//! 1. `$EXTHOST_CONFIG` (explicit config file)
//! 2. `<data_dir>/config.toml`, where `data_dir` is `$EXTHOST_DIR` or `~/.exthost`
//! 3. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::installer::InstallerConfig;
use crate::lifecycle::LifecycleConfig;
use crate::services::{HostServices, SecretProvider};
use crate::store::StoreFactory;

/// Host configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostConfig {
    /// Root of the persisted extension stores
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Working directory exposed to trusted extensions (defaults to the process cwd)
    #[serde(default)]
    pub working_dir: Option<PathBuf>,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub lifecycle: LifecycleSettings,

    #[serde(default)]
    pub installer: InstallerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Write debounce window in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleSettings {
    #[serde(default = "default_activate_timeout_ms")]
    pub activate_timeout_ms: u64,

    #[serde(default = "default_deactivate_timeout_ms")]
    pub deactivate_timeout_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallerSettings {
    /// Package manager program
    #[serde(default = "default_installer_program")]
    pub program: String,

    /// Directory packages are installed into (defaults to `<data_dir>/extensions`)
    #[serde(default)]
    pub extensions_dir: Option<PathBuf>,

    #[serde(default = "default_installer_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_data_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os("EXTHOST_DIR").filter(|d| !d.is_empty()) {
        return PathBuf::from(dir);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".exthost")
}

fn default_debounce_ms() -> u64 {
    500
}

fn default_activate_timeout_ms() -> u64 {
    30_000
}

fn default_deactivate_timeout_ms() -> u64 {
    5_000
}

fn default_installer_program() -> String {
    "npm".to_string()
}

fn default_installer_timeout_secs() -> u64 {
    300 // 5 minutes
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
        }
    }
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            activate_timeout_ms: default_activate_timeout_ms(),
            deactivate_timeout_ms: default_deactivate_timeout_ms(),
        }
    }
}

impl Default for InstallerSettings {
    fn default() -> Self {
        Self {
            program: default_installer_program(),
            extensions_dir: None,
            timeout_secs: default_installer_timeout_secs(),
        }
    }
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            working_dir: None,
            store: StoreConfig::default(),
            lifecycle: LifecycleSettings::default(),
            installer: InstallerSettings::default(),
        }
    }
}

impl HostConfig {
    /// Create a config rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            ..Default::default()
        }
    }

    /// Load from the default location, falling back to defaults when no file exists
    pub fn load() -> Result<Self, ConfigValidationError> {
        Self::load_from(&Self::config_path())
    }

    /// Load from a specific file, falling back to defaults when it does not exist
    pub fn load_from(path: &Path) -> Result<Self, ConfigValidationError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigValidationError::Read {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigValidationError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        match std::env::var_os("EXTHOST_CONFIG").filter(|p| !p.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_data_dir().join("config.toml"),
        }
    }

    /// Set the working directory exposed to trusted extensions
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(working_dir.into());
        self
    }

    /// Set the store debounce window
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.store.debounce_ms = debounce.as_millis() as u64;
        self
    }

    /// Set lifecycle timeouts
    pub fn with_lifecycle(mut self, lifecycle: LifecycleSettings) -> Self {
        self.lifecycle = lifecycle;
        self
    }

    /// Set installer configuration
    pub fn with_installer(mut self, installer: InstallerSettings) -> Self {
        self.installer = installer;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "data_dir".into(),
                message: "must not be empty".into(),
            });
        }

        if self.lifecycle.activate_timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "lifecycle.activate_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.lifecycle.deactivate_timeout_ms == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "lifecycle.deactivate_timeout_ms".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.installer.program.trim().is_empty() {
            return Err(ConfigValidationError::InvalidValue {
                field: "installer.program".into(),
                message: "must not be empty".into(),
            });
        }

        if self.installer.timeout_secs == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "installer.timeout_secs".into(),
                message: "must be greater than 0".into(),
            });
        }

        Ok(())
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.store.debounce_ms)
    }

    pub fn store_factory(&self) -> StoreFactory {
        StoreFactory::new(&self.data_dir, self.debounce())
    }

    pub fn lifecycle_config(&self) -> LifecycleConfig {
        LifecycleConfig {
            activate_timeout: Duration::from_millis(self.lifecycle.activate_timeout_ms),
            deactivate_timeout: Duration::from_millis(self.lifecycle.deactivate_timeout_ms),
        }
    }

    pub fn installer_config(&self) -> InstallerConfig {
        InstallerConfig {
            program: self.installer.program.clone(),
            extensions_dir: self
                .installer
                .extensions_dir
                .clone()
                .unwrap_or_else(|| self.data_dir.join("extensions")),
            timeout: Duration::from_secs(self.installer.timeout_secs),
        }
    }

    /// Services handed to trusted extensions
    pub fn host_services(&self, secrets: Arc<dyn SecretProvider>) -> HostServices {
        let working_dir = self
            .working_dir
            .clone()
            .or_else(|| std::env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        HostServices::new(working_dir, secrets)
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("failed to read {}: {message}", path.display())]
    Read { path: PathBuf, message: String },

    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = HostConfig::new("/data");
        assert_eq!(config.store.debounce_ms, 500);
        assert_eq!(config.debounce(), Duration::from_millis(500));
        assert_eq!(config.lifecycle.deactivate_timeout_ms, 5_000);
        assert_eq!(config.installer.program, "npm");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
data_dir = "/srv/exthost"

[store]
debounce_ms = 100

[installer]
program = "pnpm"
"#,
        )
        .unwrap();

        let config = HostConfig::load_from(&path).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/srv/exthost"));
        assert_eq!(config.store.debounce_ms, 100);
        assert_eq!(config.installer.program, "pnpm");
        assert_eq!(config.installer.timeout_secs, 300);
        assert_eq!(config.lifecycle.activate_timeout_ms, 30_000);
        assert_eq!(
            config.installer_config().extensions_dir,
            PathBuf::from("/srv/exthost/extensions")
        );
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp = tempdir().unwrap();
        let config = HostConfig::load_from(&temp.path().join("absent.toml")).unwrap();
        assert_eq!(config.store.debounce_ms, 500);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("config.toml");

        std::fs::write(&path, "[lifecycle]\ndeactivate_timeout_ms = 0\n").unwrap();
        let err = HostConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigValidationError::InvalidValue { ref field, .. } if field == "lifecycle.deactivate_timeout_ms"));

        std::fs::write(&path, "store = [").unwrap();
        assert!(matches!(
            HostConfig::load_from(&path).unwrap_err(),
            ConfigValidationError::Parse { .. }
        ));
    }

    #[test]
    fn test_builders() {
        let config = HostConfig::new("/data")
            .with_working_dir("/work")
            .with_debounce(Duration::from_millis(20));

        assert_eq!(config.store_factory().root(), Path::new("/data"));
        let services = config.host_services(Arc::new(crate::services::StaticSecrets::new()));
        assert_eq!(services.working_dir, PathBuf::from("/work"));
        assert_eq!(config.lifecycle_config().deactivate_timeout, Duration::from_secs(5));
    }
}
