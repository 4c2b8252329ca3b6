//! Host Services
//!
//! Long-lived internal services. Only trusted extensions receive a
//! `HostServices` handle; the untrusted host surface has no field for it.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Source of secret values that must never be persisted
pub trait SecretProvider: Send + Sync {
    /// Look up a secret by environment-style name (e.g. `SERPER_API_KEY`)
    fn get_secret(&self, name: &str) -> Option<String>;
}

/// Reads secrets from the process environment
#[derive(Debug, Default, Clone, Copy)]
pub struct EnvSecrets;

impl SecretProvider for EnvSecrets {
    fn get_secret(&self, name: &str) -> Option<String> {
        std::env::var(name).ok().filter(|v| !v.is_empty())
    }
}

/// Fixed in-memory secrets
#[derive(Debug, Default, Clone)]
pub struct StaticSecrets {
    values: HashMap<String, String>,
}

impl StaticSecrets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }
}

impl SecretProvider for StaticSecrets {
    fn get_secret(&self, name: &str) -> Option<String> {
        self.values.get(name).cloned()
    }
}

/// Internal services exposed to trusted extensions
#[derive(Clone)]
pub struct HostServices {
    /// Host working directory
    pub working_dir: PathBuf,
    /// Shared secrets manager
    pub secrets: Arc<dyn SecretProvider>,
}

impl HostServices {
    pub fn new(working_dir: impl Into<PathBuf>, secrets: Arc<dyn SecretProvider>) -> Self {
        Self {
            working_dir: working_dir.into(),
            secrets,
        }
    }
}

impl std::fmt::Debug for HostServices {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostServices")
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}
