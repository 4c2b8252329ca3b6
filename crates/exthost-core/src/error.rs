//! Host Error Types
//!
//! Every denial the host makes names the offending key, tool, or input.

use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigValidationError;
use crate::installer::ValidationRule;

/// Result type alias using the host Error
pub type Result<T> = std::result::Result<T, Error>;

/// Host errors
#[derive(Debug, Error)]
pub enum Error {
    /// Installer input rejected before any subprocess ran
    #[error("invalid install request ({rule}): {message}")]
    Validation { rule: ValidationRule, message: String },

    /// Extension name or id would escape its directory
    #[error("path traversal rejected in extension name '{name}'")]
    PathTraversal { name: String },

    /// Restricted tool requested by an untrusted extension
    #[error("extension '{extension}' is not authorized to execute restricted tool '{tool}'")]
    Authorization { extension: String, tool: String },

    /// Attempt to persist a secret in plaintext
    #[error(
        "setting '{key}' is sensitive and cannot be stored in plaintext; provide it via the {env_var} environment variable"
    )]
    SensitiveWrite { key: String, env_var: String },

    /// Durable write failed
    #[error("failed to persist {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// External installer exited unsuccessfully
    #[error("command failed: {cmd}\n{stderr}")]
    CommandFailed { cmd: String, stderr: String },

    /// Tool not present in the registry
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    /// Tool handler reported a failure
    #[error("tool '{tool}' failed: {message}")]
    ToolFailed { tool: String, message: String },

    /// Extension activate() failed
    #[error("extension '{id}' failed to activate: {message}")]
    ActivationFailed { id: String, message: String },

    /// Extension deactivate() failed; host cleanup still ran
    #[error("extension '{id}' failed to deactivate: {message}")]
    DeactivationFailed { id: String, message: String },

    /// Extension is already loaded
    #[error("extension already active: {0}")]
    AlreadyActive(String),

    /// Entry not found
    #[error("{entity_type} not found: {id}")]
    NotFound { entity_type: String, id: String },

    /// Timeout error
    #[error("{operation} timed out after {duration_ms}ms")]
    Timeout { operation: String, duration_ms: u64 },

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(#[from] ConfigValidationError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Create a validation error for a violated installer rule
    pub fn validation(rule: ValidationRule, message: impl Into<String>) -> Self {
        Self::Validation {
            rule,
            message: message.into(),
        }
    }

    /// Create a path traversal error
    pub fn path_traversal(name: impl Into<String>) -> Self {
        Self::PathTraversal { name: name.into() }
    }

    /// Create an authorization error
    pub fn authorization(extension: impl Into<String>, tool: impl Into<String>) -> Self {
        Self::Authorization {
            extension: extension.into(),
            tool: tool.into(),
        }
    }

    /// Create an error from a command failure
    pub fn command_failed(cmd: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            cmd: cmd.into(),
            stderr: stderr.into(),
        }
    }

    /// Create a tool failure error
    pub fn tool_failed(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ToolFailed {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(entity_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            id: id.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
        }
    }

    /// Check if this error is a security denial (authorization, traversal, sensitive write)
    pub fn is_denial(&self) -> bool {
        matches!(
            self,
            Self::Authorization { .. } | Self::PathTraversal { .. } | Self::SensitiveWrite { .. }
        )
    }

    /// Check if this error is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
