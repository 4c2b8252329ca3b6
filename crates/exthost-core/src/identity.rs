//! Extension Identity
//!
//! Who an extension is and where it came from. Immutable for the lifetime of
//! an activation.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;
use crate::installer::validate_name;

/// Where an extension was loaded from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrustSource {
    /// Ships with the host (first-party)
    Trusted,
    /// Loaded from a workspace or an external package (third-party)
    Untrusted,
}

impl fmt::Display for TrustSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrustSource::Trusted => write!(f, "trusted"),
            TrustSource::Untrusted => write!(f, "untrusted"),
        }
    }
}

/// Extension identity. Only constructible through validation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct ExtensionIdentity {
    id: String,
    source: TrustSource,
}

impl ExtensionIdentity {
    /// Create an identity, rejecting ids that could escape the store directory
    pub fn new(id: impl Into<String>, source: TrustSource) -> Result<Self> {
        let id = validate_name(&id.into())?.to_string();
        Ok(Self { id, source })
    }

    /// First-party identity
    pub fn trusted(id: impl Into<String>) -> Result<Self> {
        Self::new(id, TrustSource::Trusted)
    }

    /// Third-party identity
    pub fn untrusted(id: impl Into<String>) -> Result<Self> {
        Self::new(id, TrustSource::Untrusted)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn source(&self) -> TrustSource {
        self.source
    }
}

impl fmt::Display for ExtensionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.id, self.source)
    }
}
