//! Trust Classifier
//!
//! The single authorization predicate of the host. `authorize` is pure and is
//! evaluated on every tool execution; nothing an extension supplies can
//! influence it.

use crate::identity::{ExtensionIdentity, TrustSource};

/// Tools gated to trusted extensions: arbitrary command/code execution and
/// process spawning.
pub const RESTRICTED_TOOLS: &[&str] = &[
    "run_command",
    "execute_command",
    "execute_code",
    "execute_javascript",
    "execute_python",
    "execute_npm_function",
    "spawn_background_task",
    "spawn_process",
];

/// Outcome of an authorization check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allow,
    Deny,
}

impl Authorization {
    pub fn is_allowed(self) -> bool {
        self == Authorization::Allow
    }
}

/// True only for first-party extensions
pub fn is_trusted(identity: &ExtensionIdentity) -> bool {
    identity.source() == TrustSource::Trusted
}

/// Check whether a tool name is in the restricted set
pub fn is_restricted(tool_name: &str) -> bool {
    RESTRICTED_TOOLS.contains(&tool_name)
}

/// Decide whether `identity` may execute `tool_name`
pub fn authorize(identity: &ExtensionIdentity, tool_name: &str) -> Authorization {
    if is_restricted(tool_name) && !is_trusted(identity) {
        Authorization::Deny
    } else {
        Authorization::Allow
    }
}
