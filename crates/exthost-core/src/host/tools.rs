//! Tool registration facade handed to extensions.

use indexmap::IndexMap;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::identity::ExtensionIdentity;
use crate::registry::{Registration, ToolDescriptor, ToolHandler, ToolRegistry};
use crate::trust::{self, Authorization};

/// Name a tool is registered under.
///
/// Only a trusted owner that asked for it keeps the bare name; everything else
/// is `ext_<id>_<name>`.
pub fn full_tool_name(owner: &ExtensionIdentity, short_name: &str, use_original_name: bool) -> String {
    if use_original_name && trust::is_trusted(owner) {
        short_name.to_string()
    } else {
        format!("ext_{}_{}", owner.id(), short_name)
    }
}

/// A tool an extension wants to register
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// Input schema (JSON Schema)
    pub schema: Value,
    pub handler: ToolHandler,
    pub surface_safe: bool,
    /// Request the unprefixed name (honoured for trusted extensions only)
    pub use_original_name: bool,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, handler: ToolHandler) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            schema: json!({"type": "object"}),
            handler,
            surface_safe: false,
            use_original_name: false,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn schema(mut self, schema: Value) -> Self {
        self.schema = schema;
        self
    }

    pub fn surface_safe(mut self, surface_safe: bool) -> Self {
        self.surface_safe = surface_safe;
        self
    }

    pub fn use_original_name(mut self, use_original_name: bool) -> Self {
        self.use_original_name = use_original_name;
        self
    }
}

/// Registers, removes, and executes tools on behalf of one extension
pub struct ToolRegistrar {
    identity: ExtensionIdentity,
    registry: Arc<dyn ToolRegistry>,
    /// full name -> short name, for everything this surface registered
    registered: Mutex<IndexMap<String, String>>,
}

impl ToolRegistrar {
    pub(crate) fn new(identity: ExtensionIdentity, registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            identity,
            registry,
            registered: Mutex::new(IndexMap::new()),
        }
    }

    /// Register a tool and return its full name
    pub async fn register(&self, spec: ToolSpec) -> String {
        let full_name = full_tool_name(&self.identity, &spec.name, spec.use_original_name);

        if spec.use_original_name && full_name != spec.name {
            debug!(
                "Extension {} requested unprefixed tool name '{}'; registering as '{}'",
                self.identity, spec.name, full_name
            );
        }

        let descriptor = ToolDescriptor {
            short_name: spec.name.clone(),
            full_name: full_name.clone(),
            description: spec.description,
            schema: spec.schema,
            handler: spec.handler,
            surface_safe: spec.surface_safe,
            owner: Some(self.identity.clone()),
        };

        // Tracked first so cleanup covers a registration that raced a failure
        self.registered
            .lock()
            .await
            .insert(full_name.clone(), spec.name);

        if let Registration::Replaced { previous_owner } = self.registry.register_tool(descriptor).await {
            warn!(
                "Tool name collision: '{}' from {} replaces the tool previously registered by {}",
                full_name,
                self.identity,
                previous_owner.as_deref().unwrap_or("the host")
            );
        }

        full_name
    }

    /// Unregister every tool registered under `short_name`
    pub async fn unregister(&self, short_name: &str) -> bool {
        let mut names: Vec<String> = {
            let mut registered = self.registered.lock().await;
            let names: Vec<String> = registered
                .iter()
                .filter(|(_, short)| short.as_str() == short_name)
                .map(|(full, _)| full.clone())
                .collect();
            for name in &names {
                registered.shift_remove(name);
            }
            names
        };
        if names.is_empty() {
            names.push(full_tool_name(&self.identity, short_name, false));
        }

        let mut removed = false;
        for full_name in names {
            removed |= self
                .registry
                .unregister_owned(&full_name, self.identity.id())
                .await;
        }
        removed
    }

    /// Execute any registered tool, subject to the restricted-tool rule
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<Value> {
        if trust::authorize(&self.identity, tool_name) == Authorization::Deny {
            warn!(
                "Denied restricted tool '{}' to untrusted extension {}",
                tool_name, self.identity
            );
            return Err(Error::authorization(self.identity.id(), tool_name));
        }

        self.registry.execute_tool(tool_name, args).await
    }

    /// Full names of tools registered through this surface
    pub async fn registered(&self) -> Vec<String> {
        self.registered.lock().await.keys().cloned().collect()
    }

    /// Unregister everything this surface registered. Returns the number removed.
    pub(crate) async fn cleanup(&self) -> usize {
        let names: Vec<String> = {
            let mut registered = self.registered.lock().await;
            registered.drain(..).map(|(full, _)| full).collect()
        };

        let mut removed = 0;
        for full_name in names {
            if self
                .registry
                .unregister_owned(&full_name, self.identity.id())
                .await
            {
                removed += 1;
            }
        }
        removed
    }
}
