//! Tool Registry
//!
//! The registry extensions publish tools into. `ToolRegistry` is the seam the
//! host consumes; `DynamicToolRouter` is the in-process implementation.
//!
//! Registration is linearized by the router's write lock. Descriptors are
//! stored behind `Arc`, so a concurrent reader sees either the old or the new
//! descriptor, never a mix.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{Error, Result};
use crate::identity::ExtensionIdentity;

/// Tool handler callback type
pub type ToolHandler = Arc<dyn Fn(Value) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Wrap an async closure as a `ToolHandler`
pub fn tool_handler<F, Fut>(f: F) -> ToolHandler
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// A live tool registration
#[derive(Clone)]
pub struct ToolDescriptor {
    /// Name the extension asked for
    pub short_name: String,
    /// Name the tool is registered and executed under
    pub full_name: String,
    pub description: String,
    /// Input schema (JSON Schema)
    pub schema: Value,
    pub handler: ToolHandler,
    /// Whether the tool may be invoked from dynamic UI surfaces
    pub surface_safe: bool,
    /// Registering extension; `None` for host-provided tools
    pub owner: Option<ExtensionIdentity>,
}

impl std::fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("short_name", &self.short_name)
            .field("full_name", &self.full_name)
            .field("surface_safe", &self.surface_safe)
            .field("owner", &self.owner.as_ref().map(|o| o.id()))
            .finish_non_exhaustive()
    }
}

/// Result of registering a tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Registration {
    /// No tool had this name
    Inserted,
    /// A previous descriptor was replaced
    Replaced { previous_owner: Option<String> },
}

/// Registry consumed by the host
#[async_trait]
pub trait ToolRegistry: Send + Sync {
    /// Register under `descriptor.full_name`, replacing any existing descriptor
    async fn register_tool(&self, descriptor: ToolDescriptor) -> Registration;

    /// Remove a tool. Returns true if it existed.
    async fn unregister_tool(&self, full_name: &str) -> bool;

    /// Remove a tool only while `owner_id` still owns it
    async fn unregister_owned(&self, full_name: &str, owner_id: &str) -> bool;

    /// Execute a tool. Unknown names fail with `ToolNotFound`.
    async fn execute_tool(&self, full_name: &str, args: Value) -> Result<Value>;

    async fn has_tool(&self, full_name: &str) -> bool;

    async fn tool_count(&self) -> usize;

    async fn list_tools(&self) -> Vec<Arc<ToolDescriptor>>;
}

/// In-process registry with runtime registration and removal
pub struct DynamicToolRouter {
    /// Registered tools by full name
    tools: RwLock<HashMap<String, Arc<ToolDescriptor>>>,
    /// Change listeners for notification
    listeners: RwLock<Vec<Box<dyn Fn() + Send + Sync>>>,
}

impl Default for DynamicToolRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl DynamicToolRouter {
    /// Create a new dynamic tool router
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
        }
    }

    /// Get a descriptor by full name
    pub async fn get_tool(&self, full_name: &str) -> Option<Arc<ToolDescriptor>> {
        let tools = self.tools.read().await;
        tools.get(full_name).cloned()
    }

    /// Tools registered by one extension
    pub async fn tools_by_extension(&self, extension_id: &str) -> Vec<Arc<ToolDescriptor>> {
        let tools = self.tools.read().await;
        tools
            .values()
            .filter(|t| t.owner.as_ref().is_some_and(|o| o.id() == extension_id))
            .cloned()
            .collect()
    }

    /// Add a change listener
    pub async fn on_change(&self, callback: impl Fn() + Send + Sync + 'static) {
        let mut listeners = self.listeners.write().await;
        listeners.push(Box::new(callback));
    }

    async fn notify_listeners(&self) {
        let listeners = self.listeners.read().await;
        for listener in listeners.iter() {
            listener();
        }
    }
}

#[async_trait]
impl ToolRegistry for DynamicToolRouter {
    async fn register_tool(&self, descriptor: ToolDescriptor) -> Registration {
        let mut tools = self.tools.write().await;
        let full_name = descriptor.full_name.clone();

        let outcome = match tools.insert(full_name.clone(), Arc::new(descriptor)) {
            Some(previous) => Registration::Replaced {
                previous_owner: previous.owner.as_ref().map(|o| o.id().to_string()),
            },
            None => Registration::Inserted,
        };

        drop(tools);
        debug!("Registered tool {} ({:?})", full_name, outcome);
        self.notify_listeners().await;

        outcome
    }

    async fn unregister_tool(&self, full_name: &str) -> bool {
        let mut tools = self.tools.write().await;
        let removed = tools.remove(full_name).is_some();

        drop(tools);
        if removed {
            debug!("Unregistered tool {}", full_name);
            self.notify_listeners().await;
        }

        removed
    }

    async fn unregister_owned(&self, full_name: &str, owner_id: &str) -> bool {
        let mut tools = self.tools.write().await;
        let owned = tools
            .get(full_name)
            .is_some_and(|t| t.owner.as_ref().is_some_and(|o| o.id() == owner_id));
        if owned {
            tools.remove(full_name);
        }

        drop(tools);
        if owned {
            debug!("Unregistered tool {} owned by {}", full_name, owner_id);
            self.notify_listeners().await;
        }

        owned
    }

    async fn execute_tool(&self, full_name: &str, args: Value) -> Result<Value> {
        let handler = {
            let tools = self.tools.read().await;
            let tool = tools
                .get(full_name)
                .ok_or_else(|| Error::ToolNotFound(full_name.to_string()))?;
            tool.handler.clone()
        };

        // Lock released before calling handler
        handler(args).await
    }

    async fn has_tool(&self, full_name: &str) -> bool {
        let tools = self.tools.read().await;
        tools.contains_key(full_name)
    }

    async fn tool_count(&self) -> usize {
        let tools = self.tools.read().await;
        tools.len()
    }

    async fn list_tools(&self) -> Vec<Arc<ToolDescriptor>> {
        let tools = self.tools.read().await;
        tools.values().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn descriptor(full_name: &str, version: &'static str) -> ToolDescriptor {
        ToolDescriptor {
            short_name: full_name.to_string(),
            full_name: full_name.to_string(),
            description: "A test tool".to_string(),
            schema: json!({"type": "object", "version": version}),
            handler: tool_handler(move |_| async move { Ok(json!({"version": version})) }),
            surface_safe: false,
            owner: None,
        }
    }

    #[tokio::test]
    async fn test_reregistration_replaces() {
        let router = DynamicToolRouter::new();

        assert_eq!(
            router.register_tool(descriptor("echo", "v1")).await,
            Registration::Inserted
        );
        assert_eq!(
            router.register_tool(descriptor("echo", "v2")).await,
            Registration::Replaced { previous_owner: None }
        );
        assert_eq!(router.tool_count().await, 1);

        let output = router.execute_tool("echo", json!({})).await.unwrap();
        assert_eq!(output["version"], "v2");
        let tool = router.get_tool("echo").await.unwrap();
        assert_eq!(tool.schema["version"], "v2");
    }

    #[tokio::test]
    async fn test_unregister() {
        let router = DynamicToolRouter::new();
        router.register_tool(descriptor("keep_me", "v1")).await;
        router.register_tool(descriptor("remove_me", "v1")).await;

        assert!(router.unregister_tool("remove_me").await);
        assert!(!router.unregister_tool("remove_me").await);
        assert_eq!(router.tool_count().await, 1);
        assert!(router.has_tool("keep_me").await);
    }

    #[tokio::test]
    async fn test_call_nonexistent_tool() {
        let router = DynamicToolRouter::new();
        let err = router.execute_tool("nonexistent", json!({})).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(name) if name == "nonexistent"));
    }

    #[tokio::test]
    async fn test_tools_by_extension() {
        let router = DynamicToolRouter::new();
        let mut owned = descriptor("ext_weather_forecast", "v1");
        owned.owner = Some(ExtensionIdentity::untrusted("weather").unwrap());
        router.register_tool(owned).await;
        router.register_tool(descriptor("core_tool", "v1")).await;

        let tools = router.tools_by_extension("weather").await;
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].full_name, "ext_weather_forecast");
    }

    #[tokio::test]
    async fn test_unregister_owned_respects_replacement() {
        let router = DynamicToolRouter::new();
        let mut first = descriptor("echo", "v1");
        first.owner = Some(ExtensionIdentity::trusted("first").unwrap());
        let mut second = descriptor("echo", "v2");
        second.owner = Some(ExtensionIdentity::trusted("second").unwrap());

        router.register_tool(first).await;
        router.register_tool(second).await;

        assert!(!router.unregister_owned("echo", "first").await);
        assert!(router.has_tool("echo").await);
        assert!(router.unregister_owned("echo", "second").await);
        assert!(!router.has_tool("echo").await);
    }

    #[tokio::test]
    async fn test_change_listeners() {
        let router = DynamicToolRouter::new();
        let changes = Arc::new(AtomicUsize::new(0));
        let counter = changes.clone();
        router
            .on_change(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .await;

        router.register_tool(descriptor("a", "v1")).await;
        router.unregister_tool("a").await;
        router.unregister_tool("a").await;

        assert_eq!(changes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_registration_last_write_wins() {
        let router = Arc::new(DynamicToolRouter::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let router = router.clone();
            handles.push(tokio::spawn(async move {
                router.register_tool(descriptor("race", "v1")).await;
                router.execute_tool("race", json!({})).await.unwrap()
            }));
        }

        for handle in handles {
            let output = handle.await.unwrap();
            assert_eq!(output["version"], "v1");
        }
        assert_eq!(router.tool_count().await, 1);
    }
}
