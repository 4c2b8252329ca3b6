//! Message Bus and Event Bus
//!
//! Collaborator seams for extension messaging (`MessageBus`) and system-wide
//! notifications (`EventBus`), plus in-process implementations. Handlers are
//! identified by `HandlerId` so a host surface can remove exactly the handlers
//! it added.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Identifies one registered handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(Uuid);

impl HandlerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback for bus messages and events
pub type Handler = Arc<dyn Fn(&Value) + Send + Sync>;

/// Extension-to-extension message bus
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn register(&self, message_type: &str, handler: Handler) -> HandlerId;

    /// Remove one handler. Returns true if it was registered.
    async fn unregister(&self, message_type: &str, id: HandlerId) -> bool;

    /// Deliver `payload` to every handler of `message_type`. Returns the delivery count.
    async fn broadcast(&self, message_type: &str, payload: Value) -> usize;
}

/// System-wide event bus
#[async_trait]
pub trait EventBus: Send + Sync {
    async fn on(&self, event: &str, handler: Handler) -> HandlerId;

    /// Handler removed after its first delivery
    async fn once(&self, event: &str, handler: Handler) -> HandlerId;

    async fn off(&self, event: &str, id: HandlerId) -> bool;

    async fn emit(&self, event: &str, payload: Value) -> usize;
}

struct Entry {
    id: HandlerId,
    once: bool,
    handler: Handler,
}

/// Handlers keyed by message type or event name
#[derive(Default)]
struct HandlerTable {
    entries: RwLock<HashMap<String, Vec<Entry>>>,
}

impl HandlerTable {
    async fn add(&self, name: &str, handler: Handler, once: bool) -> HandlerId {
        let id = HandlerId::new();
        let mut entries = self.entries.write().await;
        entries
            .entry(name.to_string())
            .or_default()
            .push(Entry { id, once, handler });
        id
    }

    async fn remove(&self, name: &str, id: HandlerId) -> bool {
        let mut entries = self.entries.write().await;
        let Some(list) = entries.get_mut(name) else {
            return false;
        };

        let before = list.len();
        list.retain(|e| e.id != id);
        let removed = list.len() != before;

        if list.is_empty() {
            entries.remove(name);
        }
        removed
    }

    async fn dispatch(&self, name: &str, payload: &Value) -> usize {
        // Snapshot under the lock, call without it so handlers may re-enter
        let handlers: Vec<Handler> = {
            let mut entries = self.entries.write().await;
            let Some(list) = entries.get_mut(name) else {
                return 0;
            };
            let handlers = list.iter().map(|e| e.handler.clone()).collect();
            list.retain(|e| !e.once);
            if list.is_empty() {
                entries.remove(name);
            }
            handlers
        };

        for handler in &handlers {
            handler(payload);
        }
        handlers.len()
    }

    async fn count(&self, name: &str) -> usize {
        let entries = self.entries.read().await;
        entries.get(name).map_or(0, Vec::len)
    }
}

/// In-process message bus
#[derive(Default)]
pub struct LocalMessageBus {
    handlers: HandlerTable,
}

impl LocalMessageBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handlers registered for a message type
    pub async fn handler_count(&self, message_type: &str) -> usize {
        self.handlers.count(message_type).await
    }
}

#[async_trait]
impl MessageBus for LocalMessageBus {
    async fn register(&self, message_type: &str, handler: Handler) -> HandlerId {
        self.handlers.add(message_type, handler, false).await
    }

    async fn unregister(&self, message_type: &str, id: HandlerId) -> bool {
        self.handlers.remove(message_type, id).await
    }

    async fn broadcast(&self, message_type: &str, payload: Value) -> usize {
        self.handlers.dispatch(message_type, &payload).await
    }
}

/// In-process event bus
#[derive(Default)]
pub struct LocalEventBus {
    listeners: HandlerTable,
}

impl LocalEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of listeners for an event
    pub async fn listener_count(&self, event: &str) -> usize {
        self.listeners.count(event).await
    }
}

#[async_trait]
impl EventBus for LocalEventBus {
    async fn on(&self, event: &str, handler: Handler) -> HandlerId {
        self.listeners.add(event, handler, false).await
    }

    async fn once(&self, event: &str, handler: Handler) -> HandlerId {
        self.listeners.add(event, handler, true).await
    }

    async fn off(&self, event: &str, id: HandlerId) -> bool {
        self.listeners.remove(event, id).await
    }

    async fn emit(&self, event: &str, payload: Value) -> usize {
        self.listeners.dispatch(event, &payload).await
    }
}
