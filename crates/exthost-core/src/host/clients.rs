//! Message bus and event bus clients scoped to one extension.
//!
//! Each client remembers the handlers it added so cleanup removes exactly
//! those, leaving other extensions' handlers alone.

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use crate::bus::{EventBus, Handler, HandlerId, MessageBus};
use crate::identity::ExtensionIdentity;

/// Message bus access for one extension
pub struct BusClient {
    identity: ExtensionIdentity,
    bus: Arc<dyn MessageBus>,
    handlers: Mutex<Vec<(String, HandlerId)>>,
}

impl BusClient {
    pub(crate) fn new(identity: ExtensionIdentity, bus: Arc<dyn MessageBus>) -> Self {
        Self {
            identity,
            bus,
            handlers: Mutex::new(Vec::new()),
        }
    }

    /// Register a handler for a message type
    pub async fn register<F>(&self, message_type: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        let id = self.bus.register(message_type, handler).await;
        self.handlers.lock().await.push((message_type.to_string(), id));
        id
    }

    /// Remove every handler this extension registered for a message type
    pub async fn unregister(&self, message_type: &str) -> usize {
        let ids: Vec<HandlerId> = {
            let mut handlers = self.handlers.lock().await;
            let mut ids = Vec::new();
            handlers.retain(|(name, id)| {
                if name == message_type {
                    ids.push(*id);
                    false
                } else {
                    true
                }
            });
            ids
        };

        let mut removed = 0;
        for id in ids {
            if self.bus.unregister(message_type, id).await {
                removed += 1;
            }
        }
        removed
    }

    pub async fn broadcast(&self, message_type: &str, payload: Value) -> usize {
        self.bus.broadcast(message_type, payload).await
    }

    pub(crate) async fn cleanup(&self) -> usize {
        let handlers: Vec<(String, HandlerId)> = self.handlers.lock().await.drain(..).collect();

        let mut removed = 0;
        for (message_type, id) in handlers {
            if self.bus.unregister(&message_type, id).await {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Removed {} bus handlers for {}", removed, self.identity);
        }
        removed
    }
}

/// Event bus access for one extension
pub struct EventClient {
    identity: ExtensionIdentity,
    events: Arc<dyn EventBus>,
    listeners: Mutex<Vec<(String, HandlerId)>>,
}

impl EventClient {
    pub(crate) fn new(identity: ExtensionIdentity, events: Arc<dyn EventBus>) -> Self {
        Self {
            identity,
            events,
            listeners: Mutex::new(Vec::new()),
        }
    }

    pub async fn on<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.events.on(event, Arc::new(handler)).await;
        self.listeners.lock().await.push((event.to_string(), id));
        id
    }

    /// Listen for the next occurrence only
    pub async fn once<F>(&self, event: &str, handler: F) -> HandlerId
    where
        F: Fn(&Value) + Send + Sync + 'static,
    {
        let id = self.events.once(event, Arc::new(handler)).await;
        self.listeners.lock().await.push((event.to_string(), id));
        id
    }

    pub async fn off(&self, event: &str, id: HandlerId) -> bool {
        self.listeners
            .lock()
            .await
            .retain(|(name, existing)| !(name == event && *existing == id));
        self.events.off(event, id).await
    }

    pub async fn emit(&self, event: &str, payload: Value) -> usize {
        self.events.emit(event, payload).await
    }

    pub(crate) async fn cleanup(&self) -> usize {
        let listeners: Vec<(String, HandlerId)> = self.listeners.lock().await.drain(..).collect();

        // Already-fired `once` listeners report false here
        let mut removed = 0;
        for (event, id) in listeners {
            if self.events.off(&event, id).await {
                removed += 1;
            }
        }

        if removed > 0 {
            debug!("Removed {} event listeners for {}", removed, self.identity);
        }
        removed
    }
}
