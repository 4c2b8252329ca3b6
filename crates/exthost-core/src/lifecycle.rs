//! Extension Lifecycle
//!
//! Activation, deactivation and hot reload. The manager owns every
//! `ExtensionInstance`; an extension never outlives its surface.
//!
//! ```text
//! Unloaded -> Activating -> Active -> Deactivating -> Unloaded
//!                 |                                      ^
//!                 +---------- (activate failed) ---------+
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::host::{Collaborators, HostApi};
use crate::identity::ExtensionIdentity;

/// Code an extension provides to the host
#[async_trait]
pub trait Extension: Send + Sync {
    /// Register tools, handlers and listeners
    async fn activate(&self, host: &HostApi) -> anyhow::Result<()>;

    /// Release extension-owned resources. Host registrations are removed regardless.
    async fn deactivate(&self, _host: &HostApi) -> anyhow::Result<()> {
        Ok(())
    }

    /// JSON-Schema-like settings schema; `properties.*.default` become setting defaults
    fn settings_schema(&self) -> Option<Value> {
        None
    }
}

/// Extension lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unloaded,
    Activating,
    Active,
    Deactivating,
}

/// Lifecycle timeouts
#[derive(Debug, Clone, Copy)]
pub struct LifecycleConfig {
    pub activate_timeout: Duration,
    pub deactivate_timeout: Duration,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            activate_timeout: Duration::from_secs(30),
            deactivate_timeout: Duration::from_secs(5),
        }
    }
}

/// A loaded extension and the surface it was given
pub struct ExtensionInstance {
    identity: ExtensionIdentity,
    extension: Arc<dyn Extension>,
    host: Arc<HostApi>,
    state: LifecycleState,
    activated_at: Option<DateTime<Utc>>,
}

/// Snapshot of an instance for reporting
#[derive(Debug, Clone, Serialize)]
pub struct InstanceInfo {
    pub identity: ExtensionIdentity,
    pub state: LifecycleState,
    pub activated_at: Option<DateTime<Utc>>,
}

impl ExtensionInstance {
    fn info(&self) -> InstanceInfo {
        InstanceInfo {
            identity: self.identity.clone(),
            state: self.state,
            activated_at: self.activated_at,
        }
    }
}

/// Owns extension instances and drives their transitions
pub struct LifecycleManager {
    collaborators: Collaborators,
    config: LifecycleConfig,
    instances: RwLock<HashMap<String, ExtensionInstance>>,
    /// Serializes activate/deactivate/reload so transitions never interleave
    operation_lock: Mutex<()>,
}

impl LifecycleManager {
    pub fn new(collaborators: Collaborators, config: LifecycleConfig) -> Self {
        Self {
            collaborators,
            config,
            instances: RwLock::new(HashMap::new()),
            operation_lock: Mutex::new(()),
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Activate an extension with a fresh host surface
    pub async fn activate(&self, extension: Arc<dyn Extension>, identity: ExtensionIdentity) -> Result<()> {
        let _guard = self.operation_lock.lock().await;
        self.activate_locked(extension, identity).await
    }

    /// Deactivate an extension. Host registrations are removed and stores
    /// flushed even when the extension's own `deactivate` fails or hangs.
    pub async fn deactivate(&self, id: &str) -> Result<()> {
        let _guard = self.operation_lock.lock().await;
        self.deactivate_locked(id).await
    }

    /// Deactivate, then activate `extension` under the same identity
    pub async fn reload(&self, id: &str, extension: Arc<dyn Extension>) -> Result<()> {
        let _guard = self.operation_lock.lock().await;

        let identity = {
            let instances = self.instances.read().await;
            instances
                .get(id)
                .map(|i| i.identity.clone())
                .ok_or_else(|| Error::not_found("extension", id))?
        };

        info!("Reloading extension {}", identity);
        if let Err(e) = self.deactivate_locked(id).await {
            warn!("Deactivation before reload of {} reported: {}", id, e);
        }
        self.activate_locked(extension, identity).await
    }

    /// Deactivate every loaded extension. Returns how many were deactivated.
    pub async fn shutdown(&self) -> usize {
        let _guard = self.operation_lock.lock().await;

        let mut ids: Vec<String> = self.instances.read().await.keys().cloned().collect();
        ids.sort();

        let mut count = 0;
        for id in ids {
            // The instance is removed even when the final flush fails
            if let Err(e) = self.deactivate_locked(&id).await {
                warn!("Shutdown of {} reported: {}", id, e);
            }
            count += 1;
        }

        info!("Shut down {} extensions", count);
        count
    }

    pub async fn state(&self, id: &str) -> LifecycleState {
        let instances = self.instances.read().await;
        instances.get(id).map_or(LifecycleState::Unloaded, |i| i.state)
    }

    /// Ids of extensions in the `Active` state, sorted
    pub async fn active_ids(&self) -> Vec<String> {
        let instances = self.instances.read().await;
        let mut ids: Vec<String> = instances
            .values()
            .filter(|i| i.state == LifecycleState::Active)
            .map(|i| i.identity.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    pub async fn info(&self, id: &str) -> Option<InstanceInfo> {
        let instances = self.instances.read().await;
        instances.get(id).map(ExtensionInstance::info)
    }

    /// Host surface of a loaded extension
    pub async fn host(&self, id: &str) -> Option<Arc<HostApi>> {
        let instances = self.instances.read().await;
        instances.get(id).map(|i| i.host.clone())
    }

    async fn activate_locked(&self, extension: Arc<dyn Extension>, identity: ExtensionIdentity) -> Result<()> {
        let id = identity.id().to_string();

        let schema = extension.settings_schema();
        let host = Arc::new(HostApi::build(identity.clone(), &self.collaborators, schema.as_ref()));

        {
            let mut instances = self.instances.write().await;
            if instances.contains_key(&id) {
                return Err(Error::AlreadyActive(id));
            }
            instances.insert(
                id.clone(),
                ExtensionInstance {
                    identity: identity.clone(),
                    extension: extension.clone(),
                    host: host.clone(),
                    state: LifecycleState::Activating,
                    activated_at: None,
                },
            );
        }

        debug!("Activating extension {}", identity);
        let outcome = bounded(self.config.activate_timeout, &id, "activate", extension.activate(&host))
            .await
            .and_then(|r| {
                r.map_err(|e| Error::ActivationFailed {
                    id: id.clone(),
                    message: format!("{:#}", e),
                })
            });

        match outcome {
            Ok(()) => {
                let mut instances = self.instances.write().await;
                if let Some(instance) = instances.get_mut(&id) {
                    instance.state = LifecycleState::Active;
                    instance.activated_at = Some(Utc::now());
                }
                info!("Activated extension {}", identity);
                Ok(())
            }
            Err(e) => {
                warn!("Activation of {} failed: {}", identity, e);
                let report = host.cleanup().await;
                debug!("Rolled back partial activation of {}: {:?}", id, report);
                if let Err(flush_err) = host.flush_stores().await {
                    warn!("Flush after failed activation of {}: {}", id, flush_err);
                }
                self.instances.write().await.remove(&id);
                Err(e)
            }
        }
    }

    async fn deactivate_locked(&self, id: &str) -> Result<()> {
        let (extension, host) = {
            let mut instances = self.instances.write().await;
            let instance = instances
                .get_mut(id)
                .ok_or_else(|| Error::not_found("extension", id))?;
            instance.state = LifecycleState::Deactivating;
            (instance.extension.clone(), instance.host.clone())
        };

        debug!("Deactivating extension {}", host.identity());
        let outcome = bounded(self.config.deactivate_timeout, id, "deactivate", extension.deactivate(&host))
            .await
            .and_then(|r| {
                r.map_err(|e| Error::DeactivationFailed {
                    id: id.to_string(),
                    message: format!("{:#}", e),
                })
            });
        if let Err(e) = outcome {
            warn!("Extension {} deactivate did not complete cleanly: {}", id, e);
        }

        let report = host.cleanup().await;
        let flushed = host.flush_stores().await;
        self.instances.write().await.remove(id);

        info!(
            "Deactivated extension {} (removed {} tools, {} bus handlers, {} event listeners)",
            id, report.tools, report.bus_handlers, report.event_listeners
        );
        flushed
    }
}

/// Run extension code under a timeout
async fn bounded<F>(limit: Duration, id: &str, operation: &str, fut: F) -> Result<anyhow::Result<()>>
where
    F: Future<Output = anyhow::Result<()>>,
{
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        Error::timeout(
            format!("{} of extension '{}'", operation, id),
            limit.as_millis() as u64,
        )
    })
}
