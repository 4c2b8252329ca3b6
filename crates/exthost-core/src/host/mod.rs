//! Host API
//!
//! The capability surface handed to an extension at activation. Every call
//! an extension makes into the host goes through one of these handles, which
//! apply the trust and sensitivity rules before reaching a collaborator.
//!
//! Trusted extensions additionally see `HostServices`. The untrusted variant
//! has no such field, so there is nothing to leak.

mod clients;
mod tools;

use serde_json::Value;
use std::ops::Deref;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::bus::{EventBus, MessageBus};
use crate::error::Result;
use crate::identity::{ExtensionIdentity, TrustSource};
use crate::registry::ToolRegistry;
use crate::services::{HostServices, SecretProvider};
use crate::store::{SettingsStore, StateStore, StoreFactory};

pub use clients::{BusClient, EventClient};
pub use tools::{ToolRegistrar, ToolSpec, full_tool_name};

/// Shared collaborators every surface is built from
#[derive(Clone)]
pub struct Collaborators {
    pub registry: Arc<dyn ToolRegistry>,
    pub bus: Arc<dyn MessageBus>,
    pub events: Arc<dyn EventBus>,
    pub stores: StoreFactory,
    /// Used for sensitive-setting fallback
    pub secrets: Arc<dyn SecretProvider>,
    /// Handed to trusted extensions only
    pub services: HostServices,
}

/// Capabilities every extension receives
pub struct HostCapabilities {
    identity: ExtensionIdentity,
    pub tools: ToolRegistrar,
    pub storage: StateStore,
    pub settings: SettingsStore,
    pub bus: BusClient,
    pub events: EventClient,
}

impl HostCapabilities {
    fn new(identity: ExtensionIdentity, collaborators: &Collaborators, settings_schema: Option<&Value>) -> Self {
        let stores = &collaborators.stores;
        Self {
            tools: ToolRegistrar::new(identity.clone(), collaborators.registry.clone()),
            storage: stores.state(&identity),
            settings: stores.settings(&identity, settings_schema, collaborators.secrets.clone()),
            bus: BusClient::new(identity.clone(), collaborators.bus.clone()),
            events: EventClient::new(identity.clone(), collaborators.events.clone()),
            identity,
        }
    }

    pub fn identity(&self) -> &ExtensionIdentity {
        &self.identity
    }
}

/// Capabilities plus internal services
pub struct TrustedHost {
    caps: HostCapabilities,
    pub services: HostServices,
}

impl Deref for TrustedHost {
    type Target = HostCapabilities;

    fn deref(&self) -> &HostCapabilities {
        &self.caps
    }
}

/// Surface for one activation, shaped by trust
pub enum HostApi {
    Trusted(TrustedHost),
    Untrusted(HostCapabilities),
}

/// Counts from a `HostApi::cleanup` pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CleanupReport {
    pub tools: usize,
    pub bus_handlers: usize,
    pub event_listeners: usize,
}

impl HostApi {
    /// Build the surface for `identity`
    pub fn build(identity: ExtensionIdentity, collaborators: &Collaborators, settings_schema: Option<&Value>) -> Self {
        let caps = HostCapabilities::new(identity, collaborators, settings_schema);
        match caps.identity.source() {
            TrustSource::Trusted => HostApi::Trusted(TrustedHost {
                caps,
                services: collaborators.services.clone(),
            }),
            TrustSource::Untrusted => HostApi::Untrusted(caps),
        }
    }

    pub fn caps(&self) -> &HostCapabilities {
        match self {
            HostApi::Trusted(host) => &host.caps,
            HostApi::Untrusted(caps) => caps,
        }
    }

    pub fn identity(&self) -> &ExtensionIdentity {
        &self.caps().identity
    }

    /// Internal services; `None` for untrusted extensions
    pub fn services(&self) -> Option<&HostServices> {
        match self {
            HostApi::Trusted(host) => Some(&host.services),
            HostApi::Untrusted(_) => None,
        }
    }

    /// Remove every tool, bus handler and event listener this surface added.
    ///
    /// Safe to call after a partial activation and safe to call twice.
    pub async fn cleanup(&self) -> CleanupReport {
        let caps = self.caps();
        let report = CleanupReport {
            tools: caps.tools.cleanup().await,
            bus_handlers: caps.bus.cleanup().await,
            event_listeners: caps.events.cleanup().await,
        };
        debug!("Cleaned up {}: {:?}", caps.identity, report);
        report
    }

    /// Cancel pending timers and write both stores now.
    ///
    /// Both stores are attempted; the first failure is returned.
    pub async fn flush_stores(&self) -> Result<()> {
        let caps = self.caps();
        let state = caps.storage.flush().await;
        let settings = caps.settings.flush().await;

        if let Err(e) = &state {
            warn!("Failed to flush state for {}: {}", caps.identity, e);
        }
        if let Err(e) = &settings {
            warn!("Failed to flush settings for {}: {}", caps.identity, e);
        }
        state.and(settings)
    }
}

impl Deref for HostApi {
    type Target = HostCapabilities;

    fn deref(&self) -> &HostCapabilities {
        self.caps()
    }
}
