//! exthost-core - Extension capability and trust host
//!
//! Lets first-party and third-party extensions register tools, persist
//! state, read settings and talk over a message bus, while one authority
//! decides what each extension may do:
//!
//! - **host**: Per-extension capability surface (`HostApi`)
//! - **trust**: Trusted/untrusted classification and the restricted tool set
//! - **sensitive**: Secret-looking setting keys and their env var names
//! - **store**: Debounced, durable per-extension state and settings
//! - **installer**: Validated package installs through an external package manager
//! - **lifecycle**: Activation, deactivation and hot reload
//! - **registry** / **bus**: Tool registry, message bus and event bus
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use exthost_core::{
//!     Collaborators, DynamicToolRouter, EnvSecrets, ExtensionIdentity, HostApi, HostConfig,
//!     LocalEventBus, LocalMessageBus, ToolSpec, tool_handler,
//! };
//!
//! async fn example() -> exthost_core::Result<()> {
//!     let config = HostConfig::load()?;
//!     let secrets = Arc::new(EnvSecrets);
//!     let collaborators = Collaborators {
//!         registry: Arc::new(DynamicToolRouter::new()),
//!         bus: Arc::new(LocalMessageBus::new()),
//!         events: Arc::new(LocalEventBus::new()),
//!         stores: config.store_factory(),
//!         secrets: secrets.clone(),
//!         services: config.host_services(secrets),
//!     };
//!
//!     let host = HostApi::build(ExtensionIdentity::untrusted("weather")?, &collaborators, None);
//!     let name = host
//!         .tools
//!         .register(ToolSpec::new("forecast", tool_handler(|args| async move { Ok(args) })))
//!         .await;
//!     assert_eq!(name, "ext_weather_forecast");
//!
//!     host.cleanup().await;
//!     host.flush_stores().await
//! }
//! ```

pub mod bus;
pub mod config;
pub mod error;
pub mod host;
pub mod identity;
pub mod installer;
pub mod lifecycle;
pub mod registry;
pub mod sensitive;
pub mod services;
pub mod store;
pub mod trust;

// Re-export commonly used types
pub use bus::{EventBus, HandlerId, LocalEventBus, LocalMessageBus, MessageBus};
pub use config::{ConfigValidationError, HostConfig};
pub use error::{Error, Result};
pub use host::{
    BusClient, CleanupReport, Collaborators, EventClient, HostApi, HostCapabilities, ToolRegistrar, ToolSpec,
    TrustedHost,
};
pub use identity::{ExtensionIdentity, TrustSource};
pub use installer::{CommandOutput, CommandRunner, Installer, InstallerConfig, TokioCommandRunner, ValidationRule};
pub use lifecycle::{Extension, LifecycleConfig, LifecycleManager, LifecycleState};
pub use registry::{DynamicToolRouter, ToolDescriptor, ToolHandler, ToolRegistry, tool_handler};
pub use services::{EnvSecrets, HostServices, SecretProvider, StaticSecrets};
pub use store::{KeyedStore, SettingsStore, StateStore, StoreFactory};
