//! Extension Stores
//!
//! Durable per-extension storage. One JSON document per extension per store
//! kind:
//!
//! ```text
//! <data_dir>/
//! ├── state/<extension-id>.json
//! └── settings/<extension-id>.json
//! ```

mod keyed;
mod settings;
mod state;

use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::identity::ExtensionIdentity;
use crate::services::SecretProvider;

pub use keyed::{DEFAULT_DEBOUNCE, Entries, KeyedStore};
pub use settings::{SettingsStore, defaults_from_schema};
pub use state::StateStore;

/// Kind of per-extension document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKind {
    State,
    Settings,
}

impl StoreKind {
    pub fn dir_name(self) -> &'static str {
        match self {
            StoreKind::State => "state",
            StoreKind::Settings => "settings",
        }
    }
}

/// Opens stores namespaced by extension identity
#[derive(Debug, Clone)]
pub struct StoreFactory {
    root: PathBuf,
    debounce: Duration,
}

impl StoreFactory {
    pub fn new(root: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            root: root.into(),
            debounce,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Document path for an extension. The id was validated when the identity was built.
    pub fn path_for(&self, kind: StoreKind, identity: &ExtensionIdentity) -> PathBuf {
        self.root
            .join(kind.dir_name())
            .join(format!("{}.json", identity.id()))
    }

    pub fn state(&self, identity: &ExtensionIdentity) -> StateStore {
        StateStore::new(KeyedStore::new(
            self.path_for(StoreKind::State, identity),
            self.debounce,
        ))
    }

    /// Open settings with defaults taken from an optional settings schema
    pub fn settings(
        &self,
        identity: &ExtensionIdentity,
        schema: Option<&Value>,
        secrets: Arc<dyn SecretProvider>,
    ) -> SettingsStore {
        let defaults = schema.map(defaults_from_schema).unwrap_or_default();
        SettingsStore::new(
            self.path_for(StoreKind::Settings, identity),
            self.debounce,
            defaults,
            secrets,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StaticSecrets;
    use serde_json::json;

    #[tokio::test]
    async fn test_extensions_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let factory = StoreFactory::new(dir.path(), Duration::from_secs(60));

        let alpha = ExtensionIdentity::untrusted("alpha").unwrap();
        let beta = ExtensionIdentity::untrusted("beta").unwrap();

        let alpha_state = factory.state(&alpha);
        let beta_state = factory.state(&beta);

        alpha_state.set("shared-name", json!("alpha")).await;
        beta_state.set("shared-name", json!("beta")).await;
        alpha_state.flush().await.unwrap();
        beta_state.flush().await.unwrap();

        assert_eq!(factory.state(&alpha).get("shared-name").await, Some(json!("alpha")));
        assert_eq!(factory.state(&beta).get("shared-name").await, Some(json!("beta")));

        let secrets = Arc::new(StaticSecrets::new());
        let alpha_settings = factory.settings(&alpha, None, secrets.clone());
        alpha_settings.set("theme", json!("dark")).await.unwrap();
        alpha_settings.flush().await.unwrap();
        assert_eq!(factory.settings(&beta, None, secrets).get("theme", None).await, None);
    }

    #[test]
    fn test_layout() {
        let factory = StoreFactory::new("/data", DEFAULT_DEBOUNCE);
        let id = ExtensionIdentity::trusted("search").unwrap();
        assert_eq!(
            factory.path_for(StoreKind::State, &id),
            PathBuf::from("/data/state/search.json")
        );
        assert_eq!(
            factory.path_for(StoreKind::Settings, &id),
            PathBuf::from("/data/settings/search.json")
        );
    }
}
