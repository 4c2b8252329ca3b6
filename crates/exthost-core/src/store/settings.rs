//! Extension Settings Store
//!
//! Configuration layered on the keyed store:
//!
//! - sensitive keys are never written; `set`/`set_all` reject them
//! - a missing sensitive key falls back to its environment variable
//! - a missing key falls back to the caller default, then the schema default

use indexmap::IndexMap;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use super::keyed::{Entries, KeyedStore};
use crate::error::{Error, Result};
use crate::sensitive::{env_var_name, is_sensitive};
use crate::services::SecretProvider;

/// Settings namespaced to one extension
#[derive(Clone)]
pub struct SettingsStore {
    store: KeyedStore,
    defaults: Arc<Entries>,
    secrets: Arc<dyn SecretProvider>,
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore")
            .field("store", &self.store)
            .field("defaults", &self.defaults.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl SettingsStore {
    /// Open the settings document at `path`. Sensitive keys already in the
    /// document are dropped on load and removed from disk on the next flush.
    pub fn new(
        path: impl Into<PathBuf>,
        debounce: Duration,
        defaults: Entries,
        secrets: Arc<dyn SecretProvider>,
    ) -> Self {
        Self {
            store: KeyedStore::rejecting(path, debounce, is_sensitive),
            defaults: Arc::new(defaults),
            secrets,
        }
    }

    /// Resolve a setting: stored value, then (sensitive keys only) the
    /// environment, then `default`, then the schema default.
    pub async fn get(&self, key: &str, default: Option<Value>) -> Option<Value> {
        if let Some(value) = self.store.get(key).await {
            return Some(value);
        }

        if is_sensitive(key) {
            if let Some(secret) = self.secrets.get_secret(&env_var_name(key)) {
                return Some(Value::String(secret));
            }
        }

        default.or_else(|| self.defaults.get(key).cloned())
    }

    pub async fn has(&self, key: &str) -> bool {
        self.store.has(key).await
    }

    /// Store a non-sensitive setting
    pub async fn set(&self, key: impl Into<String>, value: Value) -> Result<()> {
        let key = key.into();
        reject_sensitive(&key)?;
        self.store.set(key, value).await;
        Ok(())
    }

    /// Store several settings; all-or-nothing if any key is sensitive
    pub async fn set_all(&self, values: impl IntoIterator<Item = (String, Value)>) -> Result<()> {
        let values: Vec<(String, Value)> = values.into_iter().collect();
        if let Some((key, _)) = values.iter().find(|(key, _)| is_sensitive(key)) {
            return Err(sensitive_error(key));
        }
        self.store.set_many(values).await;
        Ok(())
    }

    /// Stored values overlaid on the schema defaults
    pub async fn get_all(&self) -> Entries {
        let mut all = (*self.defaults).clone();
        for (key, value) in self.store.entries().await {
            all.insert(key, value);
        }
        all
    }

    pub async fn keys(&self) -> Vec<String> {
        self.store.keys().await
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.delete(key).await
    }

    /// Clear every stored setting, cancel any pending write, and persist now
    pub async fn reset(&self) -> Result<()> {
        self.store.clear().await;
        // flush() cancels the timer clear() just armed
        self.store.flush().await
    }

    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }

    pub async fn is_dirty(&self) -> bool {
        self.store.is_dirty().await
    }

    /// Underlying engine
    pub fn engine(&self) -> &KeyedStore {
        &self.store
    }
}

/// Extract `properties.<name>.default` values from a JSON-Schema-like settings schema
pub fn defaults_from_schema(schema: &Value) -> Entries {
    let mut defaults = IndexMap::new();

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return defaults;
    };

    for (name, property) in properties {
        let Some(default) = property.get("default") else {
            continue;
        };
        if is_sensitive(name) {
            warn!("Ignoring schema default for sensitive setting '{}'", name);
            continue;
        }
        defaults.insert(name.clone(), default.clone());
    }

    defaults
}

fn reject_sensitive(key: &str) -> Result<()> {
    if is_sensitive(key) {
        return Err(sensitive_error(key));
    }
    Ok(())
}

fn sensitive_error(key: &str) -> Error {
    Error::SensitiveWrite {
        key: key.to_string(),
        env_var: env_var_name(key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StaticSecrets;
    use serde_json::json;
    use std::time::Duration;

    fn settings_in(dir: &tempfile::TempDir, secrets: StaticSecrets, defaults: Entries) -> SettingsStore {
        SettingsStore::new(
            dir.path().join("settings.json"),
            Duration::from_secs(60),
            defaults,
            Arc::new(secrets),
        )
    }

    #[tokio::test]
    async fn test_sensitive_set_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir, StaticSecrets::new(), Entries::new());

        let err = settings.set("api_key", json!("secret-value")).await.unwrap_err();
        assert!(matches!(err, Error::SensitiveWrite { .. }));
        assert!(err.to_string().contains("api_key"));
        assert!(!settings.has("api_key").await);
        assert!(!settings.is_dirty().await);

        settings.set("theme", json!("dark")).await.unwrap();
        assert_eq!(settings.get("theme", None).await, Some(json!("dark")));
    }

    #[tokio::test]
    async fn test_set_all_is_all_or_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir, StaticSecrets::new(), Entries::new());

        let err = settings
            .set_all(vec![
                ("theme".to_string(), json!("dark")),
                ("authToken".to_string(), json!("t")),
                ("password".to_string(), json!("p")),
            ])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("authToken"));
        assert!(settings.keys().await.is_empty());

        settings
            .set_all(vec![
                ("theme".to_string(), json!("dark")),
                ("fontSize".to_string(), json!(14)),
            ])
            .await
            .unwrap();
        assert_eq!(settings.keys().await, vec!["theme", "fontSize"]);
    }

    #[tokio::test]
    async fn test_sensitive_env_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(
            &dir,
            StaticSecrets::new().with("SERPER_API_KEY", "v"),
            Entries::new(),
        );
        assert_eq!(settings.get("serperApiKey", None).await, Some(json!("v")));

        let bare = settings_in(&dir, StaticSecrets::new(), Entries::new());
        assert_eq!(
            bare.get("serperApiKey", Some(json!("fallback"))).await,
            Some(json!("fallback"))
        );
        assert_eq!(bare.get("serperApiKey", None).await, None);
    }

    #[tokio::test]
    async fn test_plaintext_secret_on_disk_is_dropped_and_not_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"api_key": "plain", "theme": "light"}"#).unwrap();

        let settings = settings_in(&dir, StaticSecrets::new().with("API_KEY", "from-env"), Entries::new());
        assert!(!settings.has("api_key").await);
        assert_eq!(settings.get("api_key", None).await, Some(json!("from-env")));

        settings.set("theme", json!("dark")).await.unwrap();
        settings.flush().await.unwrap();

        let disk = std::fs::read_to_string(&path).unwrap();
        assert!(!disk.contains("plain"));
        assert!(!disk.contains("api_key"));
        assert!(disk.contains("dark"));
    }

    #[tokio::test]
    async fn test_non_sensitive_never_reads_env() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir, StaticSecrets::new().with("THEME", "from-env"), Entries::new());

        assert_eq!(settings.get("theme", Some(json!("light"))).await, Some(json!("light")));
        assert_eq!(settings.get("theme", None).await, None);
    }

    #[tokio::test]
    async fn test_schema_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let schema = json!({
            "type": "object",
            "properties": {
                "theme": { "type": "string", "default": "dark" },
                "maxResults": { "type": "integer", "default": 10 },
                "apiKey": { "type": "string", "default": "do-not-ship" },
                "region": { "type": "string" }
            }
        });
        let defaults = defaults_from_schema(&schema);
        assert_eq!(defaults.len(), 2);

        let settings = settings_in(&dir, StaticSecrets::new(), defaults);
        assert_eq!(settings.get("theme", None).await, Some(json!("dark")));
        assert_eq!(settings.get("theme", Some(json!("light"))).await, Some(json!("light")));

        settings.set("maxResults", json!(50)).await.unwrap();
        let all = settings.get_all().await;
        assert_eq!(all["theme"], json!("dark"));
        assert_eq!(all["maxResults"], json!(50));
    }

    #[tokio::test]
    async fn test_reset_persists_empty_document() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_in(&dir, StaticSecrets::new(), Entries::new());

        settings.set("theme", json!("dark")).await.unwrap();
        settings.flush().await.unwrap();
        settings.set("fontSize", json!(12)).await.unwrap();

        settings.reset().await.unwrap();
        assert!(settings.engine().pending_write().await.is_none());
        assert!(settings.keys().await.is_empty());

        let on_disk = std::fs::read_to_string(dir.path().join("settings.json")).unwrap();
        let parsed: Entries = serde_json::from_str(&on_disk).unwrap();
        assert!(parsed.is_empty());
    }
}
