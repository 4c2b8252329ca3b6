//! Extension State Store
//!
//! Arbitrary durable key/value state. No sensitivity rules apply.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::keyed::{Entries, KeyedStore};
use crate::error::Result;

/// Durable state namespaced to one extension
#[derive(Debug, Clone)]
pub struct StateStore {
    store: KeyedStore,
}

impl StateStore {
    pub fn new(store: KeyedStore) -> Self {
        Self { store }
    }

    pub async fn get(&self, key: &str) -> Option<Value> {
        self.store.get(key).await
    }

    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        self.store.get_as(key).await
    }

    pub async fn has(&self, key: &str) -> bool {
        self.store.has(key).await
    }

    pub async fn set(&self, key: impl Into<String>, value: Value) {
        self.store.set(key, value).await
    }

    pub async fn delete(&self, key: &str) -> bool {
        self.store.delete(key).await
    }

    pub async fn keys(&self) -> Vec<String> {
        self.store.keys().await
    }

    pub async fn entries(&self) -> Entries {
        self.store.entries().await
    }

    pub async fn clear(&self) {
        self.store.clear().await
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
