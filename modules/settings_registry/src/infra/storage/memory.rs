//! In-process stores
//!
//! Used by tests and by hosts that keep settings for the session only.
//! Reopening a namespace on the same factory returns the same store, so a
//! registry rebuilt on one factory sees earlier writes.

use crate::contract::{
    KeyValueStore, ProtectedStore, SettingValue, SettingsMap, StoreError, StoreFactory,
};
use dashmap::DashMap;
use std::sync::Arc;

/// Concurrent in-memory key-value store
#[derive(Default)]
pub struct MemoryStore {
    data: DashMap<String, SettingValue>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<SettingValue>, StoreError> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: SettingValue) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.contains_key(key))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.data.clear();
        Ok(())
    }

    fn get_all(&self) -> Result<SettingsMap, StoreError> {
        Ok(self
            .data
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect())
    }

    fn flush(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Hands out one [`MemoryStore`] per namespace
#[derive(Default)]
pub struct MemoryStoreFactory {
    stores: DashMap<String, Arc<MemoryStore>>,
}

impl MemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concrete store for a namespace, created on first use
    pub fn store(&self, namespace: &str) -> Arc<MemoryStore> {
        self.stores
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(MemoryStore::new()))
            .clone()
    }
}

impl StoreFactory for MemoryStoreFactory {
    fn open(&self, namespace: &str) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        Ok(self.store(namespace))
    }
}

/// In-memory protected store
#[derive(Default)]
pub struct MemoryProtectedStore {
    data: DashMap<String, String>,
}

impl MemoryProtectedStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ProtectedStore for MemoryProtectedStore {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.data.remove(key);
        Ok(())
    }

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.data.contains_key(key))
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.data.clear();
        Ok(())
    }
}
