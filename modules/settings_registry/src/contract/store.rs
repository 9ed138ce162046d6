//! Storage collaborator traits
//!
//! The registry never talks to a persistence medium directly. Modules read and
//! write through these narrow interfaces; implementations live in
//! `infra::storage`.

use super::error::StoreError;
use super::model::{SettingValue, SettingsMap};
use std::sync::Arc;

/// Generic persistent key-value store, one per module namespace
///
/// Calls are synchronous from the module's point of view. Writes may be
/// buffered until [`KeyValueStore::flush`] commits them.
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Result<Option<SettingValue>, StoreError>;

    /// Write a value
    fn set(&self, key: &str, value: SettingValue) -> Result<(), StoreError>;

    /// Remove a value; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Whether a value is present
    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    /// Remove every value
    fn clear(&self) -> Result<(), StoreError>;

    /// Every stored value
    fn get_all(&self) -> Result<SettingsMap, StoreError>;

    /// Commit buffered writes to durable storage
    fn flush(&self) -> Result<(), StoreError>;

    /// Drop buffered writes and re-read durable state
    ///
    /// Stores without a write buffer have nothing to discard.
    fn discard_pending(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Opens key-value stores by namespace
pub trait StoreFactory: Send + Sync {
    fn open(&self, namespace: &str) -> Result<Arc<dyn KeyValueStore>, StoreError>;
}

/// Opaque protected store for sensitive values
///
/// How values are protected at rest is the implementation's business.
pub trait ProtectedStore: Send + Sync {
    fn put(&self, key: &str, value: &str) -> Result<(), StoreError>;

    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn remove(&self, key: &str) -> Result<(), StoreError>;

    fn contains(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.get(key)?.is_some())
    }

    fn clear(&self) -> Result<(), StoreError>;
}
