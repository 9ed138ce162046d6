//! Session-wide registry instance
//!
//! Hosts that prefer not to pass the registry around resolve it here. The
//! first caller that supplies a [`RegistryEnv`] constructs the instance;
//! concurrent first callers all receive the same one.

use super::registry::{Registry, RegistryEnv};
use crate::contract::SettingsError;
use parking_lot::RwLock;
use std::sync::Arc;

static INSTANCE: RwLock<Option<Arc<Registry>>> = parking_lot::const_rwlock(None);

/// Session registry, constructing it from `env` on first use.
///
/// `env` is ignored once the instance exists. Without an instance and
/// without `env` this fails with [`SettingsError::RegistryNotInitialized`].
pub fn get_instance(env: Option<RegistryEnv>) -> Result<Arc<Registry>, SettingsError> {
    if let Some(existing) = INSTANCE.read().as_ref() {
        return Ok(existing.clone());
    }
    let Some(env) = env else {
        return Err(SettingsError::RegistryNotInitialized);
    };

    let mut slot = INSTANCE.write();
    if let Some(existing) = slot.as_ref() {
        return Ok(existing.clone());
    }
    let registry = Registry::new(env)?;
    *slot = Some(registry.clone());
    tracing::info!("Session settings registry created");
    Ok(registry)
}

/// Session registry if it has been constructed
pub fn try_instance() -> Option<Arc<Registry>> {
    INSTANCE.read().clone()
}

/// Shut down and forget the session registry; a later `get_instance(Some(..))`
/// builds a fresh one. Returns whether an instance existed.
pub fn teardown() -> bool {
    let taken = INSTANCE.write().take();
    match taken {
        Some(registry) => {
            registry.shutdown();
            true
        }
        None => false,
    }
}
