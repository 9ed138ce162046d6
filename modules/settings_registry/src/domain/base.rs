//! Base module scaffolding
//!
//! [`BaseModule`] implements the storage side of the module contract on top
//! of a [`KeyValueStore`] and the shared [`ProtectedStore`]: typed accessors,
//! sensitive-key routing, snapshot replacement, dirty tracking and listener
//! fan-out.

use super::events::{ListenerId, ListenerSet, ModuleEvent, SettingsListener};
use super::routing::{self, decode_protected, protected_key};
use crate::contract::{
    KeyValueStore, ModuleDescriptor, ModuleDocument, ProtectedStore, Route, SettingEntry,
    SettingValue, SettingsError, SettingsMap, StoreError, StoreFactory, ValidationResult,
};
use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::{ReentrantMutex, RwLock};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Collaborators handed to a module by `initialize`
pub struct ModuleEnv {
    /// Plain store for this module's namespace
    pub store: Arc<dyn KeyValueStore>,
    /// Protected store shared by all modules
    pub protected: Arc<dyn ProtectedStore>,
    /// Factory for auxiliary namespaces (migration markers)
    pub stores: Arc<dyn StoreFactory>,
    /// Directory holding legacy flat files, if any
    pub legacy_dir: Option<PathBuf>,
    /// Reject malformed typed entries on import instead of keeping them as strings
    pub strict_import: bool,
}

impl ModuleEnv {
    /// Open the module's namespace on `stores`
    pub fn open(
        module_id: &str,
        stores: Arc<dyn StoreFactory>,
        protected: Arc<dyn ProtectedStore>,
    ) -> Result<Self, SettingsError> {
        Ok(Self {
            store: stores.open(module_id)?,
            protected,
            stores,
            legacy_dir: None,
            strict_import: false,
        })
    }

    pub fn with_legacy_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.legacy_dir = dir;
        self
    }

    pub fn with_strict_import(mut self, strict: bool) -> Self {
        self.strict_import = strict;
        self
    }
}

/// Whether an event is also republished to the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    /// Module listeners and the registry's global listeners
    Global,
    /// Module listeners only
    LocalOnly,
}

/// Shared implementation of a module's storage and notification behavior
pub struct BaseModule {
    descriptor: ModuleDescriptor,
    env: ArcSwapOption<ModuleEnv>,
    snapshot: ArcSwap<SettingsMap>,
    /// Bumped on every write; the module is dirty while it differs from `saved_revision`
    revision: AtomicU64,
    saved_revision: AtomicU64,
    listeners: ListenerSet,
    sink: RwLock<Option<Arc<dyn SettingsListener>>>,
    // Reentrant so listeners may write back into the module
    write_lock: ReentrantMutex<()>,
}

impl BaseModule {
    pub fn new(descriptor: ModuleDescriptor) -> Self {
        let defaults = descriptor.defaults().clone();
        Self {
            descriptor,
            env: ArcSwapOption::empty(),
            snapshot: ArcSwap::from_pointee(defaults),
            revision: AtomicU64::new(0),
            saved_revision: AtomicU64::new(0),
            listeners: ListenerSet::new(),
            sink: RwLock::new(None),
            write_lock: ReentrantMutex::new(()),
        }
    }

    pub fn descriptor(&self) -> &ModuleDescriptor {
        &self.descriptor
    }

    pub fn id(&self) -> &str {
        &self.descriptor.id
    }

    // ===== Lifecycle =====

    pub fn initialize(&self, env: ModuleEnv) -> Result<(), SettingsError> {
        let _guard = self.write_lock.lock();
        self.env.store(Some(Arc::new(env)));
        self.snapshot
            .store(Arc::new(self.descriptor.defaults().clone()));
        let rev = self.revision.load(Ordering::Acquire);
        self.saved_revision.store(rev, Ordering::Release);
        tracing::debug!(module = %self.id(), "Module initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.env.load().is_some()
    }

    /// Collaborators, or an uninitialized-module error
    pub fn env(&self) -> Result<Arc<ModuleEnv>, SettingsError> {
        self.env
            .load_full()
            .ok_or_else(|| SettingsError::uninitialized(self.id()))
    }

    /// Rebuild the snapshot from storage: defaults, overlaid with plain
    /// values, overlaid with protected values for sensitive keys.
    ///
    /// Writes the store still buffers are unsaved changes and are dropped.
    pub fn load(&self) -> Result<(), SettingsError> {
        let env = self.env()?;
        env.store.discard_pending()?;
        let mut next = self.descriptor.defaults().clone();
        let mut relocated = false;

        for (key, value) in env.store.get_all()? {
            if !self.descriptor.owns_key(&key) {
                tracing::debug!(module = %self.id(), key = %key, "Ignoring undeclared stored key");
                continue;
            }
            if self.descriptor.is_sensitive(&key) {
                // Plaintext copy of a sensitive key: move it behind the protected store
                env.protected
                    .put(&protected_key(self.id(), &key), &value.to_wire_string())?;
                env.store.remove(&key)?;
                relocated = true;
                tracing::info!(module = %self.id(), key = %key, "Moved sensitive key to protected store");
            }
            next.insert(key, value);
        }

        for key in self.descriptor.sensitive_keys() {
            if let Some(raw) = env.protected.get(&protected_key(self.id(), key))? {
                let kind = self
                    .descriptor
                    .expected_type(key)
                    .unwrap_or(crate::contract::SettingType::String);
                next.insert(key.clone(), decode_protected(kind, &raw));
            }
        }

        if relocated {
            env.store.flush()?;
        }

        let _guard = self.write_lock.lock();
        self.snapshot.store(Arc::new(next));
        let rev = self.revision.load(Ordering::Acquire);
        self.saved_revision.store(rev, Ordering::Release);
        Ok(())
    }

    /// Commit buffered writes; the dirty flag clears only after success
    pub fn save(&self) -> Result<(), SettingsError> {
        let env = self.env()?;
        let rev = self.revision.load(Ordering::Acquire);
        env.store.flush()?;
        self.saved_revision.fetch_max(rev, Ordering::AcqRel);
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.revision.load(Ordering::Acquire) != self.saved_revision.load(Ordering::Acquire)
    }

    /// Release collaborators; later accessor calls fail as uninitialized
    pub fn cleanup(&self) {
        let _guard = self.write_lock.lock();
        self.env.store(None);
        *self.sink.write() = None;
        tracing::debug!(module = %self.id(), "Module cleaned up");
    }

    // ===== Reads =====

    /// Live snapshot of current settings
    pub fn snapshot(&self) -> Result<Arc<SettingsMap>, SettingsError> {
        self.env()?;
        Ok(self.snapshot.load_full())
    }

    /// Current value, falling back to the declared default
    pub fn get_value(&self, key: &str) -> Result<Option<SettingValue>, SettingsError> {
        let snapshot = self.snapshot()?;
        Ok(snapshot
            .get(key)
            .or_else(|| self.descriptor.defaults().get(key))
            .cloned())
    }

    pub fn get_string(&self, key: &str, default: &str) -> Result<String, SettingsError> {
        Ok(match self.get_value(key)? {
            Some(SettingValue::String(s)) => s,
            Some(other) => other.to_wire_string(),
            None => default.to_string(),
        })
    }

    pub fn get_int(&self, key: &str, default: i32) -> Result<i32, SettingsError> {
        Ok(self
            .get_value(key)?
            .and_then(|v| v.as_i32())
            .unwrap_or(default))
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, SettingsError> {
        Ok(self
            .get_value(key)?
            .and_then(|v| v.as_bool())
            .unwrap_or(default))
    }

    pub fn get_float(&self, key: &str, default: f32) -> Result<f32, SettingsError> {
        Ok(self
            .get_value(key)?
            .and_then(|v| v.as_f32())
            .unwrap_or(default))
    }

    pub fn get_long(&self, key: &str, default: i64) -> Result<i64, SettingsError> {
        Ok(self
            .get_value(key)?
            .and_then(|v| v.as_i64())
            .unwrap_or(default))
    }

    // ===== Writes =====

    pub fn set_string(&self, key: &str, value: &str) -> Result<(), SettingsError> {
        self.set_value(key, SettingValue::from(value))
    }

    pub fn set_int(&self, key: &str, value: i32) -> Result<(), SettingsError> {
        self.set_value(key, SettingValue::Int(value))
    }

    pub fn set_bool(&self, key: &str, value: bool) -> Result<(), SettingsError> {
        self.set_value(key, SettingValue::Bool(value))
    }

    pub fn set_float(&self, key: &str, value: f32) -> Result<(), SettingsError> {
        self.set_value(key, SettingValue::Float(value))
    }

    pub fn set_long(&self, key: &str, value: i64) -> Result<(), SettingsError> {
        self.set_value(key, SettingValue::Long(value))
    }

    /// Write one value: store, dirty flag, change notification
    pub fn set_value(&self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
        self.apply(vec![(key.to_string(), Some(value))], Propagation::Global)
    }

    /// Remove a key; declared keys fall back to their default
    pub fn remove_value(&self, key: &str) -> Result<(), SettingsError> {
        self.apply(vec![(key.to_string(), None)], Propagation::Global)
    }

    /// Apply a batch of writes as one snapshot replacement.
    ///
    /// If the store fails part-way, the writes that reached storage are still
    /// published and the store error is returned.
    pub fn apply(
        &self,
        changes: Vec<(String, Option<SettingValue>)>,
        propagation: Propagation,
    ) -> Result<(), SettingsError> {
        let env = self.env()?;
        let _guard = self.write_lock.lock();

        let mut next = (*self.snapshot.load_full()).clone();
        let mut applied = Vec::with_capacity(changes.len());
        let mut failure = None;

        for (key, value) in changes {
            if let Err(e) = self.persist(&env, &key, value.as_ref()) {
                tracing::warn!(module = %self.id(), key = %key, error = %e, "Failed to persist setting");
                failure = Some(e);
                break;
            }
            let effective = match value {
                Some(v) => Some(v),
                None => self.descriptor.defaults().get(&key).cloned(),
            };
            match &effective {
                Some(v) => next.insert(key.clone(), v.clone()),
                None => next.remove(&key),
            };
            applied.push((key, effective));
        }

        if !applied.is_empty() {
            self.snapshot.store(Arc::new(next));
            self.revision.fetch_add(1, Ordering::AcqRel);
            for (key, value) in applied {
                self.emit(ModuleEvent::changed(self.id(), &key, value), propagation);
            }
        }

        match failure {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }

    fn persist(
        &self,
        env: &ModuleEnv,
        key: &str,
        value: Option<&SettingValue>,
    ) -> Result<(), StoreError> {
        match (routing::route(&self.descriptor, key), value) {
            (Route::Protected, Some(v)) => env
                .protected
                .put(&protected_key(self.id(), key), &v.to_wire_string()),
            (Route::Protected, None) => env.protected.remove(&protected_key(self.id(), key)),
            (Route::Plain, Some(v)) => env.store.set(key, v.clone()),
            (Route::Plain, None) => env.store.remove(key),
        }
    }

    /// Persist entries without touching the snapshot or notifying anyone,
    /// then flush. Used by one-time migrations that run before loading.
    pub fn write_through(&self, entries: &[SettingEntry]) -> Result<usize, SettingsError> {
        let env = self.env()?;
        let _guard = self.write_lock.lock();
        for entry in entries {
            self.persist(&env, &entry.key, Some(&entry.value))?;
        }
        env.store.flush()?;
        Ok(entries.len())
    }

    /// Restore defaults, clearing stored overrides and protected values
    pub fn reset(&self, propagation: Propagation) -> Result<(), SettingsError> {
        let env = self.env()?;
        let _guard = self.write_lock.lock();

        env.store.clear()?;
        for key in self.descriptor.sensitive_keys() {
            env.protected.remove(&protected_key(self.id(), key))?;
        }
        self.snapshot
            .store(Arc::new(self.descriptor.defaults().clone()));
        let rev = self.revision.fetch_add(1, Ordering::AcqRel) + 1;

        env.store.flush()?;
        self.saved_revision.fetch_max(rev, Ordering::AcqRel);

        tracing::info!(module = %self.id(), "Settings reset to defaults");
        self.emit(ModuleEvent::reset(self.id()), propagation);
        Ok(())
    }

    // ===== Export / import =====

    /// Current settings as a document; sensitive keys are omitted entirely
    /// unless `include_sensitive`
    pub fn export(&self, include_sensitive: bool) -> Result<ModuleDocument, SettingsError> {
        let snapshot = self.snapshot()?;
        let mut doc = ModuleDocument::new();
        for (key, value) in snapshot.iter() {
            if !include_sensitive && self.descriptor.is_sensitive(key) {
                continue;
            }
            doc.insert(key.clone(), value);
        }
        Ok(doc)
    }

    /// Merge a document into current settings; keys absent from the
    /// document are left untouched. Returns the number of keys applied.
    pub fn import(&self, doc: &ModuleDocument) -> Result<usize, SettingsError> {
        self.import_with(doc, |key, value| self.validate_declared(key, value))
    }

    /// [`BaseModule::import`] with a module-specific validator. Parsed values
    /// are clamped or rejected exactly as a per-key write would be.
    pub fn import_with<F>(&self, doc: &ModuleDocument, validate: F) -> Result<usize, SettingsError>
    where
        F: Fn(&str, &SettingValue) -> ValidationResult,
    {
        let strict = self.env()?.strict_import;
        let mut changes = Vec::with_capacity(doc.len());

        for (key, wire) in doc.iter() {
            if !self.descriptor.owns_key(key) {
                tracing::warn!(module = %self.id(), key = %key, "Skipping unknown key on import");
                continue;
            }
            let raw = wire.raw_text();
            let value = match SettingValue::parse(wire.kind, &raw) {
                Some(value) => match validate(key, &value).value_to_persist(value) {
                    Ok(value) => value,
                    Err(message) => {
                        tracing::warn!(
                            module = %self.id(), key = %key, reason = %message,
                            "Rejecting invalid entry on import"
                        );
                        continue;
                    }
                },
                None if strict => {
                    tracing::warn!(
                        module = %self.id(), key = %key, kind = %wire.kind,
                        "Rejecting malformed entry on import"
                    );
                    continue;
                }
                None => {
                    tracing::warn!(
                        module = %self.id(), key = %key, kind = %wire.kind,
                        "Malformed entry imported as string"
                    );
                    SettingValue::String(raw)
                }
            };
            changes.push((key.to_string(), Some(value)));
        }

        let count = changes.len();
        if count > 0 {
            self.apply(changes, Propagation::Global)?;
        }
        Ok(count)
    }

    // ===== Validation =====

    /// Check that `key` is declared and `value` has (or losslessly converts
    /// to) the declared type
    pub fn validate_declared(&self, key: &str, value: &SettingValue) -> ValidationResult {
        let Some(kind) = self.descriptor.expected_type(key) else {
            return ValidationResult::invalid(format!(
                "unknown setting '{}' in module '{}'",
                key,
                self.id()
            ));
        };
        match value.coerce_to(kind) {
            Some(v) if v == *value => ValidationResult::valid(),
            Some(v) => ValidationResult::coerced(v),
            None => ValidationResult::invalid(format!(
                "expected {} for '{}', got {}",
                kind,
                key,
                value.kind()
            )),
        }
    }

    // ===== Listeners =====

    pub fn add_listener(&self, listener: Arc<dyn SettingsListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_listener(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    /// Forward `Global` events to `sink` (the registry)
    pub fn attach_sink(&self, sink: Arc<dyn SettingsListener>) {
        *self.sink.write() = Some(sink);
    }

    pub fn detach_sink(&self) {
        *self.sink.write() = None;
    }

    fn emit(&self, event: ModuleEvent, propagation: Propagation) {
        self.listeners.notify(&event);
        if propagation == Propagation::Global {
            let sink = self.sink.read().clone();
            if let Some(sink) = sink {
                sink.on_event(&event);
            }
        }
    }
}
