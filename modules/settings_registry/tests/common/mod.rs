//! Common test utilities: staged output, instrumented stores and a
//! deliberately faulty module

#![allow(dead_code)]

use parking_lot::Mutex;
use settings_registry::contract::{
    KeyValueStore, ModuleCategory, ModuleDescriptor, ModuleDocument, SettingValue, SettingsMap,
    StoreError, StoreFactory,
};
use settings_registry::domain::{BaseModule, ModuleEvent, SettingsModule};
use settings_registry::infra::storage::{MemoryProtectedStore, MemoryStore};
use settings_registry::{Registry, RegistryConfig, RegistryEnv};
use std::any::Any;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

pub fn print_test_header(test_name: &str, purpose: &[&str]) {
    println!("\n🧪 TEST: {}", test_name);
    if let Some(first) = purpose.first() {
        println!("📋 PURPOSE: {}", first);
    }
    for line in purpose.iter().skip(1) {
        println!("   {}", line);
    }
}

pub fn print_json(label: &str, value: &impl serde::Serialize) {
    println!(
        "   {}: {}",
        label,
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "N/A".to_string())
    );
}

/// In-memory store that counts mutations and can be told to fail flushes
pub struct CountingStore {
    inner: MemoryStore,
    writes: AtomicUsize,
    fail_flush: AtomicBool,
}

impl CountingStore {
    fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            writes: AtomicUsize::new(0),
            fail_flush: AtomicBool::new(false),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_flush(&self, fail: bool) {
        self.fail_flush.store(fail, Ordering::SeqCst);
    }
}

impl KeyValueStore for CountingStore {
    fn get(&self, key: &str) -> Result<Option<SettingValue>, StoreError> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: SettingValue) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.remove(key)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.clear()
    }

    fn get_all(&self) -> Result<SettingsMap, StoreError> {
        self.inner.get_all()
    }

    fn flush(&self) -> Result<(), StoreError> {
        if self.fail_flush.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable {
                namespace: "counting".to_string(),
                reason: "flush disabled by test".to_string(),
            });
        }
        Ok(())
    }

    fn discard_pending(&self) -> Result<(), StoreError> {
        self.inner.discard_pending()
    }
}

/// Factory handing out one [`CountingStore`] per namespace
#[derive(Default)]
pub struct CountingStoreFactory {
    stores: Mutex<HashMap<String, Arc<CountingStore>>>,
}

impl CountingStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store(&self, namespace: &str) -> Arc<CountingStore> {
        self.stores
            .lock()
            .entry(namespace.to_string())
            .or_insert_with(|| Arc::new(CountingStore::new()))
            .clone()
    }

    pub fn total_writes(&self) -> usize {
        self.stores.lock().values().map(|s| s.writes()).sum()
    }
}

impl StoreFactory for CountingStoreFactory {
    fn open(&self, namespace: &str) -> Result<Arc<dyn KeyValueStore>, StoreError> {
        Ok(self.store(namespace))
    }
}

/// Stage at which [`FaultyModule`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Load,
    Save,
    Export,
    Import,
}

/// Module that fails (or panics) at one lifecycle stage
pub struct FaultyModule {
    base: BaseModule,
    fail_on: FailOn,
    panic: bool,
}

impl FaultyModule {
    pub fn new(id: &str, fail_on: FailOn, panic: bool) -> Self {
        Self {
            base: BaseModule::new(
                ModuleDescriptor::new(id, "Faulty", ModuleCategory::Editor)
                    .with_default("level", 1)
                    .with_default("label", "faulty"),
            ),
            fail_on,
            panic,
        }
    }

    fn fail<T>(&self, stage: FailOn) -> Option<Result<T, settings_registry::SettingsError>> {
        if self.fail_on != stage {
            return None;
        }
        if self.panic {
            panic!("{} exploded during {:?}", self.id(), stage);
        }
        Some(Err(settings_registry::SettingsError::module_failed(
            self.id(),
            format!("{:?} failed", stage),
        )))
    }
}

impl SettingsModule for FaultyModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn load_settings(&self) -> Result<(), settings_registry::SettingsError> {
        self.fail(FailOn::Load).unwrap_or_else(|| self.base.load())
    }

    fn save_settings(&self) -> Result<(), settings_registry::SettingsError> {
        self.fail(FailOn::Save).unwrap_or_else(|| self.base.save())
    }

    fn on_export(&self, include_sensitive: bool) -> Result<ModuleDocument, settings_registry::SettingsError> {
        self.fail(FailOn::Export)
            .unwrap_or_else(|| self.base.export(include_sensitive))
    }

    fn on_import(&self, doc: &ModuleDocument) -> Result<usize, settings_registry::SettingsError> {
        self.fail(FailOn::Import).unwrap_or_else(|| self.base.import(doc))
    }
}

/// Collected global events plus the thread each one arrived on
#[derive(Clone, Default)]
pub struct EventLog {
    events: Arc<Mutex<Vec<(ModuleEvent, Option<String>)>>>,
}

impl EventLog {
    pub fn attach(&self, registry: &Registry) {
        let events = self.events.clone();
        registry.add_global_listener(Arc::new(move |event: &ModuleEvent| {
            let thread = std::thread::current().name().map(str::to_string);
            events.lock().push((event.clone(), thread));
        }));
    }

    pub fn events(&self) -> Vec<ModuleEvent> {
        self.events.lock().iter().map(|(e, _)| e.clone()).collect()
    }

    pub fn threads(&self) -> Vec<Option<String>> {
        self.events.lock().iter().map(|(_, t)| t.clone()).collect()
    }

    pub fn clear(&self) {
        self.events.lock().clear();
    }
}

/// Registry on counting stores, with builtins and a default UI thread
pub struct TestRegistry {
    pub registry: Arc<Registry>,
    pub stores: Arc<CountingStoreFactory>,
    pub protected: Arc<MemoryProtectedStore>,
}

pub fn config(builtins: bool, legacy_dir: Option<PathBuf>) -> RegistryConfig {
    RegistryConfig {
        register_builtin_modules: builtins,
        legacy_dir,
        ..RegistryConfig::default()
    }
}

pub fn build_registry(config: RegistryConfig) -> TestRegistry {
    let stores = Arc::new(CountingStoreFactory::new());
    let protected = Arc::new(MemoryProtectedStore::new());
    build_registry_on(stores, protected, config)
}

pub fn build_registry_on(
    stores: Arc<CountingStoreFactory>,
    protected: Arc<MemoryProtectedStore>,
    config: RegistryConfig,
) -> TestRegistry {
    let env = RegistryEnv::new(stores.clone(), protected.clone()).with_config(config);
    let registry = Registry::new(env).expect("Failed to create registry");
    TestRegistry {
        registry,
        stores,
        protected,
    }
}

/// Initialized registry with every built-in module
pub fn builtin_registry() -> TestRegistry {
    let test = build_registry(config(true, None));
    assert!(test.registry.initialize(), "all built-in modules should load");
    test
}
