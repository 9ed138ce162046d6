//! Settings registry - module hosting and bulk orchestration

use super::base::{ModuleEnv, Propagation};
use super::dependents::dependents_of;
use super::events::{ListenerId, ListenerSet, ModuleEvent, SettingsListener};
use super::executor::{Job, SerialExecutor, ThreadDispatcher, UiDispatcher};
use super::module::SettingsModule;
use super::validation::{parse_export_document, validate_identifier};
use super::version::is_version_compatible;
use crate::config::RegistryConfig;
use crate::contract::{
    ExportDocument, ImportReport, ProtectedStore, SettingValue, SettingsError, StoreFactory,
};
use crate::infra::storage::{
    FileProtectedStore, FileStoreFactory, MemoryProtectedStore, MemoryStoreFactory,
};
use dashmap::DashMap;
use indexmap::IndexMap;
use parking_lot::{Mutex, RwLock};
use std::any::{Any, TypeId};
use std::collections::BTreeSet;
use std::marker::PhantomData;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;

/// File name of the protected store inside `data_dir`
pub const PROTECTED_STORE_FILE: &str = "protected.json";

/// Completion callback for queued bulk operations, run on the UI context
pub type BulkCallback = Box<dyn FnOnce(bool) + Send + 'static>;

/// Completion callback for asynchronous imports, run on the UI context
pub type ImportCallback = Box<dyn FnOnce(Result<ImportReport, SettingsError>) + Send + 'static>;

/// Collaborators a registry is built from
pub struct RegistryEnv {
    pub stores: Arc<dyn StoreFactory>,
    pub protected: Arc<dyn ProtectedStore>,
    /// UI context for listener delivery; a dedicated thread when `None`
    pub dispatcher: Option<Arc<dyn UiDispatcher>>,
    pub config: RegistryConfig,
}

impl RegistryEnv {
    pub fn new(stores: Arc<dyn StoreFactory>, protected: Arc<dyn ProtectedStore>) -> Self {
        Self {
            stores,
            protected,
            dispatcher: None,
            config: RegistryConfig::default(),
        }
    }

    /// Session-only stores
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryStoreFactory::new()),
            Arc::new(MemoryProtectedStore::new()),
        )
    }

    /// File-backed stores under `config.data_dir`, or in-memory stores when
    /// no data directory is configured
    pub fn from_config(config: RegistryConfig) -> Result<Self, SettingsError> {
        let env = match &config.data_dir {
            Some(dir) => Self::new(
                Arc::new(FileStoreFactory::new(dir)),
                Arc::new(FileProtectedStore::open(dir.join(PROTECTED_STORE_FILE))?),
            ),
            None => Self::in_memory(),
        };
        Ok(env.with_config(config))
    }

    pub fn with_config(mut self, config: RegistryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: Arc<dyn UiDispatcher>) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }
}

/// Whether a bulk operation runs on the caller or on the background worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecMode {
    Sync,
    Async,
}

/// Typed token returned by [`Registry::register_module`]
pub struct ModuleHandle<T> {
    id: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ModuleHandle<T> {
    fn new(id: String) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<T> Clone for ModuleHandle<T> {
    fn clone(&self) -> Self {
        Self::new(self.id.clone())
    }
}

impl<T> std::fmt::Debug for ModuleHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle").field("id", &self.id).finish()
    }
}

struct ModuleEntry {
    module: Arc<dyn SettingsModule>,
    any: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
}

/// Republishes module events to global listeners on the UI context
struct GlobalFanout {
    listeners: Arc<ListenerSet>,
    dispatcher: Arc<dyn UiDispatcher>,
}

impl GlobalFanout {
    fn publish(&self, event: ModuleEvent) {
        let listeners = self.listeners.clone();
        self.dispatcher
            .dispatch(Box::new(move || listeners.notify(&event)));
    }

    fn run_on_ui(&self, task: Job) {
        self.dispatcher.dispatch(task);
    }
}

impl SettingsListener for GlobalFanout {
    fn on_event(&self, event: &ModuleEvent) {
        self.publish(event.clone());
    }
}

/// Central orchestrator hosting all settings modules
pub struct Registry {
    me: Weak<Registry>,
    config: RegistryConfig,
    stores: Arc<dyn StoreFactory>,
    protected: Arc<dyn ProtectedStore>,
    /// Registration order is preserved
    modules: RwLock<IndexMap<String, ModuleEntry>>,
    by_type: DashMap<TypeId, String>,
    fanout: Arc<GlobalFanout>,
    initialized: AtomicBool,
    /// Serializes initialize and shutdown
    lifecycle: Mutex<()>,
    worker: SerialExecutor,
    /// Owned UI thread when the host supplied no dispatcher
    ui_thread: Option<Arc<ThreadDispatcher>>,
}

impl Registry {
    /// Create a registry and start its background worker
    pub fn new(env: RegistryEnv) -> Result<Arc<Self>, SettingsError> {
        let worker = SerialExecutor::spawn("settings-worker")?;
        let (dispatcher, ui_thread) = match env.dispatcher {
            Some(dispatcher) => (dispatcher, None),
            None => {
                let thread = Arc::new(ThreadDispatcher::spawn()?);
                let dispatcher: Arc<dyn UiDispatcher> = thread.clone();
                (dispatcher, Some(thread))
            }
        };

        tracing::debug!(version = %env.config.version, "Settings registry created");

        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            config: env.config,
            stores: env.stores,
            protected: env.protected,
            modules: RwLock::new(IndexMap::new()),
            by_type: DashMap::new(),
            fanout: Arc::new(GlobalFanout {
                listeners: Arc::new(ListenerSet::new()),
                dispatcher,
            }),
            initialized: AtomicBool::new(false),
            lifecycle: Mutex::new(()),
            worker,
            ui_thread,
        }))
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Current export/import schema version
    pub fn version(&self) -> &str {
        &self.config.version
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    // ===== Lifecycle =====

    /// Register the built-in modules (when configured) and load every
    /// module in registration order.
    ///
    /// A module that fails to load is logged and skipped; the registry is
    /// initialized either way. Returns whether every module loaded.
    ///
    /// Concurrent callers wait for the first one; modules load once.
    pub fn initialize(&self) -> bool {
        let _lifecycle = self.lifecycle.lock();
        if self.is_initialized() {
            tracing::debug!("Settings registry already initialized");
            return true;
        }

        if self.config.register_builtin_modules {
            crate::features::register_builtins(self);
            self.order_builtins_first();
        }

        let mut failed = Vec::new();
        for (id, module) in self.entries() {
            if self.bring_up(&id, &module).is_err() {
                failed.push(id);
            }
        }

        self.initialized.store(true, Ordering::Release);
        tracing::info!(
            modules = self.modules.read().len(),
            failed = failed.len(),
            "Settings registry initialized"
        );
        if !failed.is_empty() {
            tracing::warn!(?failed, "Some settings modules failed to load");
        }
        failed.is_empty()
    }

    /// Built-ins in their fixed order, then host modules in registration order
    fn order_builtins_first(&self) {
        let rank = |id: &str| {
            crate::features::BUILTIN_MODULE_IDS
                .iter()
                .position(|builtin| *builtin == id)
                .unwrap_or(usize::MAX)
        };
        self.modules
            .write()
            .sort_by(|a, _, b, _| rank(a).cmp(&rank(b)));
    }

    fn module_env(&self, id: &str) -> Result<ModuleEnv, SettingsError> {
        Ok(
            ModuleEnv::open(id, self.stores.clone(), self.protected.clone())?
                .with_legacy_dir(self.config.legacy_dir.clone())
                .with_strict_import(self.config.strict_import),
        )
    }

    fn bring_up(&self, id: &str, module: &Arc<dyn SettingsModule>) -> Result<(), SettingsError> {
        isolate(id, "load", || {
            module.initialize(self.module_env(id)?)?;
            module.base().attach_sink(self.fanout.clone());
            module.load_settings()
        })
    }

    /// Drain the worker, save dirty modules, clean up every module and stop
    /// the worker and UI threads
    pub fn shutdown(&self) {
        let _lifecycle = self.lifecycle.lock();
        self.worker.shutdown();

        if self.is_initialized() && !self.save_all_now() {
            tracing::warn!("Some settings modules failed to save during shutdown");
        }
        for (_, module) in self.entries() {
            module.base().detach_sink();
            module.cleanup();
        }
        self.initialized.store(false, Ordering::Release);

        if let Some(ui) = &self.ui_thread {
            ui.shutdown();
        }
        tracing::info!("Settings registry shut down");
    }

    // ===== Registration and lookup =====

    /// Insert or replace a module by id.
    ///
    /// When the registry is already initialized the module is loaded right
    /// away, exactly as it would have been during `initialize`.
    pub fn register_module<T: SettingsModule>(
        &self,
        module: Arc<T>,
    ) -> Result<ModuleHandle<T>, SettingsError> {
        let id = module.id().to_string();
        validate_identifier(&id)?;
        for key in module.defaults().keys() {
            validate_identifier(key)?;
        }

        let any: Arc<dyn Any + Send + Sync> = module.clone();
        let dyn_module: Arc<dyn SettingsModule> = module;
        let entry = ModuleEntry {
            module: dyn_module.clone(),
            any,
            type_id: TypeId::of::<T>(),
        };

        let previous = self.modules.write().insert(id.clone(), entry);
        if let Some(previous) = previous {
            if previous.type_id != TypeId::of::<T>() {
                self.by_type.remove(&previous.type_id);
            }
            previous.module.base().detach_sink();
            previous.module.cleanup();
            tracing::debug!(module = %id, "Replaced registered module");
        }
        self.by_type.insert(TypeId::of::<T>(), id.clone());

        if self.is_initialized() && self.bring_up(&id, &dyn_module).is_err() {
            tracing::warn!(module = %id, "Late-registered module failed to load");
        }

        Ok(ModuleHandle::new(id))
    }

    /// Module by id; `None` for unknown ids
    pub fn get_module(&self, id: &str) -> Option<Arc<dyn SettingsModule>> {
        self.modules.read().get(id).map(|e| e.module.clone())
    }

    /// Module by concrete type
    pub fn module<T: SettingsModule>(&self) -> Option<Arc<T>> {
        let id = self.by_type.get(&TypeId::of::<T>())?.value().clone();
        self.downcast(&id)
    }

    /// Module behind a registration handle
    pub fn resolve<T: SettingsModule>(&self, handle: &ModuleHandle<T>) -> Option<Arc<T>> {
        self.downcast(handle.id())
    }

    fn downcast<T: SettingsModule>(&self, id: &str) -> Option<Arc<T>> {
        let any = self.modules.read().get(id)?.any.clone();
        any.downcast::<T>().ok()
    }

    pub fn contains_module(&self, id: &str) -> bool {
        self.modules.read().contains_key(id)
    }

    /// Registered ids in registration order
    pub fn module_ids(&self) -> Vec<String> {
        self.modules.read().keys().cloned().collect()
    }

    fn entries(&self) -> Vec<(String, Arc<dyn SettingsModule>)> {
        self.modules
            .read()
            .iter()
            .map(|(id, e)| (id.clone(), e.module.clone()))
            .collect()
    }

    fn ensure_initialized(&self, operation: &str) -> Result<(), SettingsError> {
        if self.is_initialized() {
            Ok(())
        } else {
            tracing::warn!(operation, "Settings registry used before initialize");
            Err(SettingsError::RegistryNotInitialized)
        }
    }

    // ===== Bulk operations =====

    pub fn save_all(&self, mode: ExecMode) -> bool {
        match mode {
            ExecMode::Sync => self.save_all_now(),
            ExecMode::Async => self.save_all_async(None),
        }
    }

    /// Queue a save of every dirty module; returns whether it was accepted
    pub fn save_all_async(&self, callback: Option<BulkCallback>) -> bool {
        self.enqueue_bulk("save_all", callback, Registry::save_all_now)
    }

    /// Save dirty modules; true only if every attempted save succeeded
    pub fn save_all_now(&self) -> bool {
        if self.ensure_initialized("save_all").is_err() {
            return false;
        }
        let mut ok = true;
        let mut saved = 0usize;
        for (id, module) in self.entries() {
            if !module.is_dirty() {
                continue;
            }
            match isolate(&id, "save", || module.save_settings()) {
                Ok(()) => saved += 1,
                Err(_) => ok = false,
            }
        }
        tracing::debug!(saved, ok, "Saved settings modules");
        ok
    }

    pub fn reload_all(&self, mode: ExecMode) -> bool {
        match mode {
            ExecMode::Sync => self.reload_all_now(),
            ExecMode::Async => self.reload_all_async(None),
        }
    }

    pub fn reload_all_async(&self, callback: Option<BulkCallback>) -> bool {
        self.enqueue_bulk("reload_all", callback, Registry::reload_all_now)
    }

    /// Reload every module from storage, discarding unsaved changes
    pub fn reload_all_now(&self) -> bool {
        if self.ensure_initialized("reload_all").is_err() {
            return false;
        }
        let mut ok = true;
        for (id, module) in self.entries() {
            if isolate(&id, "reload", || module.load_settings()).is_err() {
                ok = false;
            }
        }
        ok
    }

    pub fn reset_all(&self, mode: ExecMode) -> bool {
        match mode {
            ExecMode::Sync => self.reset_all_now(),
            ExecMode::Async => self.reset_all_async(None),
        }
    }

    pub fn reset_all_async(&self, callback: Option<BulkCallback>) -> bool {
        self.enqueue_bulk("reset_all", callback, Registry::reset_all_now)
    }

    /// Reset every module; global listeners see a single registry-wide reset
    pub fn reset_all_now(&self) -> bool {
        if self.ensure_initialized("reset_all").is_err() {
            return false;
        }
        let mut ok = true;
        for (id, module) in self.entries() {
            if isolate(&id, "reset", || module.base().reset(Propagation::LocalOnly)).is_err() {
                ok = false;
            }
        }
        self.fanout.publish(ModuleEvent::reset_all());
        tracing::info!(ok, "Reset all settings modules");
        ok
    }

    fn enqueue_bulk(
        &self,
        operation: &'static str,
        callback: Option<BulkCallback>,
        run: fn(&Registry) -> bool,
    ) -> bool {
        let me = self.me.clone();
        let fanout = self.fanout.clone();
        let accepted = self
            .worker
            .submit(Box::new(move || {
                let ok = match me.upgrade() {
                    Some(registry) => run(&registry),
                    None => {
                        tracing::debug!(operation, "Registry dropped before bulk operation ran");
                        false
                    }
                };
                if let Some(callback) = callback {
                    fanout.run_on_ui(Box::new(move || callback(ok)));
                }
            }))
            .is_ok();
        if !accepted {
            tracing::warn!(operation, "Background worker rejected bulk operation");
        }
        accepted
    }

    // ===== Export / import =====

    /// Export every module; a module whose export fails is omitted
    pub fn export_all_settings(
        &self,
        include_sensitive: bool,
    ) -> Result<ExportDocument, SettingsError> {
        self.ensure_initialized("export")?;
        let mut modules = IndexMap::new();
        for (id, module) in self.entries() {
            if let Ok(doc) = isolate(&id, "export", || module.on_export(include_sensitive)) {
                modules.insert(id, doc);
            }
        }
        Ok(ExportDocument {
            version: self.config.version.clone(),
            export_timestamp: chrono::Utc::now().timestamp_millis(),
            modules,
        })
    }

    /// Queue an import on the background worker; `callback` receives the
    /// outcome on the UI context. Returns whether the import was accepted.
    pub fn import_settings(&self, document: ExportDocument, callback: ImportCallback) -> bool {
        let me = self.me.clone();
        let fanout = self.fanout.clone();
        let accepted = self
            .worker
            .submit(Box::new(move || {
                let result = match me.upgrade() {
                    Some(registry) => registry.import_settings_now(&document),
                    None => Err(SettingsError::RegistryNotInitialized),
                };
                fanout.run_on_ui(Box::new(move || callback(result)));
            }))
            .is_ok();
        if !accepted {
            tracing::warn!("Background worker rejected import");
        }
        accepted
    }

    /// Apply a document synchronously.
    ///
    /// The version gate runs before any module is touched. Each module
    /// section is applied in isolation; sections for unknown modules are
    /// skipped.
    pub fn import_settings_now(
        &self,
        document: &ExportDocument,
    ) -> Result<ImportReport, SettingsError> {
        self.ensure_initialized("import")?;
        if !is_version_compatible(&document.version, &self.config.version) {
            tracing::warn!(
                imported = %document.version,
                current = %self.config.version,
                "Rejecting import with incompatible version"
            );
            return Err(SettingsError::IncompatibleVersion {
                imported: document.version.clone(),
                current: self.config.version.clone(),
            });
        }

        let mut report = ImportReport {
            version: document.version.clone(),
            ..ImportReport::default()
        };
        for (id, section) in &document.modules {
            let Some(module) = self.get_module(id) else {
                tracing::warn!(module = %id, "Skipping import section for unknown module");
                report.skipped.push(id.clone());
                continue;
            };
            match isolate(id, "import", || module.on_import(section)) {
                Ok(applied) => {
                    tracing::debug!(module = %id, applied, "Imported module settings");
                    report.imported.push(id.clone());
                }
                Err(e) => report.failed.push((id.clone(), e.to_string())),
            }
        }

        self.fanout.publish(ModuleEvent::imported(&document.version));
        tracing::info!(
            version = %document.version,
            imported = report.imported.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "Settings import finished"
        );
        Ok(report)
    }

    /// Parse, shape-check and apply a JSON document
    pub fn import_settings_json(&self, text: &str) -> Result<ImportReport, SettingsError> {
        let document = parse_export_document(text, self.config.max_document_bytes)?;
        self.import_settings_now(&document)
    }

    // ===== Per-key access =====

    /// Current value of `module_id.key`, falling back to its default
    pub fn get_setting(&self, module_id: &str, key: &str) -> Option<SettingValue> {
        let module = self.get_module(module_id)?;
        match module.base().get_value(key) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(module = %module_id, key = %key, error = %e, "Failed to read setting");
                None
            }
        }
    }

    /// Validate and write one value; failures are logged and reported as `false`
    pub fn set_setting(&self, module_id: &str, key: &str, value: SettingValue) -> bool {
        let Some(module) = self.get_module(module_id) else {
            tracing::warn!(module = %module_id, key = %key, "Ignoring write to unknown module");
            return false;
        };
        match module.set_validated(key, value) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(module = %module_id, key = %key, error = %e, "Ignoring failed settings write");
                false
            }
        }
    }

    /// Modules that should refresh when `module_id` changes
    pub fn get_dependent_modules(&self, module_id: &str) -> BTreeSet<&'static str> {
        dependents_of(module_id)
    }

    // ===== Global listeners =====

    pub fn add_global_listener(&self, listener: Arc<dyn SettingsListener>) -> ListenerId {
        self.fanout.listeners.add(listener)
    }

    pub fn remove_global_listener(&self, id: ListenerId) -> bool {
        self.fanout.listeners.remove(id)
    }

    // ===== State =====

    pub fn is_dirty(&self) -> bool {
        self.modules.read().values().any(|e| e.module.is_dirty())
    }

    pub fn dirty_modules(&self) -> Vec<String> {
        self.modules
            .read()
            .iter()
            .filter(|(_, e)| e.module.is_dirty())
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Resolves once every job queued on the worker so far has finished and
    /// every callback it dispatched has run on the UI context
    pub async fn wait_idle(&self) -> Result<(), SettingsError> {
        self.worker
            .barrier()?
            .await
            .map_err(|_| SettingsError::WorkerStopped)?;

        let (done_tx, done_rx) = oneshot::channel();
        self.fanout.run_on_ui(Box::new(move || {
            let _ = done_tx.send(());
        }));
        done_rx.await.map_err(|_| SettingsError::WorkerStopped)
    }
}

/// Run one module operation, turning errors and panics into a logged,
/// module-scoped failure
fn isolate<R>(
    module_id: &str,
    operation: &'static str,
    f: impl FnOnce() -> Result<R, SettingsError>,
) -> Result<R, SettingsError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            tracing::error!(module = %module_id, operation, error = %e, "Module operation failed");
            Err(e)
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            tracing::error!(module = %module_id, operation, %reason, "Module operation panicked");
            Err(SettingsError::module_failed(module_id, reason))
        }
    }
}
