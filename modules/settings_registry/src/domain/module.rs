//! Module contract
//!
//! Every feature module implements [`SettingsModule`]. Only `base()` and
//! `as_any()` are required; the rest is provided on top of [`BaseModule`]
//! and may be overridden (typically `validate`).

use super::base::{BaseModule, ModuleEnv, Propagation};
use super::events::{ListenerId, SettingsListener};
use crate::contract::{
    ModuleDescriptor, ModuleDocument, SettingValue, SettingsError, SettingsMap, ValidationResult,
};
use std::any::Any;
use std::collections::BTreeSet;
use std::sync::Arc;

pub trait SettingsModule: Send + Sync + 'static {
    /// Shared storage scaffolding
    fn base(&self) -> &BaseModule;

    /// Get as Any for downcasting
    fn as_any(&self) -> &dyn Any;

    fn descriptor(&self) -> &ModuleDescriptor {
        self.base().descriptor()
    }

    fn id(&self) -> &str {
        self.base().id()
    }

    /// Declared defaults; pure
    fn defaults(&self) -> &SettingsMap {
        self.descriptor().defaults()
    }

    fn sensitive_keys(&self) -> &BTreeSet<String> {
        self.descriptor().sensitive_keys()
    }

    /// Check a candidate value without touching state
    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        self.base().validate_declared(key, value)
    }

    fn initialize(&self, env: ModuleEnv) -> Result<(), SettingsError> {
        self.base().initialize(env)
    }

    fn load_settings(&self) -> Result<(), SettingsError> {
        self.base().load()
    }

    fn save_settings(&self) -> Result<(), SettingsError> {
        self.base().save()
    }

    /// Live snapshot; replaced, never mutated, by writers
    fn current_settings(&self) -> Result<Arc<SettingsMap>, SettingsError> {
        self.base().snapshot()
    }

    fn on_export(&self, include_sensitive: bool) -> Result<ModuleDocument, SettingsError> {
        self.base().export(include_sensitive)
    }

    /// Merge `doc` into current settings; returns the number of keys applied
    fn on_import(&self, doc: &ModuleDocument) -> Result<usize, SettingsError> {
        self.base()
            .import_with(doc, |key, value| self.validate(key, value))
    }

    fn reset_to_defaults(&self) -> Result<(), SettingsError> {
        self.base().reset(Propagation::Global)
    }

    fn is_dirty(&self) -> bool {
        self.base().is_dirty()
    }

    fn cleanup(&self) {
        self.base().cleanup()
    }

    fn add_listener(&self, listener: Arc<dyn SettingsListener>) -> ListenerId {
        self.base().add_listener(listener)
    }

    fn remove_listener(&self, id: ListenerId) -> bool {
        self.base().remove_listener(id)
    }

    /// Validate, then persist the (possibly coerced) value
    fn set_validated(&self, key: &str, value: SettingValue) -> Result<SettingValue, SettingsError> {
        let result = self.validate(key, &value);
        let to_persist = result
            .value_to_persist(value)
            .map_err(|message| SettingsError::Validation {
                module: self.id().to_string(),
                key: key.to_string(),
                message,
            })?;
        self.base().set_value(key, to_persist.clone())?;
        Ok(to_persist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::ModuleCategory;
    use crate::domain::validation::clamp_int;
    use crate::infra::storage::{MemoryProtectedStore, MemoryStoreFactory};

    struct Sample {
        base: BaseModule,
    }

    impl SettingsModule for Sample {
        fn base(&self) -> &BaseModule {
            &self.base
        }

        fn as_any(&self) -> &dyn Any {
            self
        }

        fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
            match key {
                "size" => clamp_int(value, 1, 10),
                _ => self.base.validate_declared(key, value),
            }
        }
    }

    fn sample() -> Sample {
        let base = BaseModule::new(
            ModuleDescriptor::new("sample", "Sample", ModuleCategory::Editor)
                .with_default("size", 5)
                .with_default("label", "x"),
        );
        let env = ModuleEnv::open(
            "sample",
            Arc::new(MemoryStoreFactory::new()),
            Arc::new(MemoryProtectedStore::new()),
        )
        .unwrap();
        base.initialize(env).unwrap();
        Sample { base }
    }

    #[test]
    fn test_set_validated_persists_coerced_value() {
        let module = sample();
        let stored = module.set_validated("size", SettingValue::Int(50)).unwrap();
        assert_eq!(stored, SettingValue::Int(10));
        assert_eq!(
            module.current_settings().unwrap().get("size"),
            Some(&SettingValue::Int(10))
        );
    }

    #[test]
    fn test_set_validated_rejects_without_side_effects() {
        let module = sample();
        let err = module
            .set_validated("label", SettingValue::Int(3))
            .unwrap_err();
        assert!(matches!(err, SettingsError::Validation { .. }));
        assert!(!module.is_dirty());
        assert_eq!(
            module.current_settings().unwrap().get("label"),
            Some(&SettingValue::from("x"))
        );
    }
}
