//! Language server settings

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::validation::{boolean, clamp_int, one_of, text};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;

pub const MODULE_ID: &str = "lsp";

pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const DIAGNOSTICS_DELAY_MS: &str = "diagnostics_delay_ms";
    pub const COMPLETION_TRIGGER_CHARS: &str = "completion_trigger_chars";
    pub const MAX_COMPLETION_ITEMS: &str = "max_completion_items";
    pub const LOG_LEVEL: &str = "log_level";
    pub const INLAY_HINTS: &str = "inlay_hints";
}

const LOG_LEVELS: &[&str] = &["off", "error", "warn", "info", "debug", "trace"];

pub struct LspModule {
    base: BaseModule,
}

impl Default for LspModule {
    fn default() -> Self {
        Self::new()
    }
}

impl LspModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "Language Server", ModuleCategory::Language)
            .with_default(keys::ENABLED, true)
            .with_default(keys::DIAGNOSTICS_DELAY_MS, 500)
            .with_default(keys::COMPLETION_TRIGGER_CHARS, ".:")
            .with_default(keys::MAX_COMPLETION_ITEMS, 100)
            .with_default(keys::LOG_LEVEL, "warn")
            .with_default(keys::INLAY_HINTS, true)
    }

    pub fn enabled(&self) -> Result<bool, SettingsError> {
        self.base.get_bool(keys::ENABLED, true)
    }

    pub fn set_log_level(&self, level: &str) -> Result<(), SettingsError> {
        self.set_validated(keys::LOG_LEVEL, SettingValue::from(level))
            .map(|_| ())
    }
}

impl SettingsModule for LspModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::DIAGNOSTICS_DELAY_MS => clamp_int(value, 0, 10_000),
            keys::MAX_COMPLETION_ITEMS => clamp_int(value, 1, 1_000),
            keys::COMPLETION_TRIGGER_CHARS => text(value, true),
            keys::LOG_LEVEL => one_of(value, LOG_LEVELS),
            keys::ENABLED | keys::INLAY_HINTS => boolean(value),
            _ => self.base.validate_declared(key, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::testing::initialized;

    #[test]
    fn test_log_level_accepts_known_levels_only() {
        let module = initialized(LspModule::new());
        module.set_log_level("DEBUG").unwrap();
        assert_eq!(
            module.base().get_string(keys::LOG_LEVEL, "").unwrap(),
            "debug"
        );
        assert!(module.set_log_level("verbose").is_err());
        assert!(module.enabled().unwrap());
    }
}
