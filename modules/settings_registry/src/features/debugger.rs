//! Debugger settings

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::validation::{boolean, clamp_int, clamp_long, one_of};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;

pub const MODULE_ID: &str = "debugger";

pub mod keys {
    pub const BREAK_ON_EXCEPTION: &str = "break_on_exception";
    pub const SHOW_INLINE_VALUES: &str = "show_inline_values";
    pub const MAX_VARIABLE_DEPTH: &str = "max_variable_depth";
    pub const ATTACH_TIMEOUT_MS: &str = "attach_timeout_ms";
    pub const CONSOLE_MODE: &str = "console_mode";
}

const CONSOLE_MODES: &[&str] = &["integrated", "external", "internal"];

pub struct DebuggerModule {
    base: BaseModule,
}

impl Default for DebuggerModule {
    fn default() -> Self {
        Self::new()
    }
}

impl DebuggerModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "Debugger", ModuleCategory::Debugging)
            .with_default(keys::BREAK_ON_EXCEPTION, false)
            .with_default(keys::SHOW_INLINE_VALUES, true)
            .with_default(keys::MAX_VARIABLE_DEPTH, 5)
            .with_default(keys::ATTACH_TIMEOUT_MS, 10_000i64)
            .with_default(keys::CONSOLE_MODE, "integrated")
    }

    pub fn break_on_exception(&self) -> Result<bool, SettingsError> {
        self.base.get_bool(keys::BREAK_ON_EXCEPTION, false)
    }

    pub fn set_break_on_exception(&self, enabled: bool) -> Result<(), SettingsError> {
        self.base.set_bool(keys::BREAK_ON_EXCEPTION, enabled)
    }

    pub fn attach_timeout_ms(&self) -> Result<i64, SettingsError> {
        self.base.get_long(keys::ATTACH_TIMEOUT_MS, 10_000)
    }
}

impl SettingsModule for DebuggerModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::MAX_VARIABLE_DEPTH => clamp_int(value, 1, 32),
            keys::ATTACH_TIMEOUT_MS => clamp_long(value, 100, 600_000),
            keys::CONSOLE_MODE => one_of(value, CONSOLE_MODES),
            keys::BREAK_ON_EXCEPTION | keys::SHOW_INLINE_VALUES => boolean(value),
            _ => self.base.validate_declared(key, value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::testing::initialized;

    #[test]
    fn test_attach_timeout_clamped_to_range() {
        let module = initialized(DebuggerModule::new());
        let stored = module
            .set_validated(keys::ATTACH_TIMEOUT_MS, SettingValue::Long(5))
            .unwrap();
        assert_eq!(stored, SettingValue::Long(100));
        assert_eq!(module.attach_timeout_ms().unwrap(), 100);
    }

    #[test]
    fn test_console_mode_is_enumerated() {
        let module = initialized(DebuggerModule::new());
        assert!(module
            .set_validated(keys::CONSOLE_MODE, SettingValue::from("popup"))
            .is_err());
        assert_eq!(
            module
                .set_validated(keys::CONSOLE_MODE, SettingValue::from("External"))
                .unwrap(),
            SettingValue::from("external")
        );
    }
}
