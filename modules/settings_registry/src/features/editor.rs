//! Editor settings

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::validation::{boolean, clamp_int, clamp_long, one_of, text};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;

pub const MODULE_ID: &str = "editor";

pub mod keys {
    pub const FONT_FAMILY: &str = "font_family";
    pub const FONT_SIZE: &str = "font_size";
    pub const TAB_SIZE: &str = "tab_size";
    pub const INSERT_SPACES: &str = "insert_spaces";
    pub const WORD_WRAP: &str = "word_wrap";
    pub const LINE_NUMBERS: &str = "line_numbers";
    pub const AUTO_SAVE: &str = "auto_save";
    pub const AUTO_SAVE_DELAY_MS: &str = "auto_save_delay_ms";
    pub const FORMAT_ON_SAVE: &str = "format_on_save";
}

pub const WORD_WRAP_MODES: &[&str] = &["off", "on", "bounded"];

pub struct EditorModule {
    base: BaseModule,
}

impl Default for EditorModule {
    fn default() -> Self {
        Self::new()
    }
}

impl EditorModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "Editor", ModuleCategory::Editor)
            .with_default(keys::FONT_FAMILY, "JetBrains Mono")
            .with_default(keys::FONT_SIZE, 14)
            .with_default(keys::TAB_SIZE, 4)
            .with_default(keys::INSERT_SPACES, true)
            .with_default(keys::WORD_WRAP, "off")
            .with_default(keys::LINE_NUMBERS, true)
            .with_default(keys::AUTO_SAVE, false)
            .with_default(keys::AUTO_SAVE_DELAY_MS, 1000i64)
            .with_default(keys::FORMAT_ON_SAVE, false)
    }

    pub fn font_size(&self) -> Result<i32, SettingsError> {
        self.base.get_int(keys::FONT_SIZE, 14)
    }

    /// Clamped to 6..=72; returns the stored size
    pub fn set_font_size(&self, size: i32) -> Result<i32, SettingsError> {
        let stored = self.set_validated(keys::FONT_SIZE, SettingValue::Int(size))?;
        Ok(stored.as_i32().unwrap_or(size))
    }

    pub fn tab_size(&self) -> Result<i32, SettingsError> {
        self.base.get_int(keys::TAB_SIZE, 4)
    }

    pub fn set_tab_size(&self, size: i32) -> Result<(), SettingsError> {
        self.set_validated(keys::TAB_SIZE, SettingValue::Int(size))
            .map(|_| ())
    }

    pub fn font_family(&self) -> Result<String, SettingsError> {
        self.base.get_string(keys::FONT_FAMILY, "JetBrains Mono")
    }

    pub fn set_word_wrap(&self, mode: &str) -> Result<(), SettingsError> {
        self.set_validated(keys::WORD_WRAP, SettingValue::from(mode))
            .map(|_| ())
    }

    pub fn auto_save_delay_ms(&self) -> Result<i64, SettingsError> {
        self.base.get_long(keys::AUTO_SAVE_DELAY_MS, 1000)
    }
}

impl SettingsModule for EditorModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::FONT_FAMILY => text(value, false),
            keys::FONT_SIZE => clamp_int(value, 6, 72),
            keys::TAB_SIZE => clamp_int(value, 1, 16),
            keys::WORD_WRAP => one_of(value, WORD_WRAP_MODES),
            keys::AUTO_SAVE_DELAY_MS => clamp_long(value, 100, 600_000),
            keys::INSERT_SPACES | keys::LINE_NUMBERS | keys::AUTO_SAVE | keys::FORMAT_ON_SAVE => {
                boolean(value)
            }
            _ => self.base.validate_declared(key, value),
        }
    }
}
