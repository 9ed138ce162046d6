//! File browser settings

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::validation::{boolean, clamp_int, one_of};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;

pub const MODULE_ID: &str = "file_browser";

pub mod keys {
    pub const SHOW_HIDDEN: &str = "show_hidden";
    pub const SORT_ORDER: &str = "sort_order";
    pub const FOLLOW_SYMLINKS: &str = "follow_symlinks";
    pub const CONFIRM_DELETE: &str = "confirm_delete";
    pub const PREVIEW_MAX_KB: &str = "preview_max_kb";
}

const SORT_ORDERS: &[&str] = &["name", "size", "modified", "type"];

pub struct FileBrowserModule {
    base: BaseModule,
}

impl Default for FileBrowserModule {
    fn default() -> Self {
        Self::new()
    }
}

impl FileBrowserModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "File Browser", ModuleCategory::Files)
            .with_default(keys::SHOW_HIDDEN, false)
            .with_default(keys::SORT_ORDER, "name")
            .with_default(keys::FOLLOW_SYMLINKS, false)
            .with_default(keys::CONFIRM_DELETE, true)
            .with_default(keys::PREVIEW_MAX_KB, 512)
    }

    pub fn show_hidden(&self) -> Result<bool, SettingsError> {
        self.base.get_bool(keys::SHOW_HIDDEN, false)
    }

    pub fn set_show_hidden(&self, show: bool) -> Result<(), SettingsError> {
        self.base.set_bool(keys::SHOW_HIDDEN, show)
    }

    pub fn sort_order(&self) -> Result<String, SettingsError> {
        self.base.get_string(keys::SORT_ORDER, "name")
    }
}

impl SettingsModule for FileBrowserModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::SORT_ORDER => one_of(value, SORT_ORDERS),
            keys::PREVIEW_MAX_KB => clamp_int(value, 0, 65_536),
            keys::SHOW_HIDDEN | keys::FOLLOW_SYMLINKS | keys::CONFIRM_DELETE => boolean(value),
            _ => self.base.validate_declared(key, value),
        }
    }
}
