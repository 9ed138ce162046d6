//! Build settings
//!
//! Migrates the legacy `build.xml` (`<build><key>value</key>...</build>`)
//! on first load. The signing key password never appears in the legacy
//! rendering.

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::migration::{migrate_then_load, LegacyAdapter, LegacyFormat};
use crate::domain::validation::{boolean, clamp_int, clamp_long, text};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;

pub const MODULE_ID: &str = "build";
pub const LEGACY_FILE: &str = "build.xml";

pub mod keys {
    pub const BUILD_COMMAND: &str = "build_command";
    pub const OUTPUT_DIR: &str = "output_dir";
    pub const PARALLEL_JOBS: &str = "parallel_jobs";
    pub const CLEAN_BEFORE_BUILD: &str = "clean_before_build";
    pub const BUILD_TIMEOUT_MS: &str = "build_timeout_ms";
    pub const SIGNING_KEY_PATH: &str = "signing_key_path";
    /// Sensitive
    pub const SIGNING_KEY_PASSWORD: &str = "signing_key_password";
}

pub struct BuildModule {
    base: BaseModule,
}

impl Default for BuildModule {
    fn default() -> Self {
        Self::new()
    }
}

impl BuildModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "Build", ModuleCategory::Build)
            .with_default(keys::BUILD_COMMAND, "make")
            .with_default(keys::OUTPUT_DIR, "build")
            .with_default(keys::PARALLEL_JOBS, 4)
            .with_default(keys::CLEAN_BEFORE_BUILD, false)
            .with_default(keys::BUILD_TIMEOUT_MS, 600_000i64)
            .with_default(keys::SIGNING_KEY_PATH, "")
            .with_sensitive(keys::SIGNING_KEY_PASSWORD, "")
    }

    pub fn build_command(&self) -> Result<String, SettingsError> {
        self.base.get_string(keys::BUILD_COMMAND, "make")
    }

    pub fn parallel_jobs(&self) -> Result<i32, SettingsError> {
        self.base.get_int(keys::PARALLEL_JOBS, 4)
    }

    pub fn set_parallel_jobs(&self, jobs: i32) -> Result<(), SettingsError> {
        self.set_validated(keys::PARALLEL_JOBS, SettingValue::Int(jobs))
            .map(|_| ())
    }

    pub fn build_timeout_ms(&self) -> Result<i64, SettingsError> {
        self.base.get_long(keys::BUILD_TIMEOUT_MS, 600_000)
    }

    pub fn set_signing_key_password(&self, password: &str) -> Result<(), SettingsError> {
        self.base.set_string(keys::SIGNING_KEY_PASSWORD, password)
    }
}

impl SettingsModule for BuildModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::BUILD_COMMAND | keys::OUTPUT_DIR => text(value, false),
            keys::SIGNING_KEY_PATH | keys::SIGNING_KEY_PASSWORD => text(value, true),
            keys::PARALLEL_JOBS => clamp_int(value, 1, 256),
            keys::BUILD_TIMEOUT_MS => clamp_long(value, 1_000, 86_400_000),
            keys::CLEAN_BEFORE_BUILD => boolean(value),
            _ => self.base.validate_declared(key, value),
        }
    }

    fn load_settings(&self) -> Result<(), SettingsError> {
        migrate_then_load(self).map(|_| ())
    }
}

impl LegacyAdapter for BuildModule {
    fn legacy_format(&self) -> LegacyFormat {
        LegacyFormat::Tagged
    }

    fn legacy_file_name(&self) -> &str {
        LEGACY_FILE
    }
}
