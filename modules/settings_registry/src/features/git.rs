//! Version control settings

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::validation::{boolean, clamp_int, text};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;

pub const MODULE_ID: &str = "git";

pub mod keys {
    pub const USER_NAME: &str = "user_name";
    pub const USER_EMAIL: &str = "user_email";
    pub const DEFAULT_BRANCH: &str = "default_branch";
    pub const AUTO_FETCH: &str = "auto_fetch";
    pub const FETCH_INTERVAL_MINUTES: &str = "fetch_interval_minutes";
    pub const SIGN_COMMITS: &str = "sign_commits";
    /// Sensitive
    pub const AUTH_TOKEN: &str = "auth_token";
}

pub struct GitModule {
    base: BaseModule,
}

impl Default for GitModule {
    fn default() -> Self {
        Self::new()
    }
}

impl GitModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "Git", ModuleCategory::VersionControl)
            .with_default(keys::USER_NAME, "")
            .with_default(keys::USER_EMAIL, "")
            .with_default(keys::DEFAULT_BRANCH, "main")
            .with_default(keys::AUTO_FETCH, true)
            .with_default(keys::FETCH_INTERVAL_MINUTES, 15)
            .with_default(keys::SIGN_COMMITS, false)
            .with_sensitive(keys::AUTH_TOKEN, "")
    }

    pub fn user_name(&self) -> Result<String, SettingsError> {
        self.base.get_string(keys::USER_NAME, "")
    }

    pub fn set_user_name(&self, name: &str) -> Result<(), SettingsError> {
        self.set_validated(keys::USER_NAME, SettingValue::from(name))
            .map(|_| ())
    }

    pub fn set_user_email(&self, email: &str) -> Result<(), SettingsError> {
        self.set_validated(keys::USER_EMAIL, SettingValue::from(email))
            .map(|_| ())
    }

    pub fn auth_token(&self) -> Result<String, SettingsError> {
        self.base.get_string(keys::AUTH_TOKEN, "")
    }

    pub fn set_auth_token(&self, token: &str) -> Result<(), SettingsError> {
        self.base.set_string(keys::AUTH_TOKEN, token)
    }

    pub fn fetch_interval_minutes(&self) -> Result<i32, SettingsError> {
        self.base.get_int(keys::FETCH_INTERVAL_MINUTES, 15)
    }
}

impl SettingsModule for GitModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::USER_NAME | keys::AUTH_TOKEN => text(value, true),
            keys::USER_EMAIL => match value.as_str().map(str::trim) {
                Some("") => text(value, true),
                Some(email) if email.contains('@') => text(value, true),
                _ => ValidationResult::invalid("email address must contain '@'"),
            },
            keys::DEFAULT_BRANCH => text(value, false),
            keys::FETCH_INTERVAL_MINUTES => clamp_int(value, 1, 1440),
            keys::AUTO_FETCH | keys::SIGN_COMMITS => boolean(value),
            _ => self.base.validate_declared(key, value),
        }
    }
}
