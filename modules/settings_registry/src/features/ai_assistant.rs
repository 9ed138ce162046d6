//! AI assistant settings

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::validation::{boolean, clamp_float, clamp_int, clamp_long, one_of, text};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;

pub const MODULE_ID: &str = "ai_assistant";

pub mod keys {
    pub const ENABLED: &str = "enabled";
    pub const PROVIDER: &str = "provider";
    pub const MODEL: &str = "model";
    pub const ENDPOINT_URL: &str = "endpoint_url";
    pub const TEMPERATURE: &str = "temperature";
    pub const MAX_TOKENS: &str = "max_tokens";
    pub const REQUEST_TIMEOUT_MS: &str = "request_timeout_ms";
    /// Sensitive
    pub const API_KEY: &str = "api_key";
}

const PROVIDERS: &[&str] = &["local", "openai", "azure", "custom"];

pub struct AiAssistantModule {
    base: BaseModule,
}

impl Default for AiAssistantModule {
    fn default() -> Self {
        Self::new()
    }
}

impl AiAssistantModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "AI Assistant", ModuleCategory::Assistant)
            .with_default(keys::ENABLED, false)
            .with_default(keys::PROVIDER, "local")
            .with_default(keys::MODEL, "default")
            .with_default(keys::ENDPOINT_URL, "")
            .with_default(keys::TEMPERATURE, 0.2f32)
            .with_default(keys::MAX_TOKENS, 1024)
            .with_default(keys::REQUEST_TIMEOUT_MS, 30_000i64)
            .with_sensitive(keys::API_KEY, "")
    }

    pub fn api_key(&self) -> Result<String, SettingsError> {
        self.base.get_string(keys::API_KEY, "")
    }

    pub fn set_api_key(&self, key: &str) -> Result<(), SettingsError> {
        self.base.set_string(keys::API_KEY, key)
    }

    pub fn temperature(&self) -> Result<f32, SettingsError> {
        self.base.get_float(keys::TEMPERATURE, 0.2)
    }

    pub fn set_temperature(&self, temperature: f32) -> Result<(), SettingsError> {
        self.set_validated(keys::TEMPERATURE, SettingValue::Float(temperature))
            .map(|_| ())
    }
}

impl SettingsModule for AiAssistantModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::PROVIDER => one_of(value, PROVIDERS),
            keys::MODEL => text(value, false),
            keys::ENDPOINT_URL => match value.as_str().map(str::trim) {
                Some(url) if url.is_empty() || url.starts_with("http://") || url.starts_with("https://") => {
                    text(value, true)
                }
                _ => ValidationResult::invalid("endpoint must be an http(s) URL"),
            },
            keys::API_KEY => text(value, true),
            keys::TEMPERATURE => clamp_float(value, 0.0, 2.0),
            keys::MAX_TOKENS => clamp_int(value, 1, 32_768),
            keys::REQUEST_TIMEOUT_MS => clamp_long(value, 1_000, 600_000),
            keys::ENABLED => boolean(value),
            _ => self.base.validate_declared(key, value),
        }
    }
}
