//! UI theme settings

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::validation::{boolean, clamp_float, clamp_int, one_of};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;

pub const MODULE_ID: &str = "ui_theme";

pub mod keys {
    pub const THEME_MODE: &str = "theme_mode";
    pub const ACCENT_COLOR: &str = "accent_color";
    pub const UI_FONT_SIZE: &str = "ui_font_size";
    pub const UI_SCALE: &str = "ui_scale";
    pub const HIGH_CONTRAST: &str = "high_contrast";
    pub const ANIMATIONS_ENABLED: &str = "animations_enabled";
}

const THEME_MODES: &[&str] = &["DARK", "LIGHT", "SYSTEM"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeMode {
    Dark,
    Light,
    System,
}

impl ThemeMode {
    pub fn as_str(self) -> &'static str {
        match self {
            ThemeMode::Dark => "DARK",
            ThemeMode::Light => "LIGHT",
            ThemeMode::System => "SYSTEM",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "DARK" => Some(ThemeMode::Dark),
            "LIGHT" => Some(ThemeMode::Light),
            "SYSTEM" => Some(ThemeMode::System),
            _ => None,
        }
    }
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub struct UiThemeModule {
    base: BaseModule,
}

impl Default for UiThemeModule {
    fn default() -> Self {
        Self::new()
    }
}

impl UiThemeModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "UI Theme", ModuleCategory::Appearance)
            .with_default(keys::THEME_MODE, ThemeMode::Dark.as_str())
            .with_default(keys::ACCENT_COLOR, "#3574F0")
            .with_default(keys::UI_FONT_SIZE, 13)
            .with_default(keys::UI_SCALE, 1.0f32)
            .with_default(keys::HIGH_CONTRAST, false)
            .with_default(keys::ANIMATIONS_ENABLED, true)
    }

    pub fn theme_mode(&self) -> Result<ThemeMode, SettingsError> {
        let raw = self
            .base
            .get_string(keys::THEME_MODE, ThemeMode::Dark.as_str())?;
        Ok(ThemeMode::parse(&raw).unwrap_or(ThemeMode::Dark))
    }

    pub fn set_theme_mode(&self, mode: ThemeMode) -> Result<(), SettingsError> {
        self.base.set_string(keys::THEME_MODE, mode.as_str())
    }

    pub fn accent_color(&self) -> Result<String, SettingsError> {
        self.base.get_string(keys::ACCENT_COLOR, "#3574F0")
    }

    pub fn set_accent_color(&self, color: &str) -> Result<(), SettingsError> {
        self.set_validated(keys::ACCENT_COLOR, SettingValue::from(color))
            .map(|_| ())
    }

    pub fn ui_scale(&self) -> Result<f32, SettingsError> {
        self.base.get_float(keys::UI_SCALE, 1.0)
    }

    pub fn set_ui_scale(&self, scale: f32) -> Result<(), SettingsError> {
        self.set_validated(keys::UI_SCALE, SettingValue::Float(scale))
            .map(|_| ())
    }

    pub fn high_contrast(&self) -> Result<bool, SettingsError> {
        self.base.get_bool(keys::HIGH_CONTRAST, false)
    }
}

impl SettingsModule for UiThemeModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::THEME_MODE => one_of(value, THEME_MODES),
            keys::ACCENT_COLOR => match value.as_str() {
                Some(color) if is_hex_color(color) => ValidationResult::valid(),
                _ => ValidationResult::invalid("accent color must look like #RRGGBB"),
            },
            keys::UI_FONT_SIZE => clamp_int(value, 8, 32),
            keys::UI_SCALE => clamp_float(value, 0.5, 3.0),
            keys::HIGH_CONTRAST | keys::ANIMATIONS_ENABLED => boolean(value),
            _ => self.base.validate_declared(key, value),
        }
    }
}
