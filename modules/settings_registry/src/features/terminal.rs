//! Terminal settings and shell aliases
//!
//! Aliases are stored as dynamic `alias_<name>` keys. The module migrates the
//! legacy `terminal.conf` (`key=value` lines) on first load.

use crate::contract::{
    ModuleCategory, ModuleDescriptor, SettingValue, SettingsError, ValidationResult,
};
use crate::domain::migration::{migrate_then_load, LegacyAdapter, LegacyFormat};
use crate::domain::validation::{boolean, clamp_int, one_of, text, validate_identifier};
use crate::domain::{BaseModule, SettingsModule};
use std::any::Any;
use std::collections::BTreeMap;

pub const MODULE_ID: &str = "terminal";
pub const LEGACY_FILE: &str = "terminal.conf";
pub const ALIAS_PREFIX: &str = "alias_";

pub mod keys {
    pub const SHELL: &str = "shell";
    pub const FONT_SIZE: &str = "font_size";
    pub const SCROLLBACK_LINES: &str = "scrollback_lines";
    pub const CURSOR_STYLE: &str = "cursor_style";
    pub const COPY_ON_SELECT: &str = "copy_on_select";
}

const CURSOR_STYLES: &[&str] = &["block", "underline", "bar"];

fn alias_key(name: &str) -> String {
    format!("{ALIAS_PREFIX}{name}")
}

pub struct TerminalModule {
    base: BaseModule,
}

impl Default for TerminalModule {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalModule {
    pub fn new() -> Self {
        Self {
            base: BaseModule::new(Self::describe()),
        }
    }

    pub fn describe() -> ModuleDescriptor {
        ModuleDescriptor::new(MODULE_ID, "Terminal", ModuleCategory::Terminal)
            .with_default(keys::SHELL, "/bin/bash")
            .with_default(keys::FONT_SIZE, 13)
            .with_default(keys::SCROLLBACK_LINES, 10_000)
            .with_default(keys::CURSOR_STYLE, "block")
            .with_default(keys::COPY_ON_SELECT, false)
            .with_dynamic_prefix(ALIAS_PREFIX)
    }

    pub fn shell(&self) -> Result<String, SettingsError> {
        self.base.get_string(keys::SHELL, "/bin/bash")
    }

    pub fn set_shell(&self, shell: &str) -> Result<(), SettingsError> {
        self.set_validated(keys::SHELL, SettingValue::from(shell))
            .map(|_| ())
    }

    pub fn scrollback_lines(&self) -> Result<i32, SettingsError> {
        self.base.get_int(keys::SCROLLBACK_LINES, 10_000)
    }

    /// Aliases keyed by name, without the storage prefix
    pub fn get_all_aliases(&self) -> Result<BTreeMap<String, String>, SettingsError> {
        let snapshot = self.current_settings()?;
        Ok(snapshot
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix(ALIAS_PREFIX)?;
                if name.is_empty() {
                    return None;
                }
                Some((name.to_string(), value.as_str()?.to_string()))
            })
            .collect())
    }

    pub fn get_alias(&self, name: &str) -> Result<Option<String>, SettingsError> {
        Ok(self
            .base
            .get_value(&alias_key(name))?
            .and_then(|v| v.as_str().map(str::to_string)))
    }

    pub fn set_alias(&self, name: &str, command: &str) -> Result<(), SettingsError> {
        validate_identifier(name)?;
        self.set_validated(&alias_key(name), SettingValue::from(command))
            .map(|_| ())
    }

    pub fn remove_alias(&self, name: &str) -> Result<(), SettingsError> {
        self.base.remove_value(&alias_key(name))
    }
}

impl SettingsModule for TerminalModule {
    fn base(&self) -> &BaseModule {
        &self.base
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn validate(&self, key: &str, value: &SettingValue) -> ValidationResult {
        match key {
            keys::SHELL => text(value, false),
            keys::FONT_SIZE => clamp_int(value, 6, 72),
            keys::SCROLLBACK_LINES => clamp_int(value, 100, 1_000_000),
            keys::CURSOR_STYLE => one_of(value, CURSOR_STYLES),
            keys::COPY_ON_SELECT => boolean(value),
            _ if self.base.descriptor().is_dynamic_key(key) => text(value, false),
            _ => self.base.validate_declared(key, value),
        }
    }

    fn load_settings(&self) -> Result<(), SettingsError> {
        migrate_then_load(self).map(|_| ())
    }
}

impl LegacyAdapter for TerminalModule {
    fn legacy_format(&self) -> LegacyFormat {
        LegacyFormat::KeyValue
    }

    fn legacy_file_name(&self) -> &str {
        LEGACY_FILE
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::testing::initialized;

    #[test]
    fn test_alias_crud() {
        let module = initialized(TerminalModule::new());
        module.set_alias("ll", "ls -la").unwrap();
        module.set_alias("gs", "git status").unwrap();

        let aliases = module.get_all_aliases().unwrap();
        assert_eq!(aliases.get("ll").map(String::as_str), Some("ls -la"));
        assert_eq!(aliases.len(), 2);

        module.remove_alias("ll").unwrap();
        assert_eq!(module.get_alias("ll").unwrap(), None);
        assert_eq!(module.get_all_aliases().unwrap().len(), 1);
    }

    #[test]
    fn test_alias_rejects_bad_name_and_empty_command() {
        let module = initialized(TerminalModule::new());
        assert!(module.set_alias("bad name", "x").is_err());
        assert!(module.set_alias("empty", "   ").is_err());
    }

    #[test]
    fn test_import_from_legacy_format_goes_through_setters() {
        let module = initialized(TerminalModule::new());
        let applied = module
            .import_from_legacy_format("alias_ll=ls -la\n# comment\nscrollback_lines=50\nunknown=1\n")
            .unwrap();

        assert_eq!(applied, 2);
        assert!(module.is_dirty());
        // Clamped by validation
        assert_eq!(module.scrollback_lines().unwrap(), 100);
    }

    #[test]
    fn test_to_legacy_format_renders_aliases() {
        let module = initialized(TerminalModule::new());
        module.set_alias("gs", "git status").unwrap();
        let rendered = module.to_legacy_format().unwrap();
        assert!(rendered.contains("alias_gs=git status\n"));
        assert!(rendered.contains("shell=/bin/bash\n"));
    }
}
