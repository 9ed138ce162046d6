//! Legacy format migration
//!
//! A [`LegacyAdapter`] is a module that also understands one obsolete flat
//! file format. On load, [`migrate_then_load`] imports the legacy file once,
//! records a persisted `migrated` marker and only then loads normally. The
//! marker, not the presence of the file, decides whether migration runs:
//! the legacy file may be kept around for external tools.

use super::module::SettingsModule;
use crate::contract::{SettingEntry, SettingValue, SettingsError};
use regex::Regex;
use std::path::PathBuf;

/// Marker key inside the adapter's marker namespace
pub const MIGRATED_KEY: &str = "migrated";

const TAG_PATTERN: &str = r"<([A-Za-z_][\w.\-]*)>([^<]*)</([A-Za-z_][\w.\-]*)>";

/// Obsolete on-disk formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyFormat {
    /// `key=value` lines, `#` comments and blank lines ignored
    KeyValue,
    /// `<key>value</key>` elements, optionally wrapped in a root element
    Tagged,
}

/// Result of a load that went through migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Legacy file imported; the marker is now set
    Migrated { entries: usize },
    /// Marker already set; the legacy source was not read
    AlreadyMigrated,
    /// No legacy file; nothing to do and the marker stays unset
    NoLegacySource,
}

/// Namespace holding the marker for `module_id`
pub fn marker_namespace(module_id: &str) -> String {
    format!("{module_id}.legacy")
}

/// Split `key=value` lines on the first `=`
pub fn parse_key_value_lines(text: &str) -> Vec<(String, String)> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() {
                return None;
            }
            Some((key.to_string(), value.trim().to_string()))
        })
        .collect()
}

pub fn render_key_value_lines<'a>(entries: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(key);
        out.push('=');
        out.push_str(&value);
        out.push('\n');
    }
    out
}

/// Collect leaf `<key>value</key>` elements; mismatched tags are ignored
pub fn parse_tagged(text: &str) -> Result<Vec<(String, String)>, regex::Error> {
    let tag = Regex::new(TAG_PATTERN)?;
    Ok(tag
        .captures_iter(text)
        .filter(|caps| caps[1] == caps[3])
        .map(|caps| (caps[1].to_string(), unescape_markup(caps[2].trim())))
        .collect())
}

pub fn render_tagged<'a>(root: &str, entries: impl IntoIterator<Item = (&'a str, String)>) -> String {
    let mut out = format!("<{root}>\n");
    for (key, value) in entries {
        out.push_str(&format!("  <{key}>{}</{key}>\n", escape_markup(&value)));
    }
    out.push_str(&format!("</{root}>\n"));
    out
}

fn escape_markup(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn unescape_markup(value: &str) -> String {
    value
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Module that can read and write an obsolete flat-file format
pub trait LegacyAdapter: SettingsModule {
    fn legacy_format(&self) -> LegacyFormat;

    /// File name inside the legacy directory
    fn legacy_file_name(&self) -> &str;

    /// Root element used when rendering the tagged format
    fn legacy_root(&self) -> &str {
        self.id()
    }

    /// Map one raw legacy pair onto a modern entry; `None` drops it
    fn map_legacy_entry(&self, key: &str, raw: &str) -> Option<SettingEntry> {
        let kind = self.descriptor().expected_type(key)?;
        let value = SettingValue::parse(kind, raw)?;
        Some(SettingEntry::new(key, value))
    }

    /// Parse legacy text into entries, validated and coerced
    fn parse_legacy(&self, text: &str) -> Result<Vec<SettingEntry>, SettingsError> {
        let pairs = match self.legacy_format() {
            LegacyFormat::KeyValue => parse_key_value_lines(text),
            LegacyFormat::Tagged => parse_tagged(text).map_err(|e| SettingsError::Migration {
                module: self.id().to_string(),
                reason: e.to_string(),
            })?,
        };

        let mut entries = Vec::with_capacity(pairs.len());
        for (key, raw) in pairs {
            let Some(entry) = self.map_legacy_entry(&key, &raw) else {
                tracing::debug!(module = %self.id(), key = %key, "Dropping unmapped legacy entry");
                continue;
            };
            match self.validate(&entry.key, &entry.value).value_to_persist(entry.value) {
                Ok(value) => entries.push(SettingEntry::new(entry.key, value)),
                Err(message) => {
                    tracing::warn!(module = %self.id(), key = %entry.key, %message, "Invalid legacy entry");
                }
            }
        }
        Ok(entries)
    }

    /// Render current non-sensitive settings in the legacy format
    fn to_legacy_format(&self) -> Result<String, SettingsError> {
        let snapshot = self.current_settings()?;
        let entries = snapshot
            .iter()
            .filter(|(key, _)| !self.descriptor().is_sensitive(key))
            .map(|(key, value)| (key.as_str(), value.to_wire_string()));
        Ok(match self.legacy_format() {
            LegacyFormat::KeyValue => render_key_value_lines(entries),
            LegacyFormat::Tagged => render_tagged(self.legacy_root(), entries),
        })
    }

    /// Re-parse arbitrary legacy text and apply it through the normal
    /// setter path; returns the number of entries applied
    fn import_from_legacy_format(&self, text: &str) -> Result<usize, SettingsError> {
        let mut applied = 0;
        for entry in self.parse_legacy(text)? {
            match self.base().set_value(&entry.key, entry.value) {
                Ok(()) => applied += 1,
                Err(e) => {
                    tracing::warn!(module = %self.id(), key = %entry.key, error = %e, "Failed to apply legacy entry");
                }
            }
        }
        tracing::info!(module = %self.id(), applied, "Imported legacy settings");
        Ok(applied)
    }
}

fn legacy_path<A: LegacyAdapter + ?Sized>(adapter: &A) -> Result<Option<PathBuf>, SettingsError> {
    let env = adapter.base().env()?;
    Ok(env
        .legacy_dir
        .as_ref()
        .map(|dir| dir.join(adapter.legacy_file_name()))
        .filter(|path| path.is_file()))
}

/// Whether the adapter's migration marker is set
pub fn is_migrated<A: LegacyAdapter + ?Sized>(adapter: &A) -> Result<bool, SettingsError> {
    let env = adapter.base().env()?;
    let markers = env.stores.open(&marker_namespace(adapter.id()))?;
    Ok(markers
        .get(MIGRATED_KEY)?
        .and_then(|v| v.as_bool())
        .unwrap_or(false))
}

/// Run the one-time migration if needed, then load normally
pub fn migrate_then_load<A: LegacyAdapter + ?Sized>(
    adapter: &A,
) -> Result<MigrationOutcome, SettingsError> {
    let outcome = if is_migrated(adapter)? {
        MigrationOutcome::AlreadyMigrated
    } else {
        match legacy_path(adapter)? {
            None => MigrationOutcome::NoLegacySource,
            Some(path) => {
                let text = std::fs::read_to_string(&path).map_err(|e| SettingsError::Migration {
                    module: adapter.id().to_string(),
                    reason: format!("cannot read {}: {}", path.display(), e),
                })?;
                let entries = adapter.parse_legacy(&text)?;
                let written = adapter.base().write_through(&entries)?;

                let env = adapter.base().env()?;
                let markers = env.stores.open(&marker_namespace(adapter.id()))?;
                markers.set(MIGRATED_KEY, SettingValue::Bool(true))?;
                markers.flush()?;

                tracing::info!(
                    module = %adapter.id(),
                    path = %path.display(),
                    entries = written,
                    "Migrated legacy settings"
                );
                MigrationOutcome::Migrated { entries: written }
            }
        }
    };

    adapter.base().load()?;
    Ok(outcome)
}
