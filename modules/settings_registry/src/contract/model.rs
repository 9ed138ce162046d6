//! Contract models for the settings registry
//!
//! Typed setting values, module descriptors, validation results and the
//! versioned export document exchanged at the registry boundary.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use super::error::SettingsError;

/// Current settings of one module, keyed by setting key
pub type SettingsMap = BTreeMap<String, SettingValue>;

/// Type tag of a setting value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    String,
    Int,
    Bool,
    Float,
    Long,
}

impl SettingType {
    pub fn as_str(self) -> &'static str {
        match self {
            SettingType::String => "string",
            SettingType::Int => "int",
            SettingType::Bool => "bool",
            SettingType::Float => "float",
            SettingType::Long => "long",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, SettingType::Int | SettingType::Float | SettingType::Long)
    }
}

impl fmt::Display for SettingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed setting value
///
/// The type tag is carried by the variant, so a value can never disagree
/// with its tag.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingValue {
    String(String),
    Int(i32),
    Bool(bool),
    Float(f32),
    Long(i64),
}

impl SettingValue {
    /// Type tag of this value
    pub fn kind(&self) -> SettingType {
        match self {
            SettingValue::String(_) => SettingType::String,
            SettingValue::Int(_) => SettingType::Int,
            SettingValue::Bool(_) => SettingType::Bool,
            SettingValue::Float(_) => SettingType::Float,
            SettingValue::Long(_) => SettingType::Long,
        }
    }

    /// Parse a textual representation as the given type.
    ///
    /// Returns `None` when the text is not a valid literal for `kind`.
    pub fn parse(kind: SettingType, text: &str) -> Option<Self> {
        match kind {
            SettingType::String => Some(SettingValue::String(text.to_string())),
            SettingType::Int => text.trim().parse().ok().map(SettingValue::Int),
            SettingType::Long => text.trim().parse().ok().map(SettingValue::Long),
            SettingType::Float => text.trim().parse().ok().map(SettingValue::Float),
            SettingType::Bool => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Some(SettingValue::Bool(true)),
                "false" => Some(SettingValue::Bool(false)),
                _ => None,
            },
        }
    }

    /// Lossless textual representation (numbers print back to the same value)
    pub fn to_wire_string(&self) -> String {
        match self {
            SettingValue::String(s) => s.clone(),
            SettingValue::Int(v) => v.to_string(),
            SettingValue::Bool(v) => v.to_string(),
            SettingValue::Float(v) => v.to_string(),
            SettingValue::Long(v) => v.to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            SettingValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            SettingValue::Bool(v) => Some(*v),
            SettingValue::String(s) => SettingValue::parse(SettingType::Bool, s)?.as_bool(),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            SettingValue::Int(v) => Some(*v),
            SettingValue::Long(v) => i32::try_from(*v).ok(),
            SettingValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            SettingValue::Long(v) => Some(*v),
            SettingValue::Int(v) => Some(i64::from(*v)),
            SettingValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            SettingValue::Float(v) => Some(*v),
            // f32 holds every integer up to 2^24 exactly
            SettingValue::Int(v) if v.unsigned_abs() <= 1 << 24 => Some(*v as f32),
            SettingValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Convert to another type tag when the conversion is lossless
    pub fn coerce_to(&self, kind: SettingType) -> Option<SettingValue> {
        if self.kind() == kind {
            return Some(self.clone());
        }
        match (self, kind) {
            (SettingValue::Int(v), SettingType::Long) => Some(SettingValue::Long(i64::from(*v))),
            (SettingValue::Long(v), SettingType::Int) => {
                i32::try_from(*v).ok().map(SettingValue::Int)
            }
            (SettingValue::Int(_), SettingType::Float) => self.as_f32().map(SettingValue::Float),
            _ => None,
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wire_string())
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        SettingValue::String(value.to_string())
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::String(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(value)
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<f32> for SettingValue {
    fn from(value: f32) -> Self {
        SettingValue::Float(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Long(value)
    }
}

/// A typed (key, value) pair used for export, import and notifications
#[derive(Debug, Clone, PartialEq)]
pub struct SettingEntry {
    pub key: String,
    pub value: SettingValue,
}

impl SettingEntry {
    pub fn new(key: impl Into<String>, value: impl Into<SettingValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Type tag, always derived from the value
    pub fn kind(&self) -> SettingType {
        self.value.kind()
    }
}

/// Functional area a module belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleCategory {
    Appearance,
    Editor,
    Terminal,
    VersionControl,
    Build,
    Debugging,
    Language,
    Files,
    Assistant,
}

impl ModuleCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleCategory::Appearance => "appearance",
            ModuleCategory::Editor => "editor",
            ModuleCategory::Terminal => "terminal",
            ModuleCategory::VersionControl => "version_control",
            ModuleCategory::Build => "build",
            ModuleCategory::Debugging => "debugging",
            ModuleCategory::Language => "language",
            ModuleCategory::Files => "files",
            ModuleCategory::Assistant => "assistant",
        }
    }
}

/// Static description of a feature module
///
/// Every key the module reads or writes has an entry in `defaults`, except
/// keys under one of the `dynamic_prefixes` (user-defined collections such
/// as terminal aliases). Sensitive keys are always a subset of the defaults
/// because they can only be declared together with their default.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleDescriptor {
    pub id: String,
    pub name: String,
    pub category: ModuleCategory,
    defaults: SettingsMap,
    sensitive_keys: BTreeSet<String>,
    dynamic_prefixes: Vec<String>,
}

impl ModuleDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, category: ModuleCategory) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category,
            defaults: SettingsMap::new(),
            sensitive_keys: BTreeSet::new(),
            dynamic_prefixes: Vec::new(),
        }
    }

    /// Declare a key and its default value
    pub fn with_default(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.defaults.insert(key.to_string(), value.into());
        self
    }

    /// Declare a sensitive key and its default value
    pub fn with_sensitive(mut self, key: &str, value: impl Into<SettingValue>) -> Self {
        self.defaults.insert(key.to_string(), value.into());
        self.sensitive_keys.insert(key.to_string());
        self
    }

    /// Accept user-defined string keys starting with `prefix`
    pub fn with_dynamic_prefix(mut self, prefix: &str) -> Self {
        self.dynamic_prefixes.push(prefix.to_string());
        self
    }

    pub fn defaults(&self) -> &SettingsMap {
        &self.defaults
    }

    pub fn sensitive_keys(&self) -> &BTreeSet<String> {
        &self.sensitive_keys
    }

    pub fn dynamic_prefixes(&self) -> &[String] {
        &self.dynamic_prefixes
    }

    pub fn is_sensitive(&self, key: &str) -> bool {
        self.sensitive_keys.contains(key)
    }

    /// Whether the module owns `key` (declared or under a dynamic prefix)
    pub fn owns_key(&self, key: &str) -> bool {
        self.defaults.contains_key(key) || self.is_dynamic_key(key)
    }

    pub fn is_dynamic_key(&self, key: &str) -> bool {
        self.dynamic_prefixes
            .iter()
            .any(|prefix| key.len() > prefix.len() && key.starts_with(prefix.as_str()))
    }

    /// Expected type of a key; dynamic keys are strings
    pub fn expected_type(&self, key: &str) -> Option<SettingType> {
        match self.defaults.get(key) {
            Some(value) => Some(value.kind()),
            None if self.is_dynamic_key(key) => Some(SettingType::String),
            None => None,
        }
    }
}

/// Outcome of validating a candidate value
///
/// Validation never mutates state. On success the caller persists
/// [`ValidationResult::value_to_persist`], which is the coerced value when
/// one was produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationResult {
    pub ok: bool,
    pub coerced_value: Option<SettingValue>,
    pub error_message: Option<String>,
}

impl ValidationResult {
    pub fn valid() -> Self {
        Self {
            ok: true,
            coerced_value: None,
            error_message: None,
        }
    }

    pub fn coerced(value: SettingValue) -> Self {
        Self {
            ok: true,
            coerced_value: Some(value),
            error_message: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            ok: false,
            coerced_value: None,
            error_message: Some(message.into()),
        }
    }

    /// The value a caller should persist, or the error message
    pub fn value_to_persist(self, original: SettingValue) -> Result<SettingValue, String> {
        if !self.ok {
            return Err(self
                .error_message
                .unwrap_or_else(|| "invalid value".to_string()));
        }
        Ok(self.coerced_value.unwrap_or(original))
    }
}

/// One serialized setting inside a module document
///
/// Values are written as strings. Numbers and booleans are also accepted on
/// import so hand-edited documents still load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireEntry {
    #[serde(rename = "type")]
    pub kind: SettingType,
    pub value: serde_json::Value,
}

impl WireEntry {
    pub fn from_value(value: &SettingValue) -> Self {
        Self {
            kind: value.kind(),
            value: serde_json::Value::String(value.to_wire_string()),
        }
    }

    /// Raw textual form of the value, regardless of its JSON shape
    pub fn raw_text(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            serde_json::Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

/// Module-specific section of an export document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleDocument {
    entries: IndexMap<String, WireEntry>,
}

impl ModuleDocument {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: &SettingValue) {
        self.entries.insert(key.into(), WireEntry::from_value(value));
    }

    pub fn insert_wire(&mut self, key: impl Into<String>, entry: WireEntry) {
        self.entries.insert(key.into(), entry);
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&WireEntry> {
        self.entries.get(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &WireEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<SettingEntry> for ModuleDocument {
    fn from_iter<I: IntoIterator<Item = SettingEntry>>(iter: I) -> Self {
        let mut doc = ModuleDocument::new();
        for entry in iter {
            doc.insert(entry.key, &entry.value);
        }
        doc
    }
}

/// Whole-registry export document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportDocument {
    pub version: String,
    #[serde(default)]
    pub export_timestamp: i64,
    pub modules: IndexMap<String, ModuleDocument>,
}

impl ExportDocument {
    /// Parse and shape-check JSON text, bounded to 1MB
    pub fn from_json(text: &str) -> Result<Self, SettingsError> {
        crate::domain::validation::parse_export_document(text, 1024 * 1024)
    }

    pub fn to_json_pretty(&self) -> Result<String, SettingsError> {
        serde_json::to_string_pretty(self).map_err(|e| SettingsError::invalid_document(e.to_string()))
    }
}

/// Result of a registry-wide import
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
    /// Version declared by the imported document
    pub version: String,
    /// Modules whose section was applied
    pub imported: Vec<String>,
    /// Modules whose import failed, with the reason
    pub failed: Vec<(String, String)>,
    /// Sections naming modules that are not registered
    pub skipped: Vec<String>,
}

impl ImportReport {
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Storage destination of a setting key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Regular key-value store
    Plain,
    /// Opaque protected store
    Protected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_wire_string_round_trips() {
        for v in [0.1f32, 1.0 / 3.0, 1e-7, 123456.79, -2.5] {
            let text = SettingValue::Float(v).to_wire_string();
            assert_eq!(SettingValue::parse(SettingType::Float, &text), Some(SettingValue::Float(v)));
        }
    }

    #[test]
    fn test_long_wire_string_round_trips() {
        let text = SettingValue::Long(i64::MAX).to_wire_string();
        assert_eq!(SettingValue::parse(SettingType::Long, &text), Some(SettingValue::Long(i64::MAX)));
    }

    #[test]
    fn test_parse_rejects_bad_numbers() {
        assert_eq!(SettingValue::parse(SettingType::Int, "12x"), None);
        assert_eq!(SettingValue::parse(SettingType::Bool, "yes"), None);
        assert_eq!(SettingValue::parse(SettingType::Long, ""), None);
    }

    #[test]
    fn test_coerce_int_to_long_and_float() {
        assert_eq!(SettingValue::Int(7).coerce_to(SettingType::Long), Some(SettingValue::Long(7)));
        assert_eq!(SettingValue::Int(7).coerce_to(SettingType::Float), Some(SettingValue::Float(7.0)));
        assert_eq!(SettingValue::Long(i64::MAX).coerce_to(SettingType::Int), None);
        assert_eq!(SettingValue::Bool(true).coerce_to(SettingType::String), None);
    }

    #[test]
    fn test_descriptor_sensitive_keys_are_declared_keys() {
        let descriptor = ModuleDescriptor::new("git", "Git", ModuleCategory::VersionControl)
            .with_default("user_name", "")
            .with_sensitive("auth_token", "");

        assert!(descriptor.is_sensitive("auth_token"));
        assert!(descriptor.defaults().contains_key("auth_token"));
        assert!(!descriptor.is_sensitive("user_name"));
    }

    #[test]
    fn test_dynamic_prefix_requires_suffix() {
        let descriptor = ModuleDescriptor::new("terminal", "Terminal", ModuleCategory::Terminal)
            .with_dynamic_prefix("alias_");

        assert!(descriptor.owns_key("alias_ll"));
        assert!(!descriptor.owns_key("alias_"));
        assert_eq!(descriptor.expected_type("alias_gs"), Some(SettingType::String));
        assert_eq!(descriptor.expected_type("unknown"), None);
    }

    #[test]
    fn test_validation_result_persists_coerced_value() {
        let result = ValidationResult::coerced(SettingValue::Int(72));
        assert_eq!(result.value_to_persist(SettingValue::Int(500)), Ok(SettingValue::Int(72)));

        let result = ValidationResult::invalid("nope");
        assert_eq!(result.value_to_persist(SettingValue::Int(1)), Err("nope".to_string()));
    }

    #[test]
    fn test_module_document_serializes_as_keyed_object() {
        let doc: ModuleDocument = vec![
            SettingEntry::new("font_size", 14),
            SettingEntry::new("word_wrap", true),
        ]
        .into_iter()
        .collect();

        let json = serde_json::to_value(&doc).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "font_size": {"type": "int", "value": "14"},
                "word_wrap": {"type": "bool", "value": "true"}
            })
        );
    }
}
