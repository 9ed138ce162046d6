//! Identifier, document and value validation helpers

use crate::contract::{ExportDocument, SettingValue, SettingsError, ValidationResult};
use jsonschema::Validator;
use once_cell::sync::Lazy;
use serde_json::{json, Value};

/// Validate a module id or setting key
///
/// Accepts alphanumerics plus `_`, `.` and `-`, starting with an
/// alphanumeric character.
pub fn validate_identifier(value: &str) -> Result<(), SettingsError> {
    let Some(first_char) = value.chars().next() else {
        return Err(SettingsError::InvalidIdentifier {
            value: value.to_string(),
            details: "identifier cannot be empty".to_string(),
        });
    };

    if !first_char.is_ascii_alphanumeric() {
        return Err(SettingsError::InvalidIdentifier {
            value: value.to_string(),
            details: "must start with an alphanumeric character".to_string(),
        });
    }

    let is_valid = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '-');

    if !is_valid {
        return Err(SettingsError::InvalidIdentifier {
            value: value.to_string(),
            details: "only alphanumeric, '_', '.', and '-' are allowed".to_string(),
        });
    }

    Ok(())
}

static EXPORT_DOCUMENT_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "required": ["version", "modules"],
        "properties": {
            "version": { "type": "string", "minLength": 1 },
            "export_timestamp": { "type": "integer" },
            "modules": {
                "type": "object",
                "additionalProperties": {
                    "type": "object",
                    "additionalProperties": {
                        "type": "object",
                        "required": ["type", "value"],
                        "properties": {
                            "type": { "enum": ["string", "int", "bool", "float", "long"] },
                            "value": { "type": ["string", "number", "boolean", "null"] }
                        }
                    }
                }
            }
        }
    })
});

/// Validate a value against a JSON Schema
pub fn validate_against_schema(data: &Value, schema: &Value) -> Result<(), SettingsError> {
    let validator = Validator::new(schema).map_err(|e| SettingsError::InvalidDocument {
        message: format!("Invalid JSON Schema: {}", e),
    })?;

    if let Err(error) = validator.validate(data) {
        return Err(SettingsError::InvalidDocument {
            message: error.to_string(),
        });
    }

    Ok(())
}

/// Parse and shape-check an export document from JSON text
pub fn parse_export_document(text: &str, max_bytes: usize) -> Result<ExportDocument, SettingsError> {
    if text.len() > max_bytes {
        return Err(SettingsError::invalid_document(format!(
            "document is {} bytes, limit is {}",
            text.len(),
            max_bytes
        )));
    }

    let raw: Value = serde_json::from_str(text)
        .map_err(|e| SettingsError::invalid_document(format!("malformed JSON: {}", e)))?;
    validate_against_schema(&raw, &EXPORT_DOCUMENT_SCHEMA)?;

    let mut document: ExportDocument = serde_json::from_value(raw)
        .map_err(|e| SettingsError::invalid_document(e.to_string()))?;
    if document.export_timestamp < 0 {
        document.export_timestamp = 0;
    }
    Ok(document)
}

/// Clamp an integer into `[min, max]`, reporting a coerced value when it moved
pub fn clamp_int(value: &SettingValue, min: i32, max: i32) -> ValidationResult {
    match value.as_i32() {
        Some(v) if v < min => ValidationResult::coerced(SettingValue::Int(min)),
        Some(v) if v > max => ValidationResult::coerced(SettingValue::Int(max)),
        Some(v) if *value == SettingValue::Int(v) => ValidationResult::valid(),
        Some(v) => ValidationResult::coerced(SettingValue::Int(v)),
        None => ValidationResult::invalid(format!("expected an integer, got '{}'", value)),
    }
}

/// Clamp a long into `[min, max]`
pub fn clamp_long(value: &SettingValue, min: i64, max: i64) -> ValidationResult {
    match value.as_i64() {
        Some(v) if v < min => ValidationResult::coerced(SettingValue::Long(min)),
        Some(v) if v > max => ValidationResult::coerced(SettingValue::Long(max)),
        Some(v) if *value == SettingValue::Long(v) => ValidationResult::valid(),
        Some(v) => ValidationResult::coerced(SettingValue::Long(v)),
        None => ValidationResult::invalid(format!("expected an integer, got '{}'", value)),
    }
}

/// Clamp a float into `[min, max]`; NaN is rejected
pub fn clamp_float(value: &SettingValue, min: f32, max: f32) -> ValidationResult {
    match value.as_f32() {
        Some(v) if v.is_nan() => ValidationResult::invalid("value is not a number"),
        Some(v) if v < min => ValidationResult::coerced(SettingValue::Float(min)),
        Some(v) if v > max => ValidationResult::coerced(SettingValue::Float(max)),
        Some(v) if *value == SettingValue::Float(v) => ValidationResult::valid(),
        Some(v) => ValidationResult::coerced(SettingValue::Float(v)),
        None => ValidationResult::invalid(format!("expected a number, got '{}'", value)),
    }
}

/// Accept one of `allowed` (case-insensitive), normalized to its canonical spelling
pub fn one_of(value: &SettingValue, allowed: &[&str]) -> ValidationResult {
    let Some(text) = value.as_str() else {
        return ValidationResult::invalid(format!("expected one of {}", allowed.join(", ")));
    };
    match allowed.iter().find(|a| a.eq_ignore_ascii_case(text.trim())) {
        Some(canonical) if *canonical == text => ValidationResult::valid(),
        Some(canonical) => ValidationResult::coerced(SettingValue::from(*canonical)),
        None => ValidationResult::invalid(format!(
            "'{}' is not one of {}",
            text,
            allowed.join(", ")
        )),
    }
}

/// Accept a boolean, also parsing "true"/"false" strings
pub fn boolean(value: &SettingValue) -> ValidationResult {
    match (value, value.as_bool()) {
        (SettingValue::Bool(_), _) => ValidationResult::valid(),
        (_, Some(v)) => ValidationResult::coerced(SettingValue::Bool(v)),
        _ => ValidationResult::invalid(format!("expected a boolean, got '{}'", value)),
    }
}

/// Accept any string, trimming surrounding whitespace; optionally non-empty
pub fn text(value: &SettingValue, allow_empty: bool) -> ValidationResult {
    let Some(raw) = value.as_str() else {
        return ValidationResult::invalid(format!("expected text, got {}", value.kind()));
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() && !allow_empty {
        return ValidationResult::invalid("value cannot be empty");
    }
    if trimmed.len() == raw.len() {
        ValidationResult::valid()
    } else {
        ValidationResult::coerced(SettingValue::from(trimmed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_accepts_module_ids() {
        assert!(validate_identifier("ui_theme").is_ok());
        assert!(validate_identifier("file-browser").is_ok());
        assert!(validate_identifier("alias_ll").is_ok());
        assert!(validate_identifier("editor.v2").is_ok());
    }

    #[test]
    fn test_validate_identifier_invalid() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("_hidden").is_err());
        assert!(validate_identifier("with space").is_err());
        assert!(validate_identifier("semi;colon").is_err());
    }

    #[test]
    fn test_clamp_int_coerces_out_of_range() {
        assert_eq!(clamp_int(&SettingValue::Int(200), 8, 72), ValidationResult::coerced(SettingValue::Int(72)));
        assert_eq!(clamp_int(&SettingValue::Int(2), 8, 72), ValidationResult::coerced(SettingValue::Int(8)));
        assert_eq!(clamp_int(&SettingValue::Int(14), 8, 72), ValidationResult::valid());
        assert_eq!(
            clamp_int(&SettingValue::from("16"), 8, 72),
            ValidationResult::coerced(SettingValue::Int(16))
        );
        assert!(!clamp_int(&SettingValue::from("big"), 8, 72).ok);
    }

    #[test]
    fn test_clamp_float_rejects_nan() {
        assert!(!clamp_float(&SettingValue::Float(f32::NAN), 0.0, 1.0).ok);
        assert_eq!(
            clamp_float(&SettingValue::Float(3.5), 0.0, 2.0),
            ValidationResult::coerced(SettingValue::Float(2.0))
        );
    }

    #[test]
    fn test_one_of_normalizes_case() {
        let allowed = ["DARK", "LIGHT", "SYSTEM"];
        assert_eq!(one_of(&SettingValue::from("DARK"), &allowed), ValidationResult::valid());
        assert_eq!(
            one_of(&SettingValue::from("light"), &allowed),
            ValidationResult::coerced(SettingValue::from("LIGHT"))
        );
        assert!(!one_of(&SettingValue::from("sepia"), &allowed).ok);
        assert!(!one_of(&SettingValue::Int(1), &allowed).ok);
    }

    #[test]
    fn test_parse_export_document_shape_errors() {
        let missing_modules = r#"{"version":"1.0.0"}"#;
        assert!(matches!(
            parse_export_document(missing_modules, 1024),
            Err(SettingsError::InvalidDocument { .. })
        ));

        let bad_type = r#"{"version":"1.0.0","modules":{"editor":{"font_size":{"type":"double","value":"1"}}}}"#;
        assert!(parse_export_document(bad_type, 1024).is_err());

        assert!(parse_export_document("{not json", 1024).is_err());
    }

    #[test]
    fn test_parse_export_document_size_limit() {
        let doc = r#"{"version":"1.0.0","export_timestamp":1,"modules":{}}"#;
        assert!(parse_export_document(doc, 1024).is_ok());
        assert!(parse_export_document(doc, 10).is_err());
    }

    #[test]
    fn test_parse_export_document_accepts_native_scalars() {
        let doc = r#"{"version":"1.2.0","export_timestamp":5,"modules":{"editor":{"font_size":{"type":"int","value":18}}}}"#;
        let parsed = parse_export_document(doc, 4096).unwrap();
        let entry = parsed.modules["editor"].get("font_size").unwrap();
        assert_eq!(entry.raw_text(), "18");
    }
}
