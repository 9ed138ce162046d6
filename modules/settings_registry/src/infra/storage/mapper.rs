//! Record mappers
//!
//! Conversions between stored JSON records and contract values

use crate::contract::{SettingType, SettingValue, SettingsMap};
use std::collections::BTreeMap;

/// JSON representation of one stored value
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub(crate) struct StoredRecord {
    #[serde(rename = "type")]
    kind: SettingType,
    value: String,
}

impl From<&SettingValue> for StoredRecord {
    fn from(value: &SettingValue) -> Self {
        Self {
            kind: value.kind(),
            value: value.to_wire_string(),
        }
    }
}

impl StoredRecord {
    /// Decode the record; a value that no longer parses as its tag is kept
    /// as a string so readers can fall back to defaults.
    pub(crate) fn into_value(self) -> SettingValue {
        SettingValue::parse(self.kind, &self.value).unwrap_or(SettingValue::String(self.value))
    }
}

pub(crate) fn to_records(map: &SettingsMap) -> BTreeMap<String, StoredRecord> {
    map.iter()
        .map(|(key, value)| (key.clone(), StoredRecord::from(value)))
        .collect()
}

pub(crate) fn from_records(records: BTreeMap<String, StoredRecord>) -> SettingsMap {
    records
        .into_iter()
        .map(|(key, record)| (key, record.into_value()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_preserve_types() {
        let mut map = SettingsMap::new();
        map.insert("a".into(), SettingValue::Long(1 << 40));
        map.insert("b".into(), SettingValue::Float(0.3));
        map.insert("c".into(), SettingValue::String("42".into()));

        let back = from_records(to_records(&map));
        assert_eq!(back, map);
    }

    #[test]
    fn test_corrupt_record_degrades_to_string() {
        let record: StoredRecord =
            serde_json::from_str(r#"{"type":"int","value":"forty"}"#).unwrap();
        assert_eq!(record.into_value(), SettingValue::String("forty".into()));
    }
}
