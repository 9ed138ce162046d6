//! Sensitive-key routing
//!
//! Decides whether a module's key lives in the plain key-value store or in
//! the protected store, and how it is addressed there.

use crate::contract::{ModuleDescriptor, Route, SettingType, SettingValue};

/// Storage route for `key` of the module described by `descriptor`
pub fn route(descriptor: &ModuleDescriptor, key: &str) -> Route {
    if descriptor.is_sensitive(key) {
        Route::Protected
    } else {
        Route::Plain
    }
}

/// Address of a sensitive key inside the shared protected store
pub fn protected_key(module_id: &str, key: &str) -> String {
    format!("{module_id}/{key}")
}

/// Decode a protected-store string as the key's declared type
pub fn decode_protected(kind: SettingType, raw: &str) -> SettingValue {
    SettingValue::parse(kind, raw).unwrap_or_else(|| SettingValue::String(raw.to_string()))
}
