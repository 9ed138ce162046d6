//! Contract layer - public types and collaborator interfaces
//!
//! Transport-agnostic models, errors and the storage traits that modules
//! consume.

pub mod error;
pub mod model;
pub mod store;

pub use error::{SettingsError, StoreError};
pub use model::{
    ExportDocument, ImportReport, ModuleCategory, ModuleDescriptor, ModuleDocument, Route,
    SettingEntry, SettingType, SettingValue, SettingsMap, ValidationResult, WireEntry,
};
pub use store::{KeyValueStore, ProtectedStore, StoreFactory};
