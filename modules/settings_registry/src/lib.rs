//! Settings Registry
//!
//! Hosts independently-owned feature modules behind one registry: typed,
//! validated settings per module, protected storage for sensitive keys,
//! one-time migration of legacy flat files and versioned export/import.

// Public exports
pub mod contract;
pub use contract::{
    ExportDocument, ImportReport, ModuleDescriptor, ModuleDocument, SettingType, SettingValue,
    SettingsError, StoreError, ValidationResult,
};

pub mod config;
pub use config::RegistryConfig;

pub mod domain;
pub use domain::{
    BaseModule, ExecMode, ModuleEvent, ModuleHandle, Registry, RegistryEnv, SettingsListener,
    SettingsModule,
};

pub mod features;

pub mod infra;
