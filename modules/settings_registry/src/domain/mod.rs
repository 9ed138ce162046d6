//! Domain layer - module contract, registry and supporting policies

pub mod base;
pub mod dependents;
pub mod events;
pub mod executor;
pub mod global;
pub mod migration;
pub mod module;
pub mod registry;
pub mod routing;
pub mod validation;
pub mod version;

pub use base::{BaseModule, ModuleEnv, Propagation};
pub use events::{ListenerId, ListenerSet, ModuleEvent, SettingsListener};
pub use executor::{InlineDispatcher, Job, SerialExecutor, ThreadDispatcher, UiDispatcher};
pub use migration::{LegacyAdapter, LegacyFormat, MigrationOutcome};
pub use module::SettingsModule;
pub use registry::{
    BulkCallback, ExecMode, ImportCallback, ModuleHandle, Registry, RegistryEnv,
};
