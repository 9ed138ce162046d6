//! Contract error types for the settings registry
//!
//! Validation problems are returned as [`ValidationResult`](super::ValidationResult)
//! data; the errors below cover lifecycle, module and storage failures.

use thiserror::Error;

/// Failure reported by a key-value or protected store collaborator
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying file system operation failed
    #[error("store i/o failed during {operation}")]
    Io {
        /// Operation identifier
        operation: &'static str,
        /// Source IO error
        #[source]
        source: std::io::Error,
    },
    /// Persisted data could not be encoded or decoded
    #[error("store data could not be serialized")]
    Serialization(#[from] serde_json::Error),
    /// Store cannot serve requests
    #[error("store '{namespace}' is unavailable: {reason}")]
    Unavailable {
        /// Store namespace
        namespace: String,
        /// Failure reason
        reason: String,
    },
}

/// Settings registry errors
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Accessor called before `initialize`
    #[error("module '{module}' is not initialized")]
    Uninitialized {
        /// Module identifier
        module: String,
    },
    /// Registry used before it was constructed or initialized
    #[error("settings registry is not initialized")]
    RegistryNotInitialized,
    /// Module id is not registered
    #[error("module not found: {id}")]
    UnknownModule {
        /// Module identifier
        id: String,
    },
    /// Key is not declared by the module
    #[error("unknown setting '{key}' in module '{module}'")]
    UnknownKey {
        /// Module identifier
        module: String,
        /// Setting key
        key: String,
    },
    /// Value rejected by module validation
    #[error("validation failed for {module}.{key}: {message}")]
    Validation {
        /// Module identifier
        module: String,
        /// Setting key
        key: String,
        /// Validation error message
        message: String,
    },
    /// Identifier has an invalid format
    #[error("invalid identifier '{value}': {details}")]
    InvalidIdentifier {
        /// Offending identifier
        value: String,
        /// Error details
        details: String,
    },
    /// Import document has a different major version
    #[error("incompatible version: document {imported}, registry {current}")]
    IncompatibleVersion {
        /// Version declared by the document
        imported: String,
        /// Registry version
        current: String,
    },
    /// Import document is malformed
    #[error("invalid settings document: {message}")]
    InvalidDocument {
        /// Details
        message: String,
    },
    /// A single module operation failed or panicked
    #[error("module '{module}' failed: {reason}")]
    ModuleFailed {
        /// Module identifier
        module: String,
        /// Failure reason
        reason: String,
    },
    /// Legacy format migration failed
    #[error("legacy migration failed for '{module}': {reason}")]
    Migration {
        /// Module identifier
        module: String,
        /// Failure reason
        reason: String,
    },
    /// Background worker no longer accepts jobs
    #[error("background worker is stopped")]
    WorkerStopped,
    /// Store collaborator failure
    #[error("storage operation failed")]
    Storage(#[from] StoreError),
}

impl SettingsError {
    pub fn uninitialized(module: &str) -> Self {
        Self::Uninitialized {
            module: module.to_string(),
        }
    }

    pub fn module_failed(module: &str, reason: impl Into<String>) -> Self {
        Self::ModuleFailed {
            module: module.to_string(),
            reason: reason.into(),
        }
    }

    pub fn invalid_document(message: impl Into<String>) -> Self {
        Self::InvalidDocument {
            message: message.into(),
        }
    }
}
