//! Configuration for the settings registry

use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable prefix, e.g. `SETTINGS_REGISTRY_STRICT_IMPORT=true`
pub const ENV_PREFIX: &str = "SETTINGS_REGISTRY_";

/// Settings registry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegistryConfig {
    /// Export/import schema version; imports must share its major version
    #[serde(default = "default_version")]
    pub version: String,

    /// Reject malformed typed entries on import instead of keeping them as strings
    #[serde(default)]
    pub strict_import: bool,

    /// Root directory for file-backed stores
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Directory holding legacy flat files
    #[serde(default)]
    pub legacy_dir: Option<PathBuf>,

    /// Maximum import document size in bytes
    #[serde(default = "default_max_document_bytes")]
    pub max_document_bytes: usize,

    /// Register the built-in feature modules on `initialize`
    #[serde(default = "default_true")]
    pub register_builtin_modules: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            strict_import: false,
            data_dir: None,
            legacy_dir: None,
            max_document_bytes: default_max_document_bytes(),
            register_builtin_modules: true,
        }
    }
}

impl RegistryConfig {
    /// Layer defaults, an optional YAML file and `SETTINGS_REGISTRY_*`
    /// environment variables
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Yaml::file(path));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .with_context(|| match path {
                Some(p) => format!("failed to load registry config from {}", p.display()),
                None => "failed to load registry config".to_string(),
            })?;
        config.check()?;
        Ok(config)
    }

    fn check(&self) -> Result<()> {
        if crate::domain::version::major_version(&self.version).is_none() {
            anyhow::bail!("version '{}' has no numeric major component", self.version);
        }
        if self.max_document_bytes == 0 {
            anyhow::bail!("max_document_bytes must be positive");
        }
        Ok(())
    }
}

fn default_version() -> String {
    "1.0.0".to_string()
}

fn default_true() -> bool {
    true
}

fn default_max_document_bytes() -> usize {
    1024 * 1024 // 1MB
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = RegistryConfig::default();
        assert_eq!(config.version, "1.0.0");
        assert!(!config.strict_import);
        assert!(config.register_builtin_modules);
        assert_eq!(config.max_document_bytes, 1024 * 1024);
    }

    #[test]
    fn test_yaml_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "strict_import: true\nlegacy_dir: /var/lib/legacy").unwrap();

        let config = RegistryConfig::load(Some(file.path())).unwrap();
        assert!(config.strict_import);
        assert_eq!(config.legacy_dir, Some(PathBuf::from("/var/lib/legacy")));
        assert_eq!(config.version, "1.0.0");
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "strict_imports: true").unwrap();
        assert!(RegistryConfig::load(Some(file.path())).is_err());
    }

    #[test]
    fn test_version_without_major_is_rejected() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "version: latest").unwrap();
        assert!(RegistryConfig::load(Some(file.path())).is_err());
    }
}
