//! Engine configuration
//!
//! `CoreConfig` is a TOML file holding the few knobs the engine reads:
//!
//! ```toml
//! version = 1
//! debug = false
//! persist_indent = 4
//! max_resource_name_len = 64
//! ```
//!
//! Missing keys take their defaults. A missing file is created with the
//! defaults on first load.

mod loader;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use loader::{config_path, CONFIG_ENV, DEFAULT_CONFIG_FILE};

use crate::persist::DEFAULT_INDENT;
use crate::record::MAX_RESOURCE_NAME_LEN;

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// A value is outside its accepted range
    #[error("Invalid config value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// Config version for future migration support
    pub version: u32,

    /// Enable debug logging
    pub debug: bool,

    /// Spaces per indentation level in persistence files
    pub persist_indent: usize,

    /// Upper bound on resource names, in bytes
    pub max_resource_name_len: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            version: 1,
            debug: false,
            persist_indent: DEFAULT_INDENT,
            max_resource_name_len: MAX_RESOURCE_NAME_LEN,
        }
    }
}

impl CoreConfig {
    /// Load from [`config_path`], creating the default file if missing.
    pub fn load() -> ConfigResult<Self> {
        Self::load_from(config_path()?)
    }

    /// Load from `path`, creating the default file if missing.
    pub fn load_from(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();

        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config: Self = toml::from_str(&content)?;
            config.validate()?;
            tracing::debug!(path = %path.display(), "Loaded core config");
            Ok(config)
        } else {
            let default = Self::default();
            default.save_to(path)?;
            tracing::info!(path = %path.display(), "Created default core config");
            Ok(default)
        }
    }

    /// Save to `path`, creating parent directories as needed.
    pub fn save_to(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!(path = %path.display(), "Saved core config");
        Ok(())
    }

    /// Replace self with the contents of `path`.
    ///
    /// On error self is left unchanged.
    pub fn reload_from(&mut self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        config.validate()?;
        *self = config;
        tracing::debug!(path = %path.display(), "Reloaded core config");
        Ok(())
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.max_resource_name_len == 0 {
            return Err(ConfigError::Invalid {
                key: "max_resource_name_len",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.persist_indent > 16 {
            return Err(ConfigError::Invalid {
                key: "persist_indent",
                reason: format!("{} exceeds 16", self.persist_indent),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_core_config_default() {
        let config = CoreConfig::default();
        assert_eq!(config.version, 1);
        assert!(!config.debug);
        assert_eq!(config.persist_indent, 4);
        assert_eq!(config.max_resource_name_len, 64);
    }

    #[test]
    fn test_core_config_serialize() {
        let config = CoreConfig {
            version: 2,
            debug: true,
            ..CoreConfig::default()
        };

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("version = 2"));
        assert!(toml_str.contains("debug = true"));
        assert_eq!(toml::from_str::<CoreConfig>(&toml_str).unwrap(), config);
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: CoreConfig = toml::from_str("persist_indent = 2").unwrap();
        assert_eq!(config.persist_indent, 2);
        assert_eq!(config.max_resource_name_len, 64);
    }

    #[test]
    fn test_load_creates_default_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("resrec.toml");

        let config = CoreConfig::load_from(&path).unwrap();
        assert_eq!(config, CoreConfig::default());
        assert!(path.exists());
    }

    #[test]
    fn test_reload_picks_up_changes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resrec.toml");
        let mut config = CoreConfig::load_from(&path).unwrap();

        std::fs::write(&path, "debug = true\nmax_resource_name_len = 16\n").unwrap();
        config.reload_from(&path).unwrap();
        assert!(config.debug);
        assert_eq!(config.max_resource_name_len, 16);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resrec.toml");
        std::fs::write(&path, "max_resource_name_len = 0\n").unwrap();
        assert!(matches!(
            CoreConfig::load_from(&path),
            Err(ConfigError::Invalid { key: "max_resource_name_len", .. })
        ));

        let mut config = CoreConfig::default();
        std::fs::write(&path, "persist_indent = 40\n").unwrap();
        assert!(config.reload_from(&path).is_err());
        assert_eq!(config, CoreConfig::default());
    }

    #[test]
    fn test_malformed_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("resrec.toml");
        std::fs::write(&path, "version = \"one\"").unwrap();
        assert!(matches!(
            CoreConfig::load_from(&path),
            Err(ConfigError::ParseError(_))
        ));
    }
}
