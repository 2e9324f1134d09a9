//! Tessera settings
//!
//! All tunable parameters in one place. Loaded from `tessera.toml` at startup,
//! falls back to defaults if no config file exists.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tessera_engine::EngineConfig;
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "tessera.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Read { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Top-level settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TesseraConfig {
    /// Execution mode and concurrency cap.
    pub engine: EngineConfig,
    /// Where resource records live.
    pub storage: StorageConfig,
    /// Which built-in providers are registered.
    pub providers: ProvidersConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Records are lost when the process exits.
    Memory,
    /// One JSON file per record under `path`.
    #[default]
    Fs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root directory for the `fs` backend.
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    /// Root directory for `local_file` resources.
    pub local_file_root: PathBuf,
    /// Resource types served by the in-process memory provider.
    pub memory: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

// ============================================================
// Defaults
// ============================================================

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: PathBuf::from(".tessera/state"),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            local_file_root: PathBuf::from("files"),
            memory: vec!["memory".into()],
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "tessera=info".into(),
            json: false,
        }
    }
}

/// How [`TesseraConfig::load_quiet`] arrived at its config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadNotice {
    Loaded(PathBuf),
    Missing(PathBuf),
    /// The file exists but could not be read or parsed.
    Invalid(String),
}

impl LoadNotice {
    pub fn log(&self) {
        match self {
            Self::Loaded(path) => tracing::info!("Loaded config from {}", path.display()),
            Self::Missing(path) => {
                tracing::info!("No config at {}, using defaults", path.display())
            }
            Self::Invalid(reason) => tracing::warn!("{}, using defaults", reason),
        }
    }

    pub fn used_defaults(&self) -> bool {
        !matches!(self, Self::Loaded(_))
    }
}

impl TesseraConfig {
    /// Read and parse `path`, surfacing every failure.
    pub fn read(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load from TOML, falling back to defaults when the file is missing or invalid.
    pub fn load(path: &Path) -> Self {
        let (config, notice) = Self::load_quiet(path);
        notice.log();
        config
    }

    /// Like [`load`](Self::load), but hands back the outcome instead of
    /// logging it, for callers that set up logging from the config itself.
    pub fn load_quiet(path: &Path) -> (Self, LoadNotice) {
        match Self::read(path) {
            Ok(config) => (config, LoadNotice::Loaded(path.to_path_buf())),
            Err(e) if e.is_missing() => (Self::default(), LoadNotice::Missing(path.to_path_buf())),
            Err(e) => (Self::default(), LoadNotice::Invalid(e.to_string())),
        }
    }

    /// Write the current config as TOML (for generating a default config file).
    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_engine::ExecutionMode;

    #[test]
    fn empty_file_is_all_defaults() {
        assert_eq!(TesseraConfig::parse("").unwrap(), TesseraConfig::default());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = TesseraConfig::parse(
            r#"
            [engine]
            mode = "concurrent"

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.mode, ExecutionMode::Concurrent);
        assert_eq!(config.engine.max_concurrency, 8);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.path, PathBuf::from(".tessera/state"));
        assert_eq!(config.log.filter, "tessera=info");
    }

    #[test]
    fn default_toml_parses_back() {
        let config = TesseraConfig::default();
        assert_eq!(TesseraConfig::parse(&config.to_toml()).unwrap(), config);
    }

    #[test]
    fn unknown_backend_rejected() {
        assert!(TesseraConfig::parse("[storage]\nbackend = \"s3\"").is_err());
    }
}
