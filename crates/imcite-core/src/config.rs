//! Configuration for the imcite core
//!
//! An explicit value handed into operations and formatters; never ambient
//! process state.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::DEFAULT_MIN_ABSTRACT_LEN;
use crate::ledger::{Ledger, EDGES_FILE, REFERENCES_FILE};

/// System-wide configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImciteConfig {
    pub storage: StorageConfig,
    pub index: IndexConfig,
    pub embedding: EmbeddingConfig,
    pub graph_api: GraphApiConfig,
    pub output: OutputConfig,
}

impl Default for ImciteConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            index: IndexConfig::default(),
            embedding: EmbeddingConfig::default(),
            graph_api: GraphApiConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the ledger, cache, and index files.
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            data_dir: base.join("imcite"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Minimum abstract length (characters) for a record to be indexed.
    pub min_abstract_len: usize,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            min_abstract_len: DEFAULT_MIN_ABSTRACT_LEN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: crate::embed::ollama::DEFAULT_BASE_URL.to_string(),
            model: "nomic-embed-text".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphApiConfig {
    pub base_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

impl Default for GraphApiConfig {
    fn default() -> Self {
        Self {
            base_url: crate::sources::DEFAULT_BASE_URL.to_string(),
            api_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub quiet: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Plain,
            quiet: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed configuration: {0}")]
    Malformed(#[from] toml::de::Error),

    #[error("failed to encode configuration: {0}")]
    Encode(#[from] toml::ser::Error),
}

impl ImciteConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml(toml_str: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(toml_str)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Load from a TOML file; a missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::from_toml(&contents),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |e: std::io::Error| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(io_err)?;
            }
        }
        fs::write(path, self.to_toml()?).map_err(io_err)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.index.min_abstract_len == 0 {
            return Err(ConfigError::Invalid(
                "index.min_abstract_len must be positive".to_string(),
            ));
        }
        if self.embedding.base_url.is_empty() {
            return Err(ConfigError::Invalid(
                "embedding.base_url must not be empty".to_string(),
            ));
        }
        if self.embedding.model.is_empty() {
            return Err(ConfigError::Invalid(
                "embedding.model must not be empty".to_string(),
            ));
        }
        if self.graph_api.base_url.is_empty() {
            return Err(ConfigError::Invalid(
                "graph_api.base_url must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn references_path(&self) -> PathBuf {
        self.storage.data_dir.join(REFERENCES_FILE)
    }

    pub fn edges_path(&self) -> PathBuf {
        self.storage.data_dir.join(EDGES_FILE)
    }

    pub fn cache_path(&self) -> PathBuf {
        self.storage.data_dir.join("cache.db")
    }

    pub fn index_dir(&self) -> PathBuf {
        self.storage.data_dir.join("index")
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::open(&self.storage.data_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ImciteConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.index.min_abstract_len, DEFAULT_MIN_ABSTRACT_LEN);
        assert_eq!(config.output.format, OutputFormat::Plain);
    }

    #[test]
    fn test_toml_round_trip() {
        let mut config = ImciteConfig::default();
        config.storage.data_dir = PathBuf::from("/tmp/imcite");
        config.embedding.model = "mxbai-embed-large".to_string();

        let toml_str = config.to_toml().unwrap();
        let parsed = ImciteConfig::from_toml(&toml_str).unwrap();
        assert_eq!(config, parsed);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = ImciteConfig::from_toml("[index]\nmin_abstract_len = 80\n").unwrap();
        assert_eq!(config.index.min_abstract_len, 80);
        assert_eq!(config.embedding.model, "nomic-embed-text");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ImciteConfig::from_toml("[index]\nmin_abstract_len = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));

        let err = ImciteConfig::from_toml("[embedding]\nmodel = \"\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_load_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = ImciteConfig::load(&dir.path().join("missing.toml")).unwrap();
        assert_eq!(config, ImciteConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut config = ImciteConfig::default();
        config.output.format = OutputFormat::Json;
        config.save(&path).unwrap();

        let loaded = ImciteConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_derived_paths() {
        let mut config = ImciteConfig::default();
        config.storage.data_dir = PathBuf::from("/data/imcite");
        assert_eq!(
            config.references_path(),
            PathBuf::from("/data/imcite/references.jsonl")
        );
        assert_eq!(config.edges_path(), PathBuf::from("/data/imcite/edges.jsonl"));
        assert_eq!(config.cache_path(), PathBuf::from("/data/imcite/cache.db"));
        assert_eq!(config.index_dir(), PathBuf::from("/data/imcite/index"));
    }
}
