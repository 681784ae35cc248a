//! Persisted config (models, dataset, index location) in the app data directory.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::app_data;
use crate::finder::FinderSettings;
use crate::generation::{DEFAULT_MAX_TOKENS, DEFAULT_TEMPERATURE};
use crate::index::{IndexPaths, DEFAULT_EMBED_BATCH};
use crate::ollama::{DEFAULT_BASE_URL, DEFAULT_CHAT_MODEL, DEFAULT_EMBED_MODEL};
use crate::retriever::DEFAULT_TOP_K;
use crate::store::Expectations;

const CONFIG_FILENAME: &str = "config.toml";

/// Every field is optional; accessors fall back to the defaults.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub ollama_url: Option<String>,
    pub embed_model: Option<String>,
    /// Vector width the embedding model produces. A cached index of another
    /// width is rejected on load.
    pub embed_dimension: Option<usize>,
    pub chat_model: Option<String>,
    /// Path to the comic dataset (JSON array or JSON Lines).
    pub dataset_path: Option<String>,
    /// Directory holding the persisted index pair. Defaults to the app data dir.
    pub index_dir: Option<String>,
    pub top_k: Option<usize>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub embed_batch_size: Option<usize>,
}

impl Config {
    pub fn ollama_url(&self) -> &str {
        self.ollama_url.as_deref().unwrap_or(DEFAULT_BASE_URL)
    }

    pub fn embed_model(&self) -> &str {
        self.embed_model.as_deref().unwrap_or(DEFAULT_EMBED_MODEL)
    }

    /// What a cached index must have been built with.
    pub fn index_expectations(&self) -> Expectations<'_> {
        Expectations {
            dimension: self.embed_dimension.filter(|&d| d > 0),
            model: Some(self.embed_model()),
        }
    }

    pub fn chat_model(&self) -> &str {
        self.chat_model.as_deref().unwrap_or(DEFAULT_CHAT_MODEL)
    }

    pub fn dataset_path(&self) -> Option<PathBuf> {
        self.dataset_path
            .as_deref()
            .filter(|s| !s.is_empty())
            .map(PathBuf::from)
    }

    pub fn embed_batch_size(&self) -> usize {
        self.embed_batch_size.unwrap_or(DEFAULT_EMBED_BATCH)
    }

    pub fn finder_settings(&self) -> FinderSettings {
        FinderSettings {
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K),
            max_tokens: self.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
        }
    }

    /// Configured index directory, else the app data directory.
    pub fn index_paths(&self) -> Result<IndexPaths, ConfigError> {
        let dir = match self.index_dir.as_deref().filter(|s| !s.is_empty()) {
            Some(d) => PathBuf::from(d),
            None => app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?,
        };
        Ok(IndexPaths::in_dir(&dir))
    }
}

/// Load config from the app data directory. Returns default config if missing or invalid.
pub fn load_config() -> Config {
    match app_data::app_data_dir() {
        Some(dir) => load_config_from(&dir.join(CONFIG_FILENAME)),
        None => Config::default(),
    }
}

/// Load config from `path`. Returns default config if missing or invalid.
pub fn load_config_from(path: &Path) -> Config {
    let Ok(s) = std::fs::read_to_string(path) else {
        return Config::default();
    };
    toml::from_str(&s).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring invalid config");
        Config::default()
    })
}

/// Save config to the app data directory.
pub fn save_config(config: &Config) -> Result<(), ConfigError> {
    let data_dir = app_data::app_data_dir().ok_or(ConfigError::NoDataDir)?;
    save_config_to(config, &data_dir.join(CONFIG_FILENAME))
}

pub fn save_config_to(config: &Config, path: &Path) -> Result<(), ConfigError> {
    let s = toml::to_string_pretty(config).map_err(ConfigError::Serialize)?;
    std::fs::write(path, s).map_err(ConfigError::Write)
}

/// Set and persist the dataset path.
pub fn set_dataset_path(path: &Path) -> Result<(), ConfigError> {
    let path = path.canonicalize().map_err(ConfigError::Canonicalize)?;
    if !path.is_file() {
        return Err(ConfigError::NotAFile(path));
    }
    let mut config = load_config();
    config.dataset_path = Some(path.to_string_lossy().into_owned());
    save_config(&config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("could not determine app data directory")]
    NoDataDir,
    #[error("failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("failed to write config: {0}")]
    Write(std::io::Error),
    #[error("failed to resolve path: {0}")]
    Canonicalize(std::io::Error),
    #[error("not a file: {0}")]
    NotAFile(PathBuf),
}
