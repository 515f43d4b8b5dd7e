//! # Configuration Module
//!
//! Runtime settings and the defaults they fall back to. Settings are read from
//! an optional TOML file and then overridden by command line flags or
//! environment variables in the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CharFinderError, Result};

/// Directory under the home directory that holds all charfinder state
pub const ROOT_DIR: &str = ".charfinder";
pub const CACHE_DIR: &str = "cache";
pub const CONFIG_FILE: &str = "config.toml";

/// File names inside the cache directory
pub const DATASET_FILE: &str = "UnicodeData.txt";
pub const INDEX_FILE: &str = "unicode_name_index.json";
pub const LOCK_FILE: &str = "unicode_name_index.lock";

pub const DEFAULT_DATASET_URL: &str = "https://www.unicode.org/Public/UCD/latest/ucd/UnicodeData.txt";

/// Default fuzzy threshold
pub const DEFAULT_THRESHOLD: f64 = 0.7;

/// Default capacity of the query normalization memo
pub const DEFAULT_NORMALIZATION_CACHE_CAPACITY: usize = 1024;

pub const DEFAULT_DOWNLOAD_TIMEOUT_SECS: u64 = 30;

/// Settings shared by the library service and the CLI
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Directory for the downloaded dataset and the persisted index
    pub cache_dir: PathBuf,
    /// Explicit dataset location; defaults to `<cache_dir>/UnicodeData.txt`
    pub dataset_path: Option<PathBuf>,
    pub dataset_url: String,
    /// Never touch the network; a missing dataset becomes an error
    pub offline: bool,
    pub download_timeout_secs: u64,
    pub normalization_cache_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            dataset_path: None,
            dataset_url: DEFAULT_DATASET_URL.to_string(),
            offline: false,
            download_timeout_secs: DEFAULT_DOWNLOAD_TIMEOUT_SECS,
            normalization_cache_capacity: DEFAULT_NORMALIZATION_CACHE_CAPACITY,
        }
    }
}

impl Settings {
    /// Settings rooted at a custom cache directory
    pub fn with_cache_dir(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            ..Self::default()
        }
    }

    /// Load settings from `path`, or from `~/.charfinder/config.toml` when no
    /// path is given. A missing default file yields the defaults; a missing
    /// explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => (default_config_path(), false),
        };

        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => {
                tracing::debug!("No settings file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(e) => return Err(CharFinderError::io(&path, e)),
        };

        let settings: Settings =
            toml::from_str(&content).map_err(|e| CharFinderError::Settings {
                path: path.clone(),
                reason: e.to_string(),
            })?;
        tracing::debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn dataset_path(&self) -> PathBuf {
        self.dataset_path
            .clone()
            .unwrap_or_else(|| self.cache_dir.join(DATASET_FILE))
    }

    pub fn index_path(&self) -> PathBuf {
        self.cache_dir.join(INDEX_FILE)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.cache_dir.join(LOCK_FILE)
    }
}

/// `~/.charfinder/cache`, or a temp directory when no home directory exists
pub fn default_cache_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(ROOT_DIR).join(CACHE_DIR),
        None => std::env::temp_dir().join("charfinder").join(CACHE_DIR),
    }
}

pub fn default_config_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(ROOT_DIR).join(CONFIG_FILE),
        None => std::env::temp_dir().join("charfinder").join(CONFIG_FILE),
    }
}
