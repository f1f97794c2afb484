//! Layered configuration for batch jobs.
//!
//! Sources, lowest priority first:
//! - Default values
//! - `.search-batch/settings.toml`, found by walking up from the current directory
//! - Environment variables
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `SB_` and use double underscores
//! to separate nested levels:
//! - `SB_READER__PAGE_SIZE=50` sets `reader.page_size`
//! - `SB_STORE__REFRESH=manual` sets `store.refresh`
//! - `SB_LOGGING__LEVEL=debug` sets `logging.level`

use crate::storage::RefreshPolicy;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Directory holding the settings file and, by default, the index
pub const CONFIG_DIR: &str = ".search-batch";
pub const CONFIG_FILE: &str = "settings.toml";
pub const ENV_PREFIX: &str = "SB_";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Path to the tantivy index directory
    #[serde(default = "default_index_path")]
    pub index_path: PathBuf,

    /// Global debug mode, forces debug logging
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub reader: ReaderConfig,

    #[serde(default)]
    pub step: StepConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct LoggingConfig {
    /// One of off, error, warn, info, debug, trace
    #[serde(default = "default_log_level")]
    pub level: String,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StoreConfig {
    /// Index used when a writer is not given one
    #[serde(default = "default_index_name")]
    pub default_index: String,

    /// Indexing threads of the tantivy writer
    #[serde(default = "default_writer_threads")]
    pub writer_threads: usize,

    /// Memory budget of the tantivy writer, shared by all its threads
    #[serde(default = "default_writer_heap_bytes")]
    pub writer_heap_bytes: usize,

    /// When written documents become searchable
    #[serde(default)]
    pub refresh: RefreshPolicy,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ReaderConfig {
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Stop after this many items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_item_count: Option<usize>,

    /// Save the read position so a restarted job can resume
    #[serde(default = "default_true")]
    pub save_state: bool,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct StepConfig {
    /// Items per chunk, and so per transaction
    #[serde(default = "default_commit_interval")]
    pub commit_interval: usize,
}

fn default_version() -> u32 {
    1
}
fn default_index_path() -> PathBuf {
    PathBuf::from(CONFIG_DIR).join("index")
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_index_name() -> String {
    crate::storage::memory::DEFAULT_INDEX.to_string()
}
fn default_writer_threads() -> usize {
    // tantivy refuses less than 15MB of heap per thread, keep the default budget valid
    num_cpus::get().clamp(1, 4)
}
fn default_writer_heap_bytes() -> usize {
    100_000_000
}
fn default_page_size() -> usize {
    crate::query::DEFAULT_PAGE_SIZE
}
fn default_true() -> bool {
    true
}
fn default_commit_interval() -> usize {
    100
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            index_path: default_index_path(),
            debug: false,
            logging: LoggingConfig::default(),
            store: StoreConfig::default(),
            reader: ReaderConfig::default(),
            step: StepConfig::default(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_index: default_index_name(),
            writer_threads: default_writer_threads(),
            writer_heap_bytes: default_writer_heap_bytes(),
            refresh: RefreshPolicy::default(),
        }
    }
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_item_count: None,
            save_state: true,
        }
    }
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            commit_interval: default_commit_interval(),
        }
    }
}

impl Settings {
    /// Load configuration from all sources
    pub fn load() -> Result<Self, Box<figment::Error>> {
        let config_path = Self::find_workspace_config()
            .unwrap_or_else(|| PathBuf::from(CONFIG_DIR).join(CONFIG_FILE));
        Self::load_from(config_path)
    }

    /// Load configuration from a specific file, still honoring env overrides
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, Box<figment::Error>> {
        Figment::new()
            .merge(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            // `__` separates nested levels, a single `_` stays part of the field name
            .merge(Env::prefixed(ENV_PREFIX).map(|key| {
                key.as_str().to_lowercase().replace("__", ".").into()
            }))
            .extract()
            .map_err(Box::new)
    }

    /// Find the settings file by looking for the config directory from the
    /// current directory up to the root
    fn find_workspace_config() -> Option<PathBuf> {
        Self::workspace_root().map(|root| root.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Directory containing the config directory, if any
    pub fn workspace_root() -> Option<PathBuf> {
        let current = std::env::current_dir().ok()?;
        current
            .ancestors()
            .find(|ancestor| ancestor.join(CONFIG_DIR).is_dir())
            .map(Path::to_path_buf)
    }

    /// Save current configuration to file
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), Box<dyn std::error::Error>> {
        let parent = path.as_ref().parent().ok_or("Invalid path")?;
        std::fs::create_dir_all(parent)?;

        let toml_string = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_string)?;

        Ok(())
    }

    /// Write a commented default settings file under `dir`
    pub fn init_config_file(dir: impl AsRef<Path>, force: bool) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let config_path = dir.as_ref().join(CONFIG_DIR).join(CONFIG_FILE);

        if !force && config_path.exists() {
            return Err("Configuration file already exists. Use --force to overwrite".into());
        }
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let defaults = Settings::default();
        let template = format!(
            r#"# search-batch configuration

# Version of the configuration schema
version = {version}

# Path to the index directory (relative to the working directory)
index_path = "{index_path}"

# Force debug logging
debug = false

[logging]
# off, error, warn, info, debug or trace
level = "{level}"

[store]
# Index receiving documents when none is given
default_index = "{default_index}"
# Indexing threads (defaults to the CPU count, at most 4)
# writer_threads = {writer_threads}
# Memory budget of the index writer in bytes
writer_heap_bytes = {writer_heap_bytes}
# "immediate" makes every write searchable at once, "manual" waits for a refresh
refresh = "immediate"

[reader]
# Documents fetched per query
page_size = {page_size}
# Stop after this many documents
# max_item_count = 1000
# Remember the read position for restarts
save_state = true

[step]
# Items per chunk; each chunk runs in its own transaction
commit_interval = {commit_interval}
"#,
            version = defaults.version,
            index_path = defaults.index_path.display(),
            level = defaults.logging.level,
            default_index = defaults.store.default_index,
            writer_threads = defaults.store.writer_threads,
            writer_heap_bytes = defaults.store.writer_heap_bytes,
            page_size = defaults.reader.page_size,
            commit_interval = defaults.step.commit_interval,
        );

        std::fs::write(&config_path, template)?;
        Ok(config_path)
    }
}
