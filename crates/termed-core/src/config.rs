//! Configuration types for termed.
//!
//! [`Config::load`] reads `$XDG_CONFIG_HOME/termed/config.toml`, creating it
//! with hardcoded defaults if it does not yet exist, then applies `TERMED_*`
//! environment overrides (`TERMED_INDEX__REFRESH_INTERVAL_MS=500`).
//! [`Config::defaults`] returns the same defaults without touching the
//! filesystem or the environment (useful in tests).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Embedded defaults
// ---------------------------------------------------------------------------

const DEFAULT_CONFIG: &str = r#"
[index]
# directory         = "/var/lib/termed/index"   # omit for an in-memory index
refresh_interval_ms = 1000
commit_interval_ms  = 10000
progress_interval   = 1000
bulk_queue_capacity = 64

[tree]
max_depth = 16
"#;

// ---------------------------------------------------------------------------
// Public config types
// ---------------------------------------------------------------------------

/// Top-level configuration, loaded from `~/.config/termed/config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub tree: TreeConfig,
}

/// `[index]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Index directory. `None` keeps the index in memory.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,
    #[serde(default = "default_commit_interval_ms")]
    pub commit_interval_ms: u64,
    /// Bulk jobs log progress every this many items.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: u64,
    #[serde(default = "default_bulk_queue_capacity")]
    pub bulk_queue_capacity: usize,
}

fn default_refresh_interval_ms() -> u64 { 1_000 }
fn default_commit_interval_ms() -> u64 { 10_000 }
fn default_progress_interval() -> u64 { 1_000 }
fn default_bulk_queue_capacity() -> usize { 64 }

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            directory: None,
            refresh_interval_ms: default_refresh_interval_ms(),
            commit_interval_ms: default_commit_interval_ms(),
            progress_interval: default_progress_interval(),
            bulk_queue_capacity: default_bulk_queue_capacity(),
        }
    }
}

impl IndexConfig {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn in_directory(directory: impl Into<PathBuf>) -> Self {
        Self { directory: Some(directory.into()), ..Self::default() }
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms.max(1))
    }

    pub fn commit_interval(&self) -> Duration {
        Duration::from_millis(self.commit_interval_ms.max(1))
    }
}

/// `[tree]` section of `config.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct TreeConfig {
    /// Levels below the root rendered by `termed tree`.
    #[serde(default = "default_max_depth")]
    pub max_depth: usize,
}

fn default_max_depth() -> usize { 16 }

impl Default for TreeConfig {
    fn default() -> Self {
        Self { max_depth: default_max_depth() }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::defaults()
    }
}

impl Config {
    /// Load from `~/.config/termed/config.toml`, layered on top of the
    /// built-in defaults and under `TERMED_*` environment variables. Creates
    /// the file with defaults if it does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let path = config_path();

        if !path.exists() {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&path, DEFAULT_CONFIG.trim_start())?;
            tracing::debug!(path = %path.display(), "config: wrote defaults");
        }

        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .add_source(config::File::from(path.as_path()).required(false))
            .add_source(config::Environment::with_prefix("TERMED").separator("__"))
            .build()?
            .try_deserialize()
            .map_err(Into::into)
    }

    /// Return the built-in defaults without touching the filesystem.
    pub fn defaults() -> Self {
        config::Config::builder()
            .add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml))
            .build()
            .expect("built-in default config must be valid TOML")
            .try_deserialize()
            .expect("built-in default config must deserialize correctly")
    }
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

fn config_path() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".to_string()))
                .join(".config")
        })
        .join("termed")
        .join("config.toml")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_load() {
        let cfg = Config::defaults();
        assert!(cfg.index.directory.is_none());
        assert_eq!(cfg.index.refresh_interval_ms, 1_000);
        assert_eq!(cfg.index.commit_interval_ms, 10_000);
        assert_eq!(cfg.index.progress_interval, 1_000);
        assert_eq!(cfg.tree.max_depth, 16);
    }

    #[test]
    fn refresh_is_more_frequent_than_commit() {
        let cfg = IndexConfig::default();
        assert!(cfg.refresh_interval() < cfg.commit_interval());
    }

    #[test]
    fn zero_intervals_are_clamped() {
        let cfg = IndexConfig { refresh_interval_ms: 0, ..IndexConfig::default() };
        assert_eq!(cfg.refresh_interval(), Duration::from_millis(1));
    }
}
