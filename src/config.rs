//! Site configuration module.
//!
//! Handles loading, validating, and merging the site's `config.toml`. Stock
//! defaults are the base layer; a `config.toml` in the site root overrides
//! any subset of them.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! debug = false                   # Verbose loader logging
//!
//! [components]
//! path = "/components/"           # Where fragments live, relative to the site root
//! extension = ".html"             # Appended to the component name
//! # base_url = "https://example.com"  # Fetch fragments over HTTP instead of from disk
//!
//! [cache]
//! enabled = true                  # Two-tier fragment cache
//! prefix = "inflapy_component_"   # Key namespace for persistent entries
//! duration_secs = 3600            # Persistent entry lifetime
//!
//! [header]
//! scroll_threshold = 50           # Pixels scrolled before the header gets `scrolled`
//!
//! [processing]
//! max_processes = 4               # Max parallel loads (omit for auto = CPU cores)
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Site configuration loaded from `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SiteConfig {
    /// Emit debug-level loader logs.
    pub debug: bool,
    /// Fragment location and naming.
    pub components: ComponentsConfig,
    /// Fragment cache settings.
    pub cache: CacheConfig,
    /// Header behavior wired by post-processing.
    pub header: HeaderConfig,
    /// Parallel loading settings.
    pub processing: ProcessingConfig,
}

impl SiteConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let path = &self.components.path;
        if !path.starts_with('/') || !path.ends_with('/') {
            return Err(ConfigError::Validation(
                "components.path must start and end with '/'".into(),
            ));
        }
        if !self.components.extension.starts_with('.') {
            return Err(ConfigError::Validation(
                "components.extension must start with '.'".into(),
            ));
        }
        if self.cache.prefix.is_empty() {
            return Err(ConfigError::Validation(
                "cache.prefix must not be empty".into(),
            ));
        }
        if self.cache.duration_secs == 0 {
            return Err(ConfigError::Validation(
                "cache.duration_secs must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

/// Where fragments are found.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ComponentsConfig {
    /// Fragment directory as a site path, with leading and trailing slash.
    pub path: String,
    /// File extension appended to component names, with leading dot.
    pub extension: String,
    /// When set, fragments are fetched from this origin instead of the
    /// local site directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl Default for ComponentsConfig {
    fn default() -> Self {
        Self {
            path: "/components/".to_string(),
            extension: ".html".to_string(),
            base_url: None,
        }
    }
}

/// Fragment cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Namespace prepended to component names in the persistent store.
    pub prefix: String,
    /// Persistent entries older than this are discarded on read.
    pub duration_secs: u64,
}

impl CacheConfig {
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            prefix: crate::cache::DEFAULT_PREFIX.to_string(),
            duration_secs: crate::cache::DEFAULT_DURATION.as_secs(),
        }
    }
}

/// Header behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeaderConfig {
    /// Scroll offset in pixels past which the header gets the `scrolled` class.
    pub scroll_threshold: u32,
}

impl Default for HeaderConfig {
    fn default() -> Self {
        Self {
            scroll_threshold: 50,
        }
    }
}

/// Parallel loading settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel load workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config.max_processes.map(|n| n.min(cores)).unwrap_or(cores)
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(SiteConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `config.toml` from a directory as a raw TOML value.
///
/// Returns `Ok(None)` if no `config.toml` exists in the directory.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = path.join("config.toml");
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<SiteConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: SiteConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `config.toml` in the given site directory.
pub fn load_config(root: &Path) -> Result<SiteConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Returns a fully-commented stock `config.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# inflapy-components configuration
# ================================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Unknown keys cause an error.

# Log cache hits, misses and expiry while loading.
debug = false

# ---------------------------------------------------------------------------
# Components
# ---------------------------------------------------------------------------
[components]
# Fragment directory as a site path. A container declaring
# data-component="header" loads <path>header<extension>.
path = "/components/"
extension = ".html"

# Fetch fragments from a deployed origin instead of the site directory.
# base_url = "https://inflablesparafiestas.com.mx"

# ---------------------------------------------------------------------------
# Cache
# ---------------------------------------------------------------------------
[cache]
# In-memory plus persistent caching of fetched fragments.
enabled = true

# Namespace for persistent cache keys. `clear-cache` only removes these.
prefix = "inflapy_component_"

# Persistent entries older than this many seconds are re-fetched.
duration_secs = 3600

# ---------------------------------------------------------------------------
# Header
# ---------------------------------------------------------------------------
[header]
# Scroll offset (px) past which the header gets the "scrolled" class.
scroll_threshold = 50

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel component loads.
# Omit or comment out to auto-detect (= number of CPU cores).
# max_processes = 4
"##
}
