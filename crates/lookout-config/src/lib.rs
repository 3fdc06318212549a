//! Enumerated configuration for a Lookout deployment.
//!
//! `lookout.toml` maps one-to-one onto [`LookoutConfig`]. Option names that
//! the schema does not know are a load error ([`ConfigError::UnknownOption`])
//! rather than being silently ignored, and semantic checks (eval without a
//! password, malformed IP masks, ...) run in [`LookoutConfig::validate`].
//!
//! ```toml
//! password = "correct horse"
//! ip_masks = ["192.168.*.*", "127.0.0.1"]
//! eval_enabled = true
//!
//! [dumper]
//! level_limit = 3
//!
//! [storage]
//! backend = "file"
//! path = "/var/tmp/lookout"
//!
//! [logging]
//! level = "debug"
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use lookout_dump::{
    DumperLimits, DEFAULT_DUMP_SIZE_LIMIT, DEFAULT_ITEMS_COUNT_LIMIT, DEFAULT_ITEM_SIZE_LIMIT,
    DEFAULT_LEVEL_LIMIT,
};
use lookout_gate::DEFAULT_HEADERS_LIMIT;
use lookout_storage::{StorageLimits, DEFAULT_MAX_ENTRIES, DEFAULT_TTL};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

mod error;
mod logging;
mod schema;
mod unknown;
mod validation;

pub use error::{ConfigError, ConfigValidationError};
pub use logging::{init_tracing, LoggingConfig};
pub use schema::json_schema;

/// Connector password. Never printed by `Debug` or serialized back out.
#[derive(Clone, PartialEq, Eq, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct Password(String);

impl Password {
    pub fn new(password: impl Into<String>) -> Self {
        Self(password.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<redacted>")
    }
}

impl Serialize for Password {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str("<redacted>")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct LookoutConfig {
    /// Master switch. When off, active clients are told the connector is
    /// disabled and nothing else runs.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Prefix stripped from source file paths before they are sent.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub sources_base_path: Option<PathBuf>,

    /// Encoding label (WHATWG) used to decode byte strings in dumps.
    #[serde(default)]
    pub server_encoding: Option<String>,

    /// Largest response header the web server accepts, in bytes.
    #[serde(default = "default_headers_limit")]
    #[schemars(range(min = 512))]
    pub headers_limit: usize,

    #[serde(default)]
    pub password: Option<Password>,

    /// Refuse clients on unencrypted connections.
    #[serde(default)]
    pub ssl_only: bool,

    /// Allowed client addresses, e.g. `"192.168.*.*"`. Empty allows all.
    #[serde(default)]
    pub ip_masks: Vec<String>,

    #[serde(default = "default_true")]
    pub handle_errors: bool,

    #[serde(default = "default_true")]
    pub handle_exceptions: bool,

    /// Report an error only once per request for each file and line.
    #[serde(default)]
    pub ignore_repeated_errors: bool,

    /// Attach caller location and backtrace to debug dumps.
    #[serde(default)]
    pub detect_trace_and_source: bool,

    /// Accept evaluation requests. Requires `password`.
    #[serde(default)]
    pub eval_enabled: bool,

    #[serde(default)]
    pub dumper: DumperConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for LookoutConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sources_base_path: None,
            server_encoding: None,
            headers_limit: DEFAULT_HEADERS_LIMIT,
            password: None,
            ssl_only: false,
            ip_masks: Vec::new(),
            handle_errors: true,
            handle_exceptions: true,
            ignore_repeated_errors: false,
            detect_trace_and_source: false,
            eval_enabled: false,
            dumper: DumperConfig::default(),
            storage: StorageConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_headers_limit() -> usize {
    DEFAULT_HEADERS_LIMIT
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct DumperConfig {
    #[serde(default = "DumperConfig::default_level_limit")]
    pub level_limit: usize,
    #[serde(default = "DumperConfig::default_items_count_limit")]
    #[schemars(range(min = 1))]
    pub items_count_limit: usize,
    #[serde(default = "DumperConfig::default_item_size_limit")]
    #[schemars(range(min = 1))]
    pub item_size_limit: usize,
    #[serde(default = "DumperConfig::default_dump_size_limit")]
    #[schemars(range(min = 1))]
    pub dump_size_limit: usize,
    /// Render callables as `(callback name)` references.
    #[serde(default = "default_true")]
    pub detect_callbacks: bool,
}

impl DumperConfig {
    fn default_level_limit() -> usize {
        DEFAULT_LEVEL_LIMIT
    }

    fn default_items_count_limit() -> usize {
        DEFAULT_ITEMS_COUNT_LIMIT
    }

    fn default_item_size_limit() -> usize {
        DEFAULT_ITEM_SIZE_LIMIT
    }

    fn default_dump_size_limit() -> usize {
        DEFAULT_DUMP_SIZE_LIMIT
    }

    pub fn limits(&self) -> DumperLimits {
        DumperLimits {
            level_limit: self.level_limit,
            items_count_limit: self.items_count_limit,
            item_size_limit: self.item_size_limit,
            dump_size_limit: self.dump_size_limit,
        }
    }
}

impl Default for DumperConfig {
    fn default() -> Self {
        Self {
            level_limit: DEFAULT_LEVEL_LIMIT,
            items_count_limit: DEFAULT_ITEMS_COUNT_LIMIT,
            item_size_limit: DEFAULT_ITEM_SIZE_LIMIT,
            dump_size_limit: DEFAULT_DUMP_SIZE_LIMIT,
            detect_callbacks: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    Memory,
    File,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[schemars(deny_unknown_fields)]
pub struct StorageConfig {
    #[serde(default = "StorageConfig::default_backend")]
    pub backend: StorageBackend,

    /// Directory for the `file` backend. Defaults to `lookout-postponed` in
    /// the system temp directory.
    #[serde(default)]
    #[schemars(with = "Option<String>")]
    pub path: Option<PathBuf>,

    #[serde(default = "StorageConfig::default_ttl_secs")]
    #[schemars(range(min = 1))]
    pub ttl_secs: u64,

    #[serde(default = "StorageConfig::default_max_entries")]
    #[schemars(range(min = 1))]
    pub max_entries: usize,
}

impl StorageConfig {
    fn default_backend() -> StorageBackend {
        StorageBackend::Memory
    }

    fn default_ttl_secs() -> u64 {
        DEFAULT_TTL.as_secs()
    }

    fn default_max_entries() -> usize {
        DEFAULT_MAX_ENTRIES
    }

    pub fn limits(&self) -> StorageLimits {
        StorageLimits {
            ttl: Duration::from_secs(self.ttl_secs),
            max_entries: self.max_entries,
        }
    }

    pub fn resolved_path(&self) -> PathBuf {
        self.path
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("lookout-postponed"))
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: Self::default_backend(),
            path: None,
            ttl_secs: Self::default_ttl_secs(),
            max_entries: Self::default_max_entries(),
        }
    }
}

impl LookoutConfig {
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::load_from_str(&text)
    }

    /// Parses TOML, rejecting any option name the schema does not define.
    /// Semantic validation is separate: see [`LookoutConfig::validate`].
    pub fn load_from_str(text: &str) -> Result<Self, ConfigError> {
        let (config, unknown) = unknown::deserialize_toml_with_unknown_keys::<LookoutConfig>(text)?;
        if let Some(name) = unknown.into_iter().next() {
            return Err(ConfigError::UnknownOption { name });
        }
        tracing::debug!(target: "lookout.config", enabled = config.enabled, eval_enabled = config.eval_enabled, "config loaded");
        Ok(config)
    }

    /// Loads and validates in one step.
    pub fn load_validated(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config = Self::load_from_path(path)?;
        config.validate()?;
        Ok(config)
    }
}
