//! Configuration for btreedb
//!
//! Two layers:
//! - [`Properties`]: the flat string map a benchmark harness hands over
//!   (loaded from `.properties` files and `-p key=value` overrides).
//! - [`Config`]: typed settings with sensible defaults, built directly or
//!   from properties.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{BTreeDbError, Result};

// =============================================================================
// Property Names
// =============================================================================

/// Storage path of the engine (required, no default)
pub const PROP_DB_PATH: &str = "btree.dbname";

/// Page pool budget in bytes
pub const PROP_POOL_SIZE: &str = "btree.pool_size";

/// WAL sync strategy: `always`, or N to fsync every N appends
pub const PROP_WAL_SYNC: &str = "btree.wal_sync";

/// Number of fields per record, inherited from the workload
pub const PROP_FIELD_COUNT: &str = "fieldcount";

/// Latency measurement backend: `basic` or `hdrhistogram`
pub const PROP_MEASUREMENT_TYPE: &str = "measurementtype";

/// Default page pool budget (128 MB)
pub const DEFAULT_POOL_SIZE: usize = 134_217_728;

/// Default number of fields per record
pub const DEFAULT_FIELD_COUNT: usize = 10;

/// Default number of WAL appends between fsyncs
pub const DEFAULT_WAL_SYNC_EVERY: usize = 100;

// =============================================================================
// Properties
// =============================================================================

/// Flat `key -> value` property map
#[derive(Debug, Clone, Default)]
pub struct Properties {
    entries: HashMap<String, String>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a `.properties` file.
    ///
    /// Lines are `key=value`; blank lines and lines starting with `#` or `!`
    /// are ignored. Keys and values are trimmed.
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        let mut props = Self::new();
        props.merge_str(&text)?;
        Ok(props)
    }

    /// Merge properties from text in `.properties` syntax
    pub fn merge_str(&mut self, text: &str) -> Result<()> {
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                BTreeDbError::Config(format!(
                    "line {}: expected key=value, got {:?}",
                    lineno + 1,
                    line
                ))
            })?;
            self.set(key.trim(), value.trim());
        }
        Ok(())
    }

    /// Parse a single `key=value` override (as given on the command line)
    pub fn set_pair(&mut self, pair: &str) -> Result<()> {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| BTreeDbError::Config(format!("expected key=value, got {:?}", pair)))?;
        self.set(key.trim(), value.trim());
        Ok(())
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Get a property, falling back to `default` when absent
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Parse a property, falling back to `default` when absent
    pub fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.get(key) {
            None => Ok(default),
            Some(raw) => raw.parse().map_err(|e| {
                BTreeDbError::Config(format!("invalid value {:?} for {}: {}", raw, key, e))
            }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =============================================================================
// Config
// =============================================================================

/// Typed configuration for one adapter and the engine it shares
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory of the engine. Internal structure:
    ///   {db_path}/
    ///     ├── wal.log      (write-ahead log)
    ///     └── table.snap   (checkpoint snapshot)
    ///
    /// Required when the shared engine is opened; `None` is a fatal
    /// configuration error at that point.
    pub db_path: Option<PathBuf>,

    /// Page pool budget in bytes, converted to pages of `engine::PAGE_SIZE`
    pub pool_size: usize,

    /// Sync strategy: how often to fsync the WAL
    pub wal_sync_strategy: WalSyncStrategy,

    // -------------------------------------------------------------------------
    // Workload Configuration
    // -------------------------------------------------------------------------
    /// Number of fields every stored row carries
    pub field_count: usize,
}

/// WAL sync strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalSyncStrategy {
    /// fsync after every write (safest, slowest)
    EveryWrite,

    /// fsync after N uncommitted entries (balanced durability/performance)
    EveryNEntries { count: usize },
}

impl FromStr for WalSyncStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("always") {
            return Ok(Self::EveryWrite);
        }
        match s.parse::<usize>() {
            Ok(0) => Err("sync interval must be positive".to_string()),
            Ok(1) => Ok(Self::EveryWrite),
            Ok(count) => Ok(Self::EveryNEntries { count }),
            Err(_) => Err("expected `always` or a positive integer".to_string()),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            pool_size: DEFAULT_POOL_SIZE,
            wal_sync_strategy: WalSyncStrategy::EveryNEntries {
                count: DEFAULT_WAL_SYNC_EVERY,
            },
            field_count: DEFAULT_FIELD_COUNT,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Build a config from harness properties.
    ///
    /// A missing storage path is not an error here: it only matters to the
    /// caller that ends up opening the shared engine.
    pub fn from_properties(props: &Properties) -> Result<Self> {
        let db_path = props
            .get(PROP_DB_PATH)
            .filter(|p| !p.is_empty())
            .map(PathBuf::from);

        let sync_every = WalSyncStrategy::EveryNEntries {
            count: DEFAULT_WAL_SYNC_EVERY,
        };

        Ok(Self {
            db_path,
            pool_size: props.parse_or(PROP_POOL_SIZE, DEFAULT_POOL_SIZE)?,
            wal_sync_strategy: props.parse_or(PROP_WAL_SYNC, sync_every)?,
            field_count: props.parse_or(PROP_FIELD_COUNT, DEFAULT_FIELD_COUNT)?,
        })
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the storage path of the engine
    pub fn db_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.db_path = Some(path.into());
        self
    }

    /// Set the page pool budget (in bytes)
    pub fn pool_size(mut self, bytes: usize) -> Self {
        self.config.pool_size = bytes;
        self
    }

    /// Set the WAL sync strategy
    pub fn wal_sync_strategy(mut self, strategy: WalSyncStrategy) -> Self {
        self.config.wal_sync_strategy = strategy;
        self
    }

    /// Set the number of fields per row
    pub fn field_count(mut self, count: usize) -> Self {
        self.config.field_count = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
