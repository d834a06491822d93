use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::{Result, StoreError};

/// SQLite `synchronous` setting for file-backed stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Sync on every commit.
    Full,
    /// Sync at WAL checkpoints.
    Normal,
    /// Leave syncing to the OS.
    Off,
}

impl SyncMode {
    pub(crate) fn pragma_value(self) -> &'static str {
        match self {
            SyncMode::Full => "FULL",
            SyncMode::Normal => "NORMAL",
            SyncMode::Off => "OFF",
        }
    }
}

/// When dead resources are reclaimed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SweepPolicy {
    /// Inside the write transaction, before commit.
    Immediate,
    /// Only on open and on [`Store::collect_garbage`](crate::Store::collect_garbage).
    Deferred,
}

/// Store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StoreConfig {
    /// Reclamation timing.
    pub sweep: SweepPolicy,
    /// Assert a property's domain class on the subject instead of rejecting
    /// the write.
    pub implicit_create: bool,
    /// Entries in the writer's IRI to id cache.
    pub resource_cache_size: usize,
    /// Rows fetched per page by triples cursors.
    pub scan_batch_size: usize,
    /// Read-only connections kept for snapshot reads.
    pub reader_pool_size: usize,
    /// SQLite `synchronous` mode.
    pub synchronous: SyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            sweep: SweepPolicy::Immediate,
            implicit_create: false,
            resource_cache_size: 4096,
            scan_batch_size: 256,
            reader_pool_size: 4,
            synchronous: SyncMode::Full,
        }
    }
}

impl StoreConfig {
    /// Settings for throwaway stores: relaxed durability, small pools.
    pub fn ephemeral() -> Self {
        Self {
            synchronous: SyncMode::Off,
            reader_pool_size: 1,
            ..Self::default()
        }
    }

    /// Settings for bulk loading: reclamation deferred to explicit collection.
    pub fn bulk_load() -> Self {
        Self {
            sweep: SweepPolicy::Deferred,
            implicit_create: true,
            resource_cache_size: 65_536,
            scan_batch_size: 1024,
            synchronous: SyncMode::Normal,
            ..Self::default()
        }
    }

    /// Parses a TOML document; missing keys take their defaults.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(input).map_err(|err| StoreError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Rejects values the store cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.resource_cache_size == 0 {
            return Err(StoreError::Config("resource_cache_size must be positive".into()));
        }
        if self.scan_batch_size == 0 {
            return Err(StoreError::Config("scan_batch_size must be positive".into()));
        }
        if self.reader_pool_size == 0 {
            return Err(StoreError::Config("reader_pool_size must be positive".into()));
        }
        Ok(())
    }
}
