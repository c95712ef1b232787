//! Side-table configuration.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default initial capacity of a property's side-table.
const DEFAULT_TABLE_CAPACITY: usize = 16;

/// Tuning for the per-receiver side-table of a [`WiredProperty`].
///
/// Environment overrides (see [`WireConfig::from_env`]):
/// - `WIRE_TABLE_CAPACITY`
/// - `WIRE_SHARD_AMOUNT`
/// - `WIRE_PURGE_ON_INSERT`
///
/// [`WiredProperty`]: crate::property::WiredProperty
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WireConfig {
    /// Initial number of receivers the table is sized for.
    pub table_capacity: usize,
    /// DashMap shard count; `None` lets dashmap pick from the CPU count.
    pub shard_amount: Option<usize>,
    /// Drop entries of dead receivers whenever a new wire is stored.
    pub purge_on_insert: bool,
}

impl Default for WireConfig {
    fn default() -> Self {
        WireConfig {
            table_capacity: DEFAULT_TABLE_CAPACITY,
            shard_amount: None,
            purge_on_insert: true,
        }
    }
}

impl WireConfig {
    /// Defaults overridden by `WIRE_*` environment variables.
    ///
    /// Unparseable values are ignored with a warning.
    ///
    /// # Errors
    /// Returns `Err` if the resulting configuration fails [`WireConfig::validate`].
    pub fn from_env() -> Result<Self> {
        let mut config = WireConfig::default();

        if let Some(capacity) = env_parse::<usize>("WIRE_TABLE_CAPACITY") {
            config.table_capacity = capacity;
        }
        if let Some(shards) = env_parse::<usize>("WIRE_SHARD_AMOUNT") {
            config.shard_amount = Some(shards);
        }
        if let Some(purge) = env_parse::<bool>("WIRE_PURGE_ON_INSERT") {
            config.purge_on_insert = purge;
        }

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// `Error::ConfigError` if `shard_amount` is not a power of two above 1.
    pub fn validate(&self) -> Result<()> {
        match self.shard_amount {
            Some(shards) if shards <= 1 || !shards.is_power_of_two() => Err(Error::ConfigError(
                format!("shard_amount must be a power of two > 1, got {}", shards),
            )),
            _ => Ok(()),
        }
    }
}

fn env_parse<T: std::str::FromStr>(var: &str) -> Option<T> {
    let raw = std::env::var(var).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid value", var, raw);
            None
        }
    }
}
