use std::env;
use std::io::Read;

use serde::Deserialize;

use crate::{PoolError, Result};

/// Environment variable holding the number of workers.
pub const SIZE_ENV_VAR: &str = "MAX_THREADS";

/// Settings for building a [`ConsumerPool`](crate::ConsumerPool).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PoolConfig {
    /// Number of worker threads.
    pub size: usize,
    /// Prefix of the worker thread names.
    pub thread_name: String,
}

impl Default for PoolConfig {
    fn default() -> Self {
        PoolConfig {
            size: num_cpus::get(),
            thread_name: "consumer".to_owned(),
        }
    }
}

impl PoolConfig {
    /// Loads the defaults, taking the size from `MAX_THREADS` when it is set.
    pub fn from_env() -> Result<Self> {
        let mut config = PoolConfig::default();
        if let Ok(value) = env::var(SIZE_ENV_VAR) {
            config.size = parse_size(&value)?;
        }
        Ok(config)
    }

    /// Reads a JSON configuration. Missing fields take their defaults.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let config: PoolConfig = serde_json::from_reader(reader)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the configuration describes a usable pool.
    pub fn validate(&self) -> Result<()> {
        if self.size == 0 {
            return Err(PoolError::InvalidSize(self.size));
        }
        Ok(())
    }
}

/// Parses a worker count, rejecting zero and anything that is not a
/// non-negative integer.
pub fn parse_size(value: &str) -> Result<usize> {
    let size = value.trim().parse::<usize>().map_err(|e| {
        PoolError::StringError(format!("Invalid pool size '{}': {}", value, e))
    })?;
    if size == 0 {
        return Err(PoolError::InvalidSize(size));
    }
    Ok(size)
}
