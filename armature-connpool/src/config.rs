//! Pool configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::{PoolError, Result};

/// Default size of the per-connection read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 1024;

/// Connection pool configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of open connections (idle and checked out).
    #[serde(default = "default_max_size")]
    pub max_size: usize,
    /// How long `get` may wait for a connection, dial included. `None`
    /// waits forever.
    #[serde(rename = "acquire_timeout_ms", with = "duration_ms", default)]
    pub acquire_timeout: Option<Duration>,
    /// Read buffer capacity for each connection.
    #[serde(default = "default_read_buffer_size")]
    pub read_buffer_size: usize,
}

fn default_max_size() -> usize {
    10
}

fn default_read_buffer_size() -> usize {
    DEFAULT_READ_BUFFER_SIZE
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_size: default_max_size(),
            acquire_timeout: None,
            read_buffer_size: default_read_buffer_size(),
        }
    }
}

impl PoolConfig {
    /// Create a configuration with the given capacity.
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Default::default()
        }
    }

    /// Create a builder.
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> PoolConfigBuilder {
        let mut builder = PoolConfigBuilder::new();

        if let Ok(max_size) = std::env::var("CONNPOOL_MAX_SIZE")
            && let Ok(size) = max_size.parse() {
                builder = builder.max_size(size);
            }

        if let Ok(timeout) = std::env::var("CONNPOOL_ACQUIRE_TIMEOUT_SECS")
            && let Ok(secs) = timeout.parse() {
                builder = builder.acquire_timeout(Duration::from_secs(secs));
            }

        if let Ok(size) = std::env::var("CONNPOOL_READ_BUFFER_SIZE")
            && let Ok(size) = size.parse() {
                builder = builder.read_buffer_size(size);
            }

        builder
    }

    /// Check the configuration for values the pool cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.max_size == 0 {
            return Err(PoolError::Config(
                "max_size must be greater than zero".to_string(),
            ));
        }
        if self.acquire_timeout == Some(Duration::ZERO) {
            return Err(PoolError::Config(
                "acquire_timeout must be greater than zero".to_string(),
            ));
        }
        if self.read_buffer_size == 0 {
            return Err(PoolError::Config(
                "read_buffer_size must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for pool configuration.
#[derive(Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: PoolConfig::default(),
        }
    }

    /// Set the maximum number of open connections.
    pub fn max_size(mut self, size: usize) -> Self {
        self.config.max_size = size;
        self
    }

    /// Bound how long `get` waits for a connection.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.config.acquire_timeout = Some(timeout);
        self
    }

    /// Set the per-connection read buffer size.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.read_buffer_size = size;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> PoolConfig {
        self.config
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration
            .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
