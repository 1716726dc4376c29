//! Crate configuration
//!
//! # Environment Variables
//!
//! - `KEPLERFORGE_DEVICE`: device ordinal to configure (default: 0)
//! - `KEPLERFORGE_MIN_FREE_MEMORY_GB`: free-memory threshold of the
//!   environment validator, in GiB (default: 8)
//! - `KEPLERFORGE_STRICT_ENV`: abort initialization when validation fails
//!   ("1"/"true"/"yes" or "0"/"false"/"no", default: off)
//! - `KEPLERFORGE_LOG_*`: see [`crate::logging`]

use std::env;

use crate::device::validator::DEFAULT_MIN_FREE_MEMORY_BYTES;
use crate::error::{ForgeError, ForgeResult};
use crate::logging::{self, LoggingConfig, LoggingError};

const DEVICE_ENV: &str = "KEPLERFORGE_DEVICE";
const MIN_FREE_MEMORY_ENV: &str = "KEPLERFORGE_MIN_FREE_MEMORY_GB";
const STRICT_ENV: &str = "KEPLERFORGE_STRICT_ENV";

const GIB: u64 = 1024 * 1024 * 1024;

/// Per-device configuration
#[derive(Debug, Clone)]
pub struct ForgeConfig {
    /// Device ordinal to configure
    pub device_id: i32,
    /// Free memory required before optimized paths are enabled
    pub min_free_memory_bytes: u64,
    /// Fail initialization instead of degrading when validation fails
    pub strict_environment: bool,
    /// Subscriber setup applied by [`ForgeConfig::init_logging`]
    pub logging: LoggingConfig,
}

impl Default for ForgeConfig {
    fn default() -> Self {
        ForgeConfig {
            device_id: 0,
            min_free_memory_bytes: DEFAULT_MIN_FREE_MEMORY_BYTES,
            strict_environment: false,
            logging: LoggingConfig::default(),
        }
    }
}

impl ForgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_device_id(mut self, device_id: i32) -> Self {
        self.device_id = device_id;
        self
    }

    pub fn with_min_free_memory_bytes(mut self, bytes: u64) -> Self {
        self.min_free_memory_bytes = bytes;
        self
    }

    pub fn with_strict_environment(mut self, strict: bool) -> Self {
        self.strict_environment = strict;
        self
    }

    pub fn with_logging(mut self, logging: LoggingConfig) -> Self {
        self.logging = logging;
        self
    }

    /// Defaults overridden by `KEPLERFORGE_*` environment variables.
    ///
    /// Unset variables keep their defaults; set but unparseable values are
    /// rejected with [`ForgeError::InvalidConfiguration`].
    pub fn from_env() -> ForgeResult<Self> {
        let mut config = ForgeConfig {
            logging: LoggingConfig::from_env(),
            ..ForgeConfig::default()
        };

        if let Ok(value) = env::var(DEVICE_ENV) {
            config.device_id = parse_device_id(&value)?;
        }

        if let Ok(value) = env::var(MIN_FREE_MEMORY_ENV) {
            let gib: u64 = value.trim().parse().map_err(|_| {
                ForgeError::InvalidConfiguration(format!(
                    "{} must be a whole number of GiB, got '{}'",
                    MIN_FREE_MEMORY_ENV, value
                ))
            })?;
            config.min_free_memory_bytes = gib.checked_mul(GIB).ok_or_else(|| {
                ForgeError::InvalidConfiguration(format!(
                    "{} is out of range: {}",
                    MIN_FREE_MEMORY_ENV, gib
                ))
            })?;
        }

        if let Ok(value) = env::var(STRICT_ENV) {
            config.strict_environment = parse_bool(STRICT_ENV, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Install the global subscriber described by `self.logging`
    ///
    /// Only the first initialization in a process takes effect.
    pub fn init_logging(&self) -> Result<(), LoggingError> {
        logging::init_with_config(&self.logging)
    }

    pub fn validate(&self) -> ForgeResult<()> {
        if self.device_id < 0 {
            return Err(ForgeError::InvalidConfiguration(format!(
                "device id must be non-negative, got {}",
                self.device_id
            )));
        }
        Ok(())
    }
}

fn parse_device_id(value: &str) -> ForgeResult<i32> {
    value.trim().parse::<i32>().map_err(|_| {
        ForgeError::InvalidConfiguration(format!(
            "{} must be a device ordinal, got '{}'",
            DEVICE_ENV, value
        ))
    })
}

fn parse_bool(name: &str, value: &str) -> ForgeResult<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        _ => Err(ForgeError::InvalidConfiguration(format!(
            "{} must be a boolean, got '{}'",
            name, value
        ))),
    }
}
