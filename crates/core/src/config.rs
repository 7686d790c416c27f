//! Simulator configuration.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::level_filters::LevelFilter;

/// Default inclusive upper bound on the per-message delay.
pub const DEFAULT_MAX_LATENCY: u64 = 100;
/// Default seed for the delay generator.
pub const DEFAULT_RANDOM_SEED: u64 = 1234;

/// Which liveness checks run when a message reaches its delivery time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryGuard {
    /// Deliver only if the sender is still alive. A failed destination still
    /// receives.
    #[default]
    Sender,
    /// Deliver only if both sender and destination are alive.
    SenderAndDestination,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("max_latency must be at least 1")]
    ZeroMaxLatency,

    #[error("message loss rate {0} is outside 0.0..=1.0")]
    LossRate(f64),

    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Configuration for a [`Simulator`](crate::simulation::Simulator).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```toml
/// random_seed = 1233
/// max_latency = 50
/// debug = true
/// delivery_guard = "sender_and_destination"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Seed for the delay generator.
    pub random_seed: u64,
    /// Inclusive upper bound on the per-message delay, at least 1.
    pub max_latency: u64,
    /// Trace every send and delivery at debug level. Never changes behaviour.
    pub debug: bool,
    pub delivery_guard: DeliveryGuard,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            random_seed: DEFAULT_RANDOM_SEED,
            max_latency: DEFAULT_MAX_LATENCY,
            debug: false,
            delivery_guard: DeliveryGuard::default(),
        }
    }
}

impl SimulatorConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.random_seed = seed;
        self
    }

    pub fn with_max_latency(mut self, max_latency: u64) -> Self {
        self.max_latency = max_latency;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn with_delivery_guard(mut self, guard: DeliveryGuard) -> Self {
        self.delivery_guard = guard;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_latency == 0 {
            return Err(ConfigError::ZeroMaxLatency);
        }
        Ok(())
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }
}

/// Installs the global tracing subscriber, once per process.
///
/// Later calls are no-ops. `level` overrides the default filter; `RUST_LOG`
/// directives still apply on top.
pub fn set_logger(level: Option<LevelFilter>) -> anyhow::Result<()> {
    #[cfg(feature = "trace")]
    {
        use std::sync::atomic::{AtomicBool, Ordering};

        static LOGGER_SET: AtomicBool = AtomicBool::new(false);
        if LOGGER_SET
            .compare_exchange(false, true, Ordering::Release, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        crate::tracing::tracer::init_tracer(level)?;
    }
    #[cfg(not(feature = "trace"))]
    {
        let _ = level;
    }
    Ok(())
}
