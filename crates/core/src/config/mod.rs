//! Configuration for the liquidation bot.
//!
//! - Bot runtime configuration (profiles, cadence, thresholds, gas, timeouts)
//! - Deployment presets (ledger, flash-loan pair, checkpoint block)
//! - Environment resolution into a [`RuntimeConfig`]

mod bot;
mod deployment;
mod loader;

pub use bot::{
    BotConfig, DirectoryConfig, ExecutorConfig, ExecutorVariant, LoopConfig, TimeoutConfig,
};
pub use deployment::Deployment;
pub use loader::{env, RuntimeConfig, DEFAULT_RELAY_URL};

use thiserror::Error;

/// Startup configuration failures. All of them are fatal.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid {key}={value:?}: {reason}")]
    Invalid {
        key: &'static str,
        value: String,
        reason: String,
    },

    #[error("unknown deployment {0:?}")]
    UnknownDeployment(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    pub(crate) fn invalid(
        key: &'static str,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        ConfigError::Invalid {
            key,
            value: value.into(),
            reason: reason.into(),
        }
    }
}
