//! Bot runtime configuration with profile support.
//!
//! A profile (`default`, `testing`, `production`) picks a coherent set of
//! timings and thresholds. A TOML file can replace the profile entirely;
//! any section or key it leaves out falls back to the defaults below.

use super::ConfigError;
use liquidator_chain::gas::GasSettings;
use liquidator_chain::SubmitTimeouts;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    #[serde(default = "default_profile_name")]
    pub profile: String,

    #[serde(default)]
    pub main_loop: LoopConfig,

    #[serde(default)]
    pub directory: DirectoryConfig,

    #[serde(default)]
    pub executor: ExecutorConfig,

    #[serde(default)]
    pub gas: GasSettings,

    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_profile_name() -> String {
    "default".to_string()
}

/// Main loop cadence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Working sets are rebuilt every this many iterations.
    #[serde(default = "default_refresh_every")]
    pub refresh_every_iterations: u64,

    /// Pause between iterations.
    #[serde(default = "default_iteration_delay")]
    pub iteration_delay_secs: u64,
}

fn default_refresh_every() -> u64 {
    1000
}
fn default_iteration_delay() -> u64 {
    20
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            refresh_every_iterations: default_refresh_every(),
            iteration_delay_secs: default_iteration_delay(),
        }
    }
}

impl LoopConfig {
    pub fn iteration_delay(&self) -> Duration {
        Duration::from_secs(self.iteration_delay_secs)
    }
}

/// Withdrawal log replay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// First block to replay from. `None` uses the deployment's checkpoint.
    #[serde(default)]
    pub start_block: Option<u64>,

    /// Block span per `eth_getLogs` request.
    #[serde(default = "default_log_chunk_blocks")]
    pub log_chunk_blocks: u64,
}

fn default_log_chunk_blocks() -> u64 {
    50_000
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            start_block: None,
            log_chunk_blocks: default_log_chunk_blocks(),
        }
    }
}

/// Which liquidator entry point to call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutorVariant {
    /// `initFlash`: the contract sizes and routes everything itself.
    Flash,
    /// `absorbAndArbitrage`: purchases sized off-chain, swaps quoted here.
    OnChain,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    #[serde(default = "default_variant")]
    pub variant: ExecutorVariant,

    /// Minimum purchasable collateral, in whole USD, before an
    /// arbitrage-only attempt is made.
    #[serde(default = "default_min_arbitrage_usd")]
    pub min_arbitrage_usd: u64,

    /// Accounts absorbed per `absorbAndArbitrage` call.
    #[serde(default = "default_max_accounts_per_call")]
    pub max_accounts_per_call: usize,

    /// Iterations without submissions after a nonce or relay anomaly.
    #[serde(default)]
    pub anomaly_cooldown_iterations: u32,

    /// Slippage tolerance for quoted collateral sales.
    #[serde(default = "default_swap_slippage_bps")]
    pub swap_slippage_bps: u16,
}

fn default_variant() -> ExecutorVariant {
    ExecutorVariant::Flash
}
fn default_min_arbitrage_usd() -> u64 {
    100
}
fn default_max_accounts_per_call() -> usize {
    1
}
fn default_swap_slippage_bps() -> u16 {
    50
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            variant: default_variant(),
            min_arbitrage_usd: default_min_arbitrage_usd(),
            max_accounts_per_call: default_max_accounts_per_call(),
            anomaly_cooldown_iterations: 0,
            swap_slippage_bps: default_swap_slippage_bps(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Any single read or request.
    #[serde(default = "default_rpc_secs")]
    pub rpc_secs: u64,

    /// Receipt or bundle-target wait.
    #[serde(default = "default_confirm_secs")]
    pub confirm_secs: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_rpc_secs() -> u64 {
    10
}
fn default_confirm_secs() -> u64 {
    120
}
fn default_poll_interval_ms() -> u64 {
    2_000
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            rpc_secs: default_rpc_secs(),
            confirm_secs: default_confirm_secs(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl TimeoutConfig {
    pub fn rpc(&self) -> Duration {
        Duration::from_secs(self.rpc_secs)
    }

    pub fn submit_timeouts(&self) -> SubmitTimeouts {
        SubmitTimeouts {
            rpc: self.rpc(),
            confirm: Duration::from_secs(self.confirm_secs),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
        }
    }
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            main_loop: LoopConfig::default(),
            directory: DirectoryConfig::default(),
            executor: ExecutorConfig::default(),
            gas: GasSettings::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl BotConfig {
    /// Load from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    /// Short cycles and a $1 arbitrage floor, for forks and testnets.
    pub fn testing() -> Self {
        Self {
            profile: "testing".to_string(),
            main_loop: LoopConfig {
                refresh_every_iterations: 50,
                iteration_delay_secs: 2,
            },
            directory: DirectoryConfig {
                start_block: None,
                log_chunk_blocks: 10_000,
            },
            executor: ExecutorConfig {
                min_arbitrage_usd: 1,
                ..ExecutorConfig::default()
            },
            gas: GasSettings::default(),
            timeouts: TimeoutConfig {
                rpc_secs: 5,
                confirm_secs: 30,
                poll_interval_ms: 500,
            },
        }
    }

    /// One iteration per block and a pause after anomalies.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            main_loop: LoopConfig {
                refresh_every_iterations: 1000,
                iteration_delay_secs: 12,
            },
            directory: DirectoryConfig::default(),
            executor: ExecutorConfig {
                anomaly_cooldown_iterations: 5,
                ..ExecutorConfig::default()
            },
            gas: GasSettings {
                limit_multiplier: 1.3,
                ..GasSettings::default()
            },
            timeouts: TimeoutConfig::default(),
        }
    }

    /// Profile by name; unknown names fall back to the default profile.
    pub fn from_profile(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "testing" | "test" => Self::testing(),
            "production" | "prod" => Self::production(),
            "default" | "" => Self::default(),
            other => {
                tracing::warn!(profile = other, "Unknown bot profile, using default");
                Self::default()
            }
        }
    }

    /// Reject values the loop cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.main_loop.refresh_every_iterations == 0 {
            return Err(ConfigError::invalid(
                "main_loop.refresh_every_iterations",
                "0",
                "must be at least 1",
            ));
        }
        if self.directory.log_chunk_blocks == 0 {
            return Err(ConfigError::invalid(
                "directory.log_chunk_blocks",
                "0",
                "must be at least 1",
            ));
        }
        if self.executor.max_accounts_per_call == 0 {
            return Err(ConfigError::invalid(
                "executor.max_accounts_per_call",
                "0",
                "must be at least 1",
            ));
        }
        if self.timeouts.rpc_secs == 0 || self.timeouts.confirm_secs == 0 {
            return Err(ConfigError::invalid("timeouts", "0", "timeouts must be positive"));
        }
        Ok(())
    }

    pub fn log_config(&self) {
        tracing::info!(profile = %self.profile, "Bot configuration loaded");
        tracing::info!(
            refresh_every = self.main_loop.refresh_every_iterations,
            delay_secs = self.main_loop.iteration_delay_secs,
            log_chunk_blocks = self.directory.log_chunk_blocks,
            "Loop cadence"
        );
        tracing::info!(
            variant = ?self.executor.variant,
            min_arbitrage_usd = self.executor.min_arbitrage_usd,
            max_accounts_per_call = self.executor.max_accounts_per_call,
            anomaly_cooldown = self.executor.anomaly_cooldown_iterations,
            "Executor parameters"
        );
        tracing::info!(
            pricing = ?self.gas.pricing,
            limit_multiplier = self.gas.limit_multiplier,
            relay_bump_gwei = self.gas.relay_priority_bump_gwei,
            rpc_timeout_secs = self.timeouts.rpc_secs,
            confirm_timeout_secs = self.timeouts.confirm_secs,
            "Gas and timeouts"
        );
    }
}
