//! Process configuration resolved from the environment.

use super::deployment::{parse_address, Deployment};
use super::{BotConfig, ConfigError};
use alloy::primitives::Address;
use std::fmt;
use tracing::info;

/// Environment variable names.
pub mod env {
    pub const DEPLOYMENT: &str = "DEPLOYMENT";
    pub const LIQUIDATOR_ADDRESS: &str = "LIQUIDATOR_ADDRESS";
    pub const USE_FLASHBOTS: &str = "USE_FLASHBOTS";
    pub const ETH_PK: &str = "ETH_PK";
    pub const RPC_URL: &str = "RPC_URL";
    pub const BOT_PROFILE: &str = "BOT_PROFILE";
    pub const BOT_CONFIG: &str = "BOT_CONFIG";
    pub const RELAY_URL: &str = "RELAY_URL";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

pub const DEFAULT_RELAY_URL: &str = "https://relay.flashbots.net";

/// Everything the binary needs before it can build components.
#[derive(Clone)]
pub struct RuntimeConfig {
    pub deployment: Deployment,
    pub rpc_url: String,
    pub liquidator: Address,
    pub use_relay: bool,
    pub relay_url: String,
    pub private_key: String,
    pub bot: BotConfig,
}

impl fmt::Debug for RuntimeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeConfig")
            .field("deployment", &self.deployment.name)
            .field("rpc_url", &self.rpc_url)
            .field("liquidator", &self.liquidator)
            .field("use_relay", &self.use_relay)
            .field("relay_url", &self.relay_url)
            .field("private_key", &"<redacted>")
            .field("bot", &self.bot.profile)
            .finish()
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve through `lookup` so tests need not touch the process env.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let selector = get(env::DEPLOYMENT).ok_or(ConfigError::Missing(env::DEPLOYMENT))?;
        let deployment = Deployment::resolve(&selector)?;

        let rpc_url = get(env::RPC_URL)
            .or_else(|| deployment.rpc_url.clone())
            .ok_or(ConfigError::Missing(env::RPC_URL))?;

        let liquidator = get(env::LIQUIDATOR_ADDRESS)
            .ok_or(ConfigError::Missing(env::LIQUIDATOR_ADDRESS))
            .and_then(|v| parse_address(env::LIQUIDATOR_ADDRESS, &v))?;

        let use_relay = match get(env::USE_FLASHBOTS) {
            Some(v) => parse_flag(env::USE_FLASHBOTS, &v)?,
            None => false,
        };

        let private_key = get(env::ETH_PK).ok_or(ConfigError::Missing(env::ETH_PK))?;

        let relay_url = get(env::RELAY_URL).unwrap_or_else(|| DEFAULT_RELAY_URL.to_string());

        let mut bot = match get(env::BOT_CONFIG) {
            Some(path) => BotConfig::from_file(&path)?,
            None => BotConfig::from_profile(get(env::BOT_PROFILE).as_deref().unwrap_or("default")),
        };
        if bot.directory.start_block.is_none() {
            bot.directory.start_block = Some(deployment.start_block);
        }
        bot.validate()?;

        Ok(Self {
            deployment,
            rpc_url,
            liquidator,
            use_relay,
            relay_url,
            private_key,
            bot,
        })
    }

    pub fn log_config(&self) {
        info!(
            deployment = %self.deployment.name,
            chain_id = self.deployment.chain_id,
            ledger = %self.deployment.ledger,
            pair_token = %self.deployment.pair_token,
            pool_fee = self.deployment.pool_fee,
            "Deployment"
        );
        info!(
            liquidator = %self.liquidator,
            use_relay = self.use_relay,
            relay_url = %self.relay_url,
            "Submission"
        );
        self.bot.log_config();
    }
}

fn parse_flag(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::invalid(key, value, "expected true or false")),
    }
}
