//! Gas pricing and gas limit policy.
//!
//! Pricing is a [`GasStrategy`] picked from [`GasSettings::pricing`]. Limits
//! come from `eth_estimateGas` scaled by [`GasSettings::limit_multiplier`],
//! with [`GasSettings::default_limit`] as the fallback when estimation fails
//! for a reason other than a revert.
//!
//! ```rust,ignore
//! use liquidator_chain::gas::{create_gas_strategy, GasSettings};
//!
//! let strategy = create_gas_strategy(&GasSettings::default());
//! let params = strategy.fetch_params(rpc_url).await?;
//! strategy.apply_gas(&mut tx, &params.with_priority_bump(bump));
//! ```

mod eip1559;
mod legacy;

pub use eip1559::Eip1559GasStrategy;
pub use legacy::LegacyGasStrategy;

use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

const GWEI: f64 = 1e9;

/// Gas parameters fetched from the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasParams {
    Legacy {
        gas_price: u128,
    },
    Eip1559 {
        max_fee_per_gas: u128,
        max_priority_fee_per_gas: u128,
        base_fee: u128,
    },
}

impl GasParams {
    /// Upper bound on what one unit of gas can cost.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }

    /// Raise the tip by `bump` wei. The fee cap grows by the same amount so the
    /// bump is never swallowed by the cap.
    pub fn with_priority_bump(&self, bump: u128) -> GasParams {
        match self {
            GasParams::Legacy { gas_price } => GasParams::Legacy {
                gas_price: gas_price.saturating_add(bump),
            },
            GasParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                base_fee,
            } => GasParams::Eip1559 {
                max_fee_per_gas: max_fee_per_gas.saturating_add(bump),
                max_priority_fee_per_gas: max_priority_fee_per_gas.saturating_add(bump),
                base_fee: *base_fee,
            },
        }
    }
}

/// Pricing model selector, as written in the bot config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasPricing {
    Legacy,
    #[serde(alias = "eip-1559")]
    Eip1559,
}

/// Gas section of the bot config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasSettings {
    #[serde(default = "default_pricing")]
    pub pricing: GasPricing,
    /// Multiplier applied to `eth_estimateGas`.
    #[serde(default = "default_limit_multiplier")]
    pub limit_multiplier: f64,
    /// Gas limit used when estimation is unavailable.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Tip for EIP-1559 transactions, and floor price for legacy ones.
    #[serde(default = "default_priority_fee_gwei")]
    pub priority_fee_gwei: f64,
    /// Hard cap on the per-gas price.
    #[serde(default = "default_max_fee_gwei")]
    pub max_fee_gwei: f64,
    /// `max_fee = base_fee * multiplier + tip`.
    #[serde(default = "default_base_fee_multiplier")]
    pub base_fee_multiplier: f64,
    /// Extra tip added to transactions sent through the private relay.
    #[serde(default = "default_relay_priority_bump_gwei")]
    pub relay_priority_bump_gwei: f64,
}

fn default_pricing() -> GasPricing {
    GasPricing::Eip1559
}
fn default_limit_multiplier() -> f64 {
    1.2
}
fn default_limit() -> u64 {
    2_500_000
}
fn default_priority_fee_gwei() -> f64 {
    1.0
}
fn default_max_fee_gwei() -> f64 {
    300.0
}
fn default_base_fee_multiplier() -> f64 {
    2.0
}
fn default_relay_priority_bump_gwei() -> f64 {
    2.0
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            pricing: default_pricing(),
            limit_multiplier: default_limit_multiplier(),
            default_limit: default_limit(),
            priority_fee_gwei: default_priority_fee_gwei(),
            max_fee_gwei: default_max_fee_gwei(),
            base_fee_multiplier: default_base_fee_multiplier(),
            relay_priority_bump_gwei: default_relay_priority_bump_gwei(),
        }
    }
}

impl GasSettings {
    /// Scale an `eth_estimateGas` result by the configured multiplier.
    pub fn scaled_limit(&self, estimate: u64) -> u64 {
        let scaled = (estimate as f64 * self.limit_multiplier).ceil();
        if scaled.is_finite() && scaled >= estimate as f64 {
            scaled as u64
        } else {
            estimate
        }
    }

    /// Relay tip bump in wei.
    pub fn relay_priority_bump(&self) -> u128 {
        gwei_to_wei(self.relay_priority_bump_gwei)
    }
}

pub(crate) fn gwei_to_wei(gwei: f64) -> u128 {
    if gwei.is_finite() && gwei > 0.0 {
        (gwei * GWEI) as u128
    } else {
        0
    }
}

/// Gas pricing strategy.
#[async_trait]
pub trait GasStrategy: Send + Sync + Debug {
    /// Fetch current gas parameters from the given RPC URL.
    async fn fetch_params(&self, rpc_url: &str) -> Result<GasParams>;

    /// Write the pricing fields of `params` onto `tx`.
    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams);

    fn strategy_name(&self) -> &'static str;
}

/// Build the pricing strategy selected in `settings`.
pub fn create_gas_strategy(settings: &GasSettings) -> Box<dyn GasStrategy> {
    match settings.pricing {
        GasPricing::Eip1559 => Box::new(
            Eip1559GasStrategy::new(
                gwei_to_wei(settings.priority_fee_gwei),
                settings.base_fee_multiplier,
            )
            .with_max_fee_cap(gwei_to_wei(settings.max_fee_gwei)),
        ),
        GasPricing::Legacy => Box::new(LegacyGasStrategy::new(
            gwei_to_wei(settings.priority_fee_gwei),
            gwei_to_wei(settings.max_fee_gwei),
        )),
    }
}
