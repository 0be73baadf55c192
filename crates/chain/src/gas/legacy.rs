//! Legacy (type 0) gas pricing.

use super::{GasParams, GasStrategy};
use alloy::network::TransactionBuilder;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use tracing::warn;

/// Prices transactions with a single `gas_price`, taken from `eth_gasPrice`
/// and clamped to `[floor, cap]`.
#[derive(Debug, Clone)]
pub struct LegacyGasStrategy {
    floor: u128,
    cap: u128,
}

impl LegacyGasStrategy {
    pub fn new(floor: u128, cap: u128) -> Self {
        Self {
            floor,
            cap: cap.max(floor),
        }
    }

    fn clamp(&self, gas_price: u128) -> u128 {
        gas_price.clamp(self.floor, self.cap)
    }
}

#[async_trait]
impl GasStrategy for LegacyGasStrategy {
    async fn fetch_params(&self, rpc_url: &str) -> Result<GasParams> {
        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let gas_price = match provider.get_gas_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(error = %e, floor = self.floor, "eth_gasPrice failed, using floor");
                self.floor
            }
        };
        Ok(GasParams::Legacy {
            gas_price: self.clamp(gas_price),
        })
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        tx.set_gas_price(params.effective_gas_price());
    }

    fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}
