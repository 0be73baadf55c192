//! Collateral valuator.
//!
//! Decides whether the ledger holds enough surplus collateral to make an
//! arbitrage-only attempt worthwhile.

use crate::guard::{CallGuard, CoreError};
use crate::u256_math::{usd_threshold, usd_to_f64, usd_value};
use alloy::primitives::U256;
use liquidator_chain::{Asset, Ledger};
use std::sync::Arc;
use tracing::debug;

pub struct CollateralValuator {
    ledger: Arc<dyn Ledger>,
    guard: CallGuard,
}

impl CollateralValuator {
    pub fn new(ledger: Arc<dyn Ledger>, guard: CallGuard) -> Self {
        Self { ledger, guard }
    }

    /// True once `Σ reserves * price / scale` reaches `min_usd` whole dollars.
    /// The total is checked after each asset, so an empty asset list is
    /// always false and a zero threshold is met by the first asset. Stops
    /// reading as soon as the threshold is met.
    pub async fn has_purchaseable_collateral(
        &self,
        assets: &[Asset],
        min_usd: u64,
    ) -> Result<bool, CoreError> {
        let threshold = usd_threshold(min_usd);
        let mut total = U256::ZERO;

        for asset in assets {
            let reserves = self
                .guard
                .call("getCollateralReserves", self.ledger.collateral_reserves(asset.address))
                .await?;
            if !reserves.is_zero() {
                let price = self
                    .guard
                    .call("getPrice", self.ledger.price(asset.price_feed))
                    .await?;

                total = total.saturating_add(usd_value(reserves, price, asset.scale));
                debug!(
                    asset = %asset.address,
                    running_usd = usd_to_f64(total),
                    "Valued reserves"
                );
            }

            if total >= threshold {
                return Ok(true);
            }
        }

        Ok(false)
    }
}
