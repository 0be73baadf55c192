//! Asset-config administration for the `absorbAndArbitrage` liquidator.

use crate::events::{LogEvent, LogSink};
use crate::guard::{CallGuard, CoreError};
use alloy::primitives::{Address, U256};
use liquidator_chain::{
    encode_set_asset_config, ContractCall, LiquidatorView, SubmissionResult, SubmitError,
    Submitter,
};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AdminError {
    #[error("{caller} is not the liquidator admin ({admin})")]
    Unauthorized { caller: Address, admin: Address },

    #[error("setAssetConfig did not land: {0}")]
    NotApplied(SubmissionResult),

    #[error(transparent)]
    Submit(#[from] SubmitError),

    #[error(transparent)]
    Core(#[from] CoreError),
}

pub struct AssetAdmin {
    liquidator: Arc<dyn LiquidatorView>,
    submitter: Arc<dyn Submitter>,
    guard: CallGuard,
    sink: Arc<dyn LogSink>,
}

impl AssetAdmin {
    pub fn new(
        liquidator: Arc<dyn LiquidatorView>,
        submitter: Arc<dyn Submitter>,
        guard: CallGuard,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            liquidator,
            submitter,
            guard,
            sink,
        }
    }

    /// Set the purchase limit for `asset` on `ledger`.
    ///
    /// Refuses to submit when the signer is not the contract admin. A revert
    /// with `Unauthorized()` maps to the same error.
    pub async fn configure_asset(
        &self,
        ledger: Address,
        asset: Address,
        max_collateral_to_purchase: U256,
        enabled: bool,
    ) -> Result<SubmissionResult, AdminError> {
        let caller = self.submitter.sender();
        let admin = self.guard.call("admin", self.liquidator.admin()).await?;
        if admin != caller {
            self.sink.emit(
                LogEvent::warning("Asset config change refused")
                    .field("caller", caller)
                    .field("admin", admin)
                    .field("asset", asset),
            );
            return Err(AdminError::Unauthorized { caller, admin });
        }

        let call = ContractCall::new(
            self.liquidator.address(),
            encode_set_asset_config(ledger, asset, max_collateral_to_purchase, enabled),
            "setAssetConfig",
        );

        let result = match self.submitter.submit(call).await {
            Ok(result) => result,
            Err(e) if e.is_unauthorized() => {
                return Err(AdminError::Unauthorized { caller, admin });
            }
            Err(e) => return Err(e.into()),
        };

        if !result.is_success() {
            return Err(AdminError::NotApplied(result));
        }

        self.sink.emit(
            LogEvent::info("Asset config updated")
                .field("ledger", ledger)
                .field("asset", asset)
                .field("max_collateral_to_purchase", max_collateral_to_purchase)
                .field("enabled", enabled)
                .field("tx_hash", format!("{:#x}", result.tx_hash())),
        );
        Ok(result)
    }
}
