//! Chain interaction layer for the Comet liquidator.
//!
//! This crate provides:
//! - The read-only [`Ledger`] seam and its Comet implementation
//! - Calldata encoders and a state reader for the liquidator contract
//! - Gas strategy abstraction (Legacy + EIP-1559)
//! - Transaction signing with a locally tracked nonce
//! - The [`Submitter`] seam with public-mempool and private-relay implementations

pub mod contracts;
pub mod gas;
pub mod protocol;
mod provider;
mod signer;
pub mod submit;

#[cfg(test)]
pub(crate) mod testing;

pub use contracts::{
    encode_absorb_and_arbitrage, encode_init_flash, encode_set_asset_config, AbsorbPlan,
    AssetConfig, LiquidatorContract, LiquidatorView, SwapLeg,
};
pub use gas::{GasPricing, GasSettings};
pub use protocol::{Asset, CometLedger, Ledger};
pub use provider::{ProviderManager, ReceiptSummary};
pub use signer::{NonceManager, SignedTransaction, TransactionSigner};
pub use submit::{
    BundleResolution, ContractCall, PublicSubmitter, RelayClient, RelaySubmitter,
    SubmissionResult, SubmissionStrategy, SubmitError, SubmitTimeouts, Submitter,
};
