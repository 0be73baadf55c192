//! Contract bindings for the Comet ledger and the liquidator contract.
//!
//! `comet` holds the read-only ledger surface used by scanning and valuation.
//! `liquidator` holds calldata encoders for the flash-loan entry points and
//! the admin-gated asset configuration.

pub mod comet;
pub mod liquidator;

pub use comet::IComet;
pub use liquidator::{
    encode_absorb_and_arbitrage, encode_init_flash, encode_set_asset_config, is_unauthorized_revert,
    AbsorbPlan, AssetConfig, ILiquidator, LiquidatorContract, LiquidatorView, SwapLeg,
};
