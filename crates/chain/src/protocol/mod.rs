//! Lending ledger abstraction.
//!
//! The engine only ever reads from the ledger: the withdrawal history to find
//! accounts worth watching, the collateral configuration, the solvency
//! predicate, and the reserves/prices used to value purchasable collateral.
//! Everything that writes goes through the liquidator contract instead.
//!
//! [`Ledger`] is the seam; [`CometLedger`] talks to a deployed Comet over
//! HTTP JSON-RPC.

mod comet;

pub use comet::CometLedger;

use alloy::primitives::{Address, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// Collateral asset accepted by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Asset {
    /// ERC-20 token address.
    pub address: Address,
    /// Price feed the ledger prices this asset with.
    pub price_feed: Address,
    /// Fixed-point unit of the token (10^decimals).
    pub scale: U256,
}

impl Asset {
    pub fn new(address: Address, price_feed: Address, scale: U256) -> Self {
        Self {
            address,
            price_feed,
            scale,
        }
    }
}

/// Read-only interface to a Compound III style ledger.
#[async_trait]
pub trait Ledger: Send + Sync + Debug {
    /// Ledger contract address.
    fn address(&self) -> Address;

    /// Current head block of the chain the ledger lives on.
    async fn block_number(&self) -> Result<u64>;

    /// `src` of every `Withdraw` log in `[from_block, to_block]`, in log order.
    /// Duplicates are returned as-is.
    async fn withdraw_sources(&self, from_block: u64, to_block: u64) -> Result<Vec<Address>>;

    async fn num_assets(&self) -> Result<u8>;

    async fn asset_info(&self, index: u8) -> Result<Asset>;

    /// The ledger's own solvency predicate, evaluated against live state.
    async fn is_liquidatable(&self, account: Address) -> Result<bool>;

    /// Surplus collateral the ledger holds and is willing to sell.
    async fn collateral_reserves(&self, asset: Address) -> Result<U256>;

    /// Price from `price_feed`, 8 decimals.
    async fn price(&self, price_feed: Address) -> Result<U256>;

    /// Token the ledger lends out and settles purchases in.
    async fn base_token(&self) -> Result<Address>;

    /// Collateral balance `account` holds of `asset`.
    async fn collateral_balance(&self, account: Address, asset: Address) -> Result<U256>;
}
