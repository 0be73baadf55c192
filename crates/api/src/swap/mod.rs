//! Swap quoting for collateral sales.
//!
//! When the liquidator buys discounted collateral from the ledger it has to
//! sell it back into the base token inside the same transaction. A
//! [`SwapQuoter`] prices that sale and produces the router target and
//! calldata the liquidator contract forwards verbatim.
//!
//! # Example
//!
//! ```rust,ignore
//! use liquidator_api::swap::{SwapQuoter, SwapRequest, UniswapV3Quoter};
//!
//! let quoter = UniswapV3Quoter::mainnet("https://eth.llamarpc.com");
//! let quote = quoter
//!     .quote(&SwapRequest::new(weth, usdc, amount, liquidator))
//!     .await?;
//! ```

mod uniswap_v3;

pub use uniswap_v3::{FeeTier, UniswapV3Addresses, UniswapV3Quoter};

use alloy::primitives::{Address, Bytes, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;

/// What to sell, for what, and who receives the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapRequest {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    /// Receives `token_out`. For liquidations this is the liquidator contract.
    pub recipient: Address,
    /// Slippage tolerance in basis points.
    pub slippage_bps: u16,
}

impl SwapRequest {
    pub fn new(token_in: Address, token_out: Address, amount_in: U256, recipient: Address) -> Self {
        Self {
            token_in,
            token_out,
            amount_in,
            recipient,
            slippage_bps: 50,
        }
    }

    pub fn with_slippage_bps(mut self, slippage_bps: u16) -> Self {
        self.slippage_bps = slippage_bps;
        self
    }
}

/// Priced, executable swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapQuote {
    pub token_in: Address,
    pub token_out: Address,
    pub amount_in: U256,
    pub expected_output: U256,
    /// `expected_output` less slippage; encoded into the calldata.
    pub min_output: U256,
    /// Pool fee tier the quote was taken at.
    pub fee: u32,
    /// Contract to call.
    pub target: Address,
    /// Calldata for `target`.
    pub calldata: Bytes,
}

/// Apply a basis-point slippage haircut.
pub fn min_output_after_slippage(expected: U256, slippage_bps: u16) -> U256 {
    let keep = 10_000u64.saturating_sub(slippage_bps as u64);
    expected * U256::from(keep) / U256::from(10_000u64)
}

/// Source of executable swap quotes.
#[async_trait]
pub trait SwapQuoter: Send + Sync + Debug {
    fn quoter_id(&self) -> &str;

    async fn quote(&self, request: &SwapRequest) -> Result<SwapQuote>;
}
