//! External venue clients for the Comet liquidator.
//!
//! This crate provides:
//! - Swap quoting and calldata generation for selling purchased collateral

pub mod swap;

pub use swap::{FeeTier, SwapQuote, SwapQuoter, SwapRequest, UniswapV3Addresses, UniswapV3Quoter};
