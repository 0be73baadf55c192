//! Uniswap V3 quoting.
//!
//! Quotes come from QuoterV2 `quoteExactInputSingle`; the executable leg is
//! SwapRouter `exactInputSingle` calldata with the liquidator as recipient.

use super::{min_output_after_slippage, SwapQuote, SwapQuoter, SwapRequest};
use alloy::primitives::aliases::U24;
use alloy::primitives::{address, Address, Bytes, U160, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

sol! {
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params)
            external
            returns (
                uint256 amountOut,
                uint160 sqrtPriceX96After,
                uint32 initializedTicksCrossed,
                uint256 gasEstimate
            );
    }

    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params)
            external
            payable
            returns (uint256 amountOut);
    }
}

/// Seconds a quoted swap stays executable.
const SWAP_DEADLINE_SECS: i64 = 600;

/// Uniswap V3 periphery addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UniswapV3Addresses {
    pub swap_router: Address,
    pub quoter_v2: Address,
}

impl UniswapV3Addresses {
    /// Ethereum mainnet.
    pub const fn mainnet() -> Self {
        Self {
            swap_router: address!("E592427A0AEce92De3Edee1F18E0157C05861564"),
            quoter_v2: address!("61fFE014bA17989E743c5F6cB21bF9697530B21e"),
        }
    }
}

/// Uniswap V3 fee tiers in hundredths of a basis point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeeTier {
    Lowest = 100,
    Low = 500,
    Medium = 3000,
    High = 10000,
}

impl FeeTier {
    /// Tiers probed for an unknown pair, most liquid first for typical
    /// collateral/base pairs.
    pub const PROBE_ORDER: [FeeTier; 4] =
        [FeeTier::Low, FeeTier::Medium, FeeTier::Lowest, FeeTier::High];

    pub fn fee(self) -> u32 {
        self as u32
    }
}

/// Quoter backed by QuoterV2 over HTTP, remembering the best tier per pair.
#[derive(Clone)]
pub struct UniswapV3Quoter {
    rpc_url: String,
    addresses: UniswapV3Addresses,
    fee_cache: Arc<DashMap<(Address, Address), u32>>,
}

impl std::fmt::Debug for UniswapV3Quoter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UniswapV3Quoter")
            .field("rpc_url", &self.rpc_url)
            .field("addresses", &self.addresses)
            .field("cached_pairs", &self.fee_cache.len())
            .finish()
    }
}

impl UniswapV3Quoter {
    pub fn new(rpc_url: impl Into<String>, addresses: UniswapV3Addresses) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            addresses,
            fee_cache: Arc::new(DashMap::new()),
        }
    }

    pub fn mainnet(rpc_url: impl Into<String>) -> Self {
        Self::new(rpc_url, UniswapV3Addresses::mainnet())
    }

    pub fn cached_fee(&self, token_in: Address, token_out: Address) -> Option<u32> {
        self.fee_cache.get(&(token_in, token_out)).map(|fee| *fee)
    }

    async fn quote_at(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
        fee: u32,
    ) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let quoter = IQuoterV2::new(self.addresses.quoter_v2, provider);
        let params = IQuoterV2::QuoteExactInputSingleParams {
            tokenIn: token_in,
            tokenOut: token_out,
            amountIn: amount_in,
            fee: U24::from(fee),
            sqrtPriceLimitX96: U160::ZERO,
        };
        Ok(quoter.quoteExactInputSingle(params).call().await?.amountOut)
    }

    /// Best `(fee, amount_out)` for the pair, probing every tier on a cache miss.
    async fn best_quote(
        &self,
        token_in: Address,
        token_out: Address,
        amount_in: U256,
    ) -> Result<(u32, U256)> {
        if let Some(fee) = self.cached_fee(token_in, token_out) {
            match self.quote_at(token_in, token_out, amount_in, fee).await {
                Ok(out) if !out.is_zero() => return Ok((fee, out)),
                Ok(_) | Err(_) => {
                    debug!(fee, "Cached fee tier stopped quoting, probing again");
                    self.fee_cache.remove(&(token_in, token_out));
                }
            }
        }

        let mut best: Option<(u32, U256)> = None;
        for tier in FeeTier::PROBE_ORDER {
            match self.quote_at(token_in, token_out, amount_in, tier.fee()).await {
                Ok(out) if best.map_or(true, |(_, b)| out > b) => best = Some((tier.fee(), out)),
                Ok(_) => {}
                Err(e) => debug!(fee = tier.fee(), error = %e, "Fee tier not quotable"),
            }
        }

        match best {
            Some((fee, out)) if !out.is_zero() => {
                self.fee_cache.insert((token_in, token_out), fee);
                Ok((fee, out))
            }
            _ => anyhow::bail!("no Uniswap V3 liquidity for {token_in} -> {token_out}"),
        }
    }

    /// `exactInputSingle` calldata for a quoted swap.
    pub fn encode_swap(
        request: &SwapRequest,
        fee: u32,
        min_output: U256,
        deadline: U256,
    ) -> Bytes {
        ISwapRouter::exactInputSingleCall {
            params: ISwapRouter::ExactInputSingleParams {
                tokenIn: request.token_in,
                tokenOut: request.token_out,
                fee: U24::from(fee),
                recipient: request.recipient,
                deadline,
                amountIn: request.amount_in,
                amountOutMinimum: min_output,
                sqrtPriceLimitX96: U160::ZERO,
            },
        }
        .abi_encode()
        .into()
    }
}

#[async_trait]
impl SwapQuoter for UniswapV3Quoter {
    fn quoter_id(&self) -> &str {
        "uniswap-v3"
    }

    async fn quote(&self, request: &SwapRequest) -> Result<SwapQuote> {
        let (fee, expected_output) = self
            .best_quote(request.token_in, request.token_out, request.amount_in)
            .await?;
        let min_output = min_output_after_slippage(expected_output, request.slippage_bps);
        let deadline = U256::from((chrono::Utc::now().timestamp() + SWAP_DEADLINE_SECS).max(0) as u64);

        debug!(
            token_in = %request.token_in,
            token_out = %request.token_out,
            amount_in = %request.amount_in,
            expected = %expected_output,
            fee,
            "Uniswap V3 quote"
        );

        Ok(SwapQuote {
            token_in: request.token_in,
            token_out: request.token_out,
            amount_in: request.amount_in,
            expected_output,
            min_output,
            fee,
            target: self.addresses.swap_router,
            calldata: Self::encode_swap(request, fee, min_output, deadline),
        })
    }
}
