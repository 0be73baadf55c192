//! Liquidator contract interface.
//!
//! Two entry points exist on deployed liquidators:
//!
//! - `initFlash(FlashParams)`: the contract borrows the pair token from a
//!   Uniswap V3 pool, absorbs `accounts`, buys discounted collateral and sells
//!   it on its own routing, then repays the flash loan.
//! - `absorbAndArbitrage(...)`: the caller supplies the collateral assets to
//!   buy and the swap target/calldata to sell each one, sized off-chain.
//!
//! Both entry points accept an empty `accounts` list, which turns the call
//! into an arbitrage-only pass over the ledger's collateral reserves.

use alloy::primitives::aliases::U24;
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::ProviderBuilder;
use alloy::sol;
use alloy::sol_types::{SolCall, SolError};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use tracing::debug;

sol! {
    #[derive(Debug)]
    struct FlashParams {
        address[] accounts;
        address pairToken;
        uint24 poolFee;
        bool reversedPair;
    }

    #[sol(rpc)]
    interface ILiquidator {
        error Unauthorized();

        function initFlash(FlashParams calldata params) external;

        function absorbAndArbitrage(
            address comet,
            address[] calldata liquidatableAccounts,
            address[] calldata assets,
            address[] calldata swapTargets,
            bytes[] calldata swapTransactions,
            address flashLoanPairToken,
            uint24 flashLoanPoolFee
        ) external;

        function setAssetConfig(
            address comet,
            address asset,
            uint256 maxCollateralToPurchase,
            bool isSet
        ) external;

        function assetConfigs(address comet, address asset)
            external
            view
            returns (uint256 maxCollateralToPurchase, bool isSet);

        function admin() external view returns (address);
    }
}

/// Per-(ledger, asset) purchase limit held by the liquidator contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AssetConfig {
    pub max_collateral_to_purchase: U256,
    pub is_set: bool,
}

/// One collateral purchase inside an `absorbAndArbitrage` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SwapLeg {
    /// Collateral asset bought from the ledger.
    pub asset: Address,
    /// Contract the liquidator calls to sell the asset.
    pub target: Address,
    /// Calldata forwarded to `target`.
    pub calldata: Bytes,
}

/// Fully sized `absorbAndArbitrage` invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AbsorbPlan {
    pub ledger: Address,
    pub accounts: Vec<Address>,
    pub legs: Vec<SwapLeg>,
    pub pair_token: Address,
    pub pool_fee: u32,
}

/// Encode `initFlash` calldata.
pub fn encode_init_flash(
    accounts: &[Address],
    pair_token: Address,
    pool_fee: u32,
    reversed_pair: bool,
) -> Bytes {
    let call = ILiquidator::initFlashCall {
        params: FlashParams {
            accounts: accounts.to_vec(),
            pairToken: pair_token,
            poolFee: U24::from(pool_fee),
            reversedPair: reversed_pair,
        },
    };
    call.abi_encode().into()
}

/// Encode `absorbAndArbitrage` calldata from a sized plan.
pub fn encode_absorb_and_arbitrage(plan: &AbsorbPlan) -> Bytes {
    let call = ILiquidator::absorbAndArbitrageCall {
        comet: plan.ledger,
        liquidatableAccounts: plan.accounts.clone(),
        assets: plan.legs.iter().map(|leg| leg.asset).collect(),
        swapTargets: plan.legs.iter().map(|leg| leg.target).collect(),
        swapTransactions: plan.legs.iter().map(|leg| leg.calldata.clone()).collect(),
        flashLoanPairToken: plan.pair_token,
        flashLoanPoolFee: U24::from(plan.pool_fee),
    };
    call.abi_encode().into()
}

/// Encode `setAssetConfig` calldata.
pub fn encode_set_asset_config(
    ledger: Address,
    asset: Address,
    max_collateral_to_purchase: U256,
    enabled: bool,
) -> Bytes {
    let call = ILiquidator::setAssetConfigCall {
        comet: ledger,
        asset,
        maxCollateralToPurchase: max_collateral_to_purchase,
        isSet: enabled,
    };
    call.abi_encode().into()
}

/// True when revert data carries the liquidator's `Unauthorized()` error.
pub fn is_unauthorized_revert(revert_data: &[u8]) -> bool {
    revert_data.starts_with(&ILiquidator::Unauthorized::SELECTOR)
}

/// Read-only view of the liquidator contract's state.
#[async_trait]
pub trait LiquidatorView: Send + Sync + Debug {
    /// Deployed contract address.
    fn address(&self) -> Address;

    /// Purchase limit configured for `asset` on `ledger`.
    async fn asset_config(&self, ledger: Address, asset: Address) -> Result<AssetConfig>;

    /// Administrator allowed to change asset configs.
    async fn admin(&self) -> Result<Address>;
}

/// RPC-backed liquidator reader.
#[derive(Debug, Clone)]
pub struct LiquidatorContract {
    address: Address,
    rpc_url: String,
}

impl LiquidatorContract {
    pub fn new(address: Address, rpc_url: impl Into<String>) -> Self {
        Self {
            address,
            rpc_url: rpc_url.into(),
        }
    }
}

#[async_trait]
impl LiquidatorView for LiquidatorContract {
    fn address(&self) -> Address {
        self.address
    }

    async fn asset_config(&self, ledger: Address, asset: Address) -> Result<AssetConfig> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let contract = ILiquidator::new(self.address, &provider);
        let config = contract.assetConfigs(ledger, asset).call().await?;
        debug!(
            ledger = %ledger,
            asset = %asset,
            max = %config.maxCollateralToPurchase,
            is_set = config.isSet,
            "Read asset config"
        );
        Ok(AssetConfig {
            max_collateral_to_purchase: config.maxCollateralToPurchase,
            is_set: config.isSet,
        })
    }

    async fn admin(&self) -> Result<Address> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let contract = ILiquidator::new(self.address, &provider);
        Ok(contract.admin().call().await?._0)
    }
}
