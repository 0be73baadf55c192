//! RPC-backed Comet ledger.

use super::{Asset, Ledger};
use crate::contracts::comet::{withdraw_source, withdraw_topic};
use crate::contracts::IComet;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::Filter;
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, trace};

/// Comet deployment reached over HTTP JSON-RPC.
///
/// Builds a fresh provider per call, so it is cheap to clone and holds no
/// connection state between iterations.
#[derive(Debug, Clone)]
pub struct CometLedger {
    address: Address,
    rpc_url: String,
}

impl CometLedger {
    pub fn new(address: Address, rpc_url: impl Into<String>) -> Self {
        Self {
            address,
            rpc_url: rpc_url.into(),
        }
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }
}

#[async_trait]
impl Ledger for CometLedger {
    fn address(&self) -> Address {
        self.address
    }

    async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        Ok(provider.get_block_number().await?)
    }

    async fn withdraw_sources(&self, from_block: u64, to_block: u64) -> Result<Vec<Address>> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let filter = Filter::new()
            .address(self.address)
            .event_signature(withdraw_topic())
            .from_block(from_block)
            .to_block(to_block);

        let logs = provider.get_logs(&filter).await?;
        let sources: Vec<Address> = logs
            .iter()
            .filter_map(|log| withdraw_source(log.topics()))
            .collect();

        debug!(
            from_block,
            to_block,
            logs = logs.len(),
            sources = sources.len(),
            "Fetched Withdraw logs"
        );
        Ok(sources)
    }

    async fn num_assets(&self) -> Result<u8> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let comet = IComet::new(self.address, &provider);
        Ok(comet.numAssets().call().await?._0)
    }

    async fn asset_info(&self, index: u8) -> Result<Asset> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let comet = IComet::new(self.address, &provider);
        let info = comet.getAssetInfo(index).call().await?._0;
        trace!(index, asset = %info.asset, scale = info.scale, "Asset info");
        Ok(Asset::new(info.asset, info.priceFeed, U256::from(info.scale)))
    }

    async fn is_liquidatable(&self, account: Address) -> Result<bool> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let comet = IComet::new(self.address, &provider);
        Ok(comet.isLiquidatable(account).call().await?._0)
    }

    async fn collateral_reserves(&self, asset: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let comet = IComet::new(self.address, &provider);
        Ok(comet.getCollateralReserves(asset).call().await?._0)
    }

    async fn price(&self, price_feed: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let comet = IComet::new(self.address, &provider);
        Ok(comet.getPrice(price_feed).call().await?._0)
    }

    async fn base_token(&self) -> Result<Address> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let comet = IComet::new(self.address, &provider);
        Ok(comet.baseToken().call().await?._0)
    }

    async fn collateral_balance(&self, account: Address, asset: Address) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let comet = IComet::new(self.address, &provider);
        let collateral = comet.userCollateral(account, asset).call().await?._0;
        Ok(U256::from(collateral.balance))
    }
}
