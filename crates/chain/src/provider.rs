//! Thin JSON-RPC helpers shared by the signer and the submitters.
//! A fresh alloy HTTP provider is built per call.

use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::Result;
use tracing::{debug, info};

/// Receipt fields the submitters care about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash: B256,
    pub success: bool,
    pub block: u64,
}

/// Chain access for a single HTTP endpoint.
#[derive(Debug, Clone)]
pub struct ProviderManager {
    rpc_url: String,
}

impl ProviderManager {
    pub fn new(rpc_url: impl Into<String>) -> Self {
        Self {
            rpc_url: rpc_url.into(),
        }
    }

    /// Create and verify the endpoint answers.
    pub async fn connect(rpc_url: &str) -> Result<Self> {
        let manager = Self::new(rpc_url);
        let chain_id = manager.chain_id().await?;
        let block = manager.block_number().await?;
        info!(rpc = rpc_url, chain_id, block, "RPC endpoint verified");
        Ok(manager)
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    pub async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        Ok(provider.get_block_number().await?)
    }

    pub async fn chain_id(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        Ok(provider.get_chain_id().await?)
    }

    /// Confirmed nonce of `account` at the latest block.
    pub async fn transaction_count(&self, account: Address) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        Ok(provider.get_transaction_count(account).await?)
    }

    pub async fn receipt(&self, tx_hash: B256) -> Result<Option<ReceiptSummary>> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let receipt = provider.get_transaction_receipt(tx_hash).await?;
        Ok(receipt.map(|r| ReceiptSummary {
            tx_hash,
            success: r.status(),
            block: r.block_number.unwrap_or_default(),
        }))
    }

    /// Broadcast an already signed transaction. Returns its hash.
    pub async fn send_raw(&self, raw: &Bytes) -> Result<B256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let pending = provider.send_raw_transaction(raw).await?;
        let tx_hash = *pending.tx_hash();
        debug!(tx_hash = %tx_hash, "Raw transaction accepted by node");
        Ok(tx_hash)
    }
}
