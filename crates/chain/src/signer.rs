//! Transaction signing with a locally tracked nonce.
//!
//! The signer never broadcasts. It turns a [`ContractCall`] into a signed
//! EIP-2718 envelope; the submitter decides where the bytes go and tells the
//! signer afterwards whether the nonce was consumed.

use crate::gas::{create_gas_strategy, GasParams, GasSettings, GasStrategy};
use crate::provider::ProviderManager;
use crate::submit::{ContractCall, SubmitError};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use anyhow::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, warn};

/// Local nonce counter.
///
/// `current` is the nonce the next transaction will be signed with. It only
/// moves forward when a transaction has actually left the process, or when
/// the chain is found to be ahead.
#[derive(Debug)]
pub struct NonceManager {
    current: AtomicU64,
    last_synced: AtomicU64,
}

impl NonceManager {
    pub fn new(initial_nonce: u64) -> Self {
        Self {
            current: AtomicU64::new(initial_nonce),
            last_synced: AtomicU64::new(initial_nonce),
        }
    }

    #[inline]
    pub fn current(&self) -> u64 {
        self.current.load(Ordering::SeqCst)
    }

    pub fn last_synced(&self) -> u64 {
        self.last_synced.load(Ordering::SeqCst)
    }

    /// Record that a transaction signed with `nonce` was broadcast.
    pub fn consume(&self, nonce: u64) {
        self.current.fetch_max(nonce + 1, Ordering::SeqCst);
    }

    /// Raise the counter to the chain value if the chain is ahead.
    pub fn sync(&self, chain_nonce: u64) {
        self.current.fetch_max(chain_nonce, Ordering::SeqCst);
        self.last_synced.store(chain_nonce, Ordering::SeqCst);
    }

    /// Force the counter to the chain value.
    pub fn reset(&self, chain_nonce: u64) {
        self.current.store(chain_nonce, Ordering::SeqCst);
        self.last_synced.store(chain_nonce, Ordering::SeqCst);
    }
}

/// Signed transaction ready for broadcast or bundling.
#[derive(Debug, Clone)]
pub struct SignedTransaction {
    pub raw: Bytes,
    pub hash: B256,
    pub nonce: u64,
    pub gas_limit: u64,
}

/// Signs liquidator calls for a single funded account.
pub struct TransactionSigner {
    provider: ProviderManager,
    wallet: EthereumWallet,
    address: Address,
    chain_id: u64,
    nonce_manager: NonceManager,
    gas: GasSettings,
    gas_strategy: Box<dyn GasStrategy>,
    cached_gas_params: parking_lot::RwLock<Option<GasParams>>,
}

impl TransactionSigner {
    /// Parse `private_key` (with or without `0x`) and seed the nonce and chain
    /// id from `rpc_url`.
    pub async fn connect(private_key: &str, rpc_url: &str, gas: GasSettings) -> Result<Self> {
        let signer: PrivateKeySigner = private_key.trim_start_matches("0x").parse()?;
        let address = signer.address();
        let provider = ProviderManager::new(rpc_url);

        let chain_id = provider.chain_id().await?;
        let initial_nonce = provider.transaction_count(address).await?;
        let gas_strategy = create_gas_strategy(&gas);

        info!(
            address = %address,
            chain_id,
            initial_nonce,
            gas_strategy = gas_strategy.strategy_name(),
            "Transaction signer initialized"
        );

        Ok(Self {
            provider,
            wallet: EthereumWallet::from(signer),
            address,
            chain_id,
            nonce_manager: NonceManager::new(initial_nonce),
            gas,
            gas_strategy,
            cached_gas_params: parking_lot::RwLock::new(None),
        })
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn provider(&self) -> &ProviderManager {
        &self.provider
    }

    pub fn gas_settings(&self) -> &GasSettings {
        &self.gas
    }

    pub fn current_nonce(&self) -> u64 {
        self.nonce_manager.current()
    }

    /// Sign `call` at the current local nonce, adding `priority_bump` wei to
    /// the tip.
    ///
    /// A revert during gas estimation is returned as
    /// [`SubmitError::Reverted`] so the caller can skip a doomed broadcast.
    pub async fn sign(&self, call: &ContractCall, priority_bump: u128) -> Result<SignedTransaction> {
        let nonce = self.nonce_manager.current();
        let mut tx = TransactionRequest::default()
            .with_from(self.address)
            .with_to(call.to)
            .with_input(call.input.clone())
            .with_value(call.value)
            .with_nonce(nonce)
            .with_chain_id(self.chain_id);

        let gas_limit = self.gas_limit_for(&tx, call.label).await?;
        tx.set_gas_limit(gas_limit);

        let params = self.gas_params().await?.with_priority_bump(priority_bump);
        self.gas_strategy.apply_gas(&mut tx, &params);

        let envelope = tx.build(&self.wallet).await?;
        let signed = SignedTransaction {
            raw: envelope.encoded_2718().into(),
            hash: *envelope.tx_hash(),
            nonce,
            gas_limit,
        };

        debug!(
            call = call.label,
            tx_hash = %signed.hash,
            nonce,
            gas_limit,
            gas_price_gwei = params.effective_gas_price() / 1_000_000_000,
            "Transaction signed"
        );
        Ok(signed)
    }

    /// Mark `nonce` as used after a successful broadcast.
    pub fn consume_nonce(&self, nonce: u64) {
        self.nonce_manager.consume(nonce);
    }

    /// Confirmed on-chain nonce of the signing account.
    pub async fn chain_nonce(&self) -> Result<u64> {
        self.provider.transaction_count(self.address).await
    }

    /// Reset the local counter from the chain. Failures are logged, not returned.
    pub async fn resync_nonce(&self) {
        match self.chain_nonce().await {
            Ok(chain_nonce) => {
                self.nonce_manager.reset(chain_nonce);
                debug!(nonce = chain_nonce, "Nonce synced from chain");
            }
            Err(e) => warn!(error = %e, "Failed to sync nonce from chain"),
        }
    }

    async fn gas_limit_for(&self, tx: &TransactionRequest, label: &str) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.provider.rpc_url().parse()?);
        match provider.estimate_gas(tx.clone()).await {
            Ok(estimate) => Ok(self.gas.scaled_limit(estimate)),
            Err(e) => {
                if let Some(reverted) = revert_from(&e) {
                    return Err(reverted.into());
                }
                warn!(
                    call = label,
                    error = %e,
                    fallback = self.gas.default_limit,
                    "Gas estimation failed, using default limit"
                );
                Ok(self.gas.default_limit)
            }
        }
    }

    async fn gas_params(&self) -> Result<GasParams> {
        match self.gas_strategy.fetch_params(self.provider.rpc_url()).await {
            Ok(params) => {
                *self.cached_gas_params.write() = Some(params.clone());
                Ok(params)
            }
            Err(e) => {
                let cached = self.cached_gas_params.read().clone();
                match cached {
                    Some(params) => {
                        warn!(error = %e, "Gas price fetch failed, reusing last params");
                        Ok(params)
                    }
                    None => Err(e),
                }
            }
        }
    }
}

/// Map an `eth_estimateGas` failure to a revert when the node says so.
fn revert_from(err: &TransportError) -> Option<SubmitError> {
    let payload = err.as_error_resp()?;
    let data = payload.as_revert_data();
    if data.is_none() && !payload.message.to_lowercase().contains("revert") {
        return None;
    }
    Some(SubmitError::Reverted {
        message: payload.message.to_string(),
        data,
    })
}

impl std::fmt::Debug for TransactionSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSigner")
            .field("address", &self.address)
            .field("chain_id", &self.chain_id)
            .field("rpc_url", &self.provider.rpc_url())
            .field("gas_strategy", &self.gas_strategy.strategy_name())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonce_only_moves_on_consume_or_sync() {
        let manager = NonceManager::new(10);
        assert_eq!(manager.current(), 10);

        // Signing peeks, it does not consume.
        assert_eq!(manager.current(), 10);

        manager.consume(10);
        assert_eq!(manager.current(), 11);

        // Consuming an older nonce never rewinds.
        manager.consume(3);
        assert_eq!(manager.current(), 11);

        manager.sync(15);
        assert_eq!(manager.current(), 15);
        assert_eq!(manager.last_synced(), 15);

        manager.sync(12);
        assert_eq!(manager.current(), 15);
        assert_eq!(manager.last_synced(), 12);

        manager.reset(5);
        assert_eq!(manager.current(), 5);
    }

    #[tokio::test]
    #[ignore] // Requires network
    async fn test_signer_connects() {
        // Well-known development key, never funded on mainnet.
        let private_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
        let signer = TransactionSigner::connect(
            private_key,
            "https://eth.llamarpc.com",
            GasSettings::default(),
        )
        .await
        .unwrap();

        assert_eq!(
            signer.address().to_string().to_lowercase(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );
        assert_eq!(signer.chain_id(), 1);
    }
}
