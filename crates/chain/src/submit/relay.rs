//! Private relay (Flashbots-style) bundle submission.
//!
//! Each submission is a bundle holding exactly one transaction, targeted at
//! the block after the current head. Requests are authenticated with a
//! throwaway key that never holds funds, so the relay's reputation for the
//! searcher identity is decoupled from the funded signer.

use super::{
    bounded, pause, ContractCall, SubmissionResult, SubmissionStrategy, SubmitError,
    SubmitTimeouts, Submitter,
};
use crate::signer::{SignedTransaction, TransactionSigner};
use alloy::primitives::{keccak256, Address, Bytes};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::SignerSync;
use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const FLASHBOTS_SIGNATURE_HEADER: &str = "X-Flashbots-Signature";

/// What happened to a bundle once its target block passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BundleResolution {
    BundleIncluded { block: u64 },
    BlockPassedWithoutInclusion,
    AccountNonceTooHigh { chain_nonce: u64 },
}

/// Classify a passed bundle from what the chain shows afterwards.
pub fn resolve_bundle(
    receipt_block: Option<u64>,
    chain_nonce: u64,
    tx_nonce: u64,
) -> BundleResolution {
    match receipt_block {
        Some(block) => BundleResolution::BundleIncluded { block },
        None if chain_nonce > tx_nonce => BundleResolution::AccountNonceTooHigh { chain_nonce },
        None => BundleResolution::BlockPassedWithoutInclusion,
    }
}

/// `X-Flashbots-Signature` value for `body`: the auth address and an EIP-191
/// signature over the hex-encoded keccak256 of the body.
pub fn flashbots_signature(auth: &PrivateKeySigner, body: &str) -> Result<String> {
    let digest = format!("0x{}", hex::encode(keccak256(body.as_bytes())));
    let signature = auth.sign_message_sync(digest.as_bytes())?;
    Ok(format!(
        "{}:0x{}",
        auth.address(),
        hex::encode(signature.as_bytes())
    ))
}

/// An unanswered relay request is a transport failure like any other.
fn relay_failure(err: SubmitError) -> SubmitError {
    match err {
        SubmitError::Timeout { after, .. } => {
            SubmitError::RelayTransport(format!("no reply within {after:?}"))
        }
        other => other,
    }
}

/// HTTP client for a relay's `eth_sendBundle`.
#[derive(Debug, Clone)]
pub struct RelayClient {
    url: String,
    auth: PrivateKeySigner,
    http: reqwest::Client,
}

impl RelayClient {
    /// Client with a freshly generated auth identity.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_auth(url, PrivateKeySigner::random())
    }

    pub fn with_auth(url: impl Into<String>, auth: PrivateKeySigner) -> Self {
        Self {
            url: url.into(),
            auth,
            http: reqwest::Client::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth_address(&self) -> Address {
        self.auth.address()
    }

    /// JSON-RPC body for a bundle of `txs` targeting `block`.
    pub fn bundle_body(txs: &[Bytes], block: u64) -> Value {
        json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "eth_sendBundle",
            "params": [{
                "txs": txs.iter().map(|tx| format!("0x{}", hex::encode(tx))).collect::<Vec<_>>(),
                "blockNumber": format!("0x{block:x}"),
            }],
        })
    }

    /// Submit a bundle. Returns the relay's bundle hash when it reports one.
    ///
    /// Any failure to deliver the request, a non-2xx status, or a JSON-RPC
    /// `error` object is a [`SubmitError::RelayTransport`].
    pub async fn send_bundle(&self, txs: &[Bytes], block: u64) -> Result<Option<String>> {
        let body = Self::bundle_body(txs, block).to_string();
        let signature = flashbots_signature(&self.auth, &body)?;

        let response = self
            .http
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(FLASHBOTS_SIGNATURE_HEADER, signature)
            .body(body)
            .send()
            .await
            .map_err(|e| SubmitError::RelayTransport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SubmitError::RelayTransport(e.to_string()))?;
        if !status.is_success() {
            return Err(SubmitError::RelayTransport(format!("HTTP {status}: {text}")).into());
        }

        let reply: Value = serde_json::from_str(&text)
            .map_err(|e| SubmitError::RelayTransport(format!("malformed reply: {e}")))?;
        if let Some(error) = reply.get("error") {
            return Err(SubmitError::RelayTransport(error.to_string()).into());
        }

        Ok(reply
            .pointer("/result/bundleHash")
            .and_then(Value::as_str)
            .map(str::to_owned))
    }
}

/// Sends each call as a one-transaction bundle through a private relay.
#[derive(Debug)]
pub struct RelaySubmitter {
    signer: Arc<TransactionSigner>,
    relay: RelayClient,
    timeouts: SubmitTimeouts,
    cancel: CancellationToken,
}

impl RelaySubmitter {
    pub fn new(
        signer: Arc<TransactionSigner>,
        relay: RelayClient,
        timeouts: SubmitTimeouts,
        cancel: CancellationToken,
    ) -> Result<Self> {
        anyhow::ensure!(
            relay.auth_address() != signer.address(),
            "relay auth identity must differ from the transaction signer"
        );
        Ok(Self {
            signer,
            relay,
            timeouts,
            cancel,
        })
    }

    /// Poll the head until it reaches `target`.
    async fn wait_for_block(&self, target: u64) -> Result<u64, SubmitError> {
        let deadline = Instant::now() + self.timeouts.confirm;
        loop {
            let head = bounded(
                &self.cancel,
                self.timeouts.rpc,
                "head block",
                self.signer.provider().block_number(),
            )
            .await?;
            if head >= target {
                return Ok(head);
            }
            if Instant::now() >= deadline {
                return Err(SubmitError::Timeout {
                    after: self.timeouts.confirm,
                    waiting_for: "bundle target block",
                });
            }
            pause(&self.cancel, self.timeouts.poll_interval).await?;
        }
    }

    async fn resolve(&self, signed: &SignedTransaction) -> Result<BundleResolution, SubmitError> {
        let provider = self.signer.provider();
        let receipt = bounded(
            &self.cancel,
            self.timeouts.rpc,
            "receipt",
            provider.receipt(signed.hash),
        )
        .await?;
        if let Some(receipt) = receipt {
            return Ok(resolve_bundle(Some(receipt.block), 0, signed.nonce));
        }

        let chain_nonce = bounded(
            &self.cancel,
            self.timeouts.rpc,
            "nonce",
            self.signer.chain_nonce(),
        )
        .await?;
        Ok(resolve_bundle(None, chain_nonce, signed.nonce))
    }
}

#[async_trait]
impl Submitter for RelaySubmitter {
    fn strategy(&self) -> SubmissionStrategy {
        SubmissionStrategy::PrivateRelay
    }

    fn sender(&self) -> Address {
        self.signer.address()
    }

    async fn submit(&self, call: ContractCall) -> Result<SubmissionResult, SubmitError> {
        let head = bounded(
            &self.cancel,
            self.timeouts.rpc,
            "head block",
            self.signer.provider().block_number(),
        )
        .await?;
        let target_block = head + 1;

        let bump = self.signer.gas_settings().relay_priority_bump();
        let signed = bounded(
            &self.cancel,
            self.timeouts.rpc,
            "signing",
            self.signer.sign(&call, bump),
        )
        .await?;

        let bundle_hash = match bounded(
            &self.cancel,
            self.timeouts.rpc,
            "relay",
            self.relay.send_bundle(std::slice::from_ref(&signed.raw), target_block),
        )
        .await
        {
            Ok(hash) => hash,
            Err(e) => {
                self.signer.resync_nonce().await;
                return Err(relay_failure(e));
            }
        };

        info!(
            call = call.label,
            tx_hash = %signed.hash,
            bundle_hash = bundle_hash.as_deref().unwrap_or("-"),
            target_block,
            "Bundle submitted, waiting for target block"
        );

        let resolution = match self.wait_for_block(target_block).await {
            Ok(_) => self.resolve(&signed).await,
            Err(e) => Err(e),
        };
        let resolution = match resolution {
            Ok(resolution) => resolution,
            Err(e) => {
                self.signer.resync_nonce().await;
                return Err(e);
            }
        };
        debug!(call = call.label, ?resolution, "Bundle resolved");

        Ok(match resolution {
            BundleResolution::BundleIncluded { block } => {
                self.signer.consume_nonce(signed.nonce);
                SubmissionResult::Included {
                    tx_hash: signed.hash,
                    block,
                }
            }
            BundleResolution::BlockPassedWithoutInclusion => {
                self.signer.resync_nonce().await;
                SubmissionResult::NotIncludedThisBlock {
                    tx_hash: signed.hash,
                    target_block,
                }
            }
            BundleResolution::AccountNonceTooHigh { chain_nonce } => {
                warn!(
                    call = call.label,
                    tx_nonce = signed.nonce,
                    chain_nonce,
                    "Account nonce moved past bundled transaction"
                );
                self.signer.resync_nonce().await;
                SubmissionResult::NonceTooHigh {
                    tx_hash: signed.hash,
                    tx_nonce: signed.nonce,
                    chain_nonce,
                }
            }
        })
    }
}
