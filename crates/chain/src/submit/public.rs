//! Public mempool submission.

use super::{
    bounded, pause, ContractCall, SubmissionResult, SubmissionStrategy, SubmitError,
    SubmitTimeouts, Submitter,
};
use crate::signer::TransactionSigner;
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Broadcasts to the public mempool and waits for the receipt.
#[derive(Debug)]
pub struct PublicSubmitter {
    signer: Arc<TransactionSigner>,
    timeouts: SubmitTimeouts,
    cancel: CancellationToken,
}

impl PublicSubmitter {
    pub fn new(
        signer: Arc<TransactionSigner>,
        timeouts: SubmitTimeouts,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            signer,
            timeouts,
            cancel,
        }
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<SubmissionResult, SubmitError> {
        let deadline = Instant::now() + self.timeouts.confirm;
        loop {
            let receipt = bounded(
                &self.cancel,
                self.timeouts.rpc,
                "receipt",
                self.signer.provider().receipt(tx_hash),
            )
            .await?;

            if let Some(receipt) = receipt {
                return Ok(if receipt.success {
                    SubmissionResult::PubliclyConfirmed {
                        tx_hash,
                        block: receipt.block,
                    }
                } else {
                    SubmissionResult::PubliclyReverted {
                        tx_hash,
                        block: receipt.block,
                    }
                });
            }

            if Instant::now() >= deadline {
                return Err(SubmitError::Timeout {
                    after: self.timeouts.confirm,
                    waiting_for: "receipt",
                });
            }
            pause(&self.cancel, self.timeouts.poll_interval).await?;
        }
    }
}

#[async_trait]
impl Submitter for PublicSubmitter {
    fn strategy(&self) -> SubmissionStrategy {
        SubmissionStrategy::Public
    }

    fn sender(&self) -> Address {
        self.signer.address()
    }

    async fn submit(&self, call: ContractCall) -> Result<SubmissionResult, SubmitError> {
        let signed = bounded(
            &self.cancel,
            self.timeouts.rpc,
            "signing",
            self.signer.sign(&call, 0),
        )
        .await?;

        if let Err(e) = bounded(
            &self.cancel,
            self.timeouts.rpc,
            "broadcast",
            self.signer.provider().send_raw(&signed.raw),
        )
        .await
        {
            warn!(call = call.label, error = %e, "Broadcast failed, syncing nonce");
            self.signer.resync_nonce().await;
            return Err(e);
        }
        self.signer.consume_nonce(signed.nonce);

        info!(
            call = call.label,
            tx_hash = %signed.hash,
            nonce = signed.nonce,
            "Transaction broadcast, waiting for receipt"
        );

        let result = match self.wait_for_receipt(signed.hash).await {
            Ok(result) => result,
            Err(e) => {
                self.signer.resync_nonce().await;
                return Err(e);
            }
        };

        if let SubmissionResult::PubliclyReverted { tx_hash, block } = &result {
            warn!(call = call.label, tx_hash = %tx_hash, block, "Transaction reverted, syncing nonce");
            self.signer.resync_nonce().await;
        }
        Ok(result)
    }
}
