//! Transaction submission.
//!
//! A [`Submitter`] takes a [`ContractCall`], signs it and gets it on-chain
//! through one of two routes fixed at construction:
//!
//! - [`PublicSubmitter`] broadcasts to the mempool and waits for the receipt.
//! - [`RelaySubmitter`] wraps the transaction in a single-transaction bundle
//!   for the next block, sends it to a private relay and classifies what
//!   happened once that block has passed.
//!
//! Every wait is bounded by a timeout and abandoned when the cancellation
//! token fires.

mod public;
mod relay;

pub use public::PublicSubmitter;
pub use relay::{
    flashbots_signature, resolve_bundle, BundleResolution, RelayClient, RelaySubmitter,
};

use crate::contracts::is_unauthorized_revert;
use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use std::fmt::{self, Debug};
use std::future::IntoFuture;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// A call to be sent as a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub input: Bytes,
    pub value: U256,
    /// Short name used in logs, e.g. `initFlash`.
    pub label: &'static str,
}

impl ContractCall {
    pub fn new(to: Address, input: Bytes, label: &'static str) -> Self {
        Self {
            to,
            input,
            value: U256::ZERO,
            label,
        }
    }
}

/// Outcome of one submission that reached a definite state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    /// Relay bundle landed in the target block.
    Included { tx_hash: B256, block: u64 },
    /// Target block passed without the bundle. Retryable.
    NotIncludedThisBlock { tx_hash: B256, target_block: u64 },
    /// The account's on-chain nonce moved past the bundled transaction.
    NonceTooHigh {
        tx_hash: B256,
        tx_nonce: u64,
        chain_nonce: u64,
    },
    /// Public transaction mined successfully.
    PubliclyConfirmed { tx_hash: B256, block: u64 },
    /// Public transaction mined and reverted.
    PubliclyReverted { tx_hash: B256, block: u64 },
}

impl SubmissionResult {
    /// The transaction executed successfully on-chain.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            SubmissionResult::Included { .. } | SubmissionResult::PubliclyConfirmed { .. }
        )
    }

    /// Needs operator attention.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, SubmissionResult::NonceTooHigh { .. })
    }

    pub fn tx_hash(&self) -> B256 {
        match self {
            SubmissionResult::Included { tx_hash, .. }
            | SubmissionResult::NotIncludedThisBlock { tx_hash, .. }
            | SubmissionResult::NonceTooHigh { tx_hash, .. }
            | SubmissionResult::PubliclyConfirmed { tx_hash, .. }
            | SubmissionResult::PubliclyReverted { tx_hash, .. } => *tx_hash,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionResult::Included { .. } => "included",
            SubmissionResult::NotIncludedThisBlock { .. } => "not_included_this_block",
            SubmissionResult::NonceTooHigh { .. } => "nonce_too_high",
            SubmissionResult::PubliclyConfirmed { .. } => "publicly_confirmed",
            SubmissionResult::PubliclyReverted { .. } => "publicly_reverted",
        }
    }
}

impl fmt::Display for SubmissionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Submission failures that never produced a [`SubmissionResult`].
#[derive(Debug, Error)]
pub enum SubmitError {
    /// The relay rejected the request or could not be reached.
    #[error("relay transport error: {0}")]
    RelayTransport(String),

    /// Simulation reverted before broadcast.
    #[error("call reverted: {message}")]
    Reverted {
        message: String,
        data: Option<Bytes>,
    },

    #[error("timed out after {after:?} waiting for {waiting_for}")]
    Timeout {
        after: Duration,
        waiting_for: &'static str,
    },

    #[error("submission cancelled")]
    Cancelled,

    #[error(transparent)]
    Rpc(anyhow::Error),
}

impl SubmitError {
    /// Relay transport problems need operator attention; everything else is
    /// ordinary contention or a retryable failure.
    pub fn is_anomaly(&self) -> bool {
        matches!(self, SubmitError::RelayTransport(_))
    }

    /// The revert carried the liquidator's `Unauthorized()` error.
    pub fn is_unauthorized(&self) -> bool {
        match self {
            SubmitError::Reverted { data: Some(data), .. } => is_unauthorized_revert(data),
            _ => false,
        }
    }
}

impl From<anyhow::Error> for SubmitError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<SubmitError>() {
            Ok(inner) => inner,
            Err(other) => SubmitError::Rpc(other),
        }
    }
}

/// Which route a submitter uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionStrategy {
    Public,
    PrivateRelay,
}

impl SubmissionStrategy {
    pub fn from_flag(use_relay: bool) -> Self {
        if use_relay {
            SubmissionStrategy::PrivateRelay
        } else {
            SubmissionStrategy::Public
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStrategy::Public => "public",
            SubmissionStrategy::PrivateRelay => "private_relay",
        }
    }
}

/// Timeouts applied to every suspension inside a submission.
#[derive(Debug, Clone, Copy)]
pub struct SubmitTimeouts {
    /// Single RPC or relay request.
    pub rpc: Duration,
    /// Waiting for a receipt or for the bundle's target block.
    pub confirm: Duration,
    /// Delay between polls while waiting.
    pub poll_interval: Duration,
}

impl Default for SubmitTimeouts {
    fn default() -> Self {
        Self {
            rpc: Duration::from_secs(10),
            confirm: Duration::from_secs(120),
            poll_interval: Duration::from_secs(2),
        }
    }
}

/// Sends one transaction per call.
#[async_trait]
pub trait Submitter: Send + Sync + Debug {
    fn strategy(&self) -> SubmissionStrategy;

    /// Account that signs and pays for submissions.
    fn sender(&self) -> Address;

    async fn submit(&self, call: ContractCall) -> Result<SubmissionResult, SubmitError>;
}

/// Run `fut` under `limit`, giving up early when `cancel` fires.
pub(crate) async fn bounded<F, T, E>(
    cancel: &CancellationToken,
    limit: Duration,
    waiting_for: &'static str,
    fut: F,
) -> Result<T, SubmitError>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: Into<anyhow::Error>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SubmitError::Cancelled),
        res = tokio::time::timeout(limit, fut) => match res {
            Ok(inner) => inner.map_err(|e| SubmitError::from(e.into())),
            Err(_) => Err(SubmitError::Timeout { after: limit, waiting_for }),
        },
    }
}

/// Sleep for `interval`, returning `Cancelled` if the token fires first.
pub(crate) async fn pause(cancel: &CancellationToken, interval: Duration) -> Result<(), SubmitError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(SubmitError::Cancelled),
        _ = tokio::time::sleep(interval) => Ok(()),
    }
}
