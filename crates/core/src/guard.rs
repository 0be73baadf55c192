//! Cancellation and timeout around every network call.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors that end the current step of an iteration.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("cancelled")]
    Cancelled,

    #[error("{what} timed out after {after:?}")]
    Timeout { what: &'static str, after: Duration },

    #[error("{what} failed: {error:#}")]
    Rpc {
        what: &'static str,
        error: anyhow::Error,
    },
}

impl CoreError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, CoreError::Cancelled)
    }
}

/// Applies the read timeout to a call and abandons it when the token fires.
#[derive(Debug, Clone)]
pub struct CallGuard {
    cancel: CancellationToken,
    timeout: Duration,
}

impl CallGuard {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self { cancel, timeout }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Run `fut`, labelled `what` in errors.
    pub async fn call<T, F>(&self, what: &'static str, fut: F) -> Result<T, CoreError>
    where
        F: Future<Output = anyhow::Result<T>>,
    {
        if self.cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CoreError::Cancelled),
            res = tokio::time::timeout(self.timeout, fut) => match res {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(error)) => Err(CoreError::Rpc { what, error }),
                Err(_) => Err(CoreError::Timeout { what, after: self.timeout }),
            },
        }
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), CoreError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(CoreError::Cancelled),
            _ = tokio::time::sleep(duration) => Ok(()),
        }
    }
}
