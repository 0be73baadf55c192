//! Solvency scanner.
//!
//! One `isLiquidatable` read per tracked address, sequentially and in
//! working-set order. Nothing is cached between passes.

use crate::events::{LogEvent, LogSink};
use crate::guard::{CallGuard, CoreError};
use alloy::primitives::Address;
use liquidator_chain::Ledger;
use std::sync::Arc;
use tracing::{debug, instrument};

pub struct SolvencyScanner {
    ledger: Arc<dyn Ledger>,
    guard: CallGuard,
    sink: Arc<dyn LogSink>,
}

impl SolvencyScanner {
    pub fn new(ledger: Arc<dyn Ledger>, guard: CallGuard, sink: Arc<dyn LogSink>) -> Self {
        Self {
            ledger,
            guard,
            sink,
        }
    }

    /// Liquidatable subset of `addresses`, in input order.
    ///
    /// A failed read skips that address for this pass. Cancellation and
    /// timeouts end the pass.
    #[instrument(skip_all, fields(addresses = addresses.len()))]
    pub async fn classify(&self, addresses: &[Address]) -> Result<Vec<Address>, CoreError> {
        let mut liquidatable = Vec::new();
        let mut read_errors = 0usize;

        for &account in addresses {
            match self
                .guard
                .call("isLiquidatable", self.ledger.is_liquidatable(account))
                .await
            {
                Ok(true) => {
                    debug!(%account, "Account is liquidatable");
                    liquidatable.push(account);
                }
                Ok(false) => {}
                Err(CoreError::Rpc { error, .. }) => {
                    read_errors += 1;
                    self.sink.emit(
                        LogEvent::warning("Solvency read failed")
                            .field("account", account)
                            .field("error", format!("{error:#}")),
                    );
                }
                Err(e) => return Err(e),
            }
        }

        self.sink.emit(
            LogEvent::info("Classification complete")
                .field("checked", addresses.len())
                .field("liquidatable", liquidatable.len())
                .field("read_errors", read_errors),
        );

        Ok(liquidatable)
    }
}
