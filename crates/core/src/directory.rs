//! Position directory.
//!
//! Rebuilds the working set from scratch on every refresh: every account that
//! ever withdrew from the ledger, plus the ledger's collateral assets.

use crate::config::DirectoryConfig;
use crate::events::{LogEvent, LogSink};
use crate::guard::{CallGuard, CoreError};
use alloy::primitives::Address;
use liquidator_chain::{Asset, Ledger};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Snapshot produced by one refresh. Never mutated after construction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    /// Distinct accounts in first-seen order.
    pub addresses: Vec<Address>,
    pub assets: Vec<Asset>,
    pub refreshed_at_block: u64,
}

impl WorkingSet {
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty() && self.assets.is_empty()
    }
}

pub struct PositionDirectory {
    ledger: Arc<dyn Ledger>,
    guard: CallGuard,
    start_block: u64,
    chunk_blocks: u64,
    sink: Arc<dyn LogSink>,
}

impl PositionDirectory {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        guard: CallGuard,
        config: &DirectoryConfig,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            ledger,
            guard,
            start_block: config.start_block.unwrap_or(0),
            chunk_blocks: config.log_chunk_blocks.max(1),
            sink,
        }
    }

    /// Replay withdrawals up to the current head and re-read the asset list.
    pub async fn refresh(&self) -> Result<WorkingSet, CoreError> {
        let head = self
            .guard
            .call("blockNumber", self.ledger.block_number())
            .await?;

        let addresses = self.replay_withdrawals(head).await?;
        let assets = self.load_assets().await?;

        self.sink.emit(
            LogEvent::info("Working set refreshed")
                .field("addresses", addresses.len())
                .field("assets", assets.len())
                .field("block", head),
        );

        Ok(WorkingSet {
            addresses,
            assets,
            refreshed_at_block: head,
        })
    }

    async fn replay_withdrawals(&self, head: u64) -> Result<Vec<Address>, CoreError> {
        let mut seen = HashSet::new();
        let mut addresses = Vec::new();

        let mut from = self.start_block;
        while from <= head {
            let to = from.saturating_add(self.chunk_blocks - 1).min(head);
            let sources = self
                .guard
                .call("getLogs(Withdraw)", self.ledger.withdraw_sources(from, to))
                .await?;
            debug!(from, to, logs = sources.len(), "Replayed withdraw logs");

            for src in sources {
                if seen.insert(src) {
                    addresses.push(src);
                }
            }

            if to == u64::MAX {
                break;
            }
            from = to + 1;
        }

        Ok(addresses)
    }

    async fn load_assets(&self) -> Result<Vec<Asset>, CoreError> {
        let count = self.guard.call("numAssets", self.ledger.num_assets()).await?;
        let mut assets = Vec::with_capacity(count as usize);
        for index in 0..count {
            let asset = self
                .guard
                .call("getAssetInfo", self.ledger.asset_info(index))
                .await?;
            assets.push(asset);
        }
        Ok(assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RecordingSink, Severity};
    use crate::testing::{addr, FakeLedger};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;

    fn directory(
        ledger: Arc<FakeLedger>,
        start: u64,
        chunk: u64,
    ) -> (PositionDirectory, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let config = DirectoryConfig {
            start_block: Some(start),
            log_chunk_blocks: chunk,
        };
        let guard = CallGuard::new(CancellationToken::new(), Duration::from_secs(1));
        (PositionDirectory::new(ledger, guard, &config, sink.clone()), sink)
    }

    #[tokio::test]
    async fn test_refresh_dedupes_in_first_seen_order() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_head(250);
        ledger.push_withdraw(10, addr(2));
        ledger.push_withdraw(20, addr(1));
        ledger.push_withdraw(120, addr(2));
        ledger.push_withdraw(249, addr(3));
        ledger.add_asset(addr(0xA0), 18, 1);

        let (directory, sink) = directory(ledger.clone(), 0, 100);
        let set = directory.refresh().await.unwrap();

        assert_eq!(set.addresses, vec![addr(2), addr(1), addr(3)]);
        assert_eq!(set.assets.len(), 1);
        assert_eq!(set.refreshed_at_block, 250);
        // 0-99, 100-199, 200-250
        assert_eq!(ledger.log_queries(), vec![(0, 99), (100, 199), (200, 250)]);

        let events = sink.with_severity(Severity::Info);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].get("addresses"), Some("3"));
    }

    #[tokio::test]
    async fn test_refresh_respects_checkpoint() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_head(50);
        ledger.push_withdraw(5, addr(1));
        ledger.push_withdraw(40, addr(2));

        let (directory, _) = directory(ledger, 30, 1000);
        let set = directory.refresh().await.unwrap();
        assert_eq!(set.addresses, vec![addr(2)]);
    }

    #[tokio::test]
    async fn test_refresh_is_full_replay() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_head(10);
        ledger.push_withdraw(1, addr(1));

        let (directory, _) = directory(ledger.clone(), 0, 1000);
        let first = directory.refresh().await.unwrap();

        ledger.set_head(20);
        ledger.push_withdraw(15, addr(9));
        let second = directory.refresh().await.unwrap();

        assert_eq!(first.addresses, vec![addr(1)]);
        assert_eq!(second.addresses, vec![addr(1), addr(9)]);
    }

    #[tokio::test]
    async fn test_refresh_failure_propagates() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_head(10);
        ledger.fail_logs(true);

        let (directory, sink) = directory(ledger, 0, 1000);
        let err = directory.refresh().await.unwrap_err();
        assert!(matches!(err, CoreError::Rpc { what: "getLogs(Withdraw)", .. }));
        assert!(sink.events().is_empty());
    }
}
