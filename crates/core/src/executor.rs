//! Liquidation executor.
//!
//! Each run classifies the working set, submits one flash-loan funded
//! attempt per liquidatable account (or per batch, for `absorbAndArbitrage`),
//! and falls back to a single arbitrage-only attempt when nothing was
//! liquidated but the ledger holds enough surplus collateral.
//!
//! Sizing and submission failures are logged per batch and the pass moves
//! on. Only cancellation and failures of the shared reads (classification,
//! valuation) leave `run`.

use crate::config::{ExecutorConfig, ExecutorVariant};
use crate::directory::WorkingSet;
use crate::events::{LogEvent, LogSink, Severity};
use crate::guard::{CallGuard, CoreError};
use crate::scanner::SolvencyScanner;
use crate::valuator::CollateralValuator;
use alloy::primitives::{Address, U256};
use liquidator_api::{SwapQuoter, SwapRequest};
use liquidator_chain::{
    encode_absorb_and_arbitrage, encode_init_flash, AbsorbPlan, Asset, ContractCall, Ledger,
    LiquidatorView, SubmissionResult, SubmitError, Submitter, SwapLeg,
};
use smallvec::SmallVec;
use std::sync::Arc;
use tracing::{debug, info};

/// Where attempts are sent and how they are funded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionTarget {
    pub ledger: Address,
    pub liquidator: Address,
    pub pair_token: Address,
    pub pool_fee: u32,
    pub reversed_pair: bool,
}

/// Collaborators the executor reads from and submits through.
#[derive(Clone)]
pub struct ExecutorDeps {
    pub ledger: Arc<dyn Ledger>,
    pub liquidator: Arc<dyn LiquidatorView>,
    pub quoter: Arc<dyn SwapQuoter>,
    pub submitter: Arc<dyn Submitter>,
}

/// One submitted attempt. Not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LiquidationAttempt {
    /// Empty for arbitrage-only attempts.
    pub accounts: SmallVec<[Address; 4]>,
    pub pair_token: Address,
    pub pool_fee: u32,
    pub succeeded: bool,
    /// `SubmissionResult::as_str`, or `error`.
    pub result: &'static str,
}

impl LiquidationAttempt {
    pub fn is_arbitrage(&self) -> bool {
        self.accounts.is_empty()
    }
}

pub struct LiquidationExecutor {
    deps: ExecutorDeps,
    scanner: SolvencyScanner,
    valuator: CollateralValuator,
    guard: CallGuard,
    target: ExecutionTarget,
    config: ExecutorConfig,
    sink: Arc<dyn LogSink>,
    cooldown_remaining: u32,
    last_attempts: Vec<LiquidationAttempt>,
}

impl LiquidationExecutor {
    pub fn new(
        deps: ExecutorDeps,
        target: ExecutionTarget,
        config: ExecutorConfig,
        guard: CallGuard,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        let scanner = SolvencyScanner::new(deps.ledger.clone(), guard.clone(), sink.clone());
        let valuator = CollateralValuator::new(deps.ledger.clone(), guard.clone());
        Self {
            deps,
            scanner,
            valuator,
            guard,
            target,
            config,
            sink,
            cooldown_remaining: 0,
            last_attempts: Vec::new(),
        }
    }

    /// Attempts made by the most recent [`run`](Self::run).
    pub fn last_attempts(&self) -> &[LiquidationAttempt] {
        &self.last_attempts
    }

    /// Iterations left before submissions resume.
    pub fn cooldown_remaining(&self) -> u32 {
        self.cooldown_remaining
    }

    /// Returns whether anything was submitted.
    pub async fn run(&mut self, set: &WorkingSet) -> Result<bool, CoreError> {
        self.last_attempts.clear();

        let liquidatable = self.scanner.classify(&set.addresses).await?;

        if self.cooldown_remaining > 0 {
            self.cooldown_remaining -= 1;
            self.sink.emit(
                LogEvent::info("Submissions paused after anomaly")
                    .field("liquidatable", liquidatable.len())
                    .field("remaining", self.cooldown_remaining),
            );
            return Ok(false);
        }

        let mut attempted = false;
        for batch in liquidatable.chunks(self.batch_size()) {
            attempted |= self.attempt(batch, &set.assets).await?;
            if self.cooldown_remaining > 0 {
                break;
            }
        }

        if attempted || self.cooldown_remaining > 0 {
            return Ok(attempted);
        }

        if self
            .valuator
            .has_purchaseable_collateral(&set.assets, self.config.min_arbitrage_usd)
            .await?
        {
            attempted = self.attempt(&[], &set.assets).await?;
        } else {
            debug!(
                min_usd = self.config.min_arbitrage_usd,
                "Not enough purchasable collateral"
            );
        }

        Ok(attempted)
    }

    fn batch_size(&self) -> usize {
        match self.config.variant {
            ExecutorVariant::Flash => 1,
            ExecutorVariant::OnChain => self.config.max_accounts_per_call.max(1),
        }
    }

    /// Build and submit one attempt. `Ok(false)` when nothing was sent,
    /// including when sizing failed for this batch.
    async fn attempt(&mut self, accounts: &[Address], assets: &[Asset]) -> Result<bool, CoreError> {
        let call = match self.config.variant {
            ExecutorVariant::Flash => ContractCall::new(
                self.target.liquidator,
                encode_init_flash(
                    accounts,
                    self.target.pair_token,
                    self.target.pool_fee,
                    self.target.reversed_pair,
                ),
                "initFlash",
            ),
            ExecutorVariant::OnChain => {
                let plan = match self.plan_absorb(accounts, assets).await {
                    Ok(plan) => plan,
                    Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
                    Err(e) => {
                        self.record_unplanned(accounts, &e);
                        return Ok(false);
                    }
                };
                if accounts.is_empty() && plan.legs.is_empty() {
                    self.sink
                        .emit(LogEvent::info("No collateral sized for arbitrage"));
                    return Ok(false);
                }
                ContractCall::new(
                    self.target.liquidator,
                    encode_absorb_and_arbitrage(&plan),
                    "absorbAndArbitrage",
                )
            }
        };

        if self.guard.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        info!(
            call = call.label,
            accounts = accounts.len(),
            "Submitting attempt"
        );
        let outcome = self.deps.submitter.submit(call).await;
        if matches!(outcome, Err(SubmitError::Cancelled)) {
            return Err(CoreError::Cancelled);
        }
        self.record(accounts, outcome);
        Ok(true)
    }

    /// Size the `absorbAndArbitrage` legs for `accounts`.
    async fn plan_absorb(
        &self,
        accounts: &[Address],
        assets: &[Asset],
    ) -> Result<AbsorbPlan, CoreError> {
        let mut plan = AbsorbPlan {
            ledger: self.target.ledger,
            accounts: accounts.to_vec(),
            legs: Vec::new(),
            pair_token: self.target.pair_token,
            pool_fee: self.target.pool_fee,
        };

        let base = self
            .guard
            .call("baseToken", self.deps.ledger.base_token())
            .await?;

        for asset in assets {
            if let Some(leg) = self.size_leg(asset.address, base, accounts).await? {
                plan.legs.push(leg);
            }
        }

        Ok(plan)
    }

    async fn size_leg(
        &self,
        asset: Address,
        base: Address,
        accounts: &[Address],
    ) -> Result<Option<SwapLeg>, CoreError> {
        let config = match self
            .soft(
                asset,
                self.guard.call(
                    "assetConfigs",
                    self.deps.liquidator.asset_config(self.target.ledger, asset),
                ),
            )
            .await?
        {
            Some(config) if config.is_set => config,
            _ => return Ok(None),
        };

        let Some(reserves) = self
            .soft(
                asset,
                self.guard
                    .call("getCollateralReserves", self.deps.ledger.collateral_reserves(asset)),
            )
            .await?
        else {
            return Ok(None);
        };

        let mut available = reserves;
        for &account in accounts {
            let balance = self
                .soft(
                    asset,
                    self.guard.call(
                        "userCollateral",
                        self.deps.ledger.collateral_balance(account, asset),
                    ),
                )
                .await?
                .unwrap_or(U256::ZERO);
            available = available.saturating_add(balance);
        }

        let amount = available.min(config.max_collateral_to_purchase);
        if amount.is_zero() {
            return Ok(None);
        }

        let request = SwapRequest::new(asset, base, amount, self.target.liquidator)
            .with_slippage_bps(self.config.swap_slippage_bps);
        let quote = match self
            .guard
            .call("quote", self.deps.quoter.quote(&request))
            .await
        {
            Ok(quote) => quote,
            Err(CoreError::Rpc { error, .. }) => {
                self.sink.emit(
                    LogEvent::warning("Swap quote failed, skipping asset")
                        .field("asset", asset)
                        .field("amount", amount)
                        .field("quoter", self.deps.quoter.quoter_id())
                        .field("error", format!("{error:#}")),
                );
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        debug!(%asset, %amount, expected = %quote.expected_output, "Sized purchase");
        Ok(Some(SwapLeg {
            asset,
            target: quote.target,
            calldata: quote.calldata,
        }))
    }

    /// Turn a failed read into a skipped asset. Cancellation and timeouts
    /// still propagate.
    async fn soft<T>(
        &self,
        asset: Address,
        read: impl std::future::Future<Output = Result<T, CoreError>>,
    ) -> Result<Option<T>, CoreError> {
        match read.await {
            Ok(value) => Ok(Some(value)),
            Err(CoreError::Rpc { what, error }) => {
                self.sink.emit(
                    LogEvent::warning("Sizing read failed, skipping asset")
                        .field("asset", asset)
                        .field("read", what)
                        .field("error", format!("{error:#}")),
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Log a batch whose call could not be built.
    fn record_unplanned(&mut self, accounts: &[Address], error: &CoreError) {
        self.sink.emit(
            LogEvent::error("Attempt sizing failed")
                .field("kind", attempt_kind(accounts))
                .field("accounts", join_accounts(accounts))
                .field("pair_token", self.target.pair_token)
                .field("pool_fee", self.target.pool_fee)
                .field("result", "error")
                .field("detail", error),
        );
        self.last_attempts.push(LiquidationAttempt {
            accounts: SmallVec::from_slice(accounts),
            pair_token: self.target.pair_token,
            pool_fee: self.target.pool_fee,
            succeeded: false,
            result: "error",
        });
    }

    fn record(&mut self, accounts: &[Address], outcome: Result<SubmissionResult, SubmitError>) {
        let kind = attempt_kind(accounts);

        let (severity, message, result, detail, anomaly) = match &outcome {
            Ok(r) if r.is_success() => (
                Severity::Info,
                "Attempt succeeded",
                r.as_str(),
                format!("{:#x}", r.tx_hash()),
                false,
            ),
            Ok(r @ SubmissionResult::NonceTooHigh { tx_nonce, chain_nonce, .. }) => (
                Severity::Alert,
                "Account nonce moved past bundled transaction",
                r.as_str(),
                format!("tx_nonce={tx_nonce} chain_nonce={chain_nonce}"),
                true,
            ),
            Ok(r) => (
                Severity::Warning,
                "Attempt did not land",
                r.as_str(),
                format!("{:#x}", r.tx_hash()),
                false,
            ),
            Err(e) if e.is_anomaly() => (
                Severity::Alert,
                "Relay transport failure",
                "error",
                e.to_string(),
                true,
            ),
            Err(e @ SubmitError::Reverted { .. }) => (
                Severity::Warning,
                "Attempt reverted in simulation",
                "error",
                e.to_string(),
                false,
            ),
            Err(e) => (
                Severity::Error,
                "Attempt failed",
                "error",
                e.to_string(),
                false,
            ),
        };

        let succeeded = matches!(&outcome, Ok(r) if r.is_success());

        let mut event = LogEvent::new(severity, message)
            .field("kind", kind)
            .field("accounts", join_accounts(accounts))
            .field("pair_token", self.target.pair_token)
            .field("pool_fee", self.target.pool_fee)
            .field("result", result)
            .field("detail", detail);

        if anomaly && self.config.anomaly_cooldown_iterations > 0 {
            self.cooldown_remaining = self.config.anomaly_cooldown_iterations;
            event = event.field("paused_iterations", self.cooldown_remaining);
        }
        self.sink.emit(event);

        self.last_attempts.push(LiquidationAttempt {
            accounts: SmallVec::from_slice(accounts),
            pair_token: self.target.pair_token,
            pool_fee: self.target.pool_fee,
            succeeded,
            result,
        });
    }
}

fn attempt_kind(accounts: &[Address]) -> &'static str {
    if accounts.is_empty() {
        "arbitrage"
    } else {
        "liquidation"
    }
}

fn join_accounts(accounts: &[Address]) -> String {
    accounts
        .iter()
        .map(|a| a.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
