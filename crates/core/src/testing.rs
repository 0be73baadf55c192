//! In-memory ledger, liquidator and submitter for engine tests.
//!
//! The fake submitter decodes the calldata it is handed and applies the
//! effect a landed transaction would have on the fake ledger: absorbed
//! accounts become solvent, reserves are bought out, and the sender's base
//! balance grows.

use crate::u256_math::pow10;
use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::{SolCall, SolError};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use liquidator_api::swap::min_output_after_slippage;
use liquidator_api::{SwapQuote, SwapQuoter, SwapRequest};
use liquidator_chain::contracts::ILiquidator;
use liquidator_chain::{
    Asset, AssetConfig, ContractCall, Ledger, LiquidatorView, SubmissionResult,
    SubmissionStrategy, SubmitError, Submitter,
};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

pub fn addr(n: u8) -> Address {
    Address::with_last_byte(n)
}

/// `n` whole tokens with `decimals` decimals.
pub fn units(n: u64, decimals: u8) -> U256 {
    U256::from(n) * pow10(decimals)
}

#[derive(Debug, Default)]
struct LedgerState {
    head: u64,
    withdraws: Vec<(u64, Address)>,
    log_queries: Vec<(u64, u64)>,
    fail_logs: bool,
    assets: Vec<Asset>,
    reserves: HashMap<Address, U256>,
    prices: HashMap<Address, U256>,
    liquidatable: HashSet<Address>,
    failing: HashSet<Address>,
    collateral: HashMap<(Address, Address), U256>,
    base_balances: HashMap<Address, U256>,
    liquidatable_reads: Vec<Address>,
    reserve_reads: Vec<Address>,
}

#[derive(Debug)]
pub struct FakeLedger {
    address: Address,
    base_token: Address,
    state: Mutex<LedgerState>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            address: addr(0xC0),
            base_token: addr(0xBA),
            state: Mutex::new(LedgerState::default()),
        }
    }

    pub fn base_token_address(&self) -> Address {
        self.base_token
    }

    pub fn head(&self) -> u64 {
        self.state.lock().head
    }

    pub fn set_head(&self, block: u64) {
        self.state.lock().head = block;
    }

    pub fn push_withdraw(&self, block: u64, src: Address) {
        self.state.lock().withdraws.push((block, src));
    }

    pub fn fail_logs(&self, fail: bool) {
        self.state.lock().fail_logs = fail;
    }

    pub fn log_queries(&self) -> Vec<(u64, u64)> {
        self.state.lock().log_queries.clone()
    }

    /// Register a collateral asset priced at `price_usd` whole dollars.
    pub fn add_asset(&self, address: Address, decimals: u8, price_usd: u64) -> Address {
        let mut state = self.state.lock();
        let mut feed = [0xFEu8; 20];
        feed[19] = state.assets.len() as u8;
        let price_feed = Address::from(feed);

        state
            .assets
            .push(Asset::new(address, price_feed, pow10(decimals)));
        state
            .prices
            .insert(price_feed, U256::from(price_usd) * U256::from(100_000_000u64));
        address
    }

    pub fn assets(&self) -> Vec<Asset> {
        self.state.lock().assets.clone()
    }

    /// Set an 8-decimal price directly.
    pub fn set_price_units(&self, asset: Address, price: U256) {
        let mut state = self.state.lock();
        if let Some(feed) = state
            .assets
            .iter()
            .find(|a| a.address == asset)
            .map(|a| a.price_feed)
        {
            state.prices.insert(feed, price);
        }
    }

    pub fn set_reserves(&self, asset: Address, amount: U256) {
        self.state.lock().reserves.insert(asset, amount);
    }

    pub fn set_liquidatable(&self, account: Address, liquidatable: bool) {
        let mut state = self.state.lock();
        if liquidatable {
            state.liquidatable.insert(account);
        } else {
            state.liquidatable.remove(&account);
        }
    }

    pub fn is_liquidatable_now(&self, account: Address) -> bool {
        self.state.lock().liquidatable.contains(&account)
    }

    /// Make `isLiquidatable(account)` fail.
    pub fn fail_account(&self, account: Address) {
        self.state.lock().failing.insert(account);
    }

    pub fn set_collateral(&self, account: Address, asset: Address, amount: U256) {
        self.state.lock().collateral.insert((account, asset), amount);
    }

    pub fn base_balance(&self, owner: Address) -> U256 {
        self.state
            .lock()
            .base_balances
            .get(&owner)
            .copied()
            .unwrap_or_default()
    }

    pub fn liquidatable_reads(&self) -> Vec<Address> {
        self.state.lock().liquidatable_reads.clone()
    }

    pub fn reserve_reads(&self) -> Vec<Address> {
        self.state.lock().reserve_reads.clone()
    }

    /// Effect of a landed liquidator call.
    fn absorb_and_buy(&self, accounts: &[Address], beneficiary: Address) {
        let mut state = self.state.lock();
        let mut purchases = 0u64;

        for account in accounts {
            if state.liquidatable.remove(account) {
                purchases += 1;
            }
            state.collateral.retain(|(owner, _), _| owner != account);
        }
        for reserve in state.reserves.values_mut() {
            if !reserve.is_zero() {
                purchases += 1;
                *reserve = U256::ZERO;
            }
        }

        if purchases > 0 {
            let credit = U256::from(purchases) * pow10(6);
            let balance = state.base_balances.entry(beneficiary).or_default();
            *balance = balance.saturating_add(credit);
        }
    }
}

#[async_trait]
impl Ledger for FakeLedger {
    fn address(&self) -> Address {
        self.address
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.head())
    }

    async fn withdraw_sources(&self, from_block: u64, to_block: u64) -> Result<Vec<Address>> {
        let mut state = self.state.lock();
        if state.fail_logs {
            return Err(anyhow!("query returned more than 10000 results"));
        }
        state.log_queries.push((from_block, to_block));
        Ok(state
            .withdraws
            .iter()
            .filter(|(block, _)| (from_block..=to_block).contains(block))
            .map(|(_, src)| *src)
            .collect())
    }

    async fn num_assets(&self) -> Result<u8> {
        Ok(self.state.lock().assets.len() as u8)
    }

    async fn asset_info(&self, index: u8) -> Result<Asset> {
        self.state
            .lock()
            .assets
            .get(index as usize)
            .copied()
            .ok_or_else(|| anyhow!("asset index {index} out of range"))
    }

    async fn is_liquidatable(&self, account: Address) -> Result<bool> {
        let mut state = self.state.lock();
        state.liquidatable_reads.push(account);
        if state.failing.contains(&account) {
            return Err(anyhow!("execution reverted"));
        }
        Ok(state.liquidatable.contains(&account))
    }

    async fn collateral_reserves(&self, asset: Address) -> Result<U256> {
        let mut state = self.state.lock();
        state.reserve_reads.push(asset);
        Ok(state.reserves.get(&asset).copied().unwrap_or_default())
    }

    async fn price(&self, price_feed: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .prices
            .get(&price_feed)
            .copied()
            .unwrap_or_default())
    }

    async fn base_token(&self) -> Result<Address> {
        Ok(self.base_token)
    }

    async fn collateral_balance(&self, account: Address, asset: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .collateral
            .get(&(account, asset))
            .copied()
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
struct LiquidatorState {
    admin: Address,
    next_admin: Option<Address>,
    configs: HashMap<(Address, Address), AssetConfig>,
}

#[derive(Debug)]
pub struct FakeLiquidator {
    address: Address,
    state: Mutex<LiquidatorState>,
}

impl FakeLiquidator {
    pub fn new(address: Address, admin: Address) -> Self {
        Self {
            address,
            state: Mutex::new(LiquidatorState {
                admin,
                ..LiquidatorState::default()
            }),
        }
    }

    pub fn set_config(&self, ledger: Address, asset: Address, config: AssetConfig) {
        self.state.lock().configs.insert((ledger, asset), config);
    }

    pub fn config(&self, ledger: Address, asset: Address) -> AssetConfig {
        self.state
            .lock()
            .configs
            .get(&(ledger, asset))
            .copied()
            .unwrap_or_default()
    }

    /// Hand admin rights to `admin` just before the next write executes.
    pub fn rotate_admin_on_next_write(&self, admin: Address) {
        self.state.lock().next_admin = Some(admin);
    }

    /// `setAssetConfig` as executed by `sender`. False when not authorised.
    fn write_config(
        &self,
        sender: Address,
        ledger: Address,
        asset: Address,
        config: AssetConfig,
    ) -> bool {
        let mut state = self.state.lock();
        if let Some(admin) = state.next_admin.take() {
            state.admin = admin;
        }
        if sender != state.admin {
            return false;
        }
        state.configs.insert((ledger, asset), config);
        true
    }
}

#[async_trait]
impl LiquidatorView for FakeLiquidator {
    fn address(&self) -> Address {
        self.address
    }

    async fn asset_config(&self, ledger: Address, asset: Address) -> Result<AssetConfig> {
        Ok(self.config(ledger, asset))
    }

    async fn admin(&self) -> Result<Address> {
        Ok(self.state.lock().admin)
    }
}

/// Quotes 1:1 through a fixed router.
#[derive(Debug, Default)]
pub struct FakeQuoter {
    failing: Mutex<HashSet<Address>>,
    stalls: Mutex<usize>,
    requests: Mutex<Vec<SwapRequest>>,
}

impl FakeQuoter {
    pub const ROUTER: Address = Address::with_last_byte(0x5A);

    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_for(&self, token_in: Address) {
        self.failing.lock().insert(token_in);
    }

    /// The next quote never answers.
    pub fn stall_next(&self) {
        *self.stalls.lock() += 1;
    }

    pub fn requests(&self) -> Vec<SwapRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SwapQuoter for FakeQuoter {
    fn quoter_id(&self) -> &str {
        "fake"
    }

    async fn quote(&self, request: &SwapRequest) -> Result<SwapQuote> {
        self.requests.lock().push(request.clone());
        let stall = {
            let mut stalls = self.stalls.lock();
            let stall = *stalls > 0;
            *stalls = stalls.saturating_sub(1);
            stall
        };
        if stall {
            std::future::pending::<()>().await;
        }
        if self.failing.lock().contains(&request.token_in) {
            return Err(anyhow!("no pool for {}", request.token_in));
        }
        Ok(SwapQuote {
            token_in: request.token_in,
            token_out: request.token_out,
            amount_in: request.amount_in,
            expected_output: request.amount_in,
            min_output: min_output_after_slippage(request.amount_in, request.slippage_bps),
            fee: 500,
            target: Self::ROUTER,
            calldata: Bytes::copy_from_slice(request.token_in.as_slice()),
        })
    }
}

/// Scripted outcome for the next submission. Unscripted submissions succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scripted {
    Succeed,
    Revert,
    NotIncluded,
    NonceTooHigh,
    RelayDown,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedAbsorb {
    pub accounts: Vec<Address>,
    pub assets: Vec<Address>,
}

#[derive(Debug)]
pub struct FakeSubmitter {
    ledger: Arc<FakeLedger>,
    liquidator: Option<Arc<FakeLiquidator>>,
    sender: Address,
    strategy: SubmissionStrategy,
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<ContractCall>>,
}

impl FakeSubmitter {
    pub fn new(ledger: Arc<FakeLedger>, sender: Address, strategy: SubmissionStrategy) -> Self {
        Self {
            ledger,
            liquidator: None,
            sender,
            strategy,
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_liquidator(mut self, liquidator: Arc<FakeLiquidator>) -> Self {
        self.liquidator = Some(liquidator);
        self
    }

    pub fn script(&self, outcome: Scripted) {
        self.script.lock().push_back(outcome);
    }

    pub fn calls(&self) -> Vec<ContractCall> {
        self.calls.lock().clone()
    }

    /// `accounts` of every `initFlash` call, in submission order.
    pub fn decoded_flash_accounts(&self) -> Vec<Vec<Address>> {
        self.calls()
            .iter()
            .filter_map(|call| ILiquidator::initFlashCall::abi_decode(&call.input, true).ok())
            .map(|decoded| decoded.params.accounts)
            .collect()
    }

    pub fn decoded_absorb_calls(&self) -> Vec<DecodedAbsorb> {
        self.calls()
            .iter()
            .filter_map(|call| {
                ILiquidator::absorbAndArbitrageCall::abi_decode(&call.input, true).ok()
            })
            .map(|decoded| DecodedAbsorb {
                accounts: decoded.liquidatableAccounts,
                assets: decoded.assets,
            })
            .collect()
    }

    fn apply(&self, call: &ContractCall) -> Result<(), SubmitError> {
        if let Ok(decoded) = ILiquidator::initFlashCall::abi_decode(&call.input, true) {
            self.ledger
                .absorb_and_buy(&decoded.params.accounts, self.sender);
            return Ok(());
        }
        if let Ok(decoded) = ILiquidator::absorbAndArbitrageCall::abi_decode(&call.input, true) {
            self.ledger
                .absorb_and_buy(&decoded.liquidatableAccounts, self.sender);
            return Ok(());
        }
        if let Ok(decoded) = ILiquidator::setAssetConfigCall::abi_decode(&call.input, true) {
            let liquidator = self
                .liquidator
                .as_ref()
                .ok_or_else(|| SubmitError::Rpc(anyhow!("no liquidator attached")))?;
            let config = AssetConfig {
                max_collateral_to_purchase: decoded.maxCollateralToPurchase,
                is_set: decoded.isSet,
            };
            if !liquidator.write_config(self.sender, decoded.comet, decoded.asset, config) {
                return Err(SubmitError::Reverted {
                    message: "execution reverted: Unauthorized()".to_string(),
                    data: Some(Bytes::from(ILiquidator::Unauthorized::SELECTOR.to_vec())),
                });
            }
            return Ok(());
        }
        Err(SubmitError::Rpc(anyhow!("unknown selector")))
    }
}

#[async_trait]
impl Submitter for FakeSubmitter {
    fn strategy(&self) -> SubmissionStrategy {
        self.strategy
    }

    fn sender(&self) -> Address {
        self.sender
    }

    async fn submit(&self, call: ContractCall) -> Result<SubmissionResult, SubmitError> {
        let n = {
            let mut calls = self.calls.lock();
            calls.push(call.clone());
            calls.len() as u64
        };
        let tx_hash = B256::with_last_byte(n as u8);
        let block = self.ledger.head() + 1;
        let scripted = self.script.lock().pop_front().unwrap_or(Scripted::Succeed);

        match scripted {
            Scripted::Cancelled => Err(SubmitError::Cancelled),
            Scripted::RelayDown => Err(SubmitError::RelayTransport(
                "error sending request: connection refused".to_string(),
            )),
            Scripted::NotIncluded => Ok(SubmissionResult::NotIncludedThisBlock {
                tx_hash,
                target_block: block,
            }),
            Scripted::NonceTooHigh => Ok(SubmissionResult::NonceTooHigh {
                tx_hash,
                tx_nonce: n,
                chain_nonce: n + 1,
            }),
            Scripted::Revert => match self.strategy {
                SubmissionStrategy::Public => {
                    Ok(SubmissionResult::PubliclyReverted { tx_hash, block })
                }
                SubmissionStrategy::PrivateRelay => Err(SubmitError::Reverted {
                    message: "execution reverted".to_string(),
                    data: None,
                }),
            },
            Scripted::Succeed => {
                self.apply(&call)?;
                Ok(match self.strategy {
                    SubmissionStrategy::Public => {
                        SubmissionResult::PubliclyConfirmed { tx_hash, block }
                    }
                    SubmissionStrategy::PrivateRelay => {
                        SubmissionResult::Included { tx_hash, block }
                    }
                })
            }
        }
    }
}
