//! Liquidator core logic.
//!
//! This crate provides the engine that watches a Comet ledger:
//! - Position directory rebuilt from the ledger's withdrawal history
//! - Solvency scanning against the ledger's own predicate
//! - Collateral valuation for arbitrage-only attempts
//! - Liquidation execution through `initFlash` or `absorbAndArbitrage`
//! - Asset-config administration for the liquidator contract
//! - The main loop tying them together under one cancellation token

pub mod admin;
pub mod config;
pub mod directory;
pub mod events;
pub mod executor;
pub mod guard;
pub mod main_loop;
pub mod scanner;
pub mod u256_math;
pub mod valuator;

#[cfg(test)]
pub(crate) mod testing;

pub use admin::{AdminError, AssetAdmin};
pub use config::{BotConfig, ConfigError, Deployment, ExecutorVariant, RuntimeConfig};
pub use directory::{PositionDirectory, WorkingSet};
pub use events::{LogEvent, LogSink, RecordingSink, Severity, TracingSink};
pub use executor::{ExecutionTarget, ExecutorDeps, LiquidationAttempt, LiquidationExecutor};
pub use guard::{CallGuard, CoreError};
pub use main_loop::MainLoop;
pub use scanner::SolvencyScanner;
pub use valuator::CollateralValuator;
