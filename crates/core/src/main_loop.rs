//! Main loop: refresh, execute, sleep, until cancelled.

use crate::config::LoopConfig;
use crate::directory::{PositionDirectory, WorkingSet};
use crate::events::{LogEvent, LogSink};
use crate::executor::LiquidationExecutor;
use crate::guard::{CallGuard, CoreError};
use std::sync::Arc;
use tracing::{debug, info};

pub struct MainLoop {
    directory: PositionDirectory,
    executor: LiquidationExecutor,
    config: LoopConfig,
    guard: CallGuard,
    sink: Arc<dyn LogSink>,
    working_set: WorkingSet,
    /// Iterations since the last successful refresh.
    since_refresh: u64,
    iterations: u64,
    refreshes: u64,
}

impl MainLoop {
    pub fn new(
        directory: PositionDirectory,
        executor: LiquidationExecutor,
        config: LoopConfig,
        guard: CallGuard,
        sink: Arc<dyn LogSink>,
    ) -> Self {
        Self {
            directory,
            executor,
            config,
            guard,
            sink,
            working_set: WorkingSet::default(),
            since_refresh: 0,
            iterations: 0,
            refreshes: 0,
        }
    }

    pub fn working_set(&self) -> &WorkingSet {
        &self.working_set
    }

    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    pub fn refreshes(&self) -> u64 {
        self.refreshes
    }

    /// Run until the cancellation token fires. Returns iterations completed.
    pub async fn run(&mut self) -> u64 {
        info!(
            refresh_every = self.config.refresh_every_iterations,
            delay_secs = self.config.iteration_delay_secs,
            "Main loop started"
        );
        while self.iterate().await {}
        info!(iterations = self.iterations, "Main loop stopped");
        self.iterations
    }

    /// Run at most `n` iterations, stopping early on cancellation.
    pub async fn run_iterations(&mut self, n: u64) -> u64 {
        let mut completed = 0;
        while completed < n && self.iterate().await {
            completed += 1;
        }
        completed
    }

    /// One full iteration including the trailing sleep. `false` once cancelled.
    async fn iterate(&mut self) -> bool {
        if self.guard.is_cancelled() {
            return false;
        }

        let attempted = match self.step().await {
            Ok(attempted) => attempted,
            Err(CoreError::Cancelled) => return false,
            Err(e) => {
                self.sink.emit(
                    LogEvent::error("Iteration failed")
                        .field("iteration", self.iterations + 1)
                        .field("error", &e),
                );
                false
            }
        };

        self.iterations += 1;
        self.sink.emit(
            LogEvent::info("Heartbeat")
                .field("iteration", self.iterations)
                .field("tracked", self.working_set.addresses.len())
                .field("assets", self.working_set.assets.len())
                .field("block", self.working_set.refreshed_at_block)
                .field("attempted", attempted),
        );

        if self.guard.sleep(self.config.iteration_delay()).await.is_err() {
            return false;
        }
        self.since_refresh += 1;
        true
    }

    async fn step(&mut self) -> Result<bool, CoreError> {
        if self.working_set.is_empty()
            || self.since_refresh >= self.config.refresh_every_iterations
        {
            debug!(since_refresh = self.since_refresh, "Refreshing working set");
            self.working_set = self.directory.refresh().await?;
            self.since_refresh = 0;
            self.refreshes += 1;
        }

        self.executor.run(&self.working_set).await
    }
}
