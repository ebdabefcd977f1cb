//! Engine orchestration: the discover → batch → execute → learn cycle

use crate::{
    breaker::{BreakerRegistry, HealthSummary},
    config::EngineConfig,
    discovery::{DiscoveryEngine, Route},
    execution::{ExecutionPipeline, ExecutionResult},
    learning::{LearningStore, SnapshotPersistence},
    probe::LiquidityProbe,
    scheduler::identify_batches,
    venue::{GasBidStrategy, SwapVenue},
    Result,
};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    /// Not running
    Stopped,
    /// Cycling
    Running,
    /// Running but skipping cycles
    Paused,
}

/// Cumulative engine statistics
#[derive(Debug, Clone, Default, Serialize)]
pub struct EngineStatistics {
    /// Completed discovery/execution cycles
    pub cycles: u64,
    /// Candidate routes discovered across all cycles
    pub routes_discovered: u64,
    /// Routes handed to the execution pipeline
    pub routes_executed: u64,
    /// Routes that ran to completion
    pub successful_routes: u64,
    /// Net realized profit across all routes, in base-asset units
    pub net_profit: Decimal,
    /// Engine uptime in seconds
    pub uptime_seconds: u64,
    /// Unix timestamp of the last completed cycle
    pub last_cycle_at: Option<i64>,
}

/// Outcome summary of one engine cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    /// Threshold the cycle discovered against, percent
    pub threshold: Decimal,
    /// Candidate routes discovered
    pub discovered: usize,
    /// Conflict-free batches formed
    pub batches: usize,
    /// Routes executed
    pub executed: usize,
    /// Routes that succeeded
    pub succeeded: usize,
    /// Net realized profit for the cycle, in base-asset units
    pub cycle_profit: Decimal,
}

/// Wires discovery, scheduling, execution, and learning into one loop
pub struct ArbitrageEngine {
    config: EngineConfig,
    discovery: DiscoveryEngine,
    pipeline: ExecutionPipeline,
    learning: Arc<LearningStore>,
    breakers: Arc<BreakerRegistry>,
    state: Arc<RwLock<EngineState>>,
    statistics: Arc<RwLock<EngineStatistics>>,
    shutdown: Arc<AtomicBool>,
    start_time: Instant,
}

impl ArbitrageEngine {
    /// Assemble an engine over the given venue, persistence, and gas strategy
    pub async fn new(
        config: EngineConfig,
        venue: Arc<dyn SwapVenue>,
        persistence: Arc<dyn SnapshotPersistence>,
        gas: Arc<dyn GasBidStrategy>,
    ) -> Result<Self> {
        config.validate()?;

        let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
        let probe = Arc::new(LiquidityProbe::new(
            venue.clone(),
            breakers.clone(),
            config.probe.clone(),
        ));
        let discovery = DiscoveryEngine::new(
            probe,
            config.universe.clone(),
            config.discovery.clone(),
        );
        let pipeline = ExecutionPipeline::new(
            venue,
            breakers.clone(),
            gas,
            config.execution.clone(),
        );
        let learning = Arc::new(LearningStore::open(persistence, &config.learning).await?);

        Ok(Self {
            config,
            discovery,
            pipeline,
            learning,
            breakers,
            state: Arc::new(RwLock::new(EngineState::Stopped)),
            statistics: Arc::new(RwLock::new(EngineStatistics::default())),
            shutdown: Arc::new(AtomicBool::new(false)),
            start_time: Instant::now(),
        })
    }

    /// Run one full discover → prioritize → batch → execute → learn cycle
    pub async fn run_cycle(&self) -> Result<CycleSummary> {
        let base = self.config.universe.base_asset.clone();
        let depth_range = self.config.discovery.min_hops..=self.config.discovery.max_hops;

        let threshold = self
            .learning
            .adaptive_threshold(self.config.discovery.min_profit_threshold, None)
            .await;
        debug!(threshold = %threshold, "cycle threshold derived");

        let routes = self
            .discovery
            .discover(&base, depth_range, threshold)
            .await?;
        let discovered = routes.len();

        let routes = self.learning.prioritize(routes).await;
        let by_signature: HashMap<String, Route> = routes
            .iter()
            .map(|r| (r.signature(), r.clone()))
            .collect();

        let batches = identify_batches(routes);
        let batch_count = batches.len();

        let results = self.pipeline.execute_batches(batches).await;
        let executed = results.len();
        let mut succeeded = 0usize;
        let mut cycle_profit = Decimal::ZERO;

        for result in &results {
            if result.is_success() {
                succeeded += 1;
            }
            cycle_profit += result.realized_profit;
            self.record(&by_signature, result).await;
        }

        self.update_statistics(discovered, executed, succeeded, cycle_profit)
            .await;

        metrics::gauge!(
            "arb_cycle_profit",
            rust_decimal::prelude::ToPrimitive::to_f64(&cycle_profit).unwrap_or(0.0)
        );

        Ok(CycleSummary {
            threshold,
            discovered,
            batches: batch_count,
            executed,
            succeeded,
            cycle_profit,
        })
    }

    /// Run cycles until stopped, shut down, or `max_cycles` is reached
    pub async fn run(&self, max_cycles: Option<u64>) -> Result<()> {
        {
            let mut state = self.state.write().await;
            *state = EngineState::Running;
        }
        info!("arbitrage engine started");

        let interval = std::time::Duration::from_millis(self.config.engine.cycle_interval_ms);
        let mut completed = 0u64;

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("shutdown flag set, stopping engine");
                break;
            }
            match *self.state.read().await {
                EngineState::Stopped => break,
                EngineState::Paused => {
                    tokio::time::sleep(interval).await;
                    continue;
                }
                EngineState::Running => {}
            }

            match self.run_cycle().await {
                Ok(summary) => {
                    info!(
                        discovered = summary.discovered,
                        executed = summary.executed,
                        succeeded = summary.succeeded,
                        profit = %summary.cycle_profit,
                        "cycle complete"
                    );
                }
                Err(err) => {
                    warn!(error = %err, "cycle failed");
                }
            }

            completed += 1;
            if let Some(max) = max_cycles {
                if completed >= max {
                    info!(cycles = completed, "cycle limit reached");
                    break;
                }
            }

            tokio::time::sleep(interval).await;
        }

        {
            let mut state = self.state.write().await;
            *state = EngineState::Stopped;
        }
        info!("arbitrage engine stopped");
        Ok(())
    }

    /// Request a graceful stop: in-flight routes finish their current hop
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.pipeline.shutdown_flag().store(true, Ordering::SeqCst);
    }

    /// Pause cycling without tearing anything down
    pub async fn pause(&self) {
        let mut state = self.state.write().await;
        *state = EngineState::Paused;
        info!("engine paused");
    }

    /// Resume cycling after a pause
    pub async fn resume(&self) {
        let mut state = self.state.write().await;
        *state = EngineState::Running;
        info!("engine resumed");
    }

    /// Stop the run loop after the current cycle
    pub async fn stop(&self) {
        let mut state = self.state.write().await;
        *state = EngineState::Stopped;
        info!("engine stop requested");
    }

    /// Current lifecycle state
    pub async fn state(&self) -> EngineState {
        *self.state.read().await
    }

    /// Cumulative statistics snapshot
    pub async fn statistics(&self) -> EngineStatistics {
        let mut stats = self.statistics.read().await.clone();
        stats.uptime_seconds = self.start_time.elapsed().as_secs();
        stats
    }

    /// Aggregate breaker health
    pub fn breaker_health(&self) -> HealthSummary {
        self.breakers.health_summary()
    }

    /// The breaker registry, for operator tooling
    pub fn breakers(&self) -> Arc<BreakerRegistry> {
        self.breakers.clone()
    }

    /// The learning store read API
    pub fn learning(&self) -> Arc<LearningStore> {
        self.learning.clone()
    }

    async fn record(&self, routes: &HashMap<String, Route>, result: &ExecutionResult) {
        let Some(route) = routes.get(&result.signature) else {
            warn!(signature = %result.signature, "result for unknown route");
            return;
        };
        self.learning
            .record_outcome(route, result.is_success(), result.realized_profit_percent)
            .await;
    }

    async fn update_statistics(
        &self,
        discovered: usize,
        executed: usize,
        succeeded: usize,
        cycle_profit: Decimal,
    ) {
        let mut stats = self.statistics.write().await;
        stats.cycles += 1;
        stats.routes_discovered += discovered as u64;
        stats.routes_executed += executed as u64;
        stats.successful_routes += succeeded as u64;
        stats.net_profit += cycle_profit;
        stats.last_cycle_at = Some(chrono::Utc::now().timestamp());
    }
}
