//! Shared fixtures: seeded configurations, venues, and route builders

use async_trait::async_trait;
use multihop_arbitrage::{
    config::{EngineConfig, PoolConfig},
    discovery::Route,
    sim::SimulatedVenue,
    venue::{
        Asset, ConfirmationReceipt, FeeTier, QuoteOutcome, SwapRequest, SwapVenue,
        TransactionHandle,
    },
    Result,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Test utilities for integration tests
pub struct TestUtils;

impl TestUtils {
    /// Configuration over a three-asset universe with a seeded triangular
    /// inefficiency: WETH -> USDC -> WBTC -> WETH returns more WETH than it
    /// consumes.
    pub fn mispriced_config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.universe.assets.truncate(2); // USDC, WBTC
        config.universe.high_liquidity = vec!["USDC".to_string(), "WBTC".to_string()];
        config.discovery.max_hops = 3;
        config.probe.fee_tiers = vec![500];
        config.probe.probe_amount = dec!(0.1);
        config.probe.min_size = dec!(0.1);
        config.probe.max_size = dec!(1);
        config.engine.cycle_interval_ms = 10;
        config.execution.confirmation_timeout_ms = 100;
        config.execution.optimistic_delay_ms = 1;
        config.venue.pools = vec![
            Self::pool("WETH", "USDC", 500, dec!(10000), dec!(30_000_000)),
            Self::pool("USDC", "WBTC", 500, dec!(30_000_000), dec!(1000)),
            // WBTC fetches ~20% more WETH here than the other pools imply.
            Self::pool("WBTC", "WETH", 500, dec!(1000), dec!(12000)),
        ];
        config
    }

    /// One seeded pool
    pub fn pool(
        asset_a: &str,
        asset_b: &str,
        fee_tier: u32,
        reserve_a: Decimal,
        reserve_b: Decimal,
    ) -> PoolConfig {
        PoolConfig {
            asset_a: asset_a.to_string(),
            asset_b: asset_b.to_string(),
            fee_tier,
            reserve_a,
            reserve_b,
        }
    }

    /// Simulated venue seeded from a configuration
    pub fn venue(config: &EngineConfig) -> SimulatedVenue {
        SimulatedVenue::from_config(&config.universe, &config.venue.pools).unwrap()
    }

    /// A synthetic route over the given symbol cycle
    pub fn route(symbols: &[&str]) -> Route {
        let path: Vec<Asset> = symbols
            .iter()
            .map(|s| Asset::new(format!("asset-{}", s.to_lowercase()), *s, 18))
            .collect();
        let tiers = vec![FeeTier(500); path.len() - 1];
        Route::new(path, tiers, dec!(1), dec!(1.02), dec!(0.001), dec!(0.5)).unwrap()
    }
}

/// Venue whose calls fail until a preset number of failures is spent, then
/// report no pool. Counts quote invocations so tests can assert that a
/// rejected call never reached the venue.
pub struct FlakyVenue {
    failures_remaining: AtomicUsize,
    pub quote_calls: AtomicUsize,
}

impl FlakyVenue {
    /// Venue that fails its first `failures` quote calls
    pub fn new(failures: usize) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(failures),
            quote_calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SwapVenue for FlakyVenue {
    async fn quote(
        &self,
        _asset_in: &Asset,
        _asset_out: &Asset,
        _fee_tier: FeeTier,
        _amount_in: Decimal,
    ) -> Result<QuoteOutcome> {
        self.quote_calls.fetch_add(1, Ordering::SeqCst);
        let failing = self
            .failures_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            Err(anyhow::anyhow!("venue unreachable"))
        } else {
            Ok(QuoteOutcome::NoPool)
        }
    }

    async fn submit_swap(&self, _request: &SwapRequest) -> Result<TransactionHandle> {
        Err(anyhow::anyhow!("venue unreachable"))
    }

    async fn await_confirmation(
        &self,
        _handle: &TransactionHandle,
        _timeout: Duration,
    ) -> Result<ConfirmationReceipt> {
        Err(anyhow::anyhow!("venue unreachable"))
    }
}
