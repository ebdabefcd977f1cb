//! Execution pipeline over the simulated venue

use crate::common::TestUtils;
use multihop_arbitrage::{
    breaker::BreakerRegistry,
    discovery::DiscoveryEngine,
    execution::{ExecutionPipeline, ExecutionStatus},
    probe::LiquidityProbe,
    sim::SimulatedVenue,
    venue::{ConfirmationStatus, FixedGasBid},
    Route,
};
use rust_decimal::Decimal;
use std::sync::Arc;

struct Harness {
    venue: Arc<SimulatedVenue>,
    pipeline: ExecutionPipeline,
    routes: Vec<Route>,
}

/// Discover the seeded triangle against a fresh venue and keep the venue
/// around for failure injection.
async fn harness() -> Harness {
    let config = TestUtils::mispriced_config();
    let venue = Arc::new(TestUtils::venue(&config));
    let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    let probe = Arc::new(LiquidityProbe::new(
        venue.clone(),
        breakers.clone(),
        config.probe.clone(),
    ));
    let discovery =
        DiscoveryEngine::new(probe, config.universe.clone(), config.discovery.clone());

    let routes = discovery
        .discover(
            &config.universe.base_asset,
            config.discovery.min_hops..=config.discovery.max_hops,
            config.discovery.min_profit_threshold,
        )
        .await
        .unwrap();
    assert!(!routes.is_empty(), "harness venue must offer a route");

    let pipeline = ExecutionPipeline::new(
        venue.clone(),
        breakers,
        Arc::new(FixedGasBid::default()),
        config.execution.clone(),
    );

    Harness {
        venue,
        pipeline,
        routes,
    }
}

#[tokio::test]
async fn test_discovered_route_executes_at_a_profit() {
    let h = harness().await;
    let route = &h.routes[0];

    let result = h.pipeline.execute_route(route).await;
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.completed_hops(), route.hops());
    assert!(result.realized_profit > Decimal::ZERO);
    assert!(result.realized_amount > result.input_amount);
    for hop in &result.hops {
        assert_eq!(hop.confirmation, ConfirmationStatus::Confirmed);
    }
}

#[tokio::test]
async fn test_submission_failure_reports_failed_with_no_hops() {
    let h = harness().await;
    h.venue.fail_next_submissions(1);

    let result = h.pipeline.execute_route(&h.routes[0]).await;
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.completed_hops(), 0);
    assert!(result.error.is_some());
    // Capital never left the base asset.
    assert_eq!(result.realized_amount, result.input_amount);
    assert_eq!(result.realized_profit, Decimal::ZERO);
}

#[tokio::test]
async fn test_failed_confirmation_preserves_partial_execution() {
    let h = harness().await;
    h.venue.fail_next_confirmations(1);

    let result = h.pipeline.execute_route(&h.routes[0]).await;
    assert_eq!(result.status, ExecutionStatus::Failed);
    assert_eq!(result.hops.len(), 1);
    assert_eq!(result.hops[0].confirmation, ConfirmationStatus::Failed);
}

#[tokio::test]
async fn test_confirmation_timeout_proceeds_optimistically() {
    let h = harness().await;
    h.venue.timeout_next_confirmations(1);

    let result = h.pipeline.execute_route(&h.routes[0]).await;
    assert_eq!(result.status, ExecutionStatus::Success);
    assert_eq!(result.hops[0].confirmation, ConfirmationStatus::Timeout);
    for hop in &result.hops[1..] {
        assert_eq!(hop.confirmation, ConfirmationStatus::Confirmed);
    }
    assert!(result.realized_profit > Decimal::ZERO);
}

#[tokio::test]
async fn test_execute_batches_runs_batches_in_order() {
    let h = harness().await;

    // Two copies of the seeded route conflict on every asset, so they land
    // in two sequential batches; both must still reach a terminal state.
    let route = h.routes[0].clone();
    let batches = multihop_arbitrage::identify_batches(vec![route.clone(), route]);
    assert_eq!(batches.len(), 2);

    let results = h.pipeline.execute_batches(batches).await;
    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(matches!(
            result.status,
            ExecutionStatus::Success | ExecutionStatus::Failed
        ));
    }
    // The first execution moved the reserves toward equilibrium, so the
    // second realizes strictly less than the first.
    assert!(results[0].realized_profit > results[1].realized_profit);
}
