//! Discovery over seeded constant-product liquidity

use crate::common::TestUtils;
use multihop_arbitrage::{
    breaker::BreakerRegistry,
    config::EngineConfig,
    discovery::DiscoveryEngine,
    probe::LiquidityProbe,
    Route,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn discovery_over(config: &EngineConfig) -> DiscoveryEngine {
    let venue = Arc::new(TestUtils::venue(config));
    let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    let probe = Arc::new(LiquidityProbe::new(venue, breakers, config.probe.clone()));
    DiscoveryEngine::new(probe, config.universe.clone(), config.discovery.clone())
}

async fn discover(config: &EngineConfig) -> Vec<Route> {
    discovery_over(config)
        .discover(
            &config.universe.base_asset,
            config.discovery.min_hops..=config.discovery.max_hops,
            config.discovery.min_profit_threshold,
        )
        .await
        .unwrap()
}

#[tokio::test]
async fn test_seeded_inefficiency_is_found() {
    let config = TestUtils::mispriced_config();
    let routes = discover(&config).await;

    assert!(!routes.is_empty(), "seeded triangle not found");
    let best = &routes[0];
    assert_eq!(best.signature(), "WETH->USDC->WBTC->WETH");
    assert!(best.net_profit_percent > config.discovery.min_profit_threshold);
    assert!(best.net_profit > Decimal::ZERO);
    assert_eq!(best.fee_tiers.len(), best.hops());
}

#[tokio::test]
async fn test_results_sorted_descending() {
    let mut config = TestUtils::mispriced_config();
    // A second, shallower inefficiency through a DAI pool pair.
    config.universe.assets.push(
        multihop_arbitrage::venue::Asset::new("asset-dai", "DAI", 18),
    );
    config.venue.pools.push(TestUtils::pool(
        "WETH",
        "DAI",
        500,
        dec!(5000),
        dec!(15_000_000),
    ));
    config.venue.pools.push(TestUtils::pool(
        "DAI",
        "USDC",
        500,
        dec!(15_000_000),
        dec!(15_300_000),
    ));

    let routes = discover(&config).await;
    assert!(routes.len() > 1);
    for pair in routes.windows(2) {
        assert!(pair[0].net_profit_percent >= pair[1].net_profit_percent);
    }
}

#[tokio::test]
async fn test_missing_pools_yield_empty_scan_not_error() {
    let mut config = TestUtils::mispriced_config();
    // Only one pool: no cycle back to base can exist.
    config.venue.pools.truncate(1);

    let routes = discover(&config).await;
    assert!(routes.is_empty());
}

#[tokio::test]
async fn test_route_budget_truncates_results() {
    let mut config = TestUtils::mispriced_config();
    config.discovery.route_budget = 1;

    let routes = discover(&config).await;
    assert!(routes.len() <= 1);
}

#[tokio::test]
async fn test_balanced_pools_offer_nothing() {
    // All pools priced consistently: every round trip loses the fees.
    let mut config = TestUtils::mispriced_config();
    config.venue.pools = vec![
        TestUtils::pool("WETH", "USDC", 500, dec!(10000), dec!(30_000_000)),
        TestUtils::pool("USDC", "WBTC", 500, dec!(30_000_000), dec!(1000)),
        TestUtils::pool("WBTC", "WETH", 500, dec!(1000), dec!(10000)),
    ];

    let routes = discover(&config).await;
    assert!(routes.is_empty());
}
