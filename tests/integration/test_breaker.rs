//! Breaker behavior exercised through the probe, against a failing venue

use crate::common::FlakyVenue;
use multihop_arbitrage::{
    breaker::BreakerRegistry,
    config::{BreakerConfig, ProbeConfig},
    probe::{LiquidityProbe, QUOTE_BREAKER},
    venue::{Asset, FeeTier, QuoteOutcome},
    CircuitState, EngineError,
};
use rust_decimal_macros::dec;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

fn breaker_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 2,
        success_threshold: 1,
        open_timeout_ms: 50,
        monitoring_window_ms: 10_000,
    }
}

fn probe_config() -> ProbeConfig {
    ProbeConfig {
        fee_tiers: vec![500],
        probe_amount: dec!(1),
        min_size: dec!(0.1),
        max_size: dec!(1),
        slippage_ceiling: dec!(0.05),
    }
}

fn assets() -> (Asset, Asset) {
    (
        Asset::new("asset-weth", "WETH", 18),
        Asset::new("asset-usdc", "USDC", 6),
    )
}

#[tokio::test]
async fn test_breaker_opens_and_rejects_without_reaching_venue() {
    let venue = Arc::new(FlakyVenue::new(usize::MAX));
    let breakers = Arc::new(BreakerRegistry::new(breaker_config()));
    let probe = LiquidityProbe::new(venue.clone(), breakers.clone(), probe_config());
    let (weth, usdc) = assets();

    // Two dependency failures reach the threshold.
    assert!(probe
        .quote_tier(&weth, &usdc, FeeTier(500), dec!(1))
        .await
        .is_err());
    assert!(probe
        .quote_tier(&weth, &usdc, FeeTier(500), dec!(1))
        .await
        .is_err());
    let breaker = breakers.get_or_create(QUOTE_BREAKER);
    assert_eq!(breaker.state(), CircuitState::Open);

    // The third call is rejected fast with the distinguished error; the
    // venue never sees it.
    let before = venue.quote_calls.load(Ordering::SeqCst);
    let err = probe
        .quote_tier(&weth, &usdc, FeeTier(500), dec!(1))
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<EngineError>(),
        Some(EngineError::BreakerOpen(_))
    ));
    assert_eq!(venue.quote_calls.load(Ordering::SeqCst), before);
}

#[tokio::test]
async fn test_breaker_recovers_through_half_open() {
    // The venue fails twice, then starts answering (with no pool, which is a
    // successful call as far as the breaker is concerned).
    let venue = Arc::new(FlakyVenue::new(2));
    let breakers = Arc::new(BreakerRegistry::new(breaker_config()));
    let probe = LiquidityProbe::new(venue, breakers.clone(), probe_config());
    let (weth, usdc) = assets();

    for _ in 0..2 {
        let _ = probe.quote_tier(&weth, &usdc, FeeTier(500), dec!(1)).await;
    }
    let breaker = breakers.get_or_create(QUOTE_BREAKER);
    assert_eq!(breaker.state(), CircuitState::Open);
    assert!(!breakers.health_summary().healthy);

    // After the open timeout the next call probes the dependency and the
    // success closes the breaker again.
    tokio::time::sleep(Duration::from_millis(60)).await;
    let outcome = probe
        .quote_tier(&weth, &usdc, FeeTier(500), dec!(1))
        .await
        .unwrap();
    assert_eq!(outcome, QuoteOutcome::NoPool);
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert!(breakers.health_summary().healthy);
}

#[tokio::test]
async fn test_registry_reset_clears_open_breakers() {
    let venue = Arc::new(FlakyVenue::new(usize::MAX));
    let breakers = Arc::new(BreakerRegistry::new(breaker_config()));
    let probe = LiquidityProbe::new(venue, breakers.clone(), probe_config());
    let (weth, usdc) = assets();

    for _ in 0..2 {
        let _ = probe.quote_tier(&weth, &usdc, FeeTier(500), dec!(1)).await;
    }
    let summary = breakers.health_summary();
    assert_eq!(summary.open, 1);
    assert!(!summary.healthy);

    breakers.reset_all();
    let summary = breakers.health_summary();
    assert_eq!(summary.open, 0);
    assert!(summary.healthy);
    assert_eq!(
        breakers.status_of(QUOTE_BREAKER).unwrap().state,
        CircuitState::Closed
    );
}
