//! Learning store persistence and adaptation, file-backed

use crate::common::TestUtils;
use multihop_arbitrage::{
    config::LearningConfig,
    learning::{FilePersistence, LearningStore},
};
use rust_decimal_macros::dec;
use std::path::PathBuf;
use std::sync::Arc;

fn config_at(path: PathBuf) -> LearningConfig {
    LearningConfig {
        state_path: path,
        lock_retries: 3,
        lock_backoff_ms: 10,
        lock_stale_ms: 1000,
        max_write_failures: 5,
    }
}

#[tokio::test]
async fn test_snapshot_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_at(dir.path().join("learning.json"));

    let triangle = TestUtils::route(&["WETH", "USDC", "WBTC", "WETH"]);
    let pair = TestUtils::route(&["WETH", "DAI", "WETH"]);

    let store = LearningStore::open(Arc::new(FilePersistence::new(&config)), &config)
        .await
        .unwrap();
    store.record_outcome(&triangle, true, dec!(1.5)).await;
    store.record_outcome(&triangle, true, dec!(0.8)).await;
    store.record_outcome(&pair, false, dec!(-0.4)).await;

    // A fresh store over the same path sees identical records.
    let reopened = LearningStore::open(Arc::new(FilePersistence::new(&config)), &config)
        .await
        .unwrap();

    let stats = reopened.learning_statistics().await;
    assert_eq!(stats.tracked_routes, 2);
    assert_eq!(stats.total_attempts, 3);
    assert_eq!(stats.total_successes, 2);

    let original = store.top_performing_routes(10).await;
    let restored = reopened.top_performing_routes(10).await;
    assert_eq!(original.len(), restored.len());
    for (x, y) in original.iter().zip(restored.iter()) {
        assert_eq!(x.signature, y.signature);
        assert_eq!(x.attempts, y.attempts);
        assert_eq!(x.successes, y.successes);
        assert_eq!(x.total_profit, y.total_profit);
        assert_eq!(x.avg_profit_percent, y.avg_profit_percent);
        assert_eq!(x.success_rate, y.success_rate);
        assert_eq!(x.confidence, y.confidence);
        assert_eq!(x.last_executed_at, y.last_executed_at);
    }

    let best = restored
        .iter()
        .find(|p| p.signature == triangle.signature())
        .unwrap();
    assert_eq!(best.attempts, 2);
    assert_eq!(best.successes, 2);
    assert_eq!(best.success_rate, dec!(1));
    assert_eq!(best.avg_profit_percent, dec!(1.15));

    let worst = restored
        .iter()
        .find(|p| p.signature == pair.signature())
        .unwrap();
    assert_eq!(worst.attempts, 1);
    assert_eq!(worst.successes, 0);
}

#[tokio::test]
async fn test_unwritable_path_disables_writes_without_blocking() {
    let dir = tempfile::tempdir().unwrap();
    // The parent of the state path is a regular file, so directory creation
    // fails on every save.
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "not a directory").unwrap();
    let config = config_at(blocker.join("learning.json"));

    let persistence = Arc::new(FilePersistence::new(&config));
    let store = LearningStore::open(persistence, &config).await.unwrap();
    let route = TestUtils::route(&["WETH", "USDC", "WETH"]);

    for _ in 0..5 {
        store.record_outcome(&route, true, dec!(1)).await;
    }
    assert!(store.writes_disabled());

    // In-memory recording continues after the disable.
    store.record_outcome(&route, true, dec!(1)).await;
    let stats = store.learning_statistics().await;
    assert_eq!(stats.total_attempts, 6);
    assert!(stats.writes_disabled);
}

#[tokio::test]
async fn test_threshold_adapts_to_recorded_history() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_at(dir.path().join("learning.json"));
    let persistence = Arc::new(FilePersistence::new(&config));
    let store = LearningStore::open(persistence, &config).await.unwrap();

    let route = TestUtils::route(&["WETH", "USDC", "WBTC", "WETH"]);

    // A long streak of steady wins builds confidence above the 0.7 gate.
    for _ in 0..60 {
        store.record_outcome(&route, true, dec!(1)).await;
    }

    let base = dec!(1);
    let with_history = store
        .adaptive_threshold(base, Some(&route.signature()))
        .await;
    let without = store.adaptive_threshold(base, None).await;
    assert!(with_history < without);

    // The floor holds no matter how many reductions stack up.
    assert!(
        store
            .adaptive_threshold(dec!(0.1), Some(&route.signature()))
            .await
            >= dec!(0.1)
    );
}
