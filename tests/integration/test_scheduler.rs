//! Batch scheduler invariants over the public API

use crate::common::TestUtils;
use multihop_arbitrage::{identify_batches, Route};
use std::collections::HashSet;

/// No two routes in a batch share an asset, and the batches partition the
/// input exactly.
fn assert_conflict_free_partition(input: &[Route], batches: &[Vec<Route>]) {
    for batch in batches {
        let mut claimed = HashSet::new();
        for route in batch {
            for id in route.asset_ids() {
                assert!(
                    claimed.insert(id.to_string()),
                    "asset {} appears twice in one batch",
                    id
                );
            }
        }
    }

    let mut seen: Vec<String> = batches.iter().flatten().map(|r| r.signature()).collect();
    let mut expected: Vec<String> = input.iter().map(|r| r.signature()).collect();
    seen.sort();
    expected.sort();
    assert_eq!(seen, expected, "batches must partition the input");
}

#[tokio::test]
async fn test_base_conflicts_split_disjoint_rides_along() {
    // A and B share the base asset X and can never run together; C shares
    // nothing with either.
    let a = TestUtils::route(&["X", "Y", "X"]);
    let b = TestUtils::route(&["X", "Z", "X"]);
    let c = TestUtils::route(&["W", "V", "W"]);
    let input = vec![a, b, c];

    let batches = identify_batches(input.clone());
    assert_conflict_free_partition(&input, &batches);
    assert_eq!(batches.len(), 2);
    assert_eq!(batches[0].len(), 2);
    assert_eq!(batches[1].len(), 1);
}

#[tokio::test]
async fn test_mixed_depth_routes_stay_conflict_free() {
    let input = vec![
        TestUtils::route(&["X", "A", "B", "C", "X"]),
        TestUtils::route(&["X", "D", "X"]),
        TestUtils::route(&["Q", "A", "Q"]),
        TestUtils::route(&["Q", "R", "S", "Q"]),
        TestUtils::route(&["T", "U", "T"]),
        TestUtils::route(&["T", "B", "D", "T"]),
    ];

    let batches = identify_batches(input.clone());
    assert_conflict_free_partition(&input, &batches);
}

#[tokio::test]
async fn test_prioritized_order_feeds_earliest_batches() {
    // The scheduler scans in input order, so the first route always lands in
    // the first batch.
    let first = TestUtils::route(&["X", "Y", "X"]);
    let input = vec![
        first.clone(),
        TestUtils::route(&["X", "Z", "X"]),
        TestUtils::route(&["Y", "W", "Y"]),
    ];

    let batches = identify_batches(input.clone());
    assert_conflict_free_partition(&input, &batches);
    assert_eq!(batches[0][0].signature(), first.signature());
}
