//! Conflict-free batching of discovered routes
//!
//! Every route draws on the shared base-asset balance and whatever
//! intermediate assets it touches, so two routes sharing any asset cannot
//! safely run concurrently against one balance snapshot. Batching is a greedy
//! set-packing pass: good enough, and only the disjointness invariant is
//! load-bearing.

use crate::discovery::Route;
use std::collections::HashSet;
use tracing::debug;

/// Partition routes into batches safe to execute concurrently.
///
/// Guarantees: no two routes within a batch share any asset (base included),
/// and every input route appears in exactly one batch. Batch order follows
/// the input order, so feeding prioritized routes keeps the best candidates
/// in the earliest batches.
pub fn identify_batches(routes: Vec<Route>) -> Vec<Vec<Route>> {
    let mut remaining = routes;
    let mut batches = Vec::new();

    while !remaining.is_empty() {
        let mut batch: Vec<Route> = Vec::new();
        let mut claimed: HashSet<String> = HashSet::new();
        let mut rest: Vec<Route> = Vec::new();

        for route in remaining {
            let assets = route.asset_ids();
            if assets.iter().all(|id| !claimed.contains(*id)) {
                claimed.extend(assets.iter().map(|id| id.to_string()));
                batch.push(route);
            } else {
                rest.push(route);
            }
        }

        debug!(
            batch = batches.len() + 1,
            routes = batch.len(),
            deferred = rest.len(),
            "batch closed"
        );
        batches.push(batch);
        remaining = rest;
    }

    batches
}
