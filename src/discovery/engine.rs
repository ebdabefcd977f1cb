//! Route discovery over the probed venue
//!
//! Two complementary strategies feed the same result set: exhaustive
//! fixed-depth scans for 3- and 4-hop cycles, and a pruned depth-first search
//! for 5- and 6-hop cycles. Both spend from one per-scan work budget and
//! swallow per-candidate failures so a single bad pair never aborts a scan.

use crate::{
    config::{DiscoveryConfig, UniverseConfig},
    discovery::route::Route,
    probe::LiquidityProbe,
    venue::{Asset, FeeTier, QuoteOutcome},
    Result,
};
use futures_util::future::BoxFuture;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Smallest cycle length the depth-first search will close
const DEEP_CLOSE_MIN_HOPS: usize = 5;

/// Work budget for one discovery scan, counted in evaluated complete routes.
///
/// Threaded explicitly through the search so exhaustion stops exploration
/// promptly at every candidate iteration; partial results remain valid.
pub struct SearchBudget {
    remaining: AtomicU64,
}

impl SearchBudget {
    /// Budget allowing `limit` complete-route evaluations
    pub fn new(limit: u64) -> Self {
        Self {
            remaining: AtomicU64::new(limit),
        }
    }

    /// Spend one evaluation; false once the budget is exhausted
    pub fn try_consume(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }

    /// Whether the budget has run out
    pub fn exhausted(&self) -> bool {
        self.remaining.load(Ordering::SeqCst) == 0
    }
}

/// Discovers profitable cyclic routes starting and ending at the base asset
pub struct DiscoveryEngine {
    probe: Arc<LiquidityProbe>,
    universe: UniverseConfig,
    config: DiscoveryConfig,
}

impl DiscoveryEngine {
    /// Create a discovery engine over the given probe and universe
    pub fn new(probe: Arc<LiquidityProbe>, universe: UniverseConfig, config: DiscoveryConfig) -> Self {
        Self {
            probe,
            universe,
            config,
        }
    }

    /// Scan for profitable routes whose hop counts fall inside `depth_range`.
    ///
    /// Returns candidates with net profit of at least `min_profit_threshold`
    /// percent, sorted by net profit percent descending. The scan stops early
    /// without error once its route budget is exhausted.
    pub async fn discover(
        &self,
        base: &Asset,
        depth_range: RangeInclusive<usize>,
        min_profit_threshold: Decimal,
    ) -> Result<Vec<Route>> {
        let budget = SearchBudget::new(self.config.route_budget);
        let mut routes = Vec::new();

        if depth_range.contains(&3) {
            routes.extend(self.scan_three_hop(base, min_profit_threshold, &budget).await);
        }
        if depth_range.contains(&4) {
            routes.extend(self.scan_four_hop(base, min_profit_threshold, &budget).await);
        }

        let deep_max = (*depth_range.end()).min(self.config.max_hops);
        if deep_max >= DEEP_CLOSE_MIN_HOPS {
            routes.extend(
                self.search_deep(base, deep_max, min_profit_threshold, &budget)
                    .await,
            );
        }

        routes.sort_by(|a, b| b.net_profit_percent.cmp(&a.net_profit_percent));

        info!(
            candidates = routes.len(),
            budget_exhausted = budget.exhausted(),
            "discovery scan complete"
        );
        metrics::counter!("arb_routes_discovered_total", routes.len() as u64);

        Ok(routes)
    }

    /// Exhaustive base→A→B→base scan
    async fn scan_three_hop(
        &self,
        base: &Asset,
        threshold: Decimal,
        budget: &SearchBudget,
    ) -> Vec<Route> {
        let mut found = Vec::new();

        for a in &self.universe.assets {
            if budget.exhausted() {
                break;
            }
            let Some(input) = self.sized_input(base, a).await else {
                continue;
            };
            let Some((out_a, t1)) = self.hop_quote(base, a, input).await else {
                continue;
            };

            for b in &self.universe.assets {
                if b.id == a.id {
                    continue;
                }
                if budget.exhausted() {
                    break;
                }
                let Some((out_b, t2)) = self.hop_quote(a, b, out_a).await else {
                    continue;
                };
                let Some((out_base, t3)) = self.hop_quote(b, base, out_b).await else {
                    continue;
                };
                if !budget.try_consume() {
                    break;
                }
                if let Some(route) = self.evaluate(
                    vec![base.clone(), a.clone(), b.clone(), base.clone()],
                    vec![t1, t2, t3],
                    input,
                    out_base,
                    threshold,
                ) {
                    found.push(route);
                }
            }
        }

        found
    }

    /// Exhaustive base→A→B→C→base scan
    async fn scan_four_hop(
        &self,
        base: &Asset,
        threshold: Decimal,
        budget: &SearchBudget,
    ) -> Vec<Route> {
        let mut found = Vec::new();

        for a in &self.universe.assets {
            if budget.exhausted() {
                break;
            }
            let Some(input) = self.sized_input(base, a).await else {
                continue;
            };
            let Some((out_a, t1)) = self.hop_quote(base, a, input).await else {
                continue;
            };

            for b in &self.universe.assets {
                if b.id == a.id {
                    continue;
                }
                if budget.exhausted() {
                    break;
                }
                let Some((out_b, t2)) = self.hop_quote(a, b, out_a).await else {
                    continue;
                };

                for c in &self.universe.assets {
                    if c.id == a.id || c.id == b.id {
                        continue;
                    }
                    if budget.exhausted() {
                        break;
                    }
                    let Some((out_c, t3)) = self.hop_quote(b, c, out_b).await else {
                        continue;
                    };
                    let Some((out_base, t4)) = self.hop_quote(c, base, out_c).await else {
                        continue;
                    };
                    if !budget.try_consume() {
                        break;
                    }
                    if let Some(route) = self.evaluate(
                        vec![base.clone(), a.clone(), b.clone(), c.clone(), base.clone()],
                        vec![t1, t2, t3, t4],
                        input,
                        out_base,
                        threshold,
                    ) {
                        found.push(route);
                    }
                }
            }
        }

        found
    }

    /// Pruned depth-first search for 5..=`max_hops` cycles
    async fn search_deep(
        &self,
        base: &Asset,
        max_hops: usize,
        threshold: Decimal,
        budget: &SearchBudget,
    ) -> Vec<Route> {
        let mut found = Vec::new();

        for first in &self.universe.assets {
            if budget.exhausted() {
                break;
            }
            let Some(input) = self.sized_input(base, first).await else {
                continue;
            };
            let Some((out, tier)) = self.hop_quote(base, first, input).await else {
                continue;
            };
            if !self.passes_loss_floor(base, first, input, out).await {
                continue;
            }

            let branch = self
                .explore(
                    base,
                    vec![base.clone(), first.clone()],
                    vec![tier],
                    out,
                    input,
                    max_hops,
                    threshold,
                    budget,
                )
                .await;
            found.extend(branch);
        }

        found
    }

    /// One DFS frame: try closing the cycle, then extend the path with every
    /// unused candidate. `path` holds the base plus the intermediates walked
    /// so far; `amount` is the quoted output of the last hop.
    #[allow(clippy::too_many_arguments)]
    fn explore<'a>(
        &'a self,
        base: &'a Asset,
        path: Vec<Asset>,
        fee_tiers: Vec<FeeTier>,
        amount: Decimal,
        input: Decimal,
        max_hops: usize,
        threshold: Decimal,
        budget: &'a SearchBudget,
    ) -> BoxFuture<'a, Vec<Route>> {
        Box::pin(async move {
            let mut found = Vec::new();
            let hops_so_far = path.len() - 1;

            // Close the cycle once it is long enough.
            if hops_so_far + 1 >= DEEP_CLOSE_MIN_HOPS && hops_so_far + 1 <= max_hops {
                if budget.exhausted() {
                    return found;
                }
                let current = path.last().cloned().unwrap_or_else(|| base.clone());
                if let Some((out_base, tier)) = self.hop_quote(&current, base, amount).await {
                    if !budget.try_consume() {
                        return found;
                    }
                    let mut full_path = path.clone();
                    full_path.push(base.clone());
                    let mut full_tiers = fee_tiers.clone();
                    full_tiers.push(tier);
                    if let Some(route) =
                        self.evaluate(full_path, full_tiers, input, out_base, threshold)
                    {
                        found.push(route);
                    }
                }
            }

            // Extend the path while another intermediate still allows closing
            // within the hop limit. Beyond three intermediates only the
            // high-liquidity subset keeps branching bounded.
            if hops_so_far + 2 <= max_hops {
                let candidates = if path.len() >= 4 {
                    self.universe.high_liquidity_assets()
                } else {
                    self.universe.assets.clone()
                };
                let current = match path.last() {
                    Some(asset) => asset.clone(),
                    None => return found,
                };

                for cand in candidates {
                    if budget.exhausted() {
                        break;
                    }
                    if cand.id == base.id || path.iter().any(|a| a.id == cand.id) {
                        continue;
                    }
                    let Some((out, tier)) = self.hop_quote(&current, &cand, amount).await else {
                        continue;
                    };
                    if !self.passes_loss_floor(&current, &cand, amount, out).await {
                        continue;
                    }

                    let mut next_path = path.clone();
                    next_path.push(cand.clone());
                    let mut next_tiers = fee_tiers.clone();
                    next_tiers.push(tier);
                    let branch = self
                        .explore(
                            base, next_path, next_tiers, out, input, max_hops, threshold, budget,
                        )
                        .await;
                    found.extend(branch);
                }
            }

            found
        })
    }

    /// Quote one hop at the best tier, swallowing per-candidate failures
    async fn hop_quote(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        amount: Decimal,
    ) -> Option<(Decimal, FeeTier)> {
        match self.probe.quote_best_tier(asset_in, asset_out, amount).await {
            Ok(QuoteOutcome::Quote(quote)) => Some((quote.output_amount, quote.fee_tier)),
            Ok(QuoteOutcome::NoPool) => None,
            Err(err) => {
                debug!(
                    pair = %format!("{}/{}", asset_in, asset_out),
                    error = %err,
                    "hop quote failed, dropping candidate"
                );
                None
            }
        }
    }

    /// Position size for a branch starting base→first
    async fn sized_input(&self, base: &Asset, first: &Asset) -> Option<Decimal> {
        match self.probe.estimate_optimal_size(base, first).await {
            Ok(size) => size,
            Err(err) => {
                debug!(
                    pair = %format!("{}/{}", base, first),
                    error = %err,
                    "sizing probe failed, dropping candidate"
                );
                None
            }
        }
    }

    /// Single-hop return check: quote the hop's output straight back and
    /// prune when the round trip loses more than the loss floor.
    async fn passes_loss_floor(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: Decimal,
        amount_out: Decimal,
    ) -> bool {
        match self
            .probe
            .quote_best_tier(asset_out, asset_in, amount_out)
            .await
        {
            Ok(QuoteOutcome::Quote(back)) => {
                let hop_return = (back.output_amount - amount_in) / amount_in * dec!(100);
                if hop_return < self.config.loss_floor {
                    debug!(
                        pair = %format!("{}/{}", asset_in, asset_out),
                        hop_return = %hop_return.round_dp(4),
                        floor = %self.config.loss_floor,
                        "branch pruned below loss floor"
                    );
                    false
                } else {
                    true
                }
            }
            Ok(QuoteOutcome::NoPool) => false,
            Err(err) => {
                debug!(
                    pair = %format!("{}/{}", asset_in, asset_out),
                    error = %err,
                    "loss-floor quote failed, pruning branch"
                );
                false
            }
        }
    }

    /// Build and threshold-filter a quoted cycle
    fn evaluate(
        &self,
        path: Vec<Asset>,
        fee_tiers: Vec<FeeTier>,
        input: Decimal,
        output: Decimal,
        threshold: Decimal,
    ) -> Option<Route> {
        let hops = path.len() - 1;
        let gas = self.config.gas_per_hop * Decimal::from(hops as u64);
        let route = match Route::new(path, fee_tiers, input, output, gas, threshold) {
            Ok(route) => route,
            Err(err) => {
                debug!(error = %err, "quoted path failed validation");
                return None;
            }
        };

        if route.net_profit_percent >= threshold {
            debug!(route = %route, "profitable route found");
            Some(route)
        } else {
            None
        }
    }
}
