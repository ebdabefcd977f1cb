//! Per-route outcome history and the adaptive profit threshold

use super::persistence::SnapshotPersistence;
use crate::{config::LearningConfig, discovery::Route, Result};
use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, error, warn};

/// Entries kept in the rolling profit and volatility histories
const ROLLING_CAP: usize = 100;

/// Entries considered "recent" for volatility and profitability
const RECENT_WINDOW: usize = 10;

/// Attempt count at which confidence saturation reaches ~63%
const CONFIDENCE_SCALE: Decimal = dec!(20);

/// Recorded history for one route signature
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutePerformance {
    /// The route's symbol-sequence signature
    pub signature: String,
    /// Total execution attempts
    #[serde(default)]
    pub attempts: u64,
    /// Attempts that completed successfully
    #[serde(default)]
    pub successes: u64,
    /// Cumulative realized profit, in base-asset units
    #[serde(default, with = "rust_decimal::serde::str")]
    pub total_profit: Decimal,
    /// Mean realized profit percent per attempt
    #[serde(default, with = "rust_decimal::serde::str")]
    pub avg_profit_percent: Decimal,
    /// successes / attempts
    #[serde(default, with = "rust_decimal::serde::str")]
    pub success_rate: Decimal,
    /// Saturating confidence: `success_rate x (1 - e^(-attempts/20))`
    #[serde(default, with = "rust_decimal::serde::str")]
    pub confidence: Decimal,
    /// Timestamp of the most recent attempt
    #[serde(default)]
    pub last_executed_at: Option<DateTime<Utc>>,
}

impl RoutePerformance {
    fn new(signature: String) -> Self {
        Self {
            signature,
            attempts: 0,
            successes: 0,
            total_profit: Decimal::ZERO,
            avg_profit_percent: Decimal::ZERO,
            success_rate: Decimal::ZERO,
            confidence: Decimal::ZERO,
            last_executed_at: None,
        }
    }
}

/// The persisted learning document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LearningSnapshot {
    /// Signature → performance map, iteration order preserved
    #[serde(default)]
    pub routes: IndexMap<String, RoutePerformance>,
    /// Rolling realized-profit-percent history (last 100)
    #[serde(default, with = "decimal_seq")]
    pub profit_history: VecDeque<Decimal>,
    /// Rolling volatility samples (last 100)
    #[serde(default, with = "decimal_seq")]
    pub volatility_history: VecDeque<Decimal>,
    /// Attempts across all routes
    #[serde(default)]
    pub total_attempts: u64,
    /// Successes across all routes
    #[serde(default)]
    pub total_successes: u64,
    /// When the snapshot was last written
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Read-model of the store's global state
#[derive(Debug, Clone, Serialize)]
pub struct LearningStatistics {
    /// Distinct route signatures tracked
    pub tracked_routes: usize,
    /// Attempts across all routes
    pub total_attempts: u64,
    /// Successes across all routes
    pub total_successes: u64,
    /// Successes / attempts across all routes
    pub overall_success_rate: Decimal,
    /// Mean of the rolling volatility history, percent
    pub avg_volatility: Decimal,
    /// Mean realized profit percent over the last 10 attempts
    pub recent_profitability: Decimal,
    /// Whether persistence has been disabled after repeated failures
    pub writes_disabled: bool,
}

/// Owns the outcome history and derives the live profit threshold.
///
/// All mutation happens through [`LearningStore::record_outcome`], which
/// appends to the in-memory state and then persists the snapshot. Repeated
/// persistence failures disable further writes without ever blocking
/// discovery or execution.
pub struct LearningStore {
    state: RwLock<LearningSnapshot>,
    persistence: Arc<dyn SnapshotPersistence>,
    max_write_failures: u32,
    consecutive_write_failures: AtomicU32,
    writes_disabled: AtomicBool,
}

impl LearningStore {
    /// Open the store, loading any previously persisted snapshot. An
    /// unreadable snapshot is logged and replaced with a fresh one rather
    /// than blocking startup.
    pub async fn open(
        persistence: Arc<dyn SnapshotPersistence>,
        config: &LearningConfig,
    ) -> Result<Self> {
        let snapshot = match persistence.load().await {
            Ok(Some(snapshot)) => {
                debug!(
                    routes = snapshot.routes.len(),
                    "learning snapshot loaded"
                );
                snapshot
            }
            Ok(None) => LearningSnapshot::default(),
            Err(err) => {
                warn!(error = %err, "failed to load learning snapshot, starting fresh");
                LearningSnapshot::default()
            }
        };

        Ok(Self {
            state: RwLock::new(snapshot),
            persistence,
            max_write_failures: config.max_write_failures,
            consecutive_write_failures: AtomicU32::new(0),
            writes_disabled: AtomicBool::new(false),
        })
    }

    /// Record one execution attempt for `route` and persist the snapshot
    pub async fn record_outcome(&self, route: &Route, success: bool, realized_profit_percent: Decimal) {
        let signature = route.signature();
        let snapshot = {
            let mut state = self.state.write().await;

            let perf = state
                .routes
                .entry(signature.clone())
                .or_insert_with(|| RoutePerformance::new(signature.clone()));

            perf.attempts += 1;
            if success {
                perf.successes += 1;
            }
            let attempts = Decimal::from(perf.attempts);
            perf.avg_profit_percent = (perf.avg_profit_percent * (attempts - Decimal::ONE)
                + realized_profit_percent)
                / attempts;
            perf.total_profit += realized_profit_percent / dec!(100) * route.input_amount;
            perf.success_rate = Decimal::from(perf.successes) / attempts;
            perf.confidence = confidence(perf.success_rate, perf.attempts);
            perf.last_executed_at = Some(Utc::now());

            state.total_attempts += 1;
            if success {
                state.total_successes += 1;
            }

            push_capped(&mut state.profit_history, realized_profit_percent);
            let volatility = recent_volatility(&state.profit_history);
            push_capped(&mut state.volatility_history, volatility);

            state.updated_at = Some(Utc::now());
            state.clone()
        };

        self.persist(&snapshot).await;
    }

    /// The live minimum-profit threshold derived from `base`.
    ///
    /// High recent volatility loosens the threshold (more opportunities are
    /// worth the risk), calm markets tighten it, and a well-proven route is
    /// allowed further headroom. Never drops below 0.1.
    pub async fn adaptive_threshold(&self, base: Decimal, signature: Option<&str>) -> Decimal {
        let state = self.state.read().await;
        let mut threshold = base;

        let volatility = mean(state.volatility_history.iter());
        if volatility > dec!(3) {
            threshold -= dec!(0.3);
        } else if volatility > dec!(2) {
            threshold -= dec!(0.2);
        } else if volatility < dec!(1) {
            threshold += dec!(0.3);
        }

        if let Some(perf) = signature.and_then(|s| state.routes.get(s)) {
            if perf.confidence > dec!(0.7) {
                // confidence in (0.7, 1.0] maps linearly onto (0, 0.5]
                let reduction = (perf.confidence - dec!(0.7)) / dec!(0.3) * dec!(0.5);
                threshold -= reduction;
            }
        }

        threshold.max(dec!(0.1))
    }

    /// Order candidates for execution: net profit percent first (differences
    /// above 0.5 are decisive), then recorded confidence, then success rate.
    ///
    /// The near-tie rule is not a total order, so routes are placed by
    /// pairwise insertion rather than handed to a comparison sort.
    pub async fn prioritize(&self, routes: Vec<Route>) -> Vec<Route> {
        let history: std::collections::HashMap<String, (Decimal, Decimal)> = {
            let state = self.state.read().await;
            routes
                .iter()
                .filter_map(|r| {
                    state
                        .routes
                        .get(&r.signature())
                        .map(|p| (p.signature.clone(), (p.confidence, p.success_rate)))
                })
                .collect()
        };

        let stats_for = |route: &Route| -> (Decimal, Decimal) {
            history
                .get(&route.signature())
                .copied()
                .unwrap_or((Decimal::ZERO, Decimal::ZERO))
        };

        let ranks_before = |a: &Route, b: &Route| -> bool {
            let diff = a.net_profit_percent - b.net_profit_percent;
            if diff.abs() > dec!(0.5) {
                return a.net_profit_percent > b.net_profit_percent;
            }
            let (conf_a, rate_a) = stats_for(a);
            let (conf_b, rate_b) = stats_for(b);
            (conf_a, rate_a, a.net_profit_percent) > (conf_b, rate_b, b.net_profit_percent)
        };

        let mut ordered: Vec<Route> = Vec::with_capacity(routes.len());
        for route in routes {
            let position = ordered
                .iter()
                .position(|existing| ranks_before(&route, existing))
                .unwrap_or(ordered.len());
            ordered.insert(position, route);
        }
        ordered
    }

    /// Recorded confidence for a signature, if any attempts exist
    pub async fn route_confidence(&self, signature: &str) -> Option<Decimal> {
        self.state
            .read()
            .await
            .routes
            .get(signature)
            .map(|p| p.confidence)
    }

    /// Global learning statistics
    pub async fn learning_statistics(&self) -> LearningStatistics {
        let state = self.state.read().await;
        let overall = if state.total_attempts > 0 {
            Decimal::from(state.total_successes) / Decimal::from(state.total_attempts)
        } else {
            Decimal::ZERO
        };

        LearningStatistics {
            tracked_routes: state.routes.len(),
            total_attempts: state.total_attempts,
            total_successes: state.total_successes,
            overall_success_rate: overall,
            avg_volatility: mean(state.volatility_history.iter()),
            recent_profitability: mean(
                state
                    .profit_history
                    .iter()
                    .rev()
                    .take(RECENT_WINDOW),
            ),
            writes_disabled: self.writes_disabled.load(Ordering::SeqCst),
        }
    }

    /// Best historical performers by cumulative profit
    pub async fn top_performing_routes(&self, limit: usize) -> Vec<RoutePerformance> {
        let state = self.state.read().await;
        let mut all: Vec<RoutePerformance> = state.routes.values().cloned().collect();
        all.sort_by(|a, b| {
            b.total_profit
                .cmp(&a.total_profit)
                .then(b.success_rate.cmp(&a.success_rate))
        });
        all.truncate(limit);
        all
    }

    /// Whether persistence has been disabled after repeated failures
    pub fn writes_disabled(&self) -> bool {
        self.writes_disabled.load(Ordering::SeqCst)
    }

    async fn persist(&self, snapshot: &LearningSnapshot) {
        if self.writes_disabled.load(Ordering::SeqCst) {
            return;
        }

        match self.persistence.save(snapshot).await {
            Ok(()) => {
                self.consecutive_write_failures.store(0, Ordering::SeqCst);
            }
            Err(err) => {
                let failures = self.consecutive_write_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.max_write_failures {
                    self.writes_disabled.store(true, Ordering::SeqCst);
                    error!(
                        failures,
                        error = %err,
                        "learning persistence disabled until restart"
                    );
                } else {
                    warn!(failures, error = %err, "learning snapshot write failed");
                }
            }
        }
    }
}

/// Snapshot histories are persisted as decimal strings: the crate-wide serde
/// representation is float-based and must not touch persisted amounts.
mod decimal_seq {
    use rust_decimal::Decimal;
    use serde::ser::SerializeSeq;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::collections::VecDeque;
    use std::str::FromStr;

    pub fn serialize<S>(values: &VecDeque<Decimal>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut seq = serializer.serialize_seq(Some(values.len()))?;
        for value in values {
            seq.serialize_element(&value.to_string())?;
        }
        seq.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<VecDeque<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = VecDeque::<String>::deserialize(deserializer)?;
        raw.into_iter()
            .map(|s| Decimal::from_str(&s).map_err(de::Error::custom))
            .collect()
    }
}

/// `success_rate x (1 - e^(-attempts/20))`: grows with attempts, saturates
/// near the success rate (~90% of it by 50 attempts)
fn confidence(success_rate: Decimal, attempts: u64) -> Decimal {
    let exponent = -(Decimal::from(attempts) / CONFIDENCE_SCALE);
    success_rate * (Decimal::ONE - exponent.exp())
}

fn push_capped(history: &mut VecDeque<Decimal>, value: Decimal) {
    history.push_back(value);
    while history.len() > ROLLING_CAP {
        history.pop_front();
    }
}

/// Standard deviation of the last [`RECENT_WINDOW`] profit entries
fn recent_volatility(profits: &VecDeque<Decimal>) -> Decimal {
    let recent: Vec<Decimal> = profits.iter().rev().take(RECENT_WINDOW).copied().collect();
    if recent.len() < 2 {
        return Decimal::ZERO;
    }
    let n = Decimal::from(recent.len() as u64);
    let mean = recent.iter().copied().sum::<Decimal>() / n;
    let variance = recent
        .iter()
        .map(|p| (*p - mean) * (*p - mean))
        .sum::<Decimal>()
        / n;
    variance.sqrt().unwrap_or(Decimal::ZERO)
}

fn mean<'a>(values: impl Iterator<Item = &'a Decimal>) -> Decimal {
    let collected: Vec<Decimal> = values.copied().collect();
    if collected.is_empty() {
        return Decimal::ZERO;
    }
    collected.iter().copied().sum::<Decimal>() / Decimal::from(collected.len() as u64)
}
