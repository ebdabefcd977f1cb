//! In-memory simulated swap venue
//!
//! Implements the venue port over a constant-product pool graph, one pool
//! per (pair, fee tier). Powers the dry-run CLI mode and the integration
//! tests; the injection knobs make failure paths deterministic to test.

use crate::{
    config::{PoolConfig, UniverseConfig},
    venue::{
        Asset, BlockInfo, ConfirmationReceipt, FeeTier, Quote, QuoteOutcome, SwapRequest,
        SwapVenue, TransactionHandle,
    },
    EngineError, Result,
};
use async_trait::async_trait;
use rand::Rng;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Pool identity: ordered asset ids plus the fee tier
type PoolKey = (String, String, u32);

#[derive(Debug, Clone)]
struct Pool {
    asset_a: String,
    reserve_a: Decimal,
    reserve_b: Decimal,
}

/// Constant-product venue simulation
pub struct SimulatedVenue {
    pools: RwLock<HashMap<PoolKey, Pool>>,
    pending: RwLock<HashMap<String, ConfirmationReceipt>>,
    confirmation_latency: Duration,
    failure_probability: f64,
    fail_next_submissions: AtomicU32,
    fail_next_confirmations: AtomicU32,
    timeout_next_confirmations: AtomicU32,
    block_number: AtomicU64,
}

impl Default for SimulatedVenue {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedVenue {
    /// Empty venue with no pools
    pub fn new() -> Self {
        Self::with_pools(HashMap::new())
    }

    fn with_pools(pools: HashMap<PoolKey, Pool>) -> Self {
        Self {
            pools: RwLock::new(pools),
            pending: RwLock::new(HashMap::new()),
            confirmation_latency: Duration::from_millis(5),
            failure_probability: 0.0,
            fail_next_submissions: AtomicU32::new(0),
            fail_next_confirmations: AtomicU32::new(0),
            timeout_next_confirmations: AtomicU32::new(0),
            block_number: AtomicU64::new(1),
        }
    }

    /// Venue seeded from configuration pools
    pub fn from_config(universe: &UniverseConfig, pools: &[PoolConfig]) -> Result<Self> {
        let mut by_symbol: HashMap<&str, &Asset> = HashMap::new();
        by_symbol.insert(universe.base_asset.symbol.as_str(), &universe.base_asset);
        for asset in &universe.assets {
            by_symbol.insert(asset.symbol.as_str(), asset);
        }

        let mut seeded = HashMap::new();
        for pool in pools {
            let a = by_symbol.get(pool.asset_a.as_str()).ok_or_else(|| {
                EngineError::Config(format!("Pool references unknown asset {}", pool.asset_a))
            })?;
            let b = by_symbol.get(pool.asset_b.as_str()).ok_or_else(|| {
                EngineError::Config(format!("Pool references unknown asset {}", pool.asset_b))
            })?;
            insert_pool(
                &mut seeded,
                a,
                b,
                FeeTier(pool.fee_tier),
                pool.reserve_a,
                pool.reserve_b,
            );
        }

        Ok(Self::with_pools(seeded))
    }

    /// Simulated confirmation latency per status call
    pub fn with_confirmation_latency(mut self, latency: Duration) -> Self {
        self.confirmation_latency = latency;
        self
    }

    /// Probability that any submission is rejected, for soak-style runs
    pub fn with_failure_probability(mut self, probability: f64) -> Self {
        self.failure_probability = probability.clamp(0.0, 1.0);
        self
    }

    /// Add (or replace) a pool
    pub async fn add_pool(
        &self,
        asset_a: &Asset,
        asset_b: &Asset,
        fee_tier: FeeTier,
        reserve_a: Decimal,
        reserve_b: Decimal,
    ) {
        let mut pools = self.pools.write().await;
        insert_pool(&mut pools, asset_a, asset_b, fee_tier, reserve_a, reserve_b);
    }

    /// Reject the next `n` submissions with a dependency error
    pub fn fail_next_submissions(&self, n: u32) {
        self.fail_next_submissions.store(n, Ordering::SeqCst);
    }

    /// Report FAILED for the next `n` submitted swaps
    pub fn fail_next_confirmations(&self, n: u32) {
        self.fail_next_confirmations.store(n, Ordering::SeqCst);
    }

    /// Report TIMEOUT for the next `n` confirmation checks
    pub fn timeout_next_confirmations(&self, n: u32) {
        self.timeout_next_confirmations.store(n, Ordering::SeqCst);
    }

    /// Current reserves of a pool, for assertions
    pub async fn reserves(
        &self,
        asset_a: &Asset,
        asset_b: &Asset,
        fee_tier: FeeTier,
    ) -> Option<(Decimal, Decimal)> {
        let pools = self.pools.read().await;
        let key = pool_key(asset_a, asset_b, fee_tier);
        pools.get(&key).map(|pool| {
            if pool.asset_a == asset_a.id {
                (pool.reserve_a, pool.reserve_b)
            } else {
                (pool.reserve_b, pool.reserve_a)
            }
        })
    }

    fn take(counter: &AtomicU32) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// Constant-product output: `dy = y * dx' / (x + dx')` with the tier fee
/// taken from the input
fn amount_out(reserve_in: Decimal, reserve_out: Decimal, fee: FeeTier, amount_in: Decimal) -> Decimal {
    let after_fee = amount_in * (Decimal::ONE - fee.as_fraction());
    reserve_out * after_fee / (reserve_in + after_fee)
}

fn pool_key(asset_a: &Asset, asset_b: &Asset, fee_tier: FeeTier) -> PoolKey {
    let (first, second) = if asset_a.id <= asset_b.id {
        (asset_a.id.clone(), asset_b.id.clone())
    } else {
        (asset_b.id.clone(), asset_a.id.clone())
    };
    (first, second, fee_tier.0)
}

fn insert_pool(
    pools: &mut HashMap<PoolKey, Pool>,
    asset_a: &Asset,
    asset_b: &Asset,
    fee_tier: FeeTier,
    reserve_a: Decimal,
    reserve_b: Decimal,
) {
    let key = pool_key(asset_a, asset_b, fee_tier);
    pools.insert(
        key,
        Pool {
            asset_a: asset_a.id.clone(),
            reserve_a,
            reserve_b,
        },
    );
}

#[async_trait]
impl SwapVenue for SimulatedVenue {
    async fn quote(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        fee_tier: FeeTier,
        amount_in: Decimal,
    ) -> Result<QuoteOutcome> {
        if asset_in.id == asset_out.id {
            return Err(EngineError::Validation(
                "Quote input and output assets are identical".to_string(),
            )
            .into());
        }
        if amount_in <= Decimal::ZERO {
            return Err(
                EngineError::Validation("Quote amount must be positive".to_string()).into(),
            );
        }

        let pools = self.pools.read().await;
        let key = pool_key(asset_in, asset_out, fee_tier);
        let Some(pool) = pools.get(&key) else {
            return Ok(QuoteOutcome::NoPool);
        };

        let (reserve_in, reserve_out) = if pool.asset_a == asset_in.id {
            (pool.reserve_a, pool.reserve_b)
        } else {
            (pool.reserve_b, pool.reserve_a)
        };

        let output_amount = amount_out(reserve_in, reserve_out, fee_tier, amount_in);
        if output_amount <= Decimal::ZERO {
            return Ok(QuoteOutcome::NoPool);
        }

        Ok(QuoteOutcome::Quote(Quote {
            output_amount,
            fee_tier,
        }))
    }

    async fn submit_swap(&self, request: &SwapRequest) -> Result<TransactionHandle> {
        if Self::take(&self.fail_next_submissions) {
            return Err(
                EngineError::Dependency("simulated submission rejection".to_string()).into(),
            );
        }
        if self.failure_probability > 0.0
            && rand::thread_rng().gen::<f64>() < self.failure_probability
        {
            return Err(
                EngineError::Dependency("simulated venue congestion".to_string()).into(),
            );
        }

        let mut pools = self.pools.write().await;
        let key = pool_key(&request.asset_in, &request.asset_out, request.fee_tier);
        let Some(pool) = pools.get_mut(&key) else {
            return Err(EngineError::Execution(format!(
                "No pool for {}/{} at {}",
                request.asset_in, request.asset_out, request.fee_tier
            ))
            .into());
        };

        let in_is_a = pool.asset_a == request.asset_in.id;
        let (reserve_in, reserve_out) = if in_is_a {
            (pool.reserve_a, pool.reserve_b)
        } else {
            (pool.reserve_b, pool.reserve_a)
        };

        let output = amount_out(reserve_in, reserve_out, request.fee_tier, request.amount_in);

        let handle = TransactionHandle {
            id: Uuid::new_v4().to_string(),
            submitted_at: chrono::Utc::now().timestamp_millis(),
        };

        let receipt = if Self::take(&self.fail_next_confirmations) {
            ConfirmationReceipt::failed("injected confirmation failure")
        } else if output < request.min_amount_out {
            ConfirmationReceipt::failed(format!(
                "output {} below minimum {}",
                output, request.min_amount_out
            ))
        } else {
            // The swap lands: move the reserves.
            if in_is_a {
                pool.reserve_a += request.amount_in;
                pool.reserve_b -= output;
            } else {
                pool.reserve_b += request.amount_in;
                pool.reserve_a -= output;
            }
            let block = BlockInfo {
                number: self.block_number.fetch_add(1, Ordering::SeqCst),
                hash: format!("0x{}", Uuid::new_v4().simple()),
            };
            ConfirmationReceipt::confirmed(block, output)
        };

        debug!(
            tx = %handle.id,
            pair = %format!("{}/{}", request.asset_in, request.asset_out),
            amount_in = %request.amount_in,
            "swap submitted"
        );

        self.pending.write().await.insert(handle.id.clone(), receipt);
        Ok(handle)
    }

    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
        timeout: Duration,
    ) -> Result<ConfirmationReceipt> {
        tokio::time::sleep(self.confirmation_latency.min(timeout)).await;

        if Self::take(&self.timeout_next_confirmations) {
            return Ok(ConfirmationReceipt::timeout());
        }

        let pending = self.pending.read().await;
        Ok(pending.get(&handle.id).cloned().unwrap_or(ConfirmationReceipt {
            status: crate::venue::ConfirmationStatus::Unknown,
            block: None,
            output_amount: None,
            error_message: Some("unknown transaction".to_string()),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::venue::ConfirmationStatus;
    use rust_decimal_macros::dec;

    fn weth() -> Asset {
        Asset::new("asset-weth", "WETH", 18)
    }

    fn usdc() -> Asset {
        Asset::new("asset-usdc", "USDC", 6)
    }

    async fn venue_with_pool() -> SimulatedVenue {
        let venue = SimulatedVenue::new();
        venue
            .add_pool(&weth(), &usdc(), FeeTier(500), dec!(1000), dec!(3_000_000))
            .await;
        venue
    }

    #[test]
    fn test_constant_product_math() {
        // Equal reserves, zero-fee tier: 10 in against 1000/1000 => ~9.9
        let out = amount_out(dec!(1000), dec!(1000), FeeTier(0), dec!(10));
        assert!(out > dec!(9.9) && out < dec!(9.91));

        // The fee reduces output.
        let with_fee = amount_out(dec!(1000), dec!(1000), FeeTier(3000), dec!(10));
        assert!(with_fee < out);
    }

    #[tokio::test]
    async fn test_quote_directions_and_missing_pool() {
        let venue = venue_with_pool().await;

        let forward = venue
            .quote(&weth(), &usdc(), FeeTier(500), dec!(1))
            .await
            .unwrap();
        let quote = *forward.quote().unwrap();
        // ~3000 USDC per WETH before impact.
        assert!(quote.output_amount > dec!(2900) && quote.output_amount < dec!(3000));

        let reverse = venue
            .quote(&usdc(), &weth(), FeeTier(500), dec!(3000))
            .await
            .unwrap();
        assert!(reverse.quote().is_some());

        let missing = venue
            .quote(&weth(), &usdc(), FeeTier(3000), dec!(1))
            .await
            .unwrap();
        assert_eq!(missing, QuoteOutcome::NoPool);
    }

    #[tokio::test]
    async fn test_swap_moves_reserves() {
        let venue = venue_with_pool().await;
        let (before_weth, before_usdc) = venue
            .reserves(&weth(), &usdc(), FeeTier(500))
            .await
            .unwrap();

        let request = SwapRequest {
            asset_in: weth(),
            asset_out: usdc(),
            fee_tier: FeeTier(500),
            amount_in: dec!(1),
            min_amount_out: dec!(1),
            gas_bid: crate::venue::GasBid {
                price: dec!(0.000000001),
                limit: 300_000,
            },
            signer_id: "test".to_string(),
        };
        let handle = venue.submit_swap(&request).await.unwrap();
        let receipt = venue
            .await_confirmation(&handle, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(receipt.status, ConfirmationStatus::Confirmed);

        let (after_weth, after_usdc) = venue
            .reserves(&weth(), &usdc(), FeeTier(500))
            .await
            .unwrap();
        assert_eq!(after_weth, before_weth + dec!(1));
        assert!(after_usdc < before_usdc);
        assert_eq!(receipt.output_amount.unwrap(), before_usdc - after_usdc);
    }

    #[tokio::test]
    async fn test_min_output_violation_fails_confirmation() {
        let venue = venue_with_pool().await;
        let request = SwapRequest {
            asset_in: weth(),
            asset_out: usdc(),
            fee_tier: FeeTier(500),
            amount_in: dec!(1),
            min_amount_out: dec!(1_000_000),
            gas_bid: crate::venue::GasBid {
                price: dec!(0.000000001),
                limit: 300_000,
            },
            signer_id: "test".to_string(),
        };
        let handle = venue.submit_swap(&request).await.unwrap();
        let receipt = venue
            .await_confirmation(&handle, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(receipt.status, ConfirmationStatus::Failed);

        // Reserves must not move for a failed swap.
        let (reserve_weth, _) = venue
            .reserves(&weth(), &usdc(), FeeTier(500))
            .await
            .unwrap();
        assert_eq!(reserve_weth, dec!(1000));
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let venue = venue_with_pool().await;

        venue.fail_next_submissions(1);
        let request = SwapRequest {
            asset_in: weth(),
            asset_out: usdc(),
            fee_tier: FeeTier(500),
            amount_in: dec!(1),
            min_amount_out: dec!(1),
            gas_bid: crate::venue::GasBid {
                price: dec!(0.000000001),
                limit: 300_000,
            },
            signer_id: "test".to_string(),
        };
        assert!(venue.submit_swap(&request).await.is_err());
        // Counter exhausted; the next submission goes through.
        assert!(venue.submit_swap(&request).await.is_ok());

        venue.timeout_next_confirmations(1);
        let handle = venue.submit_swap(&request).await.unwrap();
        let receipt = venue
            .await_confirmation(&handle, Duration::from_millis(100))
            .await
            .unwrap();
        assert_eq!(receipt.status, ConfirmationStatus::Timeout);
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let venue = venue_with_pool().await;
        let receipt = venue
            .await_confirmation(
                &TransactionHandle {
                    id: "missing".to_string(),
                    submitted_at: 0,
                },
                Duration::from_millis(10),
            )
            .await
            .unwrap();
        assert_eq!(receipt.status, ConfirmationStatus::Unknown);
    }
}
