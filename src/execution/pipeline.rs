//! Sequential hop execution with confirmation monitoring
//!
//! One route executes as a small state machine: quote, submit, await
//! confirmation, carry a buffered output into the next hop. Routes within a
//! batch run concurrently; batches run strictly one after another because a
//! later batch may reuse assets the previous one just released.

use crate::{
    breaker::BreakerRegistry,
    config::ExecutionSettings,
    discovery::Route,
    execution::{ExecutionResult, ExecutionStatus, HopRecord},
    venue::{
        ConfirmationStatus, GasBidStrategy, QuoteOutcome, SwapRequest, SwapVenue,
    },
    Result,
};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Name of the breaker guarding swap submissions
pub const SWAP_BREAKER: &str = "venue.swap";

/// Name of the breaker guarding confirmation status calls
pub const STATUS_BREAKER: &str = "venue.status";

/// Name of the breaker guarding execution-time quotes
pub const QUOTE_BREAKER: &str = crate::probe::QUOTE_BREAKER;

/// Executes routes hop by hop against the venue
pub struct ExecutionPipeline {
    venue: Arc<dyn SwapVenue>,
    breakers: Arc<BreakerRegistry>,
    gas: Arc<dyn GasBidStrategy>,
    config: ExecutionSettings,
    shutdown: Arc<AtomicBool>,
}

impl ExecutionPipeline {
    /// Create a pipeline over the given venue
    pub fn new(
        venue: Arc<dyn SwapVenue>,
        breakers: Arc<BreakerRegistry>,
        gas: Arc<dyn GasBidStrategy>,
        config: ExecutionSettings,
    ) -> Self {
        Self {
            venue,
            breakers,
            gas,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag checked between hops; once set, in-flight routes finish their
    /// current hop and then abort the remainder
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Execute batches strictly in order; routes inside each batch run
    /// concurrently. Every route yields a structured result.
    pub async fn execute_batches(&self, batches: Vec<Vec<Route>>) -> Vec<ExecutionResult> {
        let mut results = Vec::new();

        for (index, batch) in batches.into_iter().enumerate() {
            if batch.is_empty() {
                continue;
            }
            info!(batch = index + 1, routes = batch.len(), "executing batch");
            let outcomes = join_all(batch.iter().map(|route| self.execute_route(route))).await;
            results.extend(outcomes);

            if self.shutdown.load(Ordering::SeqCst) {
                warn!("shutdown requested, remaining batches skipped");
                break;
            }
        }

        results
    }

    /// Run one route to a terminal state. Never returns an error; failures
    /// are captured in the result so the scheduler can continue with the
    /// rest of the batch.
    pub async fn execute_route(&self, route: &Route) -> ExecutionResult {
        let signature = route.signature();
        let total_hops = route.hops();
        let mut hops: Vec<HopRecord> = Vec::with_capacity(total_hops);
        let mut amount = route.input_amount;

        debug!(route = %signature, hops = total_hops, input = %amount, "route execution started");

        for index in 0..total_hops {
            if index > 0 && self.shutdown.load(Ordering::SeqCst) {
                warn!(route = %signature, hop = index, "shutdown requested, aborting remaining hops");
                return self.settle(route, hops, "shutdown requested");
            }

            let asset_in = &route.path[index];
            let asset_out = &route.path[index + 1];
            let fee_tier = route.fee_tiers[index];

            // Fresh quote for the hop; the discovery-time quote is stale by now.
            let quoted = match self.fresh_quote(route, index, amount).await {
                Ok(output) => output,
                Err(message) => {
                    return self.settle(route, hops, &message);
                }
            };

            let request = SwapRequest {
                asset_in: asset_in.clone(),
                asset_out: asset_out.clone(),
                fee_tier,
                amount_in: amount,
                min_amount_out: quoted * (Decimal::ONE - self.config.safety_margin),
                gas_bid: self.gas.bid(&signature, index),
                signer_id: self.config.signer_id.clone(),
            };

            let swap_breaker = self.breakers.get_or_create(SWAP_BREAKER);
            let handle = match swap_breaker
                .execute(|| self.venue.submit_swap(&request))
                .await
            {
                Ok(handle) => handle,
                Err(err) => {
                    warn!(route = %signature, hop = index, error = %err, "swap submission failed");
                    return self.settle(route, hops, &format!("hop {} submission: {}", index, err));
                }
            };

            let receipt = self.monitor_confirmation(&handle).await;
            match receipt {
                Ok(receipt) => match receipt.status {
                    ConfirmationStatus::Confirmed => {
                        let realized = receipt.output_amount.unwrap_or(quoted);
                        hops.push(HopRecord {
                            index,
                            asset_in: asset_in.symbol.clone(),
                            asset_out: asset_out.symbol.clone(),
                            fee_tier,
                            handle,
                            confirmation: ConfirmationStatus::Confirmed,
                            output_amount: realized,
                        });
                        // Never trust the raw quote for the next hop.
                        amount = if index + 1 < total_hops {
                            realized * (Decimal::ONE - self.config.inter_hop_slippage_buffer)
                        } else {
                            realized
                        };
                    }
                    ConfirmationStatus::Timeout => {
                        // Finality may simply be slow; wait once more and
                        // proceed with the buffered amount.
                        warn!(
                            route = %signature,
                            hop = index,
                            "confirmation timed out, proceeding optimistically"
                        );
                        tokio::time::sleep(Duration::from_millis(self.config.optimistic_delay_ms))
                            .await;
                        let assumed =
                            quoted * (Decimal::ONE - self.config.inter_hop_slippage_buffer);
                        hops.push(HopRecord {
                            index,
                            asset_in: asset_in.symbol.clone(),
                            asset_out: asset_out.symbol.clone(),
                            fee_tier,
                            handle,
                            confirmation: ConfirmationStatus::Timeout,
                            output_amount: assumed,
                        });
                        amount = assumed;
                    }
                    ConfirmationStatus::Failed | ConfirmationStatus::Unknown => {
                        warn!(
                            route = %signature,
                            hop = index,
                            status = %receipt.status,
                            error = receipt.error_message.as_deref().unwrap_or("none"),
                            "hop did not confirm, aborting route"
                        );
                        hops.push(HopRecord {
                            index,
                            asset_in: asset_in.symbol.clone(),
                            asset_out: asset_out.symbol.clone(),
                            fee_tier,
                            handle,
                            confirmation: receipt.status,
                            output_amount: Decimal::ZERO,
                        });
                        return self.settle(
                            route,
                            hops,
                            &format!("hop {} confirmation {}", index, receipt.status),
                        );
                    }
                },
                Err(err) => {
                    warn!(route = %signature, hop = index, error = %err, "confirmation check failed");
                    hops.push(HopRecord {
                        index,
                        asset_in: asset_in.symbol.clone(),
                        asset_out: asset_out.symbol.clone(),
                        fee_tier,
                        handle,
                        confirmation: ConfirmationStatus::Unknown,
                        output_amount: Decimal::ZERO,
                    });
                    return self.settle(route, hops, &format!("hop {} status: {}", index, err));
                }
            }
        }

        let realized_profit = amount - route.input_amount;
        let realized_profit_percent = realized_profit / route.input_amount * dec!(100);
        info!(
            route = %signature,
            realized = %amount,
            profit_percent = %realized_profit_percent.round_dp(4),
            "route execution complete"
        );
        metrics::counter!("arb_routes_executed_total", 1, "status" => "success");

        ExecutionResult {
            signature,
            hops,
            input_amount: route.input_amount,
            realized_amount: amount,
            realized_profit,
            realized_profit_percent,
            status: ExecutionStatus::Success,
            error: None,
        }
    }

    /// Breaker-gated quote at the hop's recorded tier. Returns an error
    /// message suitable for the execution result.
    async fn fresh_quote(
        &self,
        route: &Route,
        index: usize,
        amount: Decimal,
    ) -> std::result::Result<Decimal, String> {
        let asset_in = &route.path[index];
        let asset_out = &route.path[index + 1];
        let fee_tier = route.fee_tiers[index];

        let breaker = self.breakers.get_or_create(QUOTE_BREAKER);
        let outcome: Result<QuoteOutcome> = breaker
            .execute(|| self.venue.quote(asset_in, asset_out, fee_tier, amount))
            .await;

        match outcome {
            Ok(QuoteOutcome::Quote(quote)) => Ok(quote.output_amount),
            Ok(QuoteOutcome::NoPool) => {
                Err(format!("hop {} liquidity disappeared before execution", index))
            }
            Err(err) => Err(format!("hop {} quote: {}", index, err)),
        }
    }

    async fn monitor_confirmation(
        &self,
        handle: &crate::venue::TransactionHandle,
    ) -> Result<crate::venue::ConfirmationReceipt> {
        let timeout = Duration::from_millis(self.config.confirmation_timeout_ms);
        let breaker = self.breakers.get_or_create(STATUS_BREAKER);
        breaker
            .execute(|| self.venue.await_confirmation(handle, timeout))
            .await
    }

    /// Build the terminal result for an aborted route. Completed hops are
    /// preserved; realized profit reflects that the tail of the route never
    /// returned to the base asset.
    fn settle(&self, route: &Route, hops: Vec<HopRecord>, error: &str) -> ExecutionResult {
        let status = if hops.iter().any(|h| {
            matches!(
                h.confirmation,
                ConfirmationStatus::Confirmed | ConfirmationStatus::Timeout
            )
        }) {
            ExecutionStatus::PartiallyExecuted
        } else {
            ExecutionStatus::Failed
        };

        metrics::counter!("arb_routes_executed_total", 1, "status" => "failed");

        // A route that never left the base asset keeps its capital; a
        // partially executed one has it stranded in an intermediate asset
        // until recovery runs outside this pipeline.
        let (realized_amount, realized_profit, realized_profit_percent) =
            if status == ExecutionStatus::Failed {
                (route.input_amount, Decimal::ZERO, Decimal::ZERO)
            } else {
                (Decimal::ZERO, -route.input_amount, dec!(-100))
            };

        ExecutionResult {
            signature: route.signature(),
            hops,
            input_amount: route.input_amount,
            realized_amount,
            realized_profit,
            realized_profit_percent,
            status,
            error: Some(error.to_string()),
        }
    }
}
