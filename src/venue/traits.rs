//! The swap-venue port consumed by the engine

use super::{Asset, ConfirmationReceipt, FeeTier, QuoteOutcome, SwapRequest, TransactionHandle};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::time::Duration;

/// Port to the external swap venue.
///
/// The engine never talks to the venue directly; every call goes through a
/// circuit breaker owned by the caller. Implementations must be safe to share
/// across concurrently executing routes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SwapVenue: Send + Sync {
    /// Quote a single hop. Idempotent and side-effect-free; a missing pool is
    /// reported as [`QuoteOutcome::NoPool`], not as an error.
    async fn quote(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        fee_tier: FeeTier,
        amount_in: Decimal,
    ) -> Result<QuoteOutcome>;

    /// Submit a signed swap. Errors here mean the venue never accepted the
    /// transaction.
    async fn submit_swap(&self, request: &SwapRequest) -> Result<TransactionHandle>;

    /// Await finality of a submitted transaction, up to `timeout`. A deadline
    /// that elapses is reported in the receipt status, not as an error.
    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
        timeout: Duration,
    ) -> Result<ConfirmationReceipt>;
}
