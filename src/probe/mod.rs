//! Liquidity probing and multi-tier quoting
//!
//! The probe is the engine's only read path to the venue. It quotes a pair
//! across every configured fee tier at once, picks the deepest one, and can
//! estimate how large a position a pair supports from the slippage implied by
//! two trial quotes.

use crate::{
    breaker::BreakerRegistry,
    config::ProbeConfig,
    venue::{Asset, FeeTier, Quote, QuoteOutcome, SwapVenue},
    EngineError, Result,
};
use futures_util::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tracing::debug;

/// Name of the breaker guarding quote calls
pub const QUOTE_BREAKER: &str = "venue.quote";

/// Breaker-gated quoting and depth estimation over the venue port
pub struct LiquidityProbe {
    venue: Arc<dyn SwapVenue>,
    breakers: Arc<BreakerRegistry>,
    config: ProbeConfig,
}

impl LiquidityProbe {
    /// Create a probe over the given venue
    pub fn new(venue: Arc<dyn SwapVenue>, breakers: Arc<BreakerRegistry>, config: ProbeConfig) -> Self {
        Self {
            venue,
            breakers,
            config,
        }
    }

    /// Fee tiers this probe quotes
    pub fn fee_tiers(&self) -> Vec<FeeTier> {
        self.config.fee_tiers.iter().copied().map(FeeTier).collect()
    }

    /// Quote a pair at one specific tier through the quote breaker
    pub async fn quote_tier(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        fee_tier: FeeTier,
        amount_in: Decimal,
    ) -> Result<QuoteOutcome> {
        validate_pair(asset_in, asset_out, amount_in)?;
        let breaker = self.breakers.get_or_create(QUOTE_BREAKER);
        breaker
            .execute(|| self.venue.quote(asset_in, asset_out, fee_tier, amount_in))
            .await
    }

    /// Quote a pair across every configured tier concurrently and return the
    /// highest-output one. Individual tier failures are tolerated; when every
    /// tier fails or has no pool the pair is reported as [`QuoteOutcome::NoPool`].
    pub async fn quote_best_tier(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
        amount_in: Decimal,
    ) -> Result<QuoteOutcome> {
        validate_pair(asset_in, asset_out, amount_in)?;

        let breaker = self.breakers.get_or_create(QUOTE_BREAKER);
        let requests = self.fee_tiers().into_iter().map(|tier| {
            let breaker = breaker.clone();
            let venue = self.venue.clone();
            async move {
                (
                    tier,
                    breaker
                        .execute(|| venue.quote(asset_in, asset_out, tier, amount_in))
                        .await,
                )
            }
        });

        let mut best: Option<Quote> = None;
        for (tier, outcome) in join_all(requests).await {
            match outcome {
                Ok(QuoteOutcome::Quote(quote)) => {
                    if best
                        .map(|b| quote.output_amount > b.output_amount)
                        .unwrap_or(true)
                    {
                        best = Some(quote);
                    }
                }
                Ok(QuoteOutcome::NoPool) => {}
                Err(err) => {
                    debug!(
                        pair = %format!("{}/{}", asset_in, asset_out),
                        tier = %tier,
                        error = %err,
                        "tier quote failed"
                    );
                }
            }
        }

        Ok(best.map(QuoteOutcome::Quote).unwrap_or(QuoteOutcome::NoPool))
    }

    /// Estimate the position size a pair supports.
    ///
    /// Quotes the probe amount and twice the probe amount; the shortfall of
    /// the doubled quote against twice the single quote is the implied
    /// slippage, which maps through a monotone decreasing curve onto
    /// `[min_size, max_size]`. Returns `None` when the pair has no pool.
    pub async fn estimate_optimal_size(
        &self,
        asset_in: &Asset,
        asset_out: &Asset,
    ) -> Result<Option<Decimal>> {
        let amount = self.config.probe_amount;

        let single = self.quote_best_tier(asset_in, asset_out, amount).await?;
        let Some(single) = single.quote().copied() else {
            return Ok(None);
        };

        let doubled = self
            .quote_best_tier(asset_in, asset_out, amount * dec!(2))
            .await?;
        let Some(doubled) = doubled.quote().copied() else {
            return Ok(None);
        };

        let linear = single.output_amount * dec!(2);
        let slippage = if linear > Decimal::ZERO {
            ((linear - doubled.output_amount) / linear).max(Decimal::ZERO)
        } else {
            Decimal::ZERO
        };

        Ok(Some(self.size_for_slippage(slippage)))
    }

    /// Map implied slippage onto a position size. Near-zero slippage yields
    /// `max_size`; slippage at or above the ceiling collapses to `min_size`.
    fn size_for_slippage(&self, slippage: Decimal) -> Decimal {
        let ceiling = self.config.slippage_ceiling;
        if slippage >= ceiling {
            return self.config.min_size;
        }
        let size = self.config.max_size * (Decimal::ONE - slippage / ceiling);
        size.clamp(self.config.min_size, self.config.max_size)
    }
}

fn validate_pair(asset_in: &Asset, asset_out: &Asset, amount_in: Decimal) -> Result<()> {
    if asset_in.id == asset_out.id {
        return Err(EngineError::Validation(format!(
            "Cannot quote {} against itself",
            asset_in.symbol
        ))
        .into());
    }
    if amount_in <= Decimal::ZERO {
        return Err(EngineError::Validation(format!(
            "Quote amount must be positive, got {}",
            amount_in
        ))
        .into());
    }
    Ok(())
}
