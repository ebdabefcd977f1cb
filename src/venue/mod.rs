//! Swap-venue collaborator types and ports

pub mod traits;

pub use traits::SwapVenue;

#[cfg(test)]
pub use traits::MockSwapVenue;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A tradable asset in the configured universe
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Asset {
    /// Venue-level canonical identifier
    pub id: String,
    /// Human-readable symbol used in route signatures
    pub symbol: String,
    /// Number of decimal places the venue quotes this asset in
    pub decimals: u32,
}

impl Asset {
    /// Create an asset where the identifier doubles as the symbol
    pub fn new(id: impl Into<String>, symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            decimals,
        }
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.symbol)
    }
}

/// A discrete pool fee level, in hundredths of a basis point (500 = 0.05%)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeeTier(pub u32);

impl FeeTier {
    /// Fee as a fraction of the traded amount
    pub fn as_fraction(&self) -> Decimal {
        Decimal::from(self.0) / dec!(1_000_000)
    }
}

impl fmt::Display for FeeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // display boundary only; fee math stays in Decimal
        write!(f, "{}%", f64::from(self.0) / 10_000.0)
    }
}

/// A successful quote for a single hop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    /// Amount of the output asset the venue would return
    pub output_amount: Decimal,
    /// Fee tier the quote was taken against
    pub fee_tier: FeeTier,
}

/// Outcome of a quote request; the absence of a pool is not an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuoteOutcome {
    /// The pair has liquidity at the requested tier
    Quote(Quote),
    /// No pool exists for the pair/tier
    NoPool,
}

impl QuoteOutcome {
    /// The quote, if the pair had a pool
    pub fn quote(&self) -> Option<&Quote> {
        match self {
            QuoteOutcome::Quote(q) => Some(q),
            QuoteOutcome::NoPool => None,
        }
    }
}

/// Gas bid attached to a swap submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GasBid {
    /// Price per gas unit, in base-asset terms
    pub price: Decimal,
    /// Gas unit limit for the transaction
    pub limit: u64,
}

/// Pluggable gas-bid pricing strategy, invoked before each hop submission
pub trait GasBidStrategy: Send + Sync {
    /// Produce a bid for the given hop of the given route
    fn bid(&self, route_signature: &str, hop_index: usize) -> GasBid;
}

/// Strategy that bids the same price and limit for every hop
#[derive(Debug, Clone, Copy)]
pub struct FixedGasBid {
    /// Price per gas unit
    pub price: Decimal,
    /// Gas unit limit
    pub limit: u64,
}

impl Default for FixedGasBid {
    fn default() -> Self {
        Self {
            price: dec!(0.000000001),
            limit: 300_000,
        }
    }
}

impl GasBidStrategy for FixedGasBid {
    fn bid(&self, _route_signature: &str, _hop_index: usize) -> GasBid {
        GasBid {
            price: self.price,
            limit: self.limit,
        }
    }
}

/// A fully specified swap submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    /// Asset being sold
    pub asset_in: Asset,
    /// Asset being bought
    pub asset_out: Asset,
    /// Pool fee tier to trade against
    pub fee_tier: FeeTier,
    /// Exact input amount
    pub amount_in: Decimal,
    /// Minimum acceptable output; the venue rejects fills below this
    pub min_amount_out: Decimal,
    /// Gas bid for the submission
    pub gas_bid: GasBid,
    /// Identifier of the signing key held by the external signer
    pub signer_id: String,
}

/// Handle to a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionHandle {
    /// Venue-assigned transaction identifier
    pub id: String,
    /// Submission timestamp (unix millis)
    pub submitted_at: i64,
}

/// Terminal and non-terminal confirmation states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfirmationStatus {
    /// The transaction is final
    Confirmed,
    /// The transaction failed on-venue
    Failed,
    /// Finality was not observed within the deadline
    Timeout,
    /// The venue could not report a status
    Unknown,
}

impl fmt::Display for ConfirmationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfirmationStatus::Confirmed => write!(f, "CONFIRMED"),
            ConfirmationStatus::Failed => write!(f, "FAILED"),
            ConfirmationStatus::Timeout => write!(f, "TIMEOUT"),
            ConfirmationStatus::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Block inclusion details for a confirmed transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Block number
    pub number: u64,
    /// Block hash
    pub hash: String,
}

/// Result of awaiting a transaction's confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfirmationReceipt {
    /// Observed confirmation status
    pub status: ConfirmationStatus,
    /// Block details when confirmed
    pub block: Option<BlockInfo>,
    /// Realized output amount when the venue reports one
    pub output_amount: Option<Decimal>,
    /// Venue error message for failed transactions
    pub error_message: Option<String>,
}

impl ConfirmationReceipt {
    /// Receipt for a confirmed transaction with a realized output
    pub fn confirmed(block: BlockInfo, output_amount: Decimal) -> Self {
        Self {
            status: ConfirmationStatus::Confirmed,
            block: Some(block),
            output_amount: Some(output_amount),
            error_message: None,
        }
    }

    /// Receipt for a failed transaction
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: ConfirmationStatus::Failed,
            block: None,
            output_amount: None,
            error_message: Some(message.into()),
        }
    }

    /// Receipt for a confirmation deadline that elapsed without finality
    pub fn timeout() -> Self {
        Self {
            status: ConfirmationStatus::Timeout,
            block: None,
            output_amount: None,
            error_message: None,
        }
    }
}
