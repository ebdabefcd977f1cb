//! Route execution: result types and the hop pipeline

pub mod pipeline;

pub use pipeline::ExecutionPipeline;

use crate::venue::{ConfirmationStatus, FeeTier, TransactionHandle};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Terminal outcome of one route execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Every hop confirmed (or proceeded optimistically) and the route closed
    Success,
    /// The route aborted before any hop completed
    Failed,
    /// Some hops completed before the route aborted
    PartiallyExecuted,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionStatus::Success => write!(f, "success"),
            ExecutionStatus::Failed => write!(f, "failed"),
            ExecutionStatus::PartiallyExecuted => write!(f, "partially-executed"),
        }
    }
}

/// One completed hop within a route execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HopRecord {
    /// Hop position within the route, starting at 0
    pub index: usize,
    /// Symbol of the asset sold
    pub asset_in: String,
    /// Symbol of the asset bought
    pub asset_out: String,
    /// Fee tier the hop traded at
    pub fee_tier: FeeTier,
    /// Venue transaction handle
    pub handle: TransactionHandle,
    /// Confirmation status observed for the hop
    pub confirmation: ConfirmationStatus,
    /// Output amount carried forward from the hop
    pub output_amount: Decimal,
}

/// Structured outcome of one route execution. The pipeline always returns
/// one of these; it never raises.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Signature of the executed route
    pub signature: String,
    /// Ordered records of the hops that were submitted
    pub hops: Vec<HopRecord>,
    /// Base-asset amount the route was entered with
    pub input_amount: Decimal,
    /// Base-asset amount realized at the end of the route
    pub realized_amount: Decimal,
    /// Realized amount minus input
    pub realized_profit: Decimal,
    /// Realized profit as a percentage of the input
    pub realized_profit_percent: Decimal,
    /// Terminal status
    pub status: ExecutionStatus,
    /// Failure detail, when the route did not succeed
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Whether the route ran to completion
    pub fn is_success(&self) -> bool {
        matches!(self.status, ExecutionStatus::Success)
    }

    /// Number of hops that completed before the terminal state
    pub fn completed_hops(&self) -> usize {
        self.hops.len()
    }
}
