//! Multi-Hop Arbitrage Engine
//!
//! An automated arbitrage system for a decentralized asset-swap venue.
//! Discovers cyclic multi-hop trade routes across a configured asset
//! universe, sizes them against probed liquidity, executes the hops under
//! controlled slippage, and adapts its profitability thresholds from
//! historical outcomes and measured volatility.

#![deny(missing_docs)]
#![warn(clippy::all)]

pub mod breaker;
pub mod config;
pub mod discovery;
pub mod engine;
pub mod execution;
pub mod learning;
pub mod probe;
pub mod scheduler;
pub mod sim;
pub mod utils;
pub mod venue;

// Re-export commonly used types
pub use breaker::{BreakerRegistry, CircuitBreaker, CircuitState};
pub use config::EngineConfig;
pub use discovery::{DiscoveryEngine, Route, RouteConfidence};
pub use engine::ArbitrageEngine;
pub use execution::{ExecutionPipeline, ExecutionResult, ExecutionStatus};
pub use learning::LearningStore;
pub use probe::LiquidityProbe;
pub use scheduler::identify_batches;
pub use venue::{Asset, FeeTier, QuoteOutcome, SwapVenue};

/// Result type used throughout the application
pub type Result<T> = anyhow::Result<T>;

/// Common error types for the arbitrage engine
#[derive(thiserror::Error, Debug)]
pub enum EngineError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Input rejected before any I/O was issued
    #[error("Validation error: {0}")]
    Validation(String),

    /// A circuit breaker rejected the call without invoking the dependency
    #[error("Circuit breaker '{0}' is open")]
    BreakerOpen(String),

    /// An external dependency call failed
    #[error("Dependency error: {0}")]
    Dependency(String),

    /// A swap submission or confirmation failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Learning-store persistence failed
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// An operation exceeded its deadline
    #[error("Timeout: {0}")]
    Timeout(String),
}

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
