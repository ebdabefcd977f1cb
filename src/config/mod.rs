//! Configuration management module

pub mod settings;

pub use settings::*;

use crate::{venue::Asset, EngineError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for the arbitrage engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Asset universe configuration
    pub universe: UniverseConfig,
    /// Route discovery configuration
    pub discovery: DiscoveryConfig,
    /// Liquidity probe configuration
    pub probe: ProbeConfig,
    /// Execution pipeline configuration
    pub execution: ExecutionSettings,
    /// Circuit breaker configuration
    pub breaker: BreakerConfig,
    /// Learning store configuration
    pub learning: LearningConfig,
    /// Engine loop configuration
    pub engine: EngineSettings,
    /// Venue configuration
    pub venue: VenueConfig,
}

/// The tradable asset universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UniverseConfig {
    /// Asset every route starts and ends with; the capital at risk
    pub base_asset: Asset,
    /// Candidate intermediate assets (must not include the base asset)
    pub assets: Vec<Asset>,
    /// Symbols of the high-liquidity subset used for deep searches
    pub high_liquidity: Vec<String>,
}

impl UniverseConfig {
    /// Intermediate candidates restricted to the high-liquidity subset
    pub fn high_liquidity_assets(&self) -> Vec<Asset> {
        self.assets
            .iter()
            .filter(|a| self.high_liquidity.contains(&a.symbol))
            .cloned()
            .collect()
    }
}

/// Route discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Minimum hops per route
    pub min_hops: usize,
    /// Maximum hops per route
    pub max_hops: usize,
    /// Base minimum net profit threshold, in percent
    pub min_profit_threshold: Decimal,
    /// Single-hop return below which a search branch is pruned, in percent
    pub loss_floor: Decimal,
    /// Maximum complete routes the search may evaluate per scan
    pub route_budget: u64,
    /// Estimated gas cost per hop, in base-asset units
    pub gas_per_hop: Decimal,
}

/// Liquidity probe configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    /// Fee tiers to quote, in hundredths of a basis point
    pub fee_tiers: Vec<u32>,
    /// Trial amount used for depth probing, in base-asset units
    pub probe_amount: Decimal,
    /// Smallest position the engine will open
    pub min_size: Decimal,
    /// Largest position the engine will open
    pub max_size: Decimal,
    /// Implied slippage (fraction) at which sizing collapses to `min_size`
    pub slippage_ceiling: Decimal,
}

/// Execution pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Fraction shaved off a quote to form the minimum acceptable output
    pub safety_margin: Decimal,
    /// Fraction shaved off a hop's quoted output before funding the next hop
    pub inter_hop_slippage_buffer: Decimal,
    /// Confirmation deadline per hop, in milliseconds
    pub confirmation_timeout_ms: u64,
    /// Extra wait applied after a confirmation timeout, in milliseconds
    pub optimistic_delay_ms: u64,
    /// Identifier of the signing key held by the external signer
    pub signer_id: String,
}

/// Circuit breaker configuration, shared by all registered breakers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// In-window failures that open a breaker
    pub failure_threshold: u32,
    /// Half-open successes that close a breaker
    pub success_threshold: u32,
    /// Time an open breaker rejects calls, in milliseconds
    pub open_timeout_ms: u64,
    /// Sliding window inside which failures are counted, in milliseconds
    pub monitoring_window_ms: u64,
}

/// Learning store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Path of the persisted learning snapshot
    pub state_path: PathBuf,
    /// Attempts to take the snapshot file lock before giving up
    pub lock_retries: u32,
    /// Base backoff between lock attempts, in milliseconds
    pub lock_backoff_ms: u64,
    /// Age after which an abandoned lock file is broken, in milliseconds
    pub lock_stale_ms: u64,
    /// Consecutive persistence failures that disable further writes
    pub max_write_failures: u32,
}

/// Engine loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Pause between discovery/execution cycles, in milliseconds
    pub cycle_interval_ms: u64,
    /// Listen address for the Prometheus exporter, if enabled
    pub metrics_listen: Option<String>,
}

/// Venue selection and simulated-venue seed data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Venue mode; only `simulated` is built in
    pub mode: String,
    /// Initial pools for the simulated venue
    #[serde(default)]
    pub pools: Vec<PoolConfig>,
}

/// One seeded liquidity pool for the simulated venue
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Symbol of the first pool asset
    pub asset_a: String,
    /// Symbol of the second pool asset
    pub asset_b: String,
    /// Pool fee tier, in hundredths of a basis point
    pub fee_tier: u32,
    /// Initial reserve of the first asset
    pub reserve_a: Decimal,
    /// Initial reserve of the second asset
    pub reserve_b: Decimal,
}

impl EngineConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path)
            .map_err(|e| EngineError::Config(format!("Failed to read config file: {}", e)))?;

        let config: EngineConfig = toml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("Failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.universe.assets.is_empty() {
            return Err(
                EngineError::Config("At least one intermediate asset is required".to_string())
                    .into(),
            );
        }

        if self
            .universe
            .assets
            .iter()
            .any(|a| a.id == self.universe.base_asset.id)
        {
            return Err(EngineError::Config(
                "Base asset must not appear among intermediate assets".to_string(),
            )
            .into());
        }

        for symbol in &self.universe.high_liquidity {
            if !self.universe.assets.iter().any(|a| &a.symbol == symbol) {
                return Err(EngineError::Config(format!(
                    "High-liquidity symbol '{}' is not in the asset universe",
                    symbol
                ))
                .into());
            }
        }

        if self.discovery.min_hops < 3 {
            return Err(
                EngineError::Config("Routes need at least 3 hops".to_string()).into(),
            );
        }

        if self.discovery.max_hops < self.discovery.min_hops || self.discovery.max_hops > 6 {
            return Err(EngineError::Config(
                "max_hops must lie between min_hops and 6".to_string(),
            )
            .into());
        }

        validate_positive(self.discovery.min_profit_threshold, "min_profit_threshold")?;
        validate_positive(self.discovery.gas_per_hop, "gas_per_hop")?;

        if self.discovery.loss_floor >= Decimal::ZERO {
            return Err(
                EngineError::Config("loss_floor must be negative".to_string()).into(),
            );
        }

        if self.discovery.route_budget == 0 {
            return Err(
                EngineError::Config("route_budget must be greater than 0".to_string()).into(),
            );
        }

        if self.probe.fee_tiers.is_empty() {
            return Err(
                EngineError::Config("At least one fee tier is required".to_string()).into(),
            );
        }

        validate_positive(self.probe.probe_amount, "probe_amount")?;
        validate_positive(self.probe.min_size, "min_size")?;

        if self.probe.max_size < self.probe.min_size {
            return Err(
                EngineError::Config("max_size must be at least min_size".to_string()).into(),
            );
        }

        validate_fraction(self.probe.slippage_ceiling, "slippage_ceiling")?;
        validate_fraction(self.execution.safety_margin, "safety_margin")?;
        validate_fraction(
            self.execution.inter_hop_slippage_buffer,
            "inter_hop_slippage_buffer",
        )?;

        if self.execution.confirmation_timeout_ms == 0 {
            return Err(EngineError::Config(
                "confirmation_timeout_ms must be greater than 0".to_string(),
            )
            .into());
        }

        if self.breaker.failure_threshold == 0 || self.breaker.success_threshold == 0 {
            return Err(EngineError::Config(
                "Breaker thresholds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.learning.max_write_failures == 0 {
            return Err(EngineError::Config(
                "max_write_failures must be greater than 0".to_string(),
            )
            .into());
        }

        if self.venue.mode != "simulated" {
            return Err(EngineError::Config(format!(
                "Unknown venue mode: {}",
                self.venue.mode
            ))
            .into());
        }

        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        let base = Asset::new("asset-weth", "WETH", 18);
        let assets = vec![
            Asset::new("asset-usdc", "USDC", 6),
            Asset::new("asset-wbtc", "WBTC", 8),
            Asset::new("asset-dai", "DAI", 18),
            Asset::new("asset-uni", "UNI", 18),
        ];

        Self {
            universe: UniverseConfig {
                base_asset: base,
                assets,
                high_liquidity: vec!["USDC".to_string(), "WBTC".to_string()],
            },
            discovery: DiscoveryConfig {
                min_hops: 3,
                max_hops: 5,
                min_profit_threshold: defaults::MIN_PROFIT_THRESHOLD,
                loss_floor: defaults::LOSS_FLOOR,
                route_budget: defaults::ROUTE_BUDGET,
                gas_per_hop: defaults::GAS_PER_HOP,
            },
            probe: ProbeConfig {
                fee_tiers: vec![100, 500, 3000, 10000],
                probe_amount: dec!(0.1),
                min_size: dec!(0.05),
                max_size: dec!(5),
                slippage_ceiling: defaults::SLIPPAGE_CEILING,
            },
            execution: ExecutionSettings {
                safety_margin: defaults::SAFETY_MARGIN,
                inter_hop_slippage_buffer: defaults::INTER_HOP_SLIPPAGE_BUFFER,
                confirmation_timeout_ms: 10_000,
                optimistic_delay_ms: 2_000,
                signer_id: "default".to_string(),
            },
            breaker: BreakerConfig {
                failure_threshold: 5,
                success_threshold: 2,
                open_timeout_ms: 30_000,
                monitoring_window_ms: 60_000,
            },
            learning: LearningConfig {
                state_path: PathBuf::from("state/learning.json"),
                lock_retries: 5,
                lock_backoff_ms: 100,
                lock_stale_ms: 10_000,
                max_write_failures: 5,
            },
            engine: EngineSettings {
                cycle_interval_ms: 15_000,
                metrics_listen: None,
            },
            venue: VenueConfig {
                mode: "simulated".to_string(),
                pools: Vec::new(),
            },
        }
    }
}
