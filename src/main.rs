use clap::{Parser, Subcommand};
use multihop_arbitrage::{
    breaker::BreakerRegistry,
    config::EngineConfig,
    discovery::DiscoveryEngine,
    engine::ArbitrageEngine,
    learning::{FilePersistence, LearningStore},
    probe::LiquidityProbe,
    sim::SimulatedVenue,
    utils::logger,
    venue::FixedGasBid,
    EngineError, Result,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "arbitrage")]
#[command(about = "Multi-hop arbitrage engine for a decentralized swap venue")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/arbitrage.toml")]
    config: PathBuf,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Log file path
    #[arg(long, default_value = "logs/arbitrage.log")]
    log_file: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the discover/execute loop
    Run {
        /// Stop after this many cycles
        #[arg(long)]
        max_cycles: Option<u64>,
    },
    /// Run one discovery scan and print the candidates
    Discover {
        /// Minimum hops per route
        #[arg(long)]
        min_depth: Option<usize>,

        /// Maximum hops per route
        #[arg(long)]
        max_depth: Option<usize>,
    },
    /// Validate configuration
    Validate,
    /// Show learning statistics and breaker health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Initialize logging
    logger::init(&cli.log_level, &cli.log_file)?;

    info!("Starting Multi-Hop Arbitrage Engine v{}", multihop_arbitrage::VERSION);

    // Load configuration
    let config = EngineConfig::from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config.display());

    match cli.command {
        Commands::Run { max_cycles } => run_engine(config, max_cycles).await,
        Commands::Discover {
            min_depth,
            max_depth,
        } => run_discovery(config, min_depth, max_depth).await,
        Commands::Validate => validate_config(config).await,
        Commands::Status => show_status(config).await,
    }
}

async fn run_engine(config: EngineConfig, max_cycles: Option<u64>) -> Result<()> {
    if let Some(listen) = &config.engine.metrics_listen {
        let addr: std::net::SocketAddr = listen
            .parse()
            .map_err(|e| EngineError::Config(format!("Invalid metrics_listen address: {}", e)))?;
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .map_err(|e| EngineError::Config(format!("Failed to install metrics exporter: {}", e)))?;
        info!("Metrics exporter listening on {}", addr);
    }

    let venue = Arc::new(SimulatedVenue::from_config(
        &config.universe,
        &config.venue.pools,
    )?);
    let persistence = Arc::new(FilePersistence::new(&config.learning));
    let engine = Arc::new(
        ArbitrageEngine::new(config, venue, persistence, Arc::new(FixedGasBid::default()))
            .await?,
    );

    // Let an in-flight route finish its current hop on ctrl-c.
    let shutdown_handle = engine.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown_handle.request_shutdown();
        }
    });

    engine.run(max_cycles).await?;

    let stats = engine.statistics().await;
    info!(
        cycles = stats.cycles,
        executed = stats.routes_executed,
        succeeded = stats.successful_routes,
        net_profit = %stats.net_profit,
        "engine exited"
    );

    Ok(())
}

async fn run_discovery(
    config: EngineConfig,
    min_depth: Option<usize>,
    max_depth: Option<usize>,
) -> Result<()> {
    config.validate()?;

    let venue = Arc::new(SimulatedVenue::from_config(
        &config.universe,
        &config.venue.pools,
    )?);
    let breakers = Arc::new(BreakerRegistry::new(config.breaker.clone()));
    let probe = Arc::new(LiquidityProbe::new(venue, breakers, config.probe.clone()));
    let discovery = DiscoveryEngine::new(probe, config.universe.clone(), config.discovery.clone());

    let min = min_depth.unwrap_or(config.discovery.min_hops);
    let max = max_depth.unwrap_or(config.discovery.max_hops);
    let routes = discovery
        .discover(
            &config.universe.base_asset,
            min..=max,
            config.discovery.min_profit_threshold,
        )
        .await?;

    if routes.is_empty() {
        println!("No profitable routes found.");
        return Ok(());
    }

    println!("Found {} candidate route(s):", routes.len());
    for route in &routes {
        println!(
            "  {:<40} {} hops  net {:>8}%  confidence {}",
            route.signature(),
            route.hops(),
            route.net_profit_percent.round_dp(4),
            route.confidence
        );
    }

    Ok(())
}

async fn validate_config(config: EngineConfig) -> Result<()> {
    info!("Validating configuration...");

    match config.validate() {
        Ok(_) => {
            info!("Configuration is valid");
            println!("Configuration validation passed!");
        }
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            return Err(e);
        }
    }

    Ok(())
}

async fn show_status(config: EngineConfig) -> Result<()> {
    let persistence = Arc::new(FilePersistence::new(&config.learning));
    let learning = LearningStore::open(persistence, &config.learning).await?;
    let stats = learning.learning_statistics().await;

    println!("Learning store:");
    println!("  Tracked routes:       {}", stats.tracked_routes);
    println!("  Total attempts:       {}", stats.total_attempts);
    println!("  Total successes:      {}", stats.total_successes);
    println!(
        "  Overall success rate: {}%",
        (stats.overall_success_rate * rust_decimal::Decimal::from(100)).round_dp(2)
    );
    println!("  Avg volatility:       {}%", stats.avg_volatility.round_dp(4));
    println!(
        "  Recent profitability: {}%",
        stats.recent_profitability.round_dp(4)
    );
    println!("  Writes disabled:      {}", stats.writes_disabled);

    let top = learning.top_performing_routes(5).await;
    if !top.is_empty() {
        println!("Top performing routes:");
        for perf in &top {
            println!(
                "  {:<40} attempts {:>4}  success rate {:>6}%  total profit {}",
                perf.signature,
                perf.attempts,
                (perf.success_rate * rust_decimal::Decimal::from(100)).round_dp(2),
                perf.total_profit.round_dp(6)
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert()
    }
}
