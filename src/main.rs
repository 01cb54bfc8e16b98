//! Hyperliquid spot order mirror
//!
//! Watches a leader account's order stream and replicates its spot limit
//! orders on the follower account with a fixed notional per order.

mod api;
mod bot;
mod models;
mod trading;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use crate::api::{Endpoints, ExchangeClient, InfoClient};
use crate::bot::{watch_leader, MirrorBot};
use crate::models::MarketKind;
use crate::trading::{ExecutionAdapter, MetadataResolver, MirrorConfig, PaperExecution};

/// Hyperliquid spot order mirror CLI.
#[derive(Parser)]
#[command(name = "spot-mirror")]
#[command(about = "Mirror a Hyperliquid leader's spot limit orders", long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Use testnet endpoints and signing domain
    #[arg(long, env = "HYPERLIQUID_TESTNET")]
    testnet: bool,

    /// Override the info endpoint URL
    #[arg(long, env = "HYPERLIQUID_INFO_URL")]
    info_url: Option<String>,

    /// Override the exchange endpoint URL
    #[arg(long, env = "HYPERLIQUID_EXCHANGE_URL")]
    exchange_url: Option<String>,

    /// Override the websocket endpoint URL
    #[arg(long, env = "HYPERLIQUID_WS_URL")]
    ws_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start mirroring the leader's spot orders
    Run {
        /// Leader wallet address
        #[arg(long, env = "LEADER_ADDRESS")]
        leader: String,

        /// Quote value (USDC) of every follower order
        #[arg(short, long, default_value = "20")]
        notional: Decimal,

        /// Keepalive ping interval in seconds
        #[arg(long, default_value = "30")]
        keepalive: u64,

        /// Max age of cached spot metadata in seconds (0 = never refetch)
        #[arg(long, default_value = "10")]
        metadata_max_age: u64,

        /// Dry run (log follower orders instead of sending them)
        #[arg(long)]
        dry_run: bool,

        /// Ignore repeated opens for leader orders that failed to mirror
        #[arg(long)]
        suppress_failed_retries: bool,
    },

    /// Log the leader's order updates and fills without mirroring
    Watch {
        /// Leader wallet address
        #[arg(long, env = "LEADER_ADDRESS")]
        leader: String,
    },

    /// Resolve a spot market to its reference price and size precision
    Resolve {
        /// Market identifier (`@107` or `PURR/USDC`)
        market: String,
    },

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let log_level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let endpoints = Endpoints::new(cli.testnet).with_overrides(
        cli.info_url.clone(),
        cli.exchange_url.clone(),
        cli.ws_url.clone(),
    );

    match cli.command {
        Commands::Run {
            leader,
            notional,
            keepalive,
            metadata_max_age,
            dry_run,
            suppress_failed_retries,
        } => {
            let config = MirrorConfig {
                leader_address: leader,
                fixed_notional: notional,
                keepalive_interval: Duration::from_secs(keepalive),
                metadata_max_age: (metadata_max_age > 0).then(|| Duration::from_secs(metadata_max_age)),
                suppress_failed_retries,
                dry_run,
                testnet: cli.testnet,
                ..Default::default()
            };

            let (execution, live) = build_execution(&config, &endpoints);
            let metadata = Arc::new(InfoClient::new(endpoints.info.clone())?);
            let mut bot = MirrorBot::new(config.clone(), &endpoints, execution, metadata)?;

            println!("\n=== Hyperliquid Spot Order Mirror ===");
            println!("Leader:          {}", config.leader_address);
            println!("Order notional:  ${}", config.fixed_notional);
            println!("Network:         {}", if config.testnet { "TESTNET" } else { "MAINNET" });
            println!("Mode:            {}", if live { "LIVE TRADING" } else { "DRY RUN (no real orders)" });
            println!("\nPress Ctrl+C to stop.\n");

            // Run the bot
            if let Err(e) = bot.run().await {
                tracing::error!(error = %e, "Bot error");
            }

            // Show final stats
            println!("\n{}", bot.stats());
        }

        Commands::Watch { leader } => {
            let config = MirrorConfig {
                leader_address: leader,
                testnet: cli.testnet,
                ..Default::default()
            };
            config.validate()?;

            println!("\n=== Watching {} ===", config.leader_address);
            println!("Press Ctrl+C to stop.\n");

            watch_leader(&config, &endpoints).await?;
        }

        Commands::Resolve { market } => {
            let kind = MarketKind::classify(&market);
            if kind != MarketKind::Spot {
                println!("{} is a {} market; only spot markets are mirrored.", market, kind);
                return Ok(());
            }

            let source = Arc::new(InfoClient::new(endpoints.info.clone())?);
            let mut resolver = MetadataResolver::new(source, None);
            let metadata = resolver.resolve(&market).await?;

            println!("\n=== {} ===", market);
            println!("Spot Index:       {}", metadata.market.index);
            println!("Index Name:       {}", metadata.market.index_name());
            println!("Reference Price:  {}", metadata.reference_price);
            println!("Size Precision:   {}", metadata.size_precision);
        }

        Commands::Config => {
            let config = MirrorConfig {
                testnet: cli.testnet,
                ..Default::default()
            };

            println!("\n=== Mirror Configuration ===\n");
            println!("Sizing:");
            println!("  Fixed Notional:       ${}", config.fixed_notional);
            println!("  Time In Force:        GTC");

            println!("\nStream:");
            println!("  Keepalive Interval:   {}s", config.keepalive_interval.as_secs());
            println!("  Connect Timeout:      {}s", config.connect_timeout.as_secs());
            println!(
                "  Reconnect Delay:      {}s - {}s",
                config.reconnect_initial_delay.as_secs(),
                config.reconnect_max_delay.as_secs()
            );

            println!("\nMetadata:");
            match config.metadata_max_age {
                Some(age) => println!("  Max Age:              {}s", age.as_secs()),
                None => println!("  Max Age:              never refetch"),
            }

            println!("\nFailures:");
            println!("  Suppress Retries:     {}", config.suppress_failed_retries);

            println!("\n=== Endpoints ===\n");
            println!("  Info:                 {}", endpoints.info);
            println!("  Exchange:             {}", endpoints.exchange);
            println!("  WebSocket:            {}", endpoints.websocket);

            println!("\nCredentials:");
            println!(
                "  HYPERLIQUID_PRIVATE_KEY: {}",
                if std::env::var("HYPERLIQUID_PRIVATE_KEY").is_ok() { "set" } else { "not set" }
            );
        }
    }

    Ok(())
}

/// Pick the execution adapter: live exchange client unless dry-run or no key is configured.
fn build_execution(config: &MirrorConfig, endpoints: &Endpoints) -> (Arc<dyn ExecutionAdapter>, bool) {
    if config.dry_run {
        return (Arc::new(PaperExecution::new()), false);
    }

    match ExchangeClient::from_env(endpoints.exchange.clone(), !config.testnet) {
        Ok(client) => {
            info!(address = ?client.address(), "Exchange client initialized");
            (Arc::new(client), true)
        }
        Err(e) => {
            warn!("Exchange client not configured: {:#}. Running in dry-run mode.", e);
            (Arc::new(PaperExecution::new()), false)
        }
    }
}
