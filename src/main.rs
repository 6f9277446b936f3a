//! nomsync - NOM bonding curve quotes and chain-state sync
//!
//! Run with: cargo run -- watch
//!           cargo run -- quote buy 1.5
//!           cargo run -- quote buy 1.5 --gas-units 150000 --gas-tier instant
//!           cargo run -- quote sell 2500 --supply 20000000

use clap::{Args, Parser, Subcommand, ValueEnum};
use color_eyre::eyre::Result;
use console::style;
use rust_decimal::Decimal;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use nomsync::chain::{PollingBlockSource, RpcChainReader};
use nomsync::curve::{
    price_at_supply, price_curve, quote_buy, quote_buy_net_of_fee, quote_sell, LiveQuoter, Quote,
};
use nomsync::gas_oracle::{GasOracle, GasTier, GasTierKind, GasTierSource};
use nomsync::sync::{ChainStateStore, SyncLoop};
use nomsync::units::decimal_to_wei;
use nomsync::Config;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "nomsync")]
struct Cli {
    /// Read configuration from a TOML file instead of the environment
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Follow new blocks and keep the chain snapshot in sync (default)
    Watch,

    /// Quote a trade against the curve
    Quote {
        #[command(subcommand)]
        side: QuoteSide,
    },

    /// Print sampled points of the price curve
    Curve {
        /// First supply to sample
        #[arg(long, default_value = "0")]
        from: Decimal,

        /// Last supply to sample
        #[arg(long, default_value = "100000000")]
        to: Decimal,

        #[arg(long, default_value_t = 11)]
        samples: usize,
    },
}

#[derive(Subcommand, Debug)]
enum QuoteSide {
    /// ETH in, NOM out
    Buy(QuoteArgs),
    /// NOM in, ETH out
    Sell(QuoteArgs),
}

#[derive(Args, Debug)]
struct QuoteArgs {
    /// Amount paid (ETH for buys, NOM for sells)
    amount: Decimal,

    /// Quote against this supply instead of reading it from chain
    #[arg(long)]
    supply: Option<Decimal>,

    /// Slippage tolerance in basis points for the minimum output
    #[arg(long, default_value_t = 100)]
    slippage_bps: u32,

    /// Gas the buy transaction is expected to use; its fee is paid out of the amount
    #[arg(long)]
    gas_units: Option<u64>,

    /// Gas tier to price the fee at
    #[arg(long, value_enum, default_value_t = TierArg::Fast)]
    gas_tier: TierArg,

    /// Gas price in gwei, instead of asking the gas oracle
    #[arg(long)]
    gas_gwei: Option<Decimal>,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TierArg {
    Standard,
    Fast,
    Instant,
}

impl From<TierArg> for GasTierKind {
    fn from(tier: TierArg) -> Self {
        match tier {
            TierArg::Standard => GasTierKind::Standard,
            TierArg::Fast => GasTierKind::Fast,
            TierArg::Instant => GasTierKind::Instant,
        }
    }
}

fn print_banner() {
    println!();
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!(
        "{}",
        style(" 📈 NOMSYNC - Bonding Curve Quotes & Chain Sync").cyan().bold()
    );
    println!(
        "{}",
        style("    Quadratic curve | All-or-nothing block sync").cyan()
    );
    println!(
        "{}",
        style("═══════════════════════════════════════════════════════════════").cyan()
    );
    println!();
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Config::from_file(path)
        }
        None => Config::from_env(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("nomsync=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.command.unwrap_or(Command::Watch) {
        Command::Watch => watch_chain(config).await,
        Command::Quote { side } => match side {
            QuoteSide::Buy(args) => run_quote(&config, args, true).await,
            QuoteSide::Sell(args) => run_quote(&config, args, false).await,
        },
        Command::Curve { from, to, samples } => print_curve(from, to, samples),
    }
}

async fn watch_chain(config: Config) -> Result<()> {
    print_banner();

    if let Err(e) = config.validate() {
        error!("Configuration validation failed: {}", e);
        error!("Please check your .env file");
        return Err(e.into());
    }
    config.print_summary();
    println!();

    let rpc_url = config.rpc_endpoint()?;
    let bonding = config.bonding_contract()?;
    let account = config.account()?;

    let reader = RpcChainReader::new(rpc_url.clone(), bonding, config.token_contract()?);
    let gas = GasOracle::new(
        config.etherscan_api_key.clone(),
        config.chain_id,
        rpc_url.clone(),
        config.gas_api_timeout(),
    )?;
    let store = Arc::new(ChainStateStore::new());

    let mut sync = SyncLoop::new(reader, gas, store.clone(), account, bonding);
    if let Some(timeout) = config.read_timeout() {
        sync = sync.with_read_timeout(timeout);
    }
    let blocks = PollingBlockSource::new(rpc_url, config.block_poll_interval());

    // Every applied snapshot goes to the log as one JSON line.
    let mut snapshots = store.subscribe();
    let snapshot_logger = tokio::spawn(async move {
        while snapshots.changed().await.is_ok() {
            let snapshot = snapshots.borrow_and_update().clone();
            match serde_json::to_string(&*snapshot) {
                Ok(json) => info!(target: "nomsync::snapshot", "{}", json),
                Err(e) => warn!("Could not serialize snapshot: {}", e),
            }
        }
    });

    let (stop, shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Ctrl-C received, shutting down"),
            Err(e) => {
                warn!("Cannot listen for Ctrl-C: {}", e);
                std::future::pending::<()>().await;
            }
        }
        let _ = stop.send(true);
    });

    println!("{}", style("Waiting for blocks... (Ctrl-C to stop)").blue());
    sync.run(&blocks, shutdown).await;
    snapshot_logger.abort();

    let stats = sync.stats();
    println!(
        "{} {} applied, {} failed, {} duplicate, {} stale",
        style("✓").green(),
        stats.applied,
        stats.failed,
        stats.duplicate,
        stats.stale
    );
    Ok(())
}

/// Fee in ETH for `gas_units` at the requested tier.
async fn estimate_gas_fee(config: &Config, args: &QuoteArgs, gas_units: u64) -> Result<Decimal> {
    let kind = GasTierKind::from(args.gas_tier);
    let fee = match args.gas_gwei {
        Some(gwei) => GasTier::new(kind, gwei).fee_eth(gas_units)?,
        None => {
            let oracle = GasOracle::new(
                config.etherscan_api_key.clone(),
                config.chain_id,
                config.rpc_endpoint()?,
                config.gas_api_timeout(),
            )?;
            let tiers = oracle.gas_tiers().await?;
            info!("Pricing gas at {}", tiers.get(kind).label);
            tiers.fee_eth(kind, gas_units)?
        }
    };
    Ok(fee)
}

async fn run_quote(config: &Config, args: QuoteArgs, buy: bool) -> Result<()> {
    let gas_fee = match args.gas_units {
        Some(gas_units) if buy => Some(estimate_gas_fee(config, &args, gas_units).await?),
        _ => None,
    };

    let quote = match (args.supply, gas_fee) {
        (Some(supply), Some(fee)) => quote_buy_net_of_fee(args.amount, fee, supply)?,
        (Some(supply), None) if buy => quote_buy(args.amount, supply)?,
        (Some(supply), None) => quote_sell(args.amount, supply)?,
        (None, _) => {
            let reader = RpcChainReader::new(
                config.rpc_endpoint()?,
                config.bonding_contract()?,
                config.token_contract()?,
            );
            let quoter = LiveQuoter::new(reader);
            if let Some(fee) = gas_fee {
                quoter.quote_buy_net_live(args.amount, fee).await?
            } else if buy {
                quoter.quote_buy_live(args.amount).await?
            } else {
                quoter.quote_sell_live(args.amount).await?
            }
        }
    };

    if let Some(fee) = gas_fee {
        println!("{} Gas fee: {} ETH, quoting the remaining {} ETH", style("⛽").yellow(), fee, args.amount - fee);
    }
    print_quote(&quote, args.amount, args.slippage_bps, buy)
}

fn print_quote(quote: &Quote, amount: Decimal, slippage_bps: u32, buy: bool) -> Result<()> {
    let (paid, received) = if buy { ("ETH", "NOM") } else { ("NOM", "ETH") };
    let min_out = quote.min_amount_out(slippage_bps)?;

    println!();
    println!("{}", style(if buy { "═══ BUY QUOTE ═══" } else { "═══ SELL QUOTE ═══" }).blue().bold());
    println!("   Pay:          {} {}", amount, paid);
    println!("   Receive:      {} {}", style(quote.amount_out.round_dp(8)).green().bold(), received);
    println!(
        "   Min received: {} {} ({} bps slippage)",
        min_out.round_dp(8),
        received,
        slippage_bps
    );
    println!("   Min out (wei): {}", decimal_to_wei(min_out)?);
    println!("   Supply:       {} → {}", quote.supply_bottom.round_dp(4), quote.supply_top.round_dp(4));
    println!(
        "   Price:        {} → {}",
        price_at_supply(quote.supply_bottom)?.round_dp(12),
        price_at_supply(quote.supply_top)?.round_dp(12)
    );
    println!();
    Ok(())
}

fn print_curve(from: Decimal, to: Decimal, samples: usize) -> Result<()> {
    let points = price_curve(from, to, samples)?;

    println!("{}", style("═══ PRICE CURVE ═══").blue().bold());
    println!("   {:>24}  {:>24}", "Supply (NOM)", "Price (ETH/NOM)");
    for point in &points {
        println!("   {:>24}  {:>24}", point.supply.round_dp(4), point.price.round_dp(12));
    }
    Ok(())
}
