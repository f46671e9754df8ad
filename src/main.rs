//! CLI entry point: parses flags, builds a session and a strategy, and runs them to completion.

use anyhow::Result;
use clap::{Parser, Subcommand};
use deribit_mm::session::Session;
use deribit_mm::strategy::{MarketMaker, MmConfig};
use deribit_mm::uri;
use deribit_mm::writer::SubscriptionWriter;

const TEST_VENUE: &str = "wss://test.deribit.com/ws/api/v2";
const LIVE_VENUE: &str = "wss://www.deribit.com/ws/api/v2";

/// Single-instrument market-making client for a JSON-RPC-over-WebSocket derivatives venue.
#[derive(Debug, Parser)]
#[command(name = "deribit-mm", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Use the production venue instead of the test venue.
    #[arg(long, global = true)]
    live: bool,

    /// API client id. Leave empty to connect unauthenticated.
    #[arg(long, default_value = "", global = true)]
    client_id: String,

    /// API client secret.
    #[arg(long, default_value = "", global = true)]
    client_secret: String,

    /// `env_logger` filter level.
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the two-sided market-making strategy.
    Mm {
        /// Instrument symbol to quote.
        #[arg(long, default_value = "BTC-PERPETUAL")]
        instrument: String,
        /// Band edge closest to the best price.
        #[arg(long)]
        min_depth: f64,
        /// Depth at which the quoted price itself is computed.
        #[arg(long)]
        mid_depth: f64,
        /// Band edge furthest into the book.
        #[arg(long)]
        max_depth: f64,
        /// Nominal per-order size before inventory skew.
        #[arg(long)]
        order_amount: f64,
        /// Absolute position cap in USD.
        #[arg(long)]
        max_position_usd: f64,
    },
    /// Subscribe to a fixed channel list and record notifications to a file.
    Writer {
        /// Channels to subscribe to.
        #[arg(long, value_delimiter = ',')]
        channels: Vec<String>,
        /// Output file path.
        #[arg(short, long)]
        output: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level)).init();

    if let Err(err) = run(cli).await {
        eprintln!("fatal: {err:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let venue = if cli.live { LIVE_VENUE } else { TEST_VENUE };
    let address = uri::parse(venue)?;

    match cli.command {
        Command::Mm {
            instrument,
            min_depth,
            mid_depth,
            max_depth,
            order_amount,
            max_position_usd,
        } => {
            let mut session = Session::connect(&address, &cli.client_id, &cli.client_secret).await?;
            let mut market_maker = MarketMaker::new(MmConfig {
                instrument,
                frequency: "raw".to_owned(),
                min_depth,
                mid_depth,
                max_depth,
                order_amount,
                max_position_usd,
            });

            market_maker.bootstrap(&mut session).await?;
            session.run(&mut market_maker).await?;
        }
        Command::Writer { channels, output } => {
            let mut session = Session::connect(&address, &cli.client_id, &cli.client_secret).await?;
            let mut writer = SubscriptionWriter::new(channels, output)?;

            writer.bootstrap(&mut session).await?;
            session.run(&mut writer).await?;
        }
    }

    Ok(())
}
