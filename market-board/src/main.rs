//! Market Board - snapshot dashboard, dividend-ETF advisor and hot-concept reports.

use std::path::PathBuf;

use anyhow::Result;
use board_common::config::Config;
use board_common::logging::init_logging;
use clap::{Parser, Subcommand};
use market_board::pipeline::{self, advisor, demo, hot, snapshot, MarketSources};

#[derive(Parser, Debug)]
#[command(name = "market-board")]
#[command(version)]
#[command(about = "A-share market snapshot, dividend-ETF advisor and hot-concept reports", long_about = None)]
struct Cli {
    /// Config file (default: ~/.market-board/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch quotes and basis charts and render index.html
    Snapshot,

    /// Run the dividend-ETF gradient advisor
    Advise {
        /// Run even when today is not a trading day
        #[arg(long)]
        force: bool,

        /// Send the advice email even if email.enabled is false
        #[arg(long)]
        email: bool,
    },

    /// Scrape 10jqka hot lists and analyze their concepts
    Hot,

    /// Render every output from fabricated data, without network access
    Demo,
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let now = pipeline::china_now();
    let today = now.date();

    let sources = MarketSources::new(&config.http)?;
    match cli.command {
        Commands::Snapshot => snapshot::run(&config, &sources, today).await,
        Commands::Advise { force, email } => advisor::run(&config, &sources, now, force, email).await,
        Commands::Hot => hot::run(&config, &sources.ths, today).await,
        Commands::Demo => demo::run(&config, today),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match Config::load_with_env(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {e:#}");
            std::process::exit(1);
        }
    };

    init_logging(
        &config.observability.log_level,
        &config.observability.log_format,
    );

    tracing::info!(command = ?cli.command, "Market Board v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli, config).await {
        tracing::error!(error = %format!("{e:#}"), "Run failed");
        std::process::exit(1);
    }
}
