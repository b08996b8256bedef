use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use swarm_core::BidderConfig;
use swarm_core::config::ScorerKind;
use swarm_core::wire::{ErrorResponse, SelectionErrorResponse};

mod commands;

#[derive(Parser)]
#[command(
    name = "swarm-bidder",
    about = "Per-system bidder for decentralized job placement",
    version,
    propagate_version = true
)]
struct Cli {
    /// TOML file with scorer choice and weights (defaults apply when omitted)
    #[arg(long, global = true, env = "SWARM_BIDDER_CONFIG")]
    config: Option<PathBuf>,

    /// Override the scorer named in the config
    #[arg(long, global = true, value_enum)]
    scorer: Option<ScorerArg>,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Read one bid request on stdin and write one bid on stdout.
    ///
    /// Request failures are written as {"error": "..."} and still exit 0.
    /// A config that fails to load writes the same object and exits 1.
    Bid {
        /// Include the scorer's reasoning in the response
        #[arg(long)]
        explain: bool,
    },
    /// Read a job and its candidate systems on stdin and pick one.
    ///
    /// With a trailing command, each candidate is bid on by that external
    /// bidder instead of the built-in scorer.
    Select {
        /// External bidder command line
        #[arg(last = true)]
        bidder: Vec<String>,
    },
    /// Forward one bid request to an external bidder, falling back to the
    /// heuristic when it fails.
    Relay {
        /// Seconds before the external bidder is killed (overrides config)
        #[arg(long)]
        timeout_secs: Option<u64>,
        /// External bidder command line
        #[arg(last = true, required = true)]
        bidder: Vec<String>,
    },
    /// Print the effective configuration as TOML.
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum ScorerArg {
    Heuristic,
    Embedding,
}

impl From<ScorerArg> for ScorerKind {
    fn from(arg: ScorerArg) -> Self {
        match arg {
            ScorerArg::Heuristic => ScorerKind::Heuristic,
            ScorerArg::Embedding => ScorerKind::Embedding,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    // stdout carries the response; logs go to stderr.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<BidderConfig> {
    let mut config = match &cli.config {
        Some(path) => BidderConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => BidderConfig::default(),
    };
    if let Some(scorer) = cli.scorer {
        config.scorer = scorer.into();
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(err) => {
            // Callers reading stdout still get the error object.
            let message = format!("{err:#}");
            match &cli.command {
                Commands::Bid { .. } | Commands::Relay { .. } => {
                    commands::emit(&ErrorResponse::new(message))?
                }
                Commands::Select { .. } => commands::emit(&SelectionErrorResponse::new(message))?,
                Commands::Config => {}
            }
            return Err(err);
        }
    };

    match cli.command {
        Commands::Bid { explain } => {
            let input = commands::read_stdin();
            commands::emit(&commands::bid::respond(input, &config, explain))
        }
        Commands::Select { bidder } => {
            let input = commands::read_stdin();
            let timeout = Duration::from_secs(config.external.timeout_secs);
            commands::emit(&commands::select::respond(input, &config, &bidder, timeout).await)
        }
        Commands::Relay { timeout_secs, bidder } => {
            let input = commands::read_stdin();
            let timeout = Duration::from_secs(timeout_secs.unwrap_or(config.external.timeout_secs));
            commands::emit(&commands::relay::respond(input, &config, &bidder, timeout).await)
        }
        Commands::Config => commands::config::show(&config),
    }
}
