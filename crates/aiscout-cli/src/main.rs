/// aiscout CLI - scheduled Data & AI intelligence crawler.
///
/// Entry point for the aiscout binary. Parses CLI arguments, initializes
/// logging, and dispatches to subcommand handlers.
mod commands;

use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Data & AI intelligence crawler
#[derive(Parser)]
#[command(name = "aiscout")]
#[command(version)]
#[command(about = "Multi-source Data & AI intelligence crawler")]
#[command(after_help = "\
Quick start:
  1. create config.toml with your sources and LLM endpoint
  2. aiscout run       — run a full crawl batch
  3. aiscout scrape    — sweep X timelines only")]
struct Cli {
    /// Path to config.toml
    #[arg(short = 'c', long, global = true, default_value = "config.toml")]
    config: String,

    /// Enable verbose logging (debug level)
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a full crawl batch (fetch, enrich, organize, write)
    Run(commands::RunArgs),
    /// Sweep the configured X users and save raw JSON only
    Scrape(commands::ScrapeArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing-subscriber.
    //
    // Priority: RUST_LOG env var > --verbose/--quiet flags > default (info).
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("aiscout=debug,aiscout_core=debug,info")
    } else if cli.quiet {
        EnvFilter::new("error")
    } else {
        EnvFilter::new("aiscout=info,aiscout_core=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(cli.verbose)
        .compact()
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::execute(&cli.config, &args).await,
        Commands::Scrape(args) => commands::scrape::execute(&cli.config, &args).await,
    }
}
