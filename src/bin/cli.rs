//! Scoreboard CLI
//!
//! Local entry point for scraping leaderboard tables into per-target
//! summary files.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use scoreboard::{
    error::Result,
    models::Config,
    pipeline,
    storage::{LocalStorage, SummaryStorage},
    utils::log as console,
};
use tokio_util::sync::CancellationToken;

/// Scoreboard - polite leaderboard scraper
#[derive(Parser, Debug)]
#[command(
    name = "scoreboard",
    version,
    about = "Polite, concurrent scraper for paginated leaderboard tables"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "data/config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only print errors and the final summary
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scrape every target and write one summary file per target
    Scrape {
        /// Target list CSV (Boss_Name,URL)
        #[arg(long)]
        targets: Option<PathBuf>,

        /// Header profile CSV
        #[arg(long)]
        headers: Option<PathBuf>,

        /// Output directory for summaries
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Number of concurrent workers
        #[arg(short, long)]
        workers: Option<usize>,

        /// Maximum pages fetched per target
        #[arg(long)]
        max_pages: Option<u32>,
    },

    /// Validate configuration and input files
    Validate,
}

/// Initialize logging based on verbosity flags.
fn init_logging(verbose: bool, quiet: bool) {
    let level = match (verbose, quiet) {
        (true, _) => "debug",
        (false, true) => "error",
        (false, false) => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Cancel `token` on the first Ctrl-C.
fn cancel_on_interrupt(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            console::clear_line();
            log::warn!("Interrupt received, finishing in-flight work...");
            token.cancel();
        }
    });
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load_or_default(&cli.config);
    console::init(if cli.quiet {
        "error"
    } else {
        config.logging.level.as_str()
    });
    log::info!("Loaded configuration from {}", cli.config.display());

    match cli.command {
        Command::Scrape {
            targets,
            headers,
            output,
            workers,
            max_pages,
        } => {
            if let Some(path) = targets {
                config.paths.targets_file = path.display().to_string();
            }
            if let Some(path) = headers {
                config.paths.headers_file = path.display().to_string();
            }
            if let Some(path) = output {
                config.paths.output_dir = path.display().to_string();
            }
            if let Some(n) = workers {
                config.scraper.worker_count = n;
            }
            if let Some(n) = max_pages {
                config.scraper.max_pages_per_target = n;
            }
            if cli.quiet {
                config.logging.show_progress = false;
            }

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }

            let cancel = CancellationToken::new();
            cancel_on_interrupt(cancel.clone());

            let storage: Arc<dyn SummaryStorage> =
                Arc::new(LocalStorage::new(&config.paths.output_dir));
            let report = pipeline::run_scraper(&config, storage, cancel).await?;

            if report.interrupted {
                log::warn!("Run interrupted; partial results saved");
            }
        }

        Command::Validate => {
            let storage = LocalStorage::new(&config.paths.output_dir);
            pipeline::run_validate(&config, &storage).await?;
            log::info!("All validations passed!");
        }
    }

    Ok(())
}
