//! Recrawl-Robot main entry point
//!
//! This is the command-line interface for the Recrawl-Robot.

use anyhow::Context;
use clap::Parser;
use recrawl_robot::config::{load_config_with_hash, Config, SeedConfig};
use recrawl_robot::crawler::{build_http_client, open_store, run_crawl, seed_store};
use recrawl_robot::output::{load_statistics, print_statistics};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Recrawl-Robot: a resumable, polite recrawl robot
///
/// Recrawl-Robot keeps a durable frontier of URLs in SQLite, fetches them one
/// at a time with conditional requests, stores changed documents and
/// reschedules every URL for a future recrawl. Stop it with Ctrl+C; the next
/// run resumes from the database.
#[derive(Parser, Debug)]
#[command(name = "recrawl-robot")]
#[command(version = "1.0.0")]
#[command(about = "A resumable, polite recrawl robot", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be seeded without fetching anything
    #[arg(long, conflicts_with_all = ["stats", "seed_only"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "seed_only"])]
    stats: bool,

    /// Seed an empty frontier and exit without crawling
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    seed_only: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.seed_only {
        handle_seed_only(&config).await?;
    } else {
        handle_crawl(&config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recrawl_robot=info,warn"),
            1 => EnvFilter::new("recrawl_robot=debug,info"),
            2 => EnvFilter::new("recrawl_robot=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: shows the effective configuration
fn handle_dry_run(config: &Config) {
    println!("=== Recrawl-Robot Dry Run ===\n");

    println!("Database: {}", config.database.path.display());

    println!("\nCrawler Configuration:");
    println!("  User agent: {}", config.crawler.user_agent);
    println!("  Timeout: {}s", config.crawler.timeout_secs);
    println!("  Politeness delay: {}ms", config.crawler.delay_ms);
    println!("  Idle poll: {}ms", config.crawler.idle_poll_ms);
    println!("  Recrawl every: {}s", config.crawler.recrawl_every_secs);
    println!(
        "  Backoff: 2^min(tries, {}) s, at most {}s",
        config.crawler.backoff_cap_exponent, config.crawler.max_backoff_secs
    );

    println!("\nText Output:");
    match &config.text.output_dir {
        Some(dir) => println!(
            "  {} (min {} chars)",
            dir.display(),
            config.text.min_chars
        ),
        None => println!("  disabled"),
    }

    println!("\nSources ({}):", config.sources.len());
    for source in &config.sources {
        match &source.seed {
            SeedConfig::SeedFile { path } => {
                println!("  - {}: seed file {}", source.name, path.display())
            }
            SeedConfig::WikiCategory {
                api,
                category,
                max_seed,
                ..
            } => println!(
                "  - {}: category '{}' via {} (max {})",
                source.name,
                category,
                api,
                max_seed.unwrap_or(recrawl_robot::config::DEFAULT_MAX_SEED)
            ),
        }
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.database.path.display());

    let storage = open_store(config).context("failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Returns a token that is cancelled when Ctrl+C is received
fn cancel_on_ctrl_c() -> CancellationToken {
    let token = CancellationToken::new();

    let signal_token = token.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Interrupt received, stopping");
                signal_token.cancel();
            }
            Err(e) => tracing::error!("Failed to listen for Ctrl+C: {}", e),
        }
    });

    token
}

/// Handles the --seed-only mode: seeds an empty frontier and exits
async fn handle_seed_only(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_store(config).context("failed to open database")?;
    let client = build_http_client(&config.crawler)?;
    let token = cancel_on_ctrl_c();

    let offered = seed_store(config, &client, &mut storage, &token).await?;
    println!("✓ Offered {} URLs to the frontier", offered);

    Ok(())
}

/// Handles the main robot loop until Ctrl+C
async fn handle_crawl(config: &Config) -> anyhow::Result<()> {
    let token = cancel_on_ctrl_c();

    let summary = run_crawl(config, token)
        .await
        .context("robot stopped with an error")?;

    tracing::info!(
        "Stopped: {} attempts, {} ok, {} failed",
        summary.attempts,
        summary.successes,
        summary.failures
    );

    Ok(())
}
