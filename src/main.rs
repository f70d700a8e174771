//! nvim-harvest main entry point
//!
//! This is the command-line interface for the GitHub Code Search harvester.

use anyhow::{anyhow, Context};
use clap::Parser;
use nvim_harvest::config::{load_config_with_hash, Config};
use nvim_harvest::crawler::{run_crawl, CrawlOutcome, QueryCatalog};
use nvim_harvest::{CrawlState, DiskStore};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// nvim-harvest: a resumable GitHub Code Search harvester
///
/// Runs an ordered catalog of overlapping code search queries, downloads one
/// configuration file per unique repository, and persists its progress so an
/// interrupted or rate-limited crawl picks up where it stopped.
#[derive(Parser, Debug)]
#[command(name = "nvim-harvest")]
#[command(version)]
#[command(about = "A resumable GitHub Code Search harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (defaults apply when omitted)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// GitHub token (falls back to the config file, then GH_TOKEN or GITHUB_TOKEN)
    #[arg(long)]
    token: Option<String>,

    /// Stop after this many repositories
    #[arg(long, value_name = "N")]
    max_repos: Option<u64>,

    /// Directory for downloaded files
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Crawl state file
    #[arg(long, value_name = "FILE")]
    state_file: Option<PathBuf>,

    /// Resume from the saved state; this is the default, the flag only makes it explicit
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, ignoring the saved state
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Keep the seen repositories but run the query catalog again from the start
    #[arg(long)]
    reset_queries: bool,

    /// Print the query catalog and exit
    #[arg(long, conflicts_with = "status")]
    show_queries: bool,

    /// Show progress of the saved crawl and exit
    #[arg(long, conflicts_with = "show_queries")]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            let (config, hash) = load_config_with_hash(path)
                .with_context(|| format!("Failed to load {}", path.display()))?;
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            config
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, &cli);

    if cli.show_queries {
        handle_show_queries(&config);
    } else if cli.status {
        handle_status(&config)?;
    } else {
        handle_crawl(config, &cli).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("nvim_harvest=info,warn"),
            1 => EnvFilter::new("nvim_harvest=debug,info"),
            2 => EnvFilter::new("nvim_harvest=trace,debug"),
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

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(max_repos) = cli.max_repos {
        config.crawl.max_repos = max_repos;
    }
    if let Some(dir) = &cli.output_dir {
        config.output.data_dir = dir.clone();
    }
    if let Some(file) = &cli.state_file {
        config.output.state_file = file.clone();
    }
}

/// Picks the first non-empty token from the flag, the config, then the environment
fn resolve_token(cli_token: Option<&str>, config: &Config) -> Option<String> {
    cli_token
        .map(str::to_string)
        .or_else(|| config.github.token.clone())
        .or_else(|| std::env::var("GH_TOKEN").ok())
        .or_else(|| std::env::var("GITHUB_TOKEN").ok())
        .filter(|token| !token.trim().is_empty())
}

/// Handles the --show-queries mode
fn handle_show_queries(config: &Config) {
    let catalog = QueryCatalog::from_config(config.crawl.queries.as_deref());
    println!("{} search queries:\n", catalog.len());
    for (i, query) in catalog.iter().enumerate() {
        println!("  {:2}. {}", i + 1, query);
    }
}

/// Handles the --status mode: summarizes the saved state and the artifact store
fn handle_status(config: &Config) -> anyhow::Result<()> {
    let state = CrawlState::load(&config.output.state_file)?;
    let catalog = QueryCatalog::from_config(config.crawl.queries.as_deref());
    let store = DiskStore::new(&config.output.data_dir, &config.output.extension);
    let cached = store.cached_repos()?;

    println!("State file: {}", config.output.state_file.display());
    println!(
        "  Query: {}/{} (page {})",
        state.query_index.min(catalog.len()),
        catalog.len(),
        state.page
    );
    println!("  Completed queries: {}", state.completed_queries.len());
    println!("  Total fetched: {}", state.total_fetched);
    println!("  Seen repositories: {}", state.seen_repos.len());
    println!("  Failed repositories: {}", state.failed_repos.len());
    println!("\nData directory: {}", store.dir().display());
    println!("  Cached files: {}", cached.len());

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, cli: &Cli) -> anyhow::Result<()> {
    let token = resolve_token(cli.token.as_deref(), &config).ok_or_else(|| {
        anyhow!("A GitHub token is required: pass --token or set GH_TOKEN / GITHUB_TOKEN")
    })?;

    let mut state = if cli.fresh {
        tracing::info!("Starting fresh crawl (ignoring previous state)");
        CrawlState::new()
    } else {
        let state = CrawlState::load(&config.output.state_file)?;
        if state.total_fetched > 0 || state.query_index > 0 {
            tracing::info!(
                "Resuming: query {}, page {}, {} fetched so far",
                state.query_index + 1,
                state.page,
                state.total_fetched
            );
        } else if cli.resume {
            tracing::warn!(
                "Nothing to resume in {}, starting from the first query",
                config.output.state_file.display()
            );
        }
        state
    };

    if cli.reset_queries {
        tracing::info!("Restarting the query catalog, keeping {} seen repositories", state.seen_repos.len());
        state.reset_queries();
    }

    let catalog = QueryCatalog::from_config(config.crawl.queries.as_deref());
    if state.query_index >= catalog.len() {
        println!("All queries completed. Use --reset-queries to run the catalog again.");
        return Ok(());
    }

    let summary = run_crawl(&config, Some(&token), state)
        .await
        .context("Crawl failed")?;

    match summary.outcome {
        CrawlOutcome::Complete => println!("All queries completed."),
        CrawlOutcome::MaxReached => {
            println!("Reached the limit of {} repositories.", config.crawl.max_repos)
        }
        CrawlOutcome::RateLimited { reset_at } => {
            match reset_at {
                Some(at) => println!("Rate limited until {}. Run again to resume.", at.to_rfc3339()),
                None => println!("Rate limited. Run again later to resume."),
            }
        }
        CrawlOutcome::Interrupted => println!("Interrupted. Progress saved; run again to resume."),
    }
    println!(
        "Fetched {} new, {} cached, {} failed ({} total)",
        summary.fetched, summary.cached, summary.failed, summary.total_fetched
    );

    Ok(())
}
