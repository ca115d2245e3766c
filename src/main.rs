//! Listing-Harvester main entry point
//!
//! This is the command-line interface for the Listing-Harvester.

use clap::Parser;
use listing_harvester::config::{load_config_with_hash, validate, Config};
use listing_harvester::harvester::{harvest_with_unlocker, Jitter, RetryPolicy};
use listing_harvester::output::print_run_summary;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Listing-Harvester: A polite paginated listing harvester
///
/// Listing-Harvester fetches a run of listing pages through an unlocker API,
/// extracts product cards from each page, and appends the products it has
/// not seen before to an NDJSON output file.
#[derive(Parser, Debug)]
#[command(name = "listing-harvester")]
#[command(version = "0.1.0")]
#[command(about = "A polite paginated listing harvester", long_about = None)]
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

    /// Number of pages to harvest (overrides the config file)
    #[arg(long, value_name = "N")]
    pages: Option<u32>,

    /// Maximum pages in flight (overrides the config file)
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Output file (overrides the config file)
    #[arg(long, value_name = "PATH")]
    output: Option<String>,

    /// Listing URL to paginate (overrides the config file)
    #[arg(long, value_name = "URL")]
    start_url: Option<String>,

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the output file and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

impl Cli {
    /// Applies command-line overrides on top of the file configuration
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(pages) = self.pages {
            config.harvest.total_pages = pages;
        }
        if let Some(concurrency) = self.concurrency {
            config.harvest.concurrency_limit = concurrency;
        }
        if let Some(output) = &self.output {
            config.output.output_path = output.clone();
        }
        if let Some(start_url) = &self.start_url {
            config.harvest.start_url = start_url.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            cfg
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    cli.apply_overrides(&mut config);
    if let Err(e) = validate(&config) {
        tracing::error!("Invalid command-line override: {}", e);
        return Err(e.into());
    }

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("listing_harvester=info,warn"),
            1 => EnvFilter::new("listing_harvester=debug,info"),
            2 => EnvFilter::new("listing_harvester=trace,debug"),
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

/// Handles the --dry-run mode: shows the effective settings and retry schedule
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use listing_harvester::url::build_page_requests;

    println!("=== Listing-Harvester Dry Run ===\n");

    println!("Harvest Configuration:");
    println!("  Start URL: {}", config.harvest.start_url);
    println!("  Total pages: {}", config.harvest.total_pages);
    println!("  Concurrency limit: {}", config.harvest.concurrency_limit);
    println!("  Max attempts per page: {}", config.harvest.max_retries);

    println!("\nCourtesy Delay:");
    println!(
        "  {:.2}s + U[{:.2}, {:.2}]s before each page",
        config.throttle.base_delay, config.throttle.random_delay_min, config.throttle.random_delay_max
    );

    println!("\nTransport:");
    println!("  API URL: {}", config.transport.api_url);
    println!("  Zone: {}", config.transport.zone);
    println!("  Timeout: {}s", config.transport.timeout_secs);
    println!("  API key variable: {}", config.transport.api_key_env);

    println!("\nOutput:");
    println!("  File: {}", config.output.output_path);
    if let Some(dir) = &config.output.debug_dir {
        println!("  Debug snapshots: {}", dir);
    }

    let policy = RetryPolicy::from(&config.retry);
    let jitter = Jitter::from_os();
    println!("\nRetry Delay Simulation:");
    for attempt in 1..=5 {
        println!(
            "  after attempt {}: {:.2}s (floor {:.2}s)",
            attempt,
            policy.delay(attempt, &jitter).as_secs_f64(),
            policy.floor(attempt).as_secs_f64()
        );
    }

    let requests = build_page_requests(&config.harvest.start_url, config.harvest.total_pages)?;
    println!("\nPages ({}):", requests.len());
    for request in &requests {
        println!("  {:>3}. {}", request.index(), request.url());
    }

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the --stats mode: shows statistics from the output file
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    use listing_harvester::output::{load_sink_statistics, print_sink_statistics};
    use listing_harvester::storage::NdjsonSink;

    println!("Output file: {}\n", config.output.output_path);

    let sink = NdjsonSink::new(&config.output.output_path);
    let stats = load_sink_statistics(&sink)?;

    print_sink_statistics(&stats);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Harvesting {} pages from {} (concurrency {})",
        config.harvest.total_pages,
        config.harvest.start_url,
        config.harvest.concurrency_limit
    );

    match harvest_with_unlocker(config).await {
        Ok(summary) => {
            tracing::info!("Harvest completed");
            print_run_summary(&summary);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
