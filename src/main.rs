//! Catalog-Harvester main entry point
//!
//! This is the command-line interface for the Catalog-Harvester crawler.

use anyhow::Context;
use catalog_harvester::config::{load_config_with_hash, validate, ClaimPolicy, Config};
use catalog_harvester::crawler::{Orchestrator, OrchestratorSettings};
use catalog_harvester::download::{DownloadPipeline, DownloadSettings};
use catalog_harvester::notify::{Notifier, WebhookNotifier};
use catalog_harvester::output::{
    load_statistics, print_statistics, read_report_links, write_markdown_summary, HtmlReport,
};
use catalog_harvester::source::{
    build_http_client, HttpBlobFetcher, HttpPageLister, HttpRecordProcessor,
};
use catalog_harvester::state::RunStats;
use catalog_harvester::storage::SqliteStorage;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog-Harvester: a resumable catalog crawler
///
/// Catalog-Harvester walks a paginated catalog, collects the attachments of
/// every record and stores each distinct file exactly once, numbered in the
/// order it was committed. Repeated runs pick up where earlier ones left off.
#[derive(Parser, Debug)]
#[command(name = "catalog-harvester")]
#[command(version = "1.0.0")]
#[command(about = "A resumable catalog crawler and attachment downloader", long_about = None)]
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

    /// First catalog page to list (overrides crawler.start-page)
    #[arg(long, value_name = "N")]
    start_page: Option<u32>,

    /// Last catalog page to list (overrides crawler.end-page)
    #[arg(long, value_name = "N")]
    end_page: Option<u32>,

    /// Workers and concurrent sessions (overrides both crawler settings)
    #[arg(long, value_name = "N")]
    concurrency: Option<u32>,

    /// Log what would be downloaded without fetching or numbering anything
    #[arg(long)]
    simulate: bool,

    /// Release a record's claim when its processing is exhausted
    #[arg(long)]
    claim_on_success: bool,

    /// Download the attachments listed in an existing HTML report and exit
    #[arg(long, value_name = "FILE", conflicts_with_all = ["dry_run", "stats"])]
    from_report: Option<PathBuf>,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "from_report"])]
    stats: bool,

    /// Validate config and show what would be harvested without harvesting
    #[arg(long, conflicts_with_all = ["stats", "from_report"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load configuration {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    apply_overrides(&mut config, &cli);
    validate(&config).context("Invalid command-line overrides")?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if let Some(report) = &cli.from_report {
        handle_from_report(&config, report).await?;
    } else {
        handle_harvest(config, &config_hash).await?;
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
            0 => EnvFilter::new("catalog_harvester=info,warn"),
            1 => EnvFilter::new("catalog_harvester=debug,info"),
            2 => EnvFilter::new("catalog_harvester=trace,debug"),
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

/// Command-line flags win over the configuration file
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(start) = cli.start_page {
        config.crawler.start_page = start;
    }
    if let Some(end) = cli.end_page {
        config.crawler.end_page = Some(end);
    }
    if let Some(n) = cli.concurrency {
        config.crawler.workers = n;
        config.crawler.max_concurrent_sessions = n;
    }
    if cli.simulate {
        config.download.simulate = true;
    }
    if cli.claim_on_success {
        config.crawler.claim_policy = ClaimPolicy::OnSuccess;
    }
}

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) {
    println!("=== Catalog-Harvester Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Start page: {}", config.crawler.start_page);
    match config.crawler.end_page {
        Some(end) => println!("  End page: {}", end),
        None => println!("  End page: first empty page"),
    }
    println!("  Workers: {}", config.crawler.workers);
    println!(
        "  Max concurrent sessions: {}",
        config.crawler.max_concurrent_sessions
    );
    println!("  Claim policy: {:?}", config.crawler.claim_policy);

    println!("\nRetry:");
    for (name, retry) in [
        ("discovery", &config.retry.discovery),
        ("processing", &config.retry.processing),
    ] {
        println!(
            "  {}: {} attempts, {}-{}ms between attempts",
            name, retry.max_attempts, retry.min_delay_ms, retry.max_delay_ms
        );
    }

    println!("\nSource:");
    println!("  Listing URL: {}", config.source.listing_url);
    println!("  Record selector: {}", config.source.record_selector);
    println!("  Document selector: {}", config.source.document_selector);

    println!("\nDownloads:");
    if config.download.enabled {
        println!("  Output directory: {}", config.download.output_dir);
        println!(
            "  Concurrent downloads: {}",
            config.download.max_concurrent_downloads
        );
        if config.download.keywords.is_empty() {
            println!("  Keywords: (all attachments)");
        } else {
            println!("  Keywords: {}", config.download.keywords.join(", "));
        }
        if config.download.simulate {
            println!("  Simulate: nothing will be fetched");
        }
    } else {
        println!("  Disabled");
    }

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Report: {}", config.output.report_path);
    if let Some(summary) = &config.output.summary_path {
        println!("  Summary: {}", summary);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = SqliteStorage::new(Path::new(&config.output.database_path))
        .context("Failed to open database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles --from-report: replays the downloads listed in a report
async fn handle_from_report(config: &Config, report: &Path) -> anyhow::Result<()> {
    let items = read_report_links(report)
        .await
        .with_context(|| format!("Failed to read report {}", report.display()))?;
    tracing::info!("{} attachments listed in {}", items.len(), report.display());

    let store = Arc::new(
        SqliteStorage::new(Path::new(&config.output.database_path))
            .context("Failed to open database")?,
    );
    let client = build_http_client(&config.user_agent, config.source.request_timeout_secs)
        .context("Failed to build HTTP client")?;
    let pipeline = DownloadPipeline::new(
        DownloadSettings::from_config(&config.download),
        store,
        Arc::new(HttpBlobFetcher::new(client)),
    )
    .await?;

    let stats = RunStats::new();
    pipeline.download_all(&items, &stats).await;

    let snapshot = stats.snapshot();
    tracing::info!(
        "Report replay finished: {} saved, {} duplicates, {} failed, {} filtered",
        snapshot.files_saved,
        snapshot.files_duplicate,
        snapshot.files_failed,
        snapshot.files_filtered
    );
    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config, config_hash: &str) -> anyhow::Result<()> {
    let store = Arc::new(
        SqliteStorage::new(Path::new(&config.output.database_path))
            .context("Failed to open database")?,
    );
    let client = build_http_client(&config.user_agent, config.source.request_timeout_secs)
        .context("Failed to build HTTP client")?;

    let lister = Arc::new(HttpPageLister::new(client.clone(), &config.source)?);
    let processor = Arc::new(HttpRecordProcessor::new(client.clone(), &config.source)?);
    let report = Arc::new(
        HtmlReport::new(Path::new(&config.output.report_path))
            .context("Failed to prepare report file")?,
    );

    let mut orchestrator = Orchestrator::new(
        OrchestratorSettings::from_config(&config),
        store.clone(),
        lister,
        processor,
        report,
    );

    if config.download.enabled {
        let pipeline = DownloadPipeline::new(
            DownloadSettings::from_config(&config.download),
            store.clone(),
            Arc::new(HttpBlobFetcher::new(client.clone())),
        )
        .await?;
        orchestrator = orchestrator.with_downloader(Arc::new(pipeline));
    } else {
        tracing::info!("Downloads disabled, only the report will be written");
    }

    let summary = orchestrator.run(config_hash).await?;

    if let Some(path) = &config.output.summary_path {
        let written = load_statistics(store.as_ref())
            .map_err(anyhow::Error::from)
            .and_then(|totals| {
                write_markdown_summary(&summary, &totals, Path::new(path))
                    .map_err(anyhow::Error::from)
            });
        match written {
            Ok(()) => tracing::info!("Summary written to {}", path),
            Err(e) => tracing::warn!("Could not write summary to {}: {}", path, e),
        }
    }

    if let Some(url) = &config.notify.webhook_url {
        WebhookNotifier::new(client, url.clone())
            .send(&summary.headline())
            .await;
    }

    Ok(())
}
