//! Tether-Crawl main entry point
//!
//! This is the command-line interface for the Tether-Crawl site crawler.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tether_crawl::config::{load_config_with_hash, Config};
use tether_crawl::crawler::{CrawlService, CrawlStatus, StartOutcome};
use tether_crawl::storage::open_store;
use tracing_subscriber::EnvFilter;

/// How often progress is logged while crawls run
const PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

/// Tether-Crawl: a domain-scoped, resumable web crawler
///
/// Tether-Crawl crawls each configured site from its seed URL, stays within the
/// site's allowed hosts, respects robots.txt, and persists its frontier so an
/// interrupted crawl resumes where it left off.
#[derive(Parser, Debug)]
#[command(name = "tether-crawl")]
#[command(version)]
#[command(about = "A domain-scoped, resumable web crawler", long_about = None)]
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

    /// Forget previous progress of every configured project before crawling
    #[arg(long, conflicts_with_all = ["dry_run", "status"])]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "status")]
    dry_run: bool,

    /// Show pending/visited counts from the frontier store and exit
    #[arg(long, conflicts_with = "dry_run")]
    status: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.status {
        handle_status(&config)
    } else {
        handle_crawl(&config, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("tether_crawl=info,warn"),
            1 => EnvFilter::new("tether_crawl=debug,info"),
            2 => EnvFilter::new("tether_crawl=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Tether-Crawl Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Default workers: {}", config.crawler.thread_count);
    println!("  Default crawl limit: {}", config.crawler.crawl_limit);
    println!("  Fetch timeout: {}s", config.crawler.fetch_timeout_secs);
    println!("  Robots timeout: {}s", config.crawler.robots_timeout_secs);
    println!("  Dequeue wait: {}ms", config.crawler.dequeue_wait_ms);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nStorage:");
    println!("  Backend: {:?}", config.storage.backend);
    println!("  Path: {}", config.storage.path);

    let requests = config.project_requests();
    println!("\nProjects ({}):", requests.len());
    for request in &requests {
        let project = tether_crawl::CrawlProject::new(request)?;
        println!("  - {} (seed {})", project.name(), project.seed_url());
        println!(
            "    workers: {}, crawl limit: {}",
            project.thread_count(),
            project.crawl_limit()
        );
        let hosts: Vec<&str> = project.allowed_hosts().iter().map(String::as_str).collect();
        println!("    allowed hosts: {}", hosts.join(", "));
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would start crawling {} projects", requests.len());

    Ok(())
}

/// Handles the --status mode: shows persisted frontier counts per project
fn handle_status(config: &Config) -> anyhow::Result<()> {
    let store = open_store(&config.storage).context("Failed to open frontier store")?;

    println!("Frontier store: {} ({:?})\n", config.storage.path, config.storage.backend);

    for request in config.project_requests() {
        let project = tether_crawl::CrawlProject::new(&request)?;
        let counts = store.counts(project.name())?;
        println!(
            "{}: {} visited, {} pending (limit {})",
            project.name(),
            counts.visited,
            counts.pending,
            project.crawl_limit()
        );
    }

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: &Config, fresh: bool) -> anyhow::Result<()> {
    let service = CrawlService::from_config(config).context("Failed to initialize crawler")?;
    let requests = config.project_requests();

    if requests.is_empty() {
        tracing::warn!("No [[project]] entries configured, nothing to crawl");
        return Ok(());
    }

    for request in &requests {
        if fresh {
            let project = tether_crawl::CrawlProject::new(request)?;
            tracing::info!("[{}] Clearing previous progress", project.name());
            service.store().clear(project.name())?;
        }

        match service.start(request).await {
            Ok(StartOutcome::Started { project, queued }) => {
                tracing::debug!("[{}] Started with {} queued URLs", project, queued)
            }
            Ok(StartOutcome::AlreadyRunning { project }) => {
                tracing::debug!("[{}] Already running", project)
            }
            Err(e) => tracing::error!("Failed to start crawl of {}: {}", request.seed, e),
        }
    }

    let finished = service.wait_all();
    tokio::pin!(finished);
    let mut progress = tokio::time::interval(PROGRESS_INTERVAL);
    progress.tick().await;

    loop {
        tokio::select! {
            _ = &mut finished => break,
            _ = progress.tick() => {
                for status in service.statuses().await {
                    log_progress(&status);
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                tracing::info!("Interrupted, stopping all crawls");
                service.stop_all().await?;
                break;
            }
        }
    }

    println!("\n=== Crawl Summary ===");
    for status in service.statuses().await {
        println!(
            "{}: {} visited, {} pending ({})",
            status.project,
            status.visited_count,
            status.pending_count,
            status
                .stop_reason
                .map(|r| format!("{:?}", r))
                .unwrap_or_else(|| status.state.as_str().to_string())
        );
    }

    Ok(())
}

fn log_progress(status: &CrawlStatus) {
    if status.running {
        tracing::info!(
            "[{}] {}: {} visited, {} pending, {} queued, {} workers",
            status.project,
            status.state.as_str(),
            status.visited_count,
            status.pending_count,
            status.queued_count,
            status.live_workers
        );
    }
}
