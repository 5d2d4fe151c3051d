//! Streams Prefetcher main entry point
//!
//! This is the command-line interface for the addon stream prefetcher.

use anyhow::{bail, Context};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use streams_prefetcher::catalog::AddonClient;
use streams_prefetcher::config::{format_duration, load_settings, Config, LoadedSettings, RunConfig};
use streams_prefetcher::crawler::Limit;
use streams_prefetcher::job::{JobEngine, JobEvent, JobState, JobStatus};
use streams_prefetcher::output::{generate_markdown_summary, print_summary};
use streams_prefetcher::schedule::{Schedule, ScheduleRunner};
use streams_prefetcher::storage::{open_storage, Storage};
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

/// Streams Prefetcher: warms addon stream caches ahead of playback
///
/// Walks the configured addon catalogs, requests stream metadata for each
/// item so upstream caches are populated, and can nudge the upstream service
/// into preparing streams that are not cached yet.
#[derive(Parser, Debug)]
#[command(name = "streams-prefetcher")]
#[command(version = "1.0.0")]
#[command(about = "Warms addon stream caches ahead of playback", long_about = None)]
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

    /// Run a single job and exit (default when the schedule is disabled)
    #[arg(long, conflicts_with = "daemon")]
    once: bool,

    /// Keep running and start jobs on the configured schedule
    #[arg(long, conflicts_with = "once")]
    daemon: bool,

    /// Validate config and show the run plan without prefetching
    #[arg(long, conflicts_with_all = ["stats", "reset_cache", "export_summary"])]
    dry_run: bool,

    /// Show freshness cache and last run statistics and exit
    #[arg(long, conflicts_with_all = ["dry_run", "reset_cache", "export_summary"])]
    stats: bool,

    /// Forget every freshness record and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "export_summary"])]
    reset_cache: bool,

    /// Write the last run summary as markdown and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "reset_cache"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let LoadedSettings {
        config,
        run: run_config,
        schedule,
        ..
    } = match load_settings(&cli.config) {
        Ok(settings) => {
            tracing::info!(
                "Configuration loaded successfully (hash: {})",
                settings.config_hash
            );
            settings
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.dry_run {
        handle_dry_run(&config, &run_config, &schedule);
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.reset_cache {
        handle_reset_cache(&config)?;
    } else if cli.export_summary {
        handle_export_summary(&config)?;
    } else if cli.daemon || (!cli.once && schedule.is_active()) {
        handle_daemon(&config, run_config, schedule).await?;
    } else {
        handle_once(&config, run_config).await?;
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
            0 => EnvFilter::new("streams_prefetcher=info,warn"),
            1 => EnvFilter::new("streams_prefetcher=debug,info"),
            2 => EnvFilter::new("streams_prefetcher=trace,debug"),
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

fn describe_limit(limit: Limit) -> String {
    match limit {
        Limit::Unlimited => "unlimited".to_string(),
        Limit::AtMost(n) => n.to_string(),
    }
}

/// Handles the --dry-run mode: validates config and shows the run plan
fn handle_dry_run(config: &Config, run: &RunConfig, schedule: &Schedule) {
    println!("=== Streams Prefetcher Dry Run ===\n");

    println!("Limits:");
    println!("  Movies (global): {}", describe_limit(run.limits.movies_global));
    println!("  Series (global): {}", describe_limit(run.limits.series_global));
    println!(
        "  Movies per catalog: {}",
        describe_limit(run.limits.movies_per_catalog)
    );
    println!(
        "  Series per catalog: {}",
        describe_limit(run.limits.series_per_catalog)
    );
    println!(
        "  Items per mixed catalog: {}",
        describe_limit(run.limits.items_per_mixed_catalog)
    );

    println!("\nPacing:");
    println!("  Delay: {}", format_duration(run.delay.as_secs_f64()));
    println!(
        "  Cache validity: {}",
        format_duration(run.cache_validity.as_secs_f64())
    );
    println!(
        "  Max execution time: {}",
        run.max_execution_time
            .map_or_else(|| "Unlimited".to_string(), |d| format_duration(d.as_secs_f64()))
    );

    println!("\nCache warming:");
    if run.warming.enabled {
        println!("  Pattern: {}", config.cache_warming.cached_stream_regex);
        println!("  Per item: {}", run.warming.max_requests_per_item);
        println!("  Global: {}", run.warming.max_requests_global);
        println!("  Threshold: {}", run.warming.cached_streams_threshold);
    } else {
        println!("  Disabled");
    }

    println!("\nOutput:");
    println!("  Database: {}", config.storage.database_path);
    println!("  Summary: {}", config.storage.summary_path);

    println!("\nStream addons ({}):", run.stream_addons.len());
    for addon in &run.stream_addons {
        println!("  - {}", addon);
    }

    let mut catalogs: Vec<_> = run.enabled_catalogs().collect();
    catalogs.sort_by_key(|c| c.order);
    println!("\nCatalogs ({} enabled):", catalogs.len());
    for catalog in &catalogs {
        println!(
            "  {}. {} [{}] {} @ {}",
            catalog.order, catalog.name, catalog.catalog_type, catalog.catalog_id, catalog.addon_url
        );
    }
    if run.randomize_catalogs {
        println!("  (order is randomized at run time)");
    }

    println!("\nSchedule:");
    match schedule.next_trigger_after(&chrono::Local::now()) {
        Some(next) => println!("  Next run: {}", next.format("%Y-%m-%d %H:%M")),
        None => println!("  No scheduled runs"),
    }

    println!("\n✓ Configuration is valid");
    println!("✓ Would prefetch from {} catalogs", catalogs.len());
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    use streams_prefetcher::output::{load_statistics, print_statistics};

    println!("Database: {}\n", config.storage.database_path);

    let storage = open_storage(Path::new(&config.storage.database_path))?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --reset-cache mode: clears the freshness table
fn handle_reset_cache(config: &Config) -> anyhow::Result<()> {
    let mut storage = open_storage(Path::new(&config.storage.database_path))?;
    let removed = storage.clear_freshness()?;

    println!("✓ Removed {} freshness records", removed);
    Ok(())
}

/// Handles the --export-summary mode: writes the last summary as markdown
fn handle_export_summary(config: &Config) -> anyhow::Result<()> {
    println!("=== Exporting Run Summary ===\n");
    println!("Database: {}", config.storage.database_path);
    println!("Output: {}", config.storage.summary_path);
    println!();

    let storage = open_storage(Path::new(&config.storage.database_path))?;

    tracing::info!("Loading last run summary from database...");
    let Some(summary) = storage.get_latest_summary()? else {
        bail!("no finished run has been recorded yet");
    };

    generate_markdown_summary(&summary, Path::new(&config.storage.summary_path))?;

    println!("✓ Summary exported to: {}", config.storage.summary_path);
    Ok(())
}

fn build_engine(config: &Config) -> anyhow::Result<JobEngine> {
    let client = AddonClient::new(&config.http).context("failed to build HTTP client")?;
    Ok(JobEngine::new(
        Arc::new(client),
        PathBuf::from(&config.storage.database_path),
    ))
}

/// Prints the summary of a finished job and writes it as markdown
fn report(state: &JobState, summary_path: &Path) {
    let Some(summary) = &state.summary else {
        if let Some(error) = &state.error {
            tracing::error!("Run failed before it started: {}", error);
        }
        return;
    };

    print_summary(summary);
    if let Err(e) = generate_markdown_summary(summary, summary_path) {
        tracing::warn!("Failed to write summary to {}: {}", summary_path.display(), e);
    }
}

/// Keeps the process alive when its controlling terminal goes away
fn ignore_hangup() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::hangup()) {
            Ok(mut hangup) => {
                tokio::spawn(async move {
                    while hangup.recv().await.is_some() {
                        tracing::info!("Ignoring SIGHUP");
                    }
                });
            }
            Err(e) => tracing::warn!("Failed to install SIGHUP handler: {}", e),
        }
    }
}

/// Handles the --once mode: runs a single job to completion
async fn handle_once(config: &Config, run_config: RunConfig) -> anyhow::Result<()> {
    tracing::info!(
        "Starting prefetch over {} catalogs and {} stream addons",
        run_config.enabled_catalogs().count(),
        run_config.stream_addons.len()
    );

    let engine = build_engine(config)?;
    engine.request_run(run_config)?;

    let finished = engine.wait_until_finished();
    tokio::pin!(finished);

    let state = tokio::select! {
        state = &mut finished => state,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("Interrupted, cancelling after the current item");
            engine.request_cancel();
            finished.await
        }
    };

    report(&state, Path::new(&config.storage.summary_path));

    match state.status {
        JobStatus::Failed => bail!(
            "run failed: {}",
            state.error.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}

/// Handles the --daemon mode: runs jobs on the schedule until interrupted
async fn handle_daemon(
    config: &Config,
    run_config: RunConfig,
    schedule: Schedule,
) -> anyhow::Result<()> {
    if !schedule.is_active() {
        tracing::warn!("Schedule is disabled or empty; no runs will be started");
    }
    ignore_hangup();

    let engine = build_engine(config)?;

    // Report every finished job
    let reporter = {
        let engine = engine.clone();
        let mut events = engine.subscribe_events();
        let summary_path = PathBuf::from(&config.storage.summary_path);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(JobEvent::Finished { .. }) => report(&engine.state(), &summary_path),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        tracing::warn!("Missed {} job events", n);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    };

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let mut runner = ScheduleRunner::new(engine.clone(), schedule, run_config);
    let scheduler = tokio::spawn(async move {
        runner.run(shutdown_rx).await;
    });

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("Shutting down");

    let _ = shutdown_tx.send(());
    if scheduler.await.is_err() {
        tracing::warn!("Scheduler task ended abnormally");
    }

    reporter.abort();
    if engine.status().is_active() {
        engine.request_cancel();
        let state = engine.wait_until_finished().await;
        report(&state, Path::new(&config.storage.summary_path));
    }

    Ok(())
}
