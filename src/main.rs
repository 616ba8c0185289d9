//! Koyomi command-line entry point
//!
//! Loads configuration, resolves the password from the environment, runs the
//! extraction pipeline over the requested date range, and hands the merged
//! records to the JSON-lines sink.

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Parser;
use koyomi::config::load_config;
use koyomi::extract::Pipeline;
use koyomi::model::{month_windows, DateWindow};
use koyomi::session::Credentials;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Koyomi: schedule extractor for Cybozu-style groupware
///
/// Logs into the groupware, walks the monthly schedule views for the
/// requested date range, and writes the deduplicated records as JSON lines.
#[derive(Parser, Debug)]
#[command(name = "koyomi")]
#[command(version)]
#[command(about = "Extract schedule records from HTML-only groupware views", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// First day of the requested range (defaults to the 1st of this month)
    #[arg(long, value_name = "YYYY-MM-DD")]
    from: Option<NaiveDate>,

    /// Last day of the requested range (defaults to the end of this month)
    #[arg(long, value_name = "YYYY-MM-DD")]
    to: Option<NaiveDate>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Print a human-readable monthly listing instead of JSON lines on stdout
    #[arg(long)]
    listing: bool,

    /// Validate config and show the window plan without fetching anything
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)?;

    let (from, to) = resolve_range(cli.from, cli.to)?;

    if cli.dry_run {
        return handle_dry_run(&config, from, to);
    }

    let password = std::env::var(&config.login.password_env).with_context(|| {
        format!(
            "password environment variable '{}' is not set",
            config.login.password_env
        )
    })?;
    let credentials = Credentials::new(
        config.login.division.clone(),
        config.login.name.clone(),
        password,
    );

    let output = config.output.clone();
    let user_name = config.login.name.clone();
    let pipeline = Pipeline::new(config, credentials)?;

    // ^C cancels the run; accumulated pages still make it into the output
    let cancel = pipeline.cancel_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling run");
            cancel.cancel();
        }
    });

    let result = pipeline.run(from, to).await?;

    match output.records_path.as_deref() {
        Some(path) if path != "-" => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("failed to create {}", path))?;
            koyomi::output::write_records(&mut file, &result.records)?;
            tracing::info!(records = result.records.len(), path, "records written");
            if cli.listing {
                print_listing(&user_name, from, to, &result.records)?;
            }
        }
        _ if cli.listing => {
            print_listing(&user_name, from, to, &result.records)?;
        }
        _ => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            koyomi::output::write_records(&mut lock, &result.records)?;
        }
    }

    if !result.summary.failed_windows.is_empty() {
        tracing::warn!(
            failed_windows = ?result.summary.failed_windows,
            "run finished with partial results"
        );
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("koyomi=info,warn"),
            1 => EnvFilter::new("koyomi=debug,info"),
            2 => EnvFilter::new("koyomi=trace,debug"),
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

/// Defaults the range to the current calendar month
fn resolve_range(
    from: Option<NaiveDate>,
    to: Option<NaiveDate>,
) -> anyhow::Result<(NaiveDate, NaiveDate)> {
    let today = Local::now().date_naive();
    let this_month = DateWindow::containing(today);

    let from = match from {
        Some(date) => date,
        None => this_month
            .first_day()
            .context("could not resolve the current month")?,
    };
    let to = match to {
        Some(date) => date,
        None => this_month
            .next()
            .first_day()
            .and_then(|d| d.pred_opt())
            .context("could not resolve the current month")?,
    };

    Ok((from, to))
}

/// Prints the month-by-month human-readable listing to stdout
fn print_listing(
    name: &str,
    from: NaiveDate,
    to: NaiveDate,
    records: &[koyomi::model::ScheduleRecord],
) -> anyhow::Result<()> {
    let windows =
        month_windows(from, to).map_err(|message| anyhow::anyhow!("invalid range: {message}"))?;

    for window in windows {
        let monthly: Vec<koyomi::model::ScheduleRecord> = records
            .iter()
            .filter(|record| DateWindow::containing(record.date) == window)
            .cloned()
            .collect();
        print!(
            "{}",
            koyomi::output::format_listing(name, window.year, window.month, &monthly)
        );
    }
    Ok(())
}

/// Handles --dry-run: validates config and prints the window plan
fn handle_dry_run(
    config: &koyomi::config::Config,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<()> {
    let windows =
        month_windows(from, to).map_err(|message| anyhow::anyhow!("invalid range: {message}"))?;

    println!("=== Koyomi Dry Run ===\n");
    println!("Server: {}", config.server.base_url);
    println!("Login: {} / {}", config.login.division, config.login.name);
    println!(
        "Password from environment variable: {}",
        config.login.password_env
    );

    println!("\nExtractor:");
    println!(
        "  Retries per fetch: {}",
        config.extractor.max_retries_per_fetch
    );
    println!(
        "  Backoff: {}ms .. {}ms",
        config.extractor.backoff_initial_ms, config.extractor.backoff_max_ms
    );
    println!(
        "  Re-auth per window: {}",
        config.extractor.max_reauth_per_window
    );
    println!("  Page size hint: {}", config.extractor.page_size_hint);
    println!(
        "  Fetch timeout: {}s",
        config.extractor.fetch_timeout_secs
    );
    println!(
        "  Concurrent windows: {}",
        config.extractor.max_concurrent_windows
    );

    println!("\nRange: {} .. {}", from, to);
    println!("Windows ({}):", windows.len());
    for window in &windows {
        println!("  - {}", window);
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}
