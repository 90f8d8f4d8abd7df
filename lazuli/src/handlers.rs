use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use lazuli_core::config::{AcquisitionMode, ScrapeConfig};
use lazuli_core::scrape::{ScrapeOptions, execute_scrape, generate_scrape_report};
use lazuli_scanner::ExtractionPolicy;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::Level;
use url::Url;

pub fn print_banner() {
    println!(
        "{}",
        r#"
  _                    _ _
 | |    __ _ _____   _| (_)
 | |   / _` |_  / | | | | |
 | |__| (_| |/ /| |_| | | |
 |_____\__,_/___|\__,_|_|_|
"#
        .bright_blue()
        .bold()
    );
    println!("  catalog scraper v{}\n", env!("CARGO_PKG_VERSION"));
}

/// Installs the fmt subscriber. `-q` keeps warnings and errors only, `-v`
/// adds per-step detail.
pub fn init_tracing(quiet: bool, verbose: bool) {
    let level = if quiet {
        Level::WARN
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Builds the run configuration: defaults, then the `--config` file, then
/// flags.
pub fn build_config(args: &ArgMatches) -> Result<ScrapeConfig> {
    let mut config = match args.get_one::<PathBuf>("config") {
        Some(path) => {
            let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
            ScrapeConfig::load(&PathBuf::from(expanded))?
        }
        None => ScrapeConfig::default(),
    };

    if let Some(url) = args.get_one::<Url>("url") {
        config.listing_url = url.to_string();
    }
    if let Some(mode) = args.get_one::<String>("mode") {
        config.mode = AcquisitionMode::parse(mode)
            .with_context(|| format!("Unknown acquisition mode '{}'", mode))?;
    }
    if let Some(output) = args.get_one::<String>("output") {
        config.output = output.clone();
    }
    if let Some(workers) = args.get_one::<usize>("workers") {
        config.pool.workers = *workers;
    }
    if let Some(max_jobs) = args.get_one::<usize>("max-jobs") {
        config.pool.max_jobs = *max_jobs;
    }
    if let Some(scrolls) = args.get_one::<usize>("scrolls") {
        config.discovery.max_scrolls = *scrolls;
    }
    if let Some(timeout) = args.get_one::<u64>("timeout") {
        config.pool.job_timeout_secs = *timeout;
    }
    if args.get_flag("lenient") {
        config.extraction.policy = ExtractionPolicy::Lenient;
    }

    config.validate()?;
    Ok(config)
}

fn print_run_settings(config: &ScrapeConfig) {
    println!("{} {}", "Listing:".bold(), config.listing_url);
    match config.mode {
        AcquisitionMode::Rendered => {
            println!(
                "{} rendered ({} workers, up to {} products, {}s per product)",
                "Mode:".bold(),
                config.pool.workers,
                config.pool.max_jobs,
                config.pool.job_timeout_secs
            );
            let policy = match config.extraction.policy {
                ExtractionPolicy::Strict => "strict (drop products with any failed section)",
                ExtractionPolicy::Lenient => "lenient (keep products, leave failed sections empty)",
            };
            println!("{} {}", "Extraction:".bold(), policy);
        }
        AcquisitionMode::Remote => {
            println!("{} remote capture", "Mode:".bold());
        }
    }
    println!("{} {}\n", "Output:".bold(), config.output_path().display());
}

/// `lazuli run`: scrape, write the CSV, print the summary.
pub async fn handle_run(args: &ArgMatches, quiet: bool, cancel: CancellationToken) -> Result<()> {
    let config = build_config(args)?;
    if !quiet {
        print_run_settings(&config);
    }

    let options = ScrapeOptions {
        config,
        show_progress_bars: !quiet,
    };
    let summary = execute_scrape(options, cancel)
        .await
        .context("Scrape failed")?;

    if !quiet {
        println!("\n{} Scrape complete!\n", "✓".green());
        print!("{}", generate_scrape_report(&summary));
    }
    Ok(())
}
