use anyhow::Result;
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simple_logger::SimpleLogger;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use time::macros::format_description;

use cord19_etl::{sink, Pipeline, RunConfig};

#[derive(Parser, Clone)]
#[command(name = "CORD-19 ETL")]
#[command(about = "Consolidates CORD-19 metadata and full-text JSON into deduplicated, tagged articles.")]
#[command(version = "1.0.0")]
struct Cli {
    #[arg(short, long, help = "CORD-19 release directory containing metadata.csv", required = true)]
    input: PathBuf,
    #[arg(short, long, help = "Output sink: directory or csv://dir, json://dir, yaml://dir, memory://", required = true)]
    output: String,
    #[arg(short, long, help = "Directory with study design models passed to the annotator")]
    models: Option<PathBuf>,
    #[arg(short, long, help = "Entry dates CSV (defaults to <input>/entry-dates.csv)")]
    entry_dates: Option<PathBuf>,
    #[arg(long, help = "Only store articles tagged as COVID-19")]
    tagged_only: bool,
    #[arg(short, long, default_value = "0", help = "Number of worker threads (0 for auto)")]
    threads: usize,
    #[arg(short, long, default_value = "100", help = "Rows per batch sent to the worker pool")]
    batch_size: usize,
    #[arg(short, long, default_value = "INFO", help = "Logging level (DEBUG, INFO, WARN, ERROR)")]
    log_level: String,
    #[arg(long, help = "Disable the progress spinner")]
    no_progress: bool,
}

fn format_elapsed(elapsed: Duration) -> String {
    let total_secs = elapsed.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{}h {}m {}s", hours, minutes, seconds)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}.{:03}s", seconds, elapsed.subsec_millis())
    }
}

fn main() -> Result<()> {
    let start_time = Instant::now();
    let cli = Cli::parse();

    let log_level = match cli.log_level.to_uppercase().as_str() {
        "DEBUG" => LevelFilter::Debug,
        "INFO" => LevelFilter::Info,
        "WARN" | "WARNING" => LevelFilter::Warn,
        "ERROR" => LevelFilter::Error,
        _ => {
            eprintln!("Invalid log level '{}', defaulting to INFO.", cli.log_level);
            LevelFilter::Info
        }
    };
    SimpleLogger::new()
        .with_level(log_level)
        .with_timestamp_format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .init()?;

    info!("Starting CORD-19 ETL");
    let config = RunConfig::new(&cli.input)
        .with_models(cli.models.clone())
        .with_entry_dates(cli.entry_dates.clone())
        .tagged_only(cli.tagged_only)
        .with_threads(cli.threads)
        .with_batch_size(cli.batch_size)
        .with_progress(!cli.no_progress);
    info!("Input directory: {}", config.input_dir.display());
    info!("Entry dates: {}", config.entry_dates_path().display());
    info!("Output: {}", cli.output);

    let mut output = sink::create(&cli.output)?;
    let summary = match Pipeline::new(config).run(output.as_mut()) {
        Ok(summary) => summary,
        Err(e) => {
            error!("ETL run aborted after {}: {:#}", format_elapsed(start_time.elapsed()), e);
            std::process::exit(1);
        }
    };

    info!("-------------------- FINAL SUMMARY --------------------");
    info!("Total execution time: {}", format_elapsed(start_time.elapsed()));
    info!("Rows read: {}", summary.rows);
    info!("Articles stored: {}", summary.accepted);
    info!("Skipped duplicate ids: {}", summary.duplicate_ids);
    info!("Skipped duplicate hashes: {}", summary.duplicate_hashes);
    if cli.tagged_only {
        info!("Skipped untagged: {}", summary.untagged);
    }
    if summary.failed > 0 {
        warn!("Rows failed and skipped: {}", summary.failed);
    }
    info!("Distinct citations: {}", summary.citations);
    info!("-------------------------------------------------------");

    Ok(())
}
