//! CLI entry point for the yearly mileage aggregator.
//!
//! Provides subcommands for processing a vehicle-test results file into
//! per-area mileage tables and for summarising the written tables.

use anyhow::Result;
use clap::{Parser, Subcommand};
use mileage_by_area::config::{
    DEFAULT_BATCH_SIZE, DEFAULT_ENCODING, DEFAULT_FALLBACK_ENCODING, DEFAULT_OUTPUT_DIR,
    DEFAULT_TOP_N, DEFAULT_YEAR, OutputPaths, ProcessConfig, default_input,
};
use mileage_by_area::pipeline::{ProcessOutcome, run, summarize};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "mileage_by_area")]
#[command(about = "Aggregate yearly vehicle mileage by postcode area", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream a pipe-delimited test results file into mileage tables
    Process {
        /// Source file (`.gz` is decompressed on the fly); defaults to INPUT/test_result_<year>.csv
        #[arg(short, long, env = "MILEAGE_INPUT")]
        input: Option<PathBuf>,

        /// Directory the tables and run report are written to
        #[arg(short, long, env = "MILEAGE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Test year, used in the default input and output file names
        #[arg(short, long, env = "MILEAGE_YEAR", default_value_t = DEFAULT_YEAR)]
        year: u16,

        /// Rows read per batch
        #[arg(short, long, env = "MILEAGE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE)]
        batch_size: usize,

        /// Optional: stop after this many batches
        #[arg(long, env = "MILEAGE_MAX_BATCHES")]
        max_batches: Option<u64>,

        /// Encoding tried first
        #[arg(long, env = "MILEAGE_ENCODING", default_value = DEFAULT_ENCODING)]
        encoding: String,

        /// Encoding used when the first one cannot decode the source
        #[arg(long, env = "MILEAGE_FALLBACK_ENCODING", default_value = DEFAULT_FALLBACK_ENCODING)]
        fallback_encoding: String,

        /// Number of top areas shown in the console summary
        #[arg(long, default_value_t = DEFAULT_TOP_N)]
        top: usize,
    },
    /// Write per vehicle-type and fuel-type summary reports from processed tables
    Summarize {
        /// Directory containing the processed tables
        #[arg(short, long, env = "MILEAGE_OUTPUT_DIR", default_value = DEFAULT_OUTPUT_DIR)]
        output_dir: PathBuf,

        /// Test year of the tables to summarise
        #[arg(short, long, env = "MILEAGE_YEAR", default_value_t = DEFAULT_YEAR)]
        year: u16,
    },
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/mileage_by_area.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("mileage_by_area.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Process {
            input,
            output_dir,
            year,
            batch_size,
            max_batches,
            encoding,
            fallback_encoding,
            top,
        } => {
            let config = ProcessConfig {
                input: input.unwrap_or_else(|| default_input(year)),
                output_dir,
                year,
                batch_size,
                max_batches,
                encoding,
                fallback_encoding,
                top_n: top,
            };

            match run(&config)? {
                ProcessOutcome::Completed { tables, .. } => {
                    info!(
                        areas = tables.areas.len(),
                        vehicle_type_rows = tables.vehicle_types.len(),
                        fuel_type_rows = tables.fuel_types.len(),
                        "Done"
                    );
                }
                ProcessOutcome::NoValidData { stats } => {
                    info!(rows = stats.rows_read, "No valid data found");
                }
            }
        }
        Commands::Summarize { output_dir, year } => {
            let paths = OutputPaths::new(&output_dir, year);
            let written = summarize(&paths)?;
            info!(reports = written.len(), "Analysis complete");
        }
    }

    Ok(())
}
