//! Stream driver: reads the source batch by batch, validates each row and
//! folds admitted records into the aggregator, then writes the tables.

use anyhow::Result;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::analyzers::aggregate::MileageAggregator;
use crate::analyzers::report::build_tables;
use crate::analyzers::summary::{ReportKind, render_report, summarize_categories};
use crate::analyzers::types::{CategoryRow, FuelTypeSummary, MileageTables, VehicleTypeSummary};
use crate::config::{OutputPaths, ProcessConfig};
use crate::output::{
    log_drop_reasons, log_summary, read_table, remove_stale_tables, write_run_report, write_tables,
    write_text,
};
use crate::reader::{MileageReader, ParsedRow, detect_encoding, encoding_for_label};
use crate::record::derive_record;
use crate::stats::{RunStats, format_duration, resident_memory_mb};

/// How a processing run ended.
#[derive(Debug)]
pub enum ProcessOutcome {
    /// At least one record was admitted and the tables were written.
    Completed { tables: MileageTables, stats: RunStats },
    /// No record survived validation; no tables exist.
    NoValidData { stats: RunStats },
}

impl ProcessOutcome {
    pub fn stats(&self) -> &RunStats {
        match self {
            ProcessOutcome::Completed { stats, .. } | ProcessOutcome::NoValidData { stats } => stats,
        }
    }
}

/// Validates every row of a batch and folds the survivors into all three keyings.
pub fn fold_batch(aggregator: &mut MileageAggregator, stats: &mut RunStats, batch: Vec<ParsedRow>) {
    for row in batch {
        match row {
            ParsedRow::Malformed => stats.record_malformed(),
            ParsedRow::Record(raw) => match derive_record(&raw) {
                Ok(derived) => {
                    stats.record_admitted(derived.vehicle_id);
                    aggregator.fold(&derived);
                }
                Err(reason) => stats.record_drop(reason),
            },
        }
    }
}

/// Streams the configured source through validation and aggregation.
#[tracing::instrument(
    skip(config),
    fields(input = %config.input.display(), batch_size = config.batch_size)
)]
pub fn aggregate_source(config: &ProcessConfig) -> Result<(MileageAggregator, RunStats)> {
    config.validate()?;

    let primary = encoding_for_label(&config.encoding)?;
    let fallback = encoding_for_label(&config.fallback_encoding)?;
    let detected = detect_encoding(&config.input, primary, fallback)?;

    let mut reader = MileageReader::open(&config.input, detected.encoding)?;
    debug!(columns = ?reader.headers(), "Source columns");

    let mut stats = RunStats::new(&config.input.display().to_string());
    stats.encoding = detected.encoding.name().to_string();
    stats.used_fallback_encoding = detected.used_fallback;

    info!(encoding = %stats.encoding, "Processing source");

    let mut aggregator = MileageAggregator::new();
    let started = Instant::now();

    loop {
        let batch = reader.read_batch(config.batch_size)?;
        if batch.is_empty() {
            break;
        }

        if config.max_batches == Some(stats.batches) {
            info!(max_batches = stats.batches, "Reached maximum batch limit, stopping");
            stats.stopped_early = true;
            break;
        }
        stats.batches += 1;

        fold_batch(&mut aggregator, &mut stats, batch);

        let memory = stats.observe(started.elapsed().as_secs_f64());
        info!(
            batch = stats.batches,
            rows = stats.rows_read,
            admitted = stats.admitted,
            vehicles = stats.distinct_vehicles,
            rows_per_sec = %format!("{:.0}", stats.rows_per_sec),
            memory_mb = ?memory.map(|mb| (mb * 10.0).round() / 10.0),
            "Progress"
        );
    }

    stats.observe(started.elapsed().as_secs_f64());
    let (areas, vehicle_types, fuel_types) = aggregator.group_counts();
    stats.area_groups = areas;
    stats.vehicle_type_groups = vehicle_types;
    stats.fuel_type_groups = fuel_types;

    info!(
        rows = stats.rows_read,
        vehicles = stats.distinct_vehicles,
        elapsed = %format_duration(stats.elapsed_secs),
        "Source exhausted"
    );

    Ok((aggregator, stats))
}

/// Runs the whole pipeline: aggregate the source, finalize, and write outputs.
///
/// A run with no admitted records is not an error: stale tables are removed,
/// the run report is still written, and [`ProcessOutcome::NoValidData`] is returned.
pub fn run(config: &ProcessConfig) -> Result<ProcessOutcome> {
    let (aggregator, mut stats) = aggregate_source(config)?;
    let paths = config.output_paths();

    info!("Calculating final statistics");
    let finalize_started = Instant::now();
    let tables = build_tables(&aggregator);
    drop(aggregator);

    stats.finish();

    if tables.is_empty() {
        warn!(rows = stats.rows_read, "No valid data found");
        remove_stale_tables(&paths)?;
        write_run_report(&paths.run_report, &stats)?;
        log_drop_reasons(&stats);
        return Ok(ProcessOutcome::NoValidData { stats });
    }

    write_tables(&paths, &tables)?;
    write_run_report(&paths.run_report, &stats)?;
    log_summary(&tables, &stats, config.top_n);
    info!(
        memory_mb = ?resident_memory_mb().map(|mb| (mb * 10.0).round() / 10.0),
        elapsed = %format_duration(finalize_started.elapsed().as_secs_f64()),
        "Finalization complete"
    );

    Ok(ProcessOutcome::Completed { tables, stats })
}

/// Writes the per-category summary reports from previously written tables.
///
/// Returns the paths of the reports produced; a missing table is skipped.
#[tracing::instrument(skip(paths))]
pub fn summarize(paths: &OutputPaths) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    if paths.vehicle_types.exists() {
        let rows: Vec<VehicleTypeSummary> = read_table(&paths.vehicle_types)?;
        let summaries = summarize_categories(rows.into_iter().map(CategoryRow::from).collect());
        write_text(&paths.vehicle_summary, &render_report(ReportKind::Vehicle, &summaries))?;
        info!(path = %paths.vehicle_summary.display(), "Summary report saved");
        written.push(paths.vehicle_summary.clone());
    } else {
        warn!(path = %paths.vehicle_types.display(), "Vehicle type table not found, skipping");
    }

    if paths.fuel_types.exists() {
        let rows: Vec<FuelTypeSummary> = read_table(&paths.fuel_types)?;
        let summaries = summarize_categories(rows.into_iter().map(CategoryRow::from).collect());
        write_text(&paths.fuel_summary, &render_report(ReportKind::Fuel, &summaries))?;
        info!(path = %paths.fuel_summary.display(), "Summary report saved");
        written.push(paths.fuel_summary.clone());
    } else {
        warn!(path = %paths.fuel_types.display(), "Fuel type table not found, skipping");
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{DropReason, RawRecord};

    fn raw(id: u64, area: &str, first_use: &str, tested: &str, mileage: &str) -> ParsedRow {
        ParsedRow::Record(RawRecord {
            vehicle_id: id,
            postcode_area: area.to_string(),
            test_mileage: mileage.to_string(),
            first_use_date: first_use.to_string(),
            test_date: tested.to_string(),
            test_class_id: "4".to_string(),
            fuel_type: "PE".to_string(),
        })
    }

    #[test]
    fn test_fold_batch_tallies_every_outcome() {
        let mut aggregator = MileageAggregator::new();
        let mut stats = RunStats::new("test");

        fold_batch(
            &mut aggregator,
            &mut stats,
            vec![
                raw(1, "AB", "2019-01-01", "2023-01-01", "40000"),
                raw(1, "AB", "2019-01-01", "2023-01-01", "20000"),
                raw(2, "CD", "2023-01-01", "2019-01-01", "40000"),
                raw(3, "CD", "garbage", "2019-01-01", "40000"),
                raw(4, "CD", "2019-01-01", "2023-01-01", "9999999"),
                ParsedRow::Malformed,
            ],
        );

        assert_eq!(stats.rows_read, 6);
        assert_eq!(stats.admitted, 2);
        assert_eq!(stats.distinct_vehicles, 1);
        assert_eq!(stats.malformed_rows, 1);
        assert_eq!(stats.dropped[&DropReason::MalformedDate], 1);
        assert_eq!(stats.dropped[&DropReason::NonPositiveOrExcessiveAge], 1);
        assert_eq!(stats.dropped[&DropReason::NonFiniteOrOutOfRangeMileage], 1);
        assert_eq!(aggregator.admitted(), stats.admitted);
        assert!(aggregator.area("CD").is_none());
    }

    #[test]
    fn test_outcome_exposes_stats() {
        let outcome = ProcessOutcome::NoValidData {
            stats: RunStats::new("x"),
        };
        assert_eq!(outcome.stats().source, "x");
    }
}
