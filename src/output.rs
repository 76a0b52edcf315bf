//! Output persistence and console reporting for mileage tables.
//!
//! Tables are written as CSV with a header row, replacing any earlier file.

use anyhow::{Context, Result};
use csv::WriterBuilder;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

use crate::analyzers::summary::thousands;
use crate::analyzers::types::MileageTables;
use crate::analyzers::utility::mean;
use crate::config::OutputPaths;
use crate::stats::{RunStats, format_duration};

/// Writes `rows` to a CSV file at `path`, overwriting it.
pub fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    debug!(path = %path.display(), rows = rows.len(), "Writing table");

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let mut writer = WriterBuilder::new()
        .has_headers(true)
        .from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    Ok(())
}

/// Reads a table written by [`write_table`] back into rows.
pub fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut rows = Vec::new();
    for result in reader.deserialize() {
        let row: T = result.with_context(|| format!("Bad row in {}", path.display()))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Writes all three tables to their well-known locations.
pub fn write_tables(paths: &OutputPaths, tables: &MileageTables) -> Result<()> {
    write_table(&paths.areas, &tables.areas)?;
    write_table(&paths.vehicle_types, &tables.vehicle_types)?;
    write_table(&paths.fuel_types, &tables.fuel_types)?;

    info!(path = %paths.areas.display(), "Area statistics saved");
    info!(path = %paths.vehicle_types.display(), "Vehicle type statistics saved");
    info!(path = %paths.fuel_types.display(), "Fuel type statistics saved");
    Ok(())
}

/// Deletes tables left over from an earlier run so no stale results remain.
pub fn remove_stale_tables(paths: &OutputPaths) -> Result<()> {
    for path in paths.tables() {
        if path.exists() {
            fs::remove_file(path)
                .with_context(|| format!("Failed to remove {}", path.display()))?;
            info!(path = %path.display(), "Removed stale table");
        }
    }
    Ok(())
}

/// Writes the run statistics as pretty-printed JSON.
pub fn write_run_report(path: &Path, stats: &RunStats) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(stats)?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;

    debug!(path = %path.display(), "Run report written");
    Ok(())
}

/// Writes a plain-text report, overwriting any earlier one.
pub fn write_text(path: &Path, text: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))
}

/// Logs a human-readable digest of the finished run.
pub fn log_summary(tables: &MileageTables, stats: &RunStats, top_n: usize) {
    info!(areas = tables.areas.len(), "Processing complete");

    for area in tables.areas.iter().take(top_n) {
        info!(
            postcode_area = %area.postcode_area,
            average = %format!("{:.0}", area.average_yearly_mileage),
            min = %format!("{:.2}", area.min_yearly_mileage),
            max = %format!("{:.0}", area.max_yearly_mileage),
            p5 = %format!("{:.0}", area.percentile_5),
            p95 = %format!("{:.0}", area.percentile_95),
            vehicles = area.vehicle_count,
            "Top area by average yearly mileage"
        );
    }

    for row in tables.vehicle_types.iter().take(top_n * 2) {
        info!(
            postcode_area = %row.postcode_area,
            vehicle_type = %row.vehicle_type,
            average = %format!("{:.0}", row.average_yearly_mileage),
            vehicles = row.vehicle_count,
            "Vehicle type sample"
        );
    }

    for row in tables.fuel_types.iter().take(top_n * 2) {
        info!(
            postcode_area = %row.postcode_area,
            fuel_type = %row.fuel_type,
            average = %format!("{:.0}", row.average_yearly_mileage),
            vehicles = row.vehicle_count,
            "Fuel type sample"
        );
    }

    let averages: Vec<f64> = tables.areas.iter().map(|a| a.average_yearly_mileage).collect();
    info!(
        average = %format!("{:.0}", mean(&averages)),
        "Average yearly mileage across all areas"
    );

    // areas are ranked highest first
    if let (Some(highest), Some(lowest)) = (tables.areas.first(), tables.areas.last()) {
        info!(
            postcode_area = %highest.postcode_area,
            average = %format!("{:.0}", highest.average_yearly_mileage),
            "Highest average yearly mileage"
        );
        info!(
            postcode_area = %lowest.postcode_area,
            average = %format!("{:.0}", lowest.average_yearly_mileage),
            "Lowest average yearly mileage"
        );
    }

    info!(
        total_vehicles = %thousands(tables.total_vehicles()),
        distinct_vehicles = stats.distinct_vehicles,
        "Total vehicles processed"
    );
    log_drop_reasons(stats);
}

/// Logs how many rows were rejected and why.
pub fn log_drop_reasons(stats: &RunStats) {
    info!(
        rows_read = stats.rows_read,
        admitted = stats.admitted,
        admitted_pct = %format!("{:.1}", stats.admitted_pct()),
        malformed = stats.malformed_rows,
        "Row outcomes"
    );
    for (reason, count) in &stats.dropped {
        info!(reason = %reason, count, "Dropped rows");
    }
    info!(
        elapsed = %format_duration(stats.elapsed_secs),
        peak_memory_mb = ?stats.peak_memory_mb,
        "Run totals"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzers::types::{AreaSummary, FuelTypeSummary};
    use std::path::PathBuf;

    fn area(name: &str, average: f64) -> AreaSummary {
        AreaSummary {
            postcode_area: name.to_string(),
            average_yearly_mileage: average,
            min_yearly_mileage: average,
            max_yearly_mileage: average,
            percentile_5: average,
            percentile_95: average,
            vehicle_count: 1,
        }
    }

    #[test]
    fn test_write_table_header_and_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/areas.csv");

        write_table(&path, &[area("AB", 10_000.0), area("CD", 5_000.0)]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<_> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "postcode_area,average_yearly_mileage,min_yearly_mileage,max_yearly_mileage,percentile_5,percentile_95,vehicle_count"
        );
        assert!(lines[1].starts_with("AB,10000"));
    }

    #[test]
    fn test_write_table_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("areas.csv");

        write_table(&path, &[area("AB", 1.0), area("CD", 2.0)]).unwrap();
        write_table(&path, &[area("EF", 3.0)]).unwrap();

        let rows: Vec<AreaSummary> = read_table(&path).unwrap();
        assert_eq!(rows, vec![area("EF", 3.0)]);
    }

    #[test]
    fn test_fuel_table_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fuel.csv");
        let rows = [FuelTypeSummary {
            postcode_area: "AB".to_string(),
            fuel_type: "DI".to_string(),
            average_yearly_mileage: 1.0,
            min_yearly_mileage: 1.0,
            max_yearly_mileage: 1.0,
            percentile_5: 1.0,
            percentile_95: 1.0,
            vehicle_count: 1,
        }];
        write_table(&path, &rows).unwrap();

        let header = fs::read_to_string(&path).unwrap();
        assert!(header.starts_with(
            "postcode_area,fuel_type,average_yearly_mileage,min_yearly_mileage,max_yearly_mileage,percentile_5,percentile_95,vehicle_count\n"
        ));
    }

    #[test]
    fn test_remove_stale_tables() {
        let dir = tempfile::tempdir().unwrap();
        let paths = OutputPaths::new(dir.path(), 2023);
        write_table(&paths.areas, &[area("AB", 1.0)]).unwrap();

        remove_stale_tables(&paths).unwrap();
        assert!(!paths.areas.exists());
        // nothing to remove is fine
        remove_stale_tables(&paths).unwrap();
    }

    #[test]
    fn test_write_run_report() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("run_report.json");
        let mut stats = RunStats::new("input.csv");
        stats.record_admitted(9);

        write_run_report(&path, &stats).unwrap();

        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["admitted"], 1);
        assert_eq!(value["source"], "input.csv");
    }

    #[test]
    fn test_log_summary_does_not_panic() {
        let tables = MileageTables {
            areas: vec![area("AB", 2.0), area("CD", 1.0)],
            ..Default::default()
        };
        log_summary(&tables, &RunStats::new("input.csv"), 5);
        log_summary(&MileageTables::default(), &RunStats::default(), 5);
    }
}
