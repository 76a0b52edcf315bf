use flate2::Compression;
use flate2::write::GzEncoder;
use mileage_by_area::analyzers::types::{AreaSummary, FuelTypeSummary, VehicleTypeSummary};
use mileage_by_area::config::ProcessConfig;
use mileage_by_area::output::read_table;
use mileage_by_area::pipeline::{ProcessOutcome, run, summarize};
use mileage_by_area::record::DropReason;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const SAMPLE: &str = "tests/fixtures/test_results_sample.csv";

const HEADER: &str = "test_id|vehicle_id|test_date|test_class_id|test_type|test_result|test_mileage|postcode_area|make|model|colour|fuel_type|cylinder_capacity|first_use_date\n";

fn config(input: impl Into<PathBuf>, out: &Path) -> ProcessConfig {
    ProcessConfig::new(input, out)
}

fn completed(outcome: ProcessOutcome) -> mileage_by_area::analyzers::types::MileageTables {
    match outcome {
        ProcessOutcome::Completed { tables, .. } => tables,
        ProcessOutcome::NoValidData { .. } => panic!("expected tables"),
    }
}

#[test]
fn test_full_pipeline_on_sample() {
    let out = tempfile::tempdir().unwrap();
    let cfg = config(SAMPLE, out.path());

    let outcome = run(&cfg).expect("pipeline failed");
    let stats = outcome.stats();
    assert_eq!(stats.rows_read, 12);
    assert_eq!(stats.admitted, 7);
    assert_eq!(stats.distinct_vehicles, 6);
    assert_eq!(stats.malformed_rows, 1);
    assert_eq!(stats.dropped[&DropReason::MalformedDate], 1);
    assert_eq!(stats.dropped[&DropReason::NonPositiveOrExcessiveAge], 2);
    assert_eq!(stats.dropped[&DropReason::NonFiniteOrOutOfRangeMileage], 1);
    assert!(!stats.used_fallback_encoding);

    let tables = completed(outcome);
    assert_eq!(tables.total_vehicles(), 7);

    let order: Vec<_> = tables.areas.iter().map(|a| a.postcode_area.as_str()).collect();
    assert_eq!(order, ["EF", "AB", "CD"]);

    let ab = &tables.areas[1];
    assert_eq!(ab.vehicle_count, 4);
    assert!((ab.average_yearly_mileage - 12_750.0).abs() < 1e-6);
    assert_eq!(ab.min_yearly_mileage, 9_000.0);
    assert_eq!(ab.max_yearly_mileage, 20_000.0);

    let vt: Vec<_> = tables
        .vehicle_types
        .iter()
        .map(|r| (r.postcode_area.as_str(), r.vehicle_type.as_str(), r.vehicle_count))
        .collect();
    assert_eq!(vt, [("AB", "7", 1), ("AB", "4", 3), ("CD", "4", 2), ("EF", "4", 1)]);

    let diesel = tables
        .fuel_types
        .iter()
        .find(|r| r.postcode_area == "AB" && r.fuel_type == "DI")
        .unwrap();
    assert_eq!(diesel.vehicle_count, 2);
    assert!((diesel.average_yearly_mileage - 16_000.0).abs() < 1e-6);
    assert_eq!(diesel.min_yearly_mileage, 12_000.0);
    assert_eq!(diesel.max_yearly_mileage, 20_000.0);
}

#[test]
fn test_written_tables_match_returned_tables() {
    let out = tempfile::tempdir().unwrap();
    let cfg = config(SAMPLE, out.path());
    let tables = completed(run(&cfg).unwrap());
    let paths = cfg.output_paths();

    let areas: Vec<AreaSummary> = read_table(&paths.areas).unwrap();
    let vehicle_types: Vec<VehicleTypeSummary> = read_table(&paths.vehicle_types).unwrap();
    let fuel_types: Vec<FuelTypeSummary> = read_table(&paths.fuel_types).unwrap();

    assert_eq!(areas.len(), tables.areas.len());
    assert_eq!(vehicle_types.len(), tables.vehicle_types.len());
    assert_eq!(fuel_types.len(), tables.fuel_types.len());
    assert!(paths.run_report.exists());
}

#[test]
fn test_counts_conserved_across_tables() {
    let out = tempfile::tempdir().unwrap();
    let tables = completed(run(&config(SAMPLE, out.path())).unwrap());

    for area in &tables.areas {
        let by_type: u64 = tables
            .vehicle_types
            .iter()
            .filter(|r| r.postcode_area == area.postcode_area)
            .map(|r| r.vehicle_count)
            .sum();
        let by_fuel: u64 = tables
            .fuel_types
            .iter()
            .filter(|r| r.postcode_area == area.postcode_area)
            .map(|r| r.vehicle_count)
            .sum();
        assert_eq!(by_type, area.vehicle_count);
        assert_eq!(by_fuel, area.vehicle_count);
        assert!(area.min_yearly_mileage <= area.percentile_5);
        assert!(area.percentile_95 <= area.max_yearly_mileage);
    }
}

#[test]
fn test_rerun_produces_identical_tables() {
    let first = tempfile::tempdir().unwrap();
    let second = tempfile::tempdir().unwrap();
    let cfg_a = config(SAMPLE, first.path()).with_batch_size(3);
    let cfg_b = config(SAMPLE, second.path()).with_batch_size(3);
    run(&cfg_a).unwrap();
    run(&cfg_b).unwrap();

    let (a, b) = (cfg_a.output_paths(), cfg_b.output_paths());
    for (left, right) in a.tables().iter().zip(b.tables().iter()) {
        assert_eq!(fs::read(left).unwrap(), fs::read(right).unwrap());
    }
}

#[test]
fn test_single_vehicle_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("single.csv");
    fs::write(
        &input,
        format!("{HEADER}1|1|2023-01-01|4|NT|P|30000|AB|FORD|FOCUS|BLUE|PE|1596|2020-01-01\n"),
    )
    .unwrap();

    let tables = completed(run(&config(&input, &dir.path().join("out"))).unwrap());
    assert_eq!(tables.areas.len(), 1);

    let ab = &tables.areas[0];
    assert_eq!(ab.postcode_area, "AB");
    assert_eq!(ab.vehicle_count, 1);
    assert!((ab.average_yearly_mileage - 10_000.0).abs() < 5.0);
    assert_eq!(ab.min_yearly_mileage, ab.average_yearly_mileage);
    assert_eq!(ab.max_yearly_mileage, ab.average_yearly_mileage);
    assert_eq!(ab.percentile_5, ab.average_yearly_mileage);
    assert_eq!(ab.percentile_95, ab.average_yearly_mileage);
}

#[test]
fn test_no_valid_data_is_not_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("bad.csv");
    fs::write(
        &input,
        format!(
            "{HEADER}1|1|2019-01-01|4|NT|P|30000|AB|FORD|FOCUS|BLUE|PE|1596|2020-01-01\n2|oops\n"
        ),
    )
    .unwrap();

    let out = dir.path().join("out");
    let cfg = config(&input, &out);
    let paths = cfg.output_paths();

    // a table from an earlier run must not survive
    fs::create_dir_all(&out).unwrap();
    fs::write(&paths.areas, "stale").unwrap();

    match run(&cfg).unwrap() {
        ProcessOutcome::NoValidData { stats } => {
            assert_eq!(stats.rows_read, 2);
            assert_eq!(stats.admitted, 0);
            assert_eq!(stats.dropped[&DropReason::NonPositiveOrExcessiveAge], 1);
            assert_eq!(stats.malformed_rows, 1);
        }
        ProcessOutcome::Completed { .. } => panic!("expected no valid data"),
    }

    for table in paths.tables() {
        assert!(!table.exists());
    }
    assert!(paths.run_report.exists());
}

#[test]
fn test_header_only_source_has_no_valid_data() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("empty.csv");
    fs::write(&input, HEADER).unwrap();

    let outcome = run(&config(&input, &dir.path().join("out"))).unwrap();
    assert!(matches!(outcome, ProcessOutcome::NoValidData { .. }));
}

#[test]
fn test_latin1_source_uses_fallback_encoding() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("latin1.csv");
    let mut bytes = HEADER.as_bytes().to_vec();
    bytes.extend_from_slice(b"1|1|2023-01-01|4|NT|P|40000|AB|CITRO\xCBN|C3|RED|PE|1360|2019-01-01\n");
    bytes.extend_from_slice(b"2|2|2023-01-01|4|NT|P|20000|AB|SKODA|FABIA|RED|PE|999|2019-01-01\n");
    fs::write(&input, bytes).unwrap();

    let outcome = run(&config(&input, &dir.path().join("out"))).unwrap();
    assert!(outcome.stats().used_fallback_encoding);
    assert_eq!(outcome.stats().encoding, "windows-1252");
    assert_eq!(outcome.stats().admitted, 2);
}

#[test]
fn test_gzip_source() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("sample.csv.gz");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&fs::read(SAMPLE).unwrap()).unwrap();
    fs::write(&input, encoder.finish().unwrap()).unwrap();

    let outcome = run(&config(&input, &dir.path().join("out"))).unwrap();
    assert_eq!(outcome.stats().admitted, 7);
}

#[test]
fn test_missing_required_column_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("no_fuel.csv");
    fs::write(
        &input,
        "vehicle_id|postcode_area|test_mileage|first_use_date|test_date|test_class_id\n1|AB|1|2019-01-01|2023-01-01|4\n",
    )
    .unwrap();

    assert!(run(&config(&input, &dir.path().join("out"))).is_err());
}

#[test]
fn test_max_batches_stops_early() {
    let out = tempfile::tempdir().unwrap();
    let mut cfg = config(SAMPLE, out.path()).with_batch_size(2);
    cfg.max_batches = Some(1);

    let outcome = run(&cfg).unwrap();
    let stats = outcome.stats();
    assert_eq!(stats.batches, 1);
    assert_eq!(stats.rows_read, 2);
    assert!(stats.stopped_early);
}

#[test]
fn test_summarize_reports_from_written_tables() {
    let out = tempfile::tempdir().unwrap();
    let cfg = config(SAMPLE, out.path());
    run(&cfg).unwrap();

    let paths = cfg.output_paths();
    let written = summarize(&paths).unwrap();
    assert_eq!(written, vec![paths.vehicle_summary.clone(), paths.fuel_summary.clone()]);

    let vehicle = fs::read_to_string(&paths.vehicle_summary).unwrap();
    assert!(vehicle.contains("Total number of vehicles: 7"));
    assert!(vehicle.contains("vehicle_type"));

    let fuel = fs::read_to_string(&paths.fuel_summary).unwrap();
    assert!(fuel.starts_with("Mileage Analysis Summary Report - Fuel"));
}

#[test]
fn test_summarize_without_tables_writes_nothing() {
    let out = tempfile::tempdir().unwrap();
    let paths = config(SAMPLE, out.path()).output_paths();
    assert!(summarize(&paths).unwrap().is_empty());
}
