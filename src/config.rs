//! Run configuration and the fixed layout of the output directory.

use anyhow::{Result, ensure};
use std::path::{Path, PathBuf};

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_YEAR: u16 = 2023;
pub const DEFAULT_OUTPUT_DIR: &str = "OUTPUT";
pub const DEFAULT_ENCODING: &str = "utf-8";
pub const DEFAULT_FALLBACK_ENCODING: &str = "latin1";
pub const DEFAULT_TOP_N: usize = 5;

/// Default source path for a given test year.
pub fn default_input(year: u16) -> PathBuf {
    PathBuf::from(format!("INPUT/test_result_{year}.csv"))
}

/// Well-known file names inside the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub areas: PathBuf,
    pub vehicle_types: PathBuf,
    pub fuel_types: PathBuf,
    pub run_report: PathBuf,
    pub vehicle_summary: PathBuf,
    pub fuel_summary: PathBuf,
}

impl OutputPaths {
    pub fn new(dir: &Path, year: u16) -> Self {
        Self {
            areas: dir.join(format!("yearly_mileage_{year}.csv")),
            vehicle_types: dir.join(format!("yearly_mileage_by_vehicle_type_{year}.csv")),
            fuel_types: dir.join(format!("yearly_mileage_by_fuel_type_{year}.csv")),
            run_report: dir.join(format!("run_report_{year}.json")),
            vehicle_summary: dir.join("summary_report_vehicle.txt"),
            fuel_summary: dir.join("summary_report_fuel.txt"),
        }
    }

    pub fn tables(&self) -> [&Path; 3] {
        [
            self.areas.as_path(),
            self.vehicle_types.as_path(),
            self.fuel_types.as_path(),
        ]
    }
}

/// Settings for one processing run.
#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub year: u16,
    pub batch_size: usize,
    pub max_batches: Option<u64>,
    pub encoding: String,
    pub fallback_encoding: String,
    pub top_n: usize,
}

impl ProcessConfig {
    pub fn new(input: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output_dir: output_dir.into(),
            year: DEFAULT_YEAR,
            batch_size: DEFAULT_BATCH_SIZE,
            max_batches: None,
            encoding: DEFAULT_ENCODING.to_string(),
            fallback_encoding: DEFAULT_FALLBACK_ENCODING.to_string(),
            top_n: DEFAULT_TOP_N,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_year(mut self, year: u16) -> Self {
        self.year = year;
        self
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.batch_size > 0, "batch size must be greater than zero");
        ensure!(
            self.max_batches != Some(0),
            "max batches must be greater than zero when set"
        );
        Ok(())
    }

    pub fn output_paths(&self) -> OutputPaths {
        OutputPaths::new(&self.output_dir, self.year)
    }
}
