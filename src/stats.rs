//! Run-level telemetry: row tallies, drop reasons, throughput and memory.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use crate::record::DropReason;

#[derive(Debug, Default, Serialize)]
pub struct RunStats {
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub source: String,
    pub encoding: String,
    pub used_fallback_encoding: bool,

    // row tallies
    pub rows_read: u64,
    pub malformed_rows: u64,
    pub dropped: BTreeMap<DropReason, u64>,
    pub admitted: u64,
    pub distinct_vehicles: u64,
    pub batches: u64,
    pub stopped_early: bool,

    // groups
    pub area_groups: usize,
    pub vehicle_type_groups: usize,
    pub fuel_type_groups: usize,

    // timing
    pub elapsed_secs: f64,
    pub rows_per_sec: f64,
    pub peak_memory_mb: Option<f64>,

    #[serde(skip)]
    vehicles: HashSet<u64>,
}

impl RunStats {
    pub fn new(source: &str) -> Self {
        RunStats {
            started_at: Some(Utc::now()),
            source: source.to_string(),
            dropped: DropReason::ALL.iter().map(|r| (*r, 0)).collect(),
            ..Default::default()
        }
    }

    pub fn record_malformed(&mut self) {
        self.rows_read += 1;
        self.malformed_rows += 1;
    }

    pub fn record_drop(&mut self, reason: DropReason) {
        self.rows_read += 1;
        *self.dropped.entry(reason).or_insert(0) += 1;
    }

    pub fn record_admitted(&mut self, vehicle_id: u64) {
        self.rows_read += 1;
        self.admitted += 1;
        if self.vehicles.insert(vehicle_id) {
            self.distinct_vehicles += 1;
        }
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped.values().sum()
    }

    pub fn pct(part: u64, total: u64) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn admitted_pct(&self) -> f64 {
        Self::pct(self.admitted, self.rows_read)
    }

    /// Refreshes throughput and the resident-memory high-water mark.
    pub fn observe(&mut self, elapsed_secs: f64) -> Option<f64> {
        self.elapsed_secs = elapsed_secs;
        self.rows_per_sec = if elapsed_secs > 0.0 {
            self.rows_read as f64 / elapsed_secs
        } else {
            0.0
        };

        let memory = resident_memory_mb();
        if let Some(mb) = memory {
            self.peak_memory_mb = Some(self.peak_memory_mb.map_or(mb, |peak| peak.max(mb)));
        }
        memory
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }
}

/// Resident set size of this process in MiB, where the platform exposes it.
pub fn resident_memory_mb() -> Option<f64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    parse_vm_rss_kb(&status).map(|kb| kb as f64 / 1024.0)
}

fn parse_vm_rss_kb(status: &str) -> Option<u64> {
    status
        .lines()
        .find_map(|line| line.strip_prefix("VmRSS:"))
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|kb| kb.parse().ok())
}

/// Human-readable duration: seconds, minutes or hours.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1} seconds")
    } else if seconds < 3600.0 {
        format!("{:.1} minutes", seconds / 60.0)
    } else {
        format!("{:.1} hours", seconds / 3600.0)
    }
}
