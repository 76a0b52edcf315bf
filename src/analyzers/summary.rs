use crate::analyzers::types::{CategoryRow, CategorySummary};
use crate::analyzers::utility::{mean, round2};
use std::collections::BTreeMap;
use std::fmt::Write;

/// Which per-type table a summary report describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    Vehicle,
    Fuel,
}

impl ReportKind {
    pub fn name(&self) -> &'static str {
        match self {
            ReportKind::Vehicle => "vehicle",
            ReportKind::Fuel => "fuel",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ReportKind::Vehicle => "Vehicle",
            ReportKind::Fuel => "Fuel",
        }
    }

    fn column(&self) -> &'static str {
        match self {
            ReportKind::Vehicle => "vehicle_type",
            ReportKind::Fuel => "fuel_type",
        }
    }
}

/// Groups per-area rows by category, rolling up counts and mileage ranges.
pub fn summarize_categories(rows: Vec<CategoryRow>) -> Vec<CategorySummary> {
    let mut grouped: BTreeMap<String, Vec<CategoryRow>> = BTreeMap::new();
    for row in rows {
        grouped.entry(row.category.clone()).or_default().push(row);
    }

    grouped
        .into_iter()
        .map(|(category, rows)| {
            let averages: Vec<f64> = rows.iter().map(|r| r.average_yearly_mileage).collect();
            CategorySummary {
                category,
                vehicle_count: rows.iter().map(|r| r.vehicle_count).sum(),
                mean_of_averages: round2(mean(&averages)),
                min_of_averages: round2(averages.iter().copied().fold(f64::INFINITY, f64::min)),
                max_of_averages: round2(averages.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
                min_yearly_mileage: round2(
                    rows.iter().map(|r| r.min_yearly_mileage).fold(f64::INFINITY, f64::min),
                ),
                max_yearly_mileage: round2(
                    rows.iter().map(|r| r.max_yearly_mileage).fold(f64::NEG_INFINITY, f64::max),
                ),
            }
        })
        .collect()
}

/// Renders the plain-text summary report for one table.
pub fn render_report(kind: ReportKind, summaries: &[CategorySummary]) -> String {
    let total: u64 = summaries.iter().map(|s| s.vehicle_count).sum();
    let mut out = String::new();

    let _ = writeln!(out, "Mileage Analysis Summary Report - {}", kind.title());
    let _ = writeln!(out, "==============================");
    let _ = writeln!(out);
    let _ = writeln!(out, "Total number of vehicles: {}", thousands(total));
    let _ = writeln!(out, "Statistics by {}:", kind.title());
    let _ = writeln!(
        out,
        "{:<14} {:>14} {:>12} {:>12} {:>12} {:>12} {:>12}",
        kind.column(),
        "vehicle_count",
        "avg_mean",
        "avg_min",
        "avg_max",
        "min_mileage",
        "max_mileage"
    );
    for s in summaries {
        let _ = writeln!(
            out,
            "{:<14} {:>14} {:>12.2} {:>12.2} {:>12.2} {:>12.2} {:>12.2}",
            s.category,
            s.vehicle_count,
            s.mean_of_averages,
            s.min_of_averages,
            s.max_of_averages,
            s.min_yearly_mileage,
            s.max_yearly_mileage
        );
    }

    out
}

/// Formats an integer with comma thousands separators.
pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
