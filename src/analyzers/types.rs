//! Data types produced by the aggregation pipeline.

use serde::{Deserialize, Serialize};

/// Order statistics of one non-empty group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GroupSummary {
    pub average_yearly_mileage: f64,
    pub min_yearly_mileage: f64,
    pub max_yearly_mileage: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub vehicle_count: u64,
}

/// Area-level output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaSummary {
    pub postcode_area: String,
    pub average_yearly_mileage: f64,
    pub min_yearly_mileage: f64,
    pub max_yearly_mileage: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub vehicle_count: u64,
}

/// Area × vehicle-type output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleTypeSummary {
    pub postcode_area: String,
    pub vehicle_type: String,
    pub average_yearly_mileage: f64,
    pub min_yearly_mileage: f64,
    pub max_yearly_mileage: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub vehicle_count: u64,
}

/// Area × fuel-type output row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FuelTypeSummary {
    pub postcode_area: String,
    pub fuel_type: String,
    pub average_yearly_mileage: f64,
    pub min_yearly_mileage: f64,
    pub max_yearly_mileage: f64,
    pub percentile_5: f64,
    pub percentile_95: f64,
    pub vehicle_count: u64,
}

/// The three ranked tables written at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MileageTables {
    pub areas: Vec<AreaSummary>,
    pub vehicle_types: Vec<VehicleTypeSummary>,
    pub fuel_types: Vec<FuelTypeSummary>,
}

impl MileageTables {
    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }

    pub fn total_vehicles(&self) -> u64 {
        self.areas.iter().map(|a| a.vehicle_count).sum()
    }
}

/// A row of a per-type table read back for the summary report.
///
/// `category` is the vehicle type or fuel type, depending on the table.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRow {
    pub category: String,
    pub average_yearly_mileage: f64,
    pub min_yearly_mileage: f64,
    pub max_yearly_mileage: f64,
    pub vehicle_count: u64,
}

impl From<VehicleTypeSummary> for CategoryRow {
    fn from(row: VehicleTypeSummary) -> Self {
        Self {
            category: row.vehicle_type,
            average_yearly_mileage: row.average_yearly_mileage,
            min_yearly_mileage: row.min_yearly_mileage,
            max_yearly_mileage: row.max_yearly_mileage,
            vehicle_count: row.vehicle_count,
        }
    }
}

impl From<FuelTypeSummary> for CategoryRow {
    fn from(row: FuelTypeSummary) -> Self {
        Self {
            category: row.fuel_type,
            average_yearly_mileage: row.average_yearly_mileage,
            min_yearly_mileage: row.min_yearly_mileage,
            max_yearly_mileage: row.max_yearly_mileage,
            vehicle_count: row.vehicle_count,
        }
    }
}

/// Per-category line of the summary report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorySummary {
    pub category: String,
    pub vehicle_count: u64,
    pub mean_of_averages: f64,
    pub min_of_averages: f64,
    pub max_of_averages: f64,
    pub min_yearly_mileage: f64,
    pub max_yearly_mileage: f64,
}
