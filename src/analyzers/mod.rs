//! Mileage aggregation and reporting.
//!
//! Admitted records are folded into per-group accumulators under three
//! keyings (area, area × vehicle type, area × fuel type). Once the source is
//! exhausted the accumulators are finalized into ranked summary tables.

pub mod aggregate;
pub mod report;
pub mod summary;
pub mod types;
pub mod utility;
