//! Row-level validation: raw vehicle-test rows in, derived mileage records out.

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::fmt;

/// Days per year used to turn a date difference into a vehicle age.
pub const DAYS_PER_YEAR: f64 = 365.25;
/// Exclusive upper bound on a plausible vehicle age.
pub const MAX_AGE_YEARS: f64 = 100.0;
/// Inclusive upper bound on a plausible yearly mileage.
pub const MAX_YEARLY_MILEAGE: f64 = 100_000.0;

/// One vehicle-test event, with the fields still in their textual form.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    pub vehicle_id: u64,
    pub postcode_area: String,
    pub test_mileage: String,
    pub first_use_date: String,
    pub test_date: String,
    pub test_class_id: String,
    pub fuel_type: String,
}

/// A raw record that passed validation, plus its derived metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRecord {
    pub vehicle_id: u64,
    pub postcode_area: String,
    pub test_class_id: String,
    pub fuel_type: String,
    pub vehicle_age_years: f64,
    pub yearly_mileage: f64,
}

/// Why a structurally valid row was not admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    MalformedDate,
    NonPositiveOrExcessiveAge,
    NonFiniteOrOutOfRangeMileage,
}

impl DropReason {
    pub const ALL: [DropReason; 3] = [
        DropReason::MalformedDate,
        DropReason::NonPositiveOrExcessiveAge,
        DropReason::NonFiniteOrOutOfRangeMileage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::MalformedDate => "malformed_date",
            DropReason::NonPositiveOrExcessiveAge => "non_positive_or_excessive_age",
            DropReason::NonFiniteOrOutOfRangeMileage => "non_finite_or_out_of_range_mileage",
        }
    }
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses `YYYY-MM-DD`, or a `YYYY-MM-DD HH:MM:SS` timestamp whose time part is ignored.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S").map(|dt| dt.date()))
        .ok()
}

/// Empty or unparseable mileage becomes NaN and is rejected by the range check.
fn parse_mileage(value: &str) -> f64 {
    value.trim().parse::<f64>().unwrap_or(f64::NAN)
}

/// Computes vehicle age and yearly mileage for `raw`, or the reason it is dropped.
///
/// Age is the whole-day difference between the dates divided by
/// [`DAYS_PER_YEAR`] and must lie strictly inside `(0, 100)`; a test dated
/// before first use yields a negative age and is dropped by the same rule.
/// Yearly mileage must be finite and inside `[0, 100000]`.
pub fn derive_record(raw: &RawRecord) -> Result<DerivedRecord, DropReason> {
    let (Some(first_use), Some(tested)) = (parse_date(&raw.first_use_date), parse_date(&raw.test_date))
    else {
        return Err(DropReason::MalformedDate);
    };

    if tested < first_use {
        return Err(DropReason::NonPositiveOrExcessiveAge);
    }

    let age_years = (tested - first_use).num_days() as f64 / DAYS_PER_YEAR;
    if !(age_years > 0.0 && age_years < MAX_AGE_YEARS) {
        return Err(DropReason::NonPositiveOrExcessiveAge);
    }

    let yearly_mileage = parse_mileage(&raw.test_mileage) / age_years;
    if !yearly_mileage.is_finite() || !(0.0..=MAX_YEARLY_MILEAGE).contains(&yearly_mileage) {
        return Err(DropReason::NonFiniteOrOutOfRangeMileage);
    }

    Ok(DerivedRecord {
        vehicle_id: raw.vehicle_id,
        postcode_area: raw.postcode_area.clone(),
        test_class_id: raw.test_class_id.clone(),
        fuel_type: raw.fuel_type.clone(),
        vehicle_age_years: age_years,
        yearly_mileage,
    })
}
