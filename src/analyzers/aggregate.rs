use crate::analyzers::types::GroupSummary;
use crate::analyzers::utility::{percentile, sort_ascending};
use crate::record::DerivedRecord;
use std::collections::BTreeMap;

/// Running statistics for one group of admitted records.
///
/// Every sample is retained so the finalizer can compute exact percentiles;
/// memory therefore grows with the number of admitted records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GroupAccumulator {
    vehicle_count: u64,
    total_mileage: f64,
    samples: Vec<f64>,
}

impl GroupAccumulator {
    pub fn update(&mut self, yearly_mileage: f64) {
        self.vehicle_count += 1;
        self.total_mileage += yearly_mileage;
        self.samples.push(yearly_mileage);
    }

    pub fn merge(&mut self, other: GroupAccumulator) {
        self.vehicle_count += other.vehicle_count;
        self.total_mileage += other.total_mileage;
        self.samples.extend(other.samples);
    }

    pub fn vehicle_count(&self) -> u64 {
        self.vehicle_count
    }

    pub fn total_mileage(&self) -> f64 {
        self.total_mileage
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Summarises the group, or `None` if it never saw a record.
    pub fn finalize(&self) -> Option<GroupSummary> {
        if self.vehicle_count == 0 {
            return None;
        }

        let mut sorted = self.samples.clone();
        sort_ascending(&mut sorted);

        Some(GroupSummary {
            average_yearly_mileage: self.total_mileage / self.vehicle_count as f64,
            min_yearly_mileage: *sorted.first()?,
            max_yearly_mileage: *sorted.last()?,
            percentile_5: percentile(&sorted, 5.0)?,
            percentile_95: percentile(&sorted, 95.0)?,
            vehicle_count: self.vehicle_count,
        })
    }
}

/// The three independent keyings every admitted record is folded into.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MileageAggregator {
    pub(crate) by_area: BTreeMap<String, GroupAccumulator>,
    pub(crate) by_vehicle_type: BTreeMap<(String, String), GroupAccumulator>,
    pub(crate) by_fuel_type: BTreeMap<(String, String), GroupAccumulator>,
}

impl MileageAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one record into its area, area × vehicle-type and area × fuel-type groups.
    pub fn fold(&mut self, record: &DerivedRecord) {
        let mileage = record.yearly_mileage;

        self.by_area
            .entry(record.postcode_area.clone())
            .or_default()
            .update(mileage);

        self.by_vehicle_type
            .entry((record.postcode_area.clone(), record.test_class_id.clone()))
            .or_default()
            .update(mileage);

        self.by_fuel_type
            .entry((record.postcode_area.clone(), record.fuel_type.clone()))
            .or_default()
            .update(mileage);
    }

    /// Combines another aggregator (e.g. a shard built elsewhere) into this one.
    pub fn merge(&mut self, other: MileageAggregator) {
        for (key, acc) in other.by_area {
            self.by_area.entry(key).or_default().merge(acc);
        }
        for (key, acc) in other.by_vehicle_type {
            self.by_vehicle_type.entry(key).or_default().merge(acc);
        }
        for (key, acc) in other.by_fuel_type {
            self.by_fuel_type.entry(key).or_default().merge(acc);
        }
    }

    pub fn area(&self, area: &str) -> Option<&GroupAccumulator> {
        self.by_area.get(area)
    }

    pub fn vehicle_type(&self, area: &str, vehicle_type: &str) -> Option<&GroupAccumulator> {
        self.by_vehicle_type
            .get(&(area.to_string(), vehicle_type.to_string()))
    }

    pub fn fuel_type(&self, area: &str, fuel_type: &str) -> Option<&GroupAccumulator> {
        self.by_fuel_type
            .get(&(area.to_string(), fuel_type.to_string()))
    }

    /// Number of admitted records, counted through the area keying.
    pub fn admitted(&self) -> u64 {
        self.by_area.values().map(GroupAccumulator::vehicle_count).sum()
    }

    /// Group counts as `(areas, area × vehicle-type, area × fuel-type)`.
    pub fn group_counts(&self) -> (usize, usize, usize) {
        (
            self.by_area.len(),
            self.by_vehicle_type.len(),
            self.by_fuel_type.len(),
        )
    }
}
