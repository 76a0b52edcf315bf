use crate::analyzers::aggregate::MileageAggregator;
use crate::analyzers::types::{AreaSummary, FuelTypeSummary, MileageTables, VehicleTypeSummary};
use tracing::debug;

/// Converts every accumulator into the three output tables.
///
/// Empty groups are skipped. Areas are ranked by average yearly mileage,
/// highest first; vehicle-type rows by area, then average descending; fuel
/// rows keep their grouped key order. Ties keep key order.
pub fn build_tables(aggregator: &MileageAggregator) -> MileageTables {
    let mut areas: Vec<AreaSummary> = aggregator
        .by_area
        .iter()
        .filter_map(|(area, acc)| {
            let s = acc.finalize()?;
            Some(AreaSummary {
                postcode_area: area.clone(),
                average_yearly_mileage: s.average_yearly_mileage,
                min_yearly_mileage: s.min_yearly_mileage,
                max_yearly_mileage: s.max_yearly_mileage,
                percentile_5: s.percentile_5,
                percentile_95: s.percentile_95,
                vehicle_count: s.vehicle_count,
            })
        })
        .collect();
    areas.sort_by(|a, b| b.average_yearly_mileage.total_cmp(&a.average_yearly_mileage));

    let mut vehicle_types: Vec<VehicleTypeSummary> = aggregator
        .by_vehicle_type
        .iter()
        .filter_map(|((area, vehicle_type), acc)| {
            let s = acc.finalize()?;
            Some(VehicleTypeSummary {
                postcode_area: area.clone(),
                vehicle_type: vehicle_type.clone(),
                average_yearly_mileage: s.average_yearly_mileage,
                min_yearly_mileage: s.min_yearly_mileage,
                max_yearly_mileage: s.max_yearly_mileage,
                percentile_5: s.percentile_5,
                percentile_95: s.percentile_95,
                vehicle_count: s.vehicle_count,
            })
        })
        .collect();
    vehicle_types.sort_by(|a, b| {
        a.postcode_area
            .cmp(&b.postcode_area)
            .then(b.average_yearly_mileage.total_cmp(&a.average_yearly_mileage))
    });

    let fuel_types: Vec<FuelTypeSummary> = aggregator
        .by_fuel_type
        .iter()
        .filter_map(|((area, fuel_type), acc)| {
            let s = acc.finalize()?;
            Some(FuelTypeSummary {
                postcode_area: area.clone(),
                fuel_type: fuel_type.clone(),
                average_yearly_mileage: s.average_yearly_mileage,
                min_yearly_mileage: s.min_yearly_mileage,
                max_yearly_mileage: s.max_yearly_mileage,
                percentile_5: s.percentile_5,
                percentile_95: s.percentile_95,
                vehicle_count: s.vehicle_count,
            })
        })
        .collect();

    debug!(
        areas = areas.len(),
        vehicle_types = vehicle_types.len(),
        fuel_types = fuel_types.len(),
        "Tables built"
    );

    MileageTables {
        areas,
        vehicle_types,
        fuel_types,
    }
}
