//! Same-instant cross-section check.
//!
//! Complements trend verification: at a single timestamp, a station
//! whose reading sits far from the robust center of its neighbors'
//! elevation-adjusted readings is reported as a spatial outlier. Works
//! without any history, so it also catches stations that have been
//! wrong for longer than the evaluation window.

use crate::config::VariableSpec;
use crate::core::Station;
use crate::spatial::NeighborGraph;
use crate::utils::{median, std_dev};
use serde::Serialize;
use std::collections::HashMap;

/// A station deviating from its neighborhood at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SnapshotOutlier {
    pub station_id: String,
    pub variable: String,
    pub value: f64,
    /// Robust center of the elevation-adjusted neighbor readings.
    pub neighbor_median: f64,
    /// Deviation in scaled-MAD units.
    pub deviation: f64,
    pub neighbors_used: usize,
}

/// Bring a neighbor's reading onto the target station's elevation.
///
/// `elevation_gap_m` is neighbor minus target; a positive rate means
/// the variable grows as elevation drops (temperature, pressure).
fn adjust_for_elevation(value: f64, elevation_gap_m: f64, variable: &VariableSpec) -> f64 {
    match variable.elevation_rate {
        Some(rate) => value + (elevation_gap_m / 100.0) * rate,
        None => value,
    }
}

/// Detect stations whose instantaneous reading deviates from their
/// neighborhood by more than `threshold` scaled-MAD units.
///
/// `readings` holds each reporting station's value for the variable at
/// the probed timestamp; stations that did not report are simply
/// absent. Stations with fewer than `min_neighbors` reporting
/// neighbors are skipped, not flagged.
pub fn detect_snapshot_outliers(
    readings: &HashMap<String, f64>,
    variable: &VariableSpec,
    stations: &[Station],
    graph: &NeighborGraph,
    threshold: f64,
    min_neighbors: usize,
) -> Vec<SnapshotOutlier> {
    let elevations: HashMap<&str, f64> = stations
        .iter()
        .map(|s| (s.id.as_str(), s.elevation))
        .collect();

    let mut outliers = Vec::new();
    // Stable iteration so repeated runs report in the same order.
    let mut station_ids: Vec<&String> = readings.keys().collect();
    station_ids.sort();

    for station_id in station_ids {
        let value = readings[station_id];
        let Some(&target_elevation) = elevations.get(station_id.as_str()) else {
            continue;
        };

        let adjusted: Vec<f64> = graph
            .neighbors(station_id)
            .iter()
            .filter_map(|neighbor| {
                let reading = readings.get(&neighbor.station_id)?;
                let elevation = elevations.get(neighbor.station_id.as_str())?;
                Some(adjust_for_elevation(
                    *reading,
                    elevation - target_elevation,
                    variable,
                ))
            })
            .collect();
        if adjusted.len() < min_neighbors {
            continue;
        }

        let center = median(&adjusted);
        let mad = {
            let deviations: Vec<f64> = adjusted.iter().map(|v| (v - center).abs()).collect();
            let mad = median(&deviations);
            if mad > 0.0 {
                mad
            } else {
                // Flat neighborhood: fall back to the plain spread so
                // the ratio stays defined.
                let spread = std_dev(&adjusted);
                if spread.is_finite() && spread > 0.0 {
                    spread
                } else {
                    1e-6
                }
            }
        };

        let deviation = (value - center).abs() / (1.4826 * mad);
        if deviation > threshold {
            outliers.push(SnapshotOutlier {
                station_id: station_id.clone(),
                variable: variable.name.clone(),
                value,
                neighbor_median: center,
                deviation,
                neighbors_used: adjusted.len(),
            });
        }
    }

    outliers
}
