//! Spatial verification of temporal anomaly candidates.
//!
//! A candidate backed by the same trend at neighboring stations is
//! weather; a candidate its neighbors do not echo is a failing device;
//! anything in between stays suspected.

use crate::config::SpatialConfig;
use crate::core::{Window, WindowSeries};
use crate::error::Result;
use crate::spatial::{fill_gaps, NeighborGraph};
use crate::store::{ObservationStore, WindowReader};
use crate::utils::pearson;
use serde::Serialize;
use std::fmt;
use tracing::debug;

/// Diagnostic reason for a fallback verdict with no usable neighbors.
pub const NO_NEIGHBORS: &str = "no_neighbors";

/// Spatial classification of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialClass {
    /// Neighbors follow the same trend: a real meteorological event.
    WeatherEvent,
    /// Neighbors disagree: the station's sensor is the likely culprit.
    DeviceFailure,
    /// Correlation between the thresholds, or nothing to correlate
    /// against.
    Suspected,
}

impl fmt::Display for SpatialClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpatialClass::WeatherEvent => "weather_event",
            SpatialClass::DeviceFailure => "device_failure",
            SpatialClass::Suspected => "suspected",
        };
        f.write_str(name)
    }
}

/// Outcome of spatial verification; written once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpatialVerdict {
    pub classification: SpatialClass,
    /// Unweighted mean trend correlation across usable neighbors;
    /// absent when no neighbor was usable.
    pub mean_correlation: Option<f64>,
    /// Neighbors that actually entered the correlation, not the
    /// geographic count.
    pub neighbors_used: usize,
    pub reason: String,
}

impl SpatialVerdict {
    fn fallback() -> Self {
        Self {
            classification: SpatialClass::Suspected,
            mean_correlation: None,
            neighbors_used: 0,
            reason: NO_NEIGHBORS.to_string(),
        }
    }
}

/// Classifies candidates by neighbor trend correlation.
pub struct SpatialVerifier<'a, S: ObservationStore + ?Sized> {
    store: &'a S,
    graph: &'a NeighborGraph,
    config: &'a SpatialConfig,
    interval: chrono::Duration,
}

impl<'a, S: ObservationStore + ?Sized> SpatialVerifier<'a, S> {
    pub fn new(
        store: &'a S,
        graph: &'a NeighborGraph,
        config: &'a SpatialConfig,
        interval: chrono::Duration,
    ) -> Self {
        Self {
            store,
            graph,
            config,
            interval,
        }
    }

    /// Verify the candidate whose window produced `series`.
    ///
    /// Store failures propagate (fatal to the run); an unusable
    /// neighborhood is not an error and falls back to `Suspected`.
    pub fn verify(&self, series: &WindowSeries) -> Result<SpatialVerdict> {
        let window = series.window();
        let neighbors = self.graph.neighbors(&window.station_id);
        if neighbors.is_empty() {
            return Ok(SpatialVerdict::fallback());
        }

        let candidate = match self.usable_values(series) {
            Some(values) => values,
            None => {
                debug!(
                    station = %window.station_id,
                    variable = %window.variable,
                    "candidate series unusable after gap filtering"
                );
                return Ok(SpatialVerdict::fallback());
            }
        };

        let reader = WindowReader::new(self.store, self.interval);
        let mut correlations = Vec::with_capacity(neighbors.len());
        for neighbor in neighbors {
            let neighbor_window = Window::new(
                neighbor.station_id.clone(),
                window.variable.clone(),
                window.end,
                window.duration,
            );
            let neighbor_series = reader.read(neighbor_window)?;
            match self.usable_values(&neighbor_series) {
                Some(values) => correlations.push(pearson(&candidate, &values)),
                None => debug!(
                    station = %window.station_id,
                    neighbor = %neighbor.station_id,
                    variable = %window.variable,
                    "neighbor excluded by gap filtering"
                ),
            }
        }

        if correlations.is_empty() {
            return Ok(SpatialVerdict::fallback());
        }

        let mean_correlation = correlations.iter().sum::<f64>() / correlations.len() as f64;
        let (classification, reason) = if mean_correlation >= self.config.correlation_high {
            (SpatialClass::WeatherEvent, "trend_consistent")
        } else if mean_correlation <= self.config.correlation_low {
            (SpatialClass::DeviceFailure, "trend_inconsistent")
        } else {
            (SpatialClass::Suspected, "weak_correlation")
        };

        Ok(SpatialVerdict {
            classification,
            mean_correlation: Some(mean_correlation),
            neighbors_used: correlations.len(),
            reason: reason.to_string(),
        })
    }

    /// Gap-fill one series; `None` means exclude it.
    fn usable_values(&self, series: &WindowSeries) -> Option<Vec<f64>> {
        if series.valid_count() < self.config.min_overlap {
            return None;
        }
        fill_gaps(series.slots(), self.config.max_gap_run)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Window;
    use crate::store::MemoryStore;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn end_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 21, 2, 0, 0).unwrap()
    }

    fn graph_of_pair() -> NeighborGraph {
        NeighborGraph::build(
            &[
                crate::core::Station::new("a", "A", 39.36, 22.94, 10.0),
                crate::core::Station::new("b", "B", 39.40, 22.96, 20.0),
            ],
            100.0,
            None,
        )
    }

    fn store_with(series: &[(&str, &[f64])]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (station, values) in series {
            store.push_series(station, "temp_out", end_time(), Duration::minutes(10), values);
        }
        store
    }

    fn read_candidate(store: &MemoryStore, slots: usize) -> WindowSeries {
        let duration = Duration::minutes(10 * (slots as i64 - 1));
        let reader = WindowReader::new(store, Duration::minutes(10));
        reader
            .read(Window::new("a", "temp_out", end_time(), duration))
            .unwrap()
    }

    fn verifier<'a>(
        store: &'a MemoryStore,
        graph: &'a NeighborGraph,
        config: &'a SpatialConfig,
    ) -> SpatialVerifier<'a, MemoryStore> {
        SpatialVerifier::new(store, graph, config, Duration::minutes(10))
    }

    #[test]
    fn synchronized_decline_is_weather() {
        let store = store_with(&[
            ("a", &[15.0, 14.0, 13.0, 12.0, 11.0, 10.0, 9.0]),
            ("b", &[16.0, 15.0, 14.0, 13.0, 12.0, 11.0, 10.0]),
        ]);
        let graph = graph_of_pair();
        let config = SpatialConfig::default();
        let series = read_candidate(&store, 7);

        let verdict = verifier(&store, &graph, &config).verify(&series).unwrap();
        assert_eq!(verdict.classification, SpatialClass::WeatherEvent);
        assert!(verdict.mean_correlation.unwrap() > 0.6);
        assert_eq!(verdict.neighbors_used, 1);
    }

    #[test]
    fn flat_neighbor_means_device_failure() {
        let store = store_with(&[
            ("a", &[15.0, 15.0, 15.0, 15.0, 15.0, 15.0, 99.0]),
            ("b", &[8.0, 8.0, 8.0, 8.0, 8.0, 8.0, 8.0]),
        ]);
        let graph = graph_of_pair();
        let config = SpatialConfig::default();
        let series = read_candidate(&store, 7);

        let verdict = verifier(&store, &graph, &config).verify(&series).unwrap();
        assert_eq!(verdict.classification, SpatialClass::DeviceFailure);
        assert!(verdict.mean_correlation.unwrap().abs() < 1e-9);
        assert_eq!(verdict.reason, "trend_inconsistent");
    }

    #[test]
    fn no_geographic_neighbors_is_suspected() {
        let store = store_with(&[("a", &[15.0, 15.0, 15.0, 99.0])]);
        let graph = NeighborGraph::build(
            &[crate::core::Station::new("a", "A", 39.36, 22.94, 10.0)],
            100.0,
            None,
        );
        let config = SpatialConfig::default();
        let series = read_candidate(&store, 4);

        let verdict = verifier(&store, &graph, &config).verify(&series).unwrap();
        assert_eq!(verdict.classification, SpatialClass::Suspected);
        assert_eq!(verdict.reason, NO_NEIGHBORS);
        assert_eq!(verdict.neighbors_used, 0);
        assert!(verdict.mean_correlation.is_none());
    }

    #[test]
    fn neighbor_with_long_gap_is_excluded() {
        // Neighbor reports only the first and last slots: a five-slot
        // interior gap exceeds the default limit of 3.
        let mut store = store_with(&[("a", &[15.0, 14.0, 13.0, 12.0, 11.0, 10.0, 9.0])]);
        store.push("b", "temp_out", end_time() - Duration::minutes(60), 16.0);
        store.push("b", "temp_out", end_time(), 10.0);

        let graph = graph_of_pair();
        let config = SpatialConfig::default();
        let series = read_candidate(&store, 7);

        let verdict = verifier(&store, &graph, &config).verify(&series).unwrap();
        assert_eq!(verdict.classification, SpatialClass::Suspected);
        assert_eq!(verdict.reason, NO_NEIGHBORS);
    }

    #[test]
    fn neighbor_with_short_gap_is_bridged() {
        let mut store = store_with(&[("a", &[15.0, 14.0, 13.0, 12.0, 11.0, 10.0, 9.0])]);
        // Neighbor misses two interior slots; interpolation bridges
        // them and the neighbor stays usable.
        let neighbor = [16.0, 15.0, 14.0, 13.0, 12.0, 11.0, 10.0];
        for (i, value) in neighbor.iter().enumerate() {
            if i == 2 || i == 3 {
                continue;
            }
            let back = (neighbor.len() - 1 - i) as i64;
            store.push(
                "b",
                "temp_out",
                end_time() - Duration::minutes(10 * back),
                *value,
            );
        }

        let graph = graph_of_pair();
        let config = SpatialConfig::default();
        let series = read_candidate(&store, 7);

        let verdict = verifier(&store, &graph, &config).verify(&series).unwrap();
        assert_eq!(verdict.classification, SpatialClass::WeatherEvent);
        assert_eq!(verdict.neighbors_used, 1);
    }

    #[test]
    fn mid_band_correlation_stays_suspected() {
        // Neighbor half follows the decline, half wanders: correlation
        // lands between the thresholds.
        let store = store_with(&[
            ("a", &[15.0, 14.0, 13.0, 12.0, 11.0, 10.0, 9.0]),
            ("b", &[14.0, 15.5, 13.5, 14.8, 13.0, 14.2, 12.8]),
        ]);
        let graph = graph_of_pair();
        let config = SpatialConfig::default();
        let series = read_candidate(&store, 7);

        let verdict = verifier(&store, &graph, &config).verify(&series).unwrap();
        let corr = verdict.mean_correlation.unwrap();
        assert!(
            corr > config.correlation_low && corr < config.correlation_high,
            "correlation {corr} escaped the mid band"
        );
        assert_eq!(verdict.classification, SpatialClass::Suspected);
        assert_eq!(verdict.reason, "weak_correlation");
    }
}
