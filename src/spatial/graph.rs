//! Static neighbor graph over the station network.

use crate::core::Station;
use std::collections::HashMap;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two coordinates, in kilometers.
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let (lat1, lon1, lat2, lon2) = (
        lat1.to_radians(),
        lon1.to_radians(),
        lat2.to_radians(),
        lon2.to_radians(),
    );
    let a = ((lat2 - lat1) / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * ((lon2 - lon1) / 2.0).sin().powi(2);
    EARTH_RADIUS_KM * 2.0 * a.sqrt().asin()
}

/// A qualifying neighbor of some station.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub station_id: String,
    pub distance_km: f64,
}

/// Precomputed adjacency over the full station set.
///
/// Built once per run with an O(n²) pairwise pass, which is fine for
/// the tens to low hundreds of stations a real network has. Never
/// mutated afterward, so it can be shared by reference across workers.
#[derive(Debug, Clone, Default)]
pub struct NeighborGraph {
    adjacency: HashMap<String, Vec<Neighbor>>,
}

impl NeighborGraph {
    /// Build the graph from station coordinates.
    ///
    /// Two stations are neighbors when their great-circle distance is
    /// within `radius_km` and, if `max_elevation_gap_m` is set, their
    /// elevations differ by no more than that gap.
    pub fn build(stations: &[Station], radius_km: f64, max_elevation_gap_m: Option<f64>) -> Self {
        let mut adjacency: HashMap<String, Vec<Neighbor>> = stations
            .iter()
            .map(|s| (s.id.clone(), Vec::new()))
            .collect();

        for (i, a) in stations.iter().enumerate() {
            for b in stations.iter().skip(i + 1) {
                if let Some(gap) = max_elevation_gap_m {
                    if (a.elevation - b.elevation).abs() > gap {
                        continue;
                    }
                }
                let distance = haversine_km(a.latitude, a.longitude, b.latitude, b.longitude);
                if distance > radius_km {
                    continue;
                }
                adjacency.get_mut(&a.id).unwrap().push(Neighbor {
                    station_id: b.id.clone(),
                    distance_km: distance,
                });
                adjacency.get_mut(&b.id).unwrap().push(Neighbor {
                    station_id: a.id.clone(),
                    distance_km: distance,
                });
            }
        }

        // Nearest-first, ties broken by id, so iteration order is
        // stable from run to run.
        for neighbors in adjacency.values_mut() {
            neighbors.sort_by(|x, y| {
                x.distance_km
                    .partial_cmp(&y.distance_km)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then_with(|| x.station_id.cmp(&y.station_id))
            });
        }

        Self { adjacency }
    }

    /// The station's neighbors, nearest first. Unknown stations and
    /// stations with no qualifying neighbor both yield an empty slice;
    /// neither is an error.
    pub fn neighbors(&self, station_id: &str) -> &[Neighbor] {
        self.adjacency
            .get(station_id)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Number of stations the graph was built over.
    pub fn station_count(&self) -> usize {
        self.adjacency.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn network() -> Vec<Station> {
        vec![
            Station::new("volos", "Volos", 39.36, 22.94, 15.0),
            Station::new("larissa", "Larissa", 39.64, 22.42, 73.0),
            Station::new("trikala", "Trikala", 39.56, 21.77, 115.0),
            Station::new("athens", "Athens", 37.98, 23.73, 90.0),
            Station::new("olympus", "Mount Olympus", 40.09, 22.36, 2650.0),
        ]
    }

    #[test]
    fn haversine_matches_known_distance() {
        // Volos to Larissa is roughly 55 km.
        let d = haversine_km(39.36, 22.94, 39.64, 22.42);
        assert!((50.0..60.0).contains(&d), "got {d}");
    }

    #[test]
    fn haversine_zero_for_same_point() {
        assert_relative_eq!(haversine_km(39.0, 22.0, 39.0, 22.0), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn neighbors_within_radius_are_symmetric() {
        let graph = NeighborGraph::build(&network(), 100.0, None);

        let volos: Vec<&str> = graph
            .neighbors("volos")
            .iter()
            .map(|n| n.station_id.as_str())
            .collect();
        assert!(volos.contains(&"larissa"));
        assert!(!volos.contains(&"athens"));

        let larissa: Vec<&str> = graph
            .neighbors("larissa")
            .iter()
            .map(|n| n.station_id.as_str())
            .collect();
        assert!(larissa.contains(&"volos"));
    }

    #[test]
    fn neighbors_are_sorted_nearest_first() {
        let graph = NeighborGraph::build(&network(), 150.0, None);
        let neighbors = graph.neighbors("larissa");
        for pair in neighbors.windows(2) {
            assert!(pair[0].distance_km <= pair[1].distance_km);
        }
    }

    #[test]
    fn elevation_gap_excludes_mountain_station() {
        let with_gap = NeighborGraph::build(&network(), 150.0, Some(500.0));
        let ids: Vec<&str> = with_gap
            .neighbors("larissa")
            .iter()
            .map(|n| n.station_id.as_str())
            .collect();
        assert!(!ids.contains(&"olympus"));

        let without_gap = NeighborGraph::build(&network(), 150.0, None);
        let ids: Vec<&str> = without_gap
            .neighbors("larissa")
            .iter()
            .map(|n| n.station_id.as_str())
            .collect();
        assert!(ids.contains(&"olympus"));
    }

    #[test]
    fn isolated_station_has_empty_neighbor_set() {
        let graph = NeighborGraph::build(&network(), 100.0, None);
        assert!(graph.neighbors("athens").is_empty());
        assert!(graph.neighbors("unknown").is_empty());
    }
}
