//! Cross-station spatial analysis: the static neighbor graph, gap
//! interpolation, trend-correlation verification, and the same-instant
//! snapshot check.

mod graph;
mod interpolate;
mod snapshot;
mod verifier;

pub use graph::{haversine_km, Neighbor, NeighborGraph};
pub use interpolate::fill_gaps;
pub use snapshot::{detect_snapshot_outliers, SnapshotOutlier};
pub use verifier::{SpatialClass, SpatialVerdict, SpatialVerifier, NO_NEIGHBORS};
