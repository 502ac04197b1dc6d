//! Density-based detector (local outlier factor).
//!
//! Compares the local density around the current value with the
//! densities around its k nearest temporal neighbors; a ratio well
//! above 1 means the current value sits in a sparser region than its
//! neighborhood, i.e. it is locally outlying.

use super::{require_points, Detector, Evaluation};
use crate::error::Result;
use crate::utils::mean;

/// Local outlier factor over the in-series value neighborhood.
#[derive(Debug, Clone)]
pub struct LocalOutlierFactor {
    neighbors: usize,
    threshold: f64,
}

impl LocalOutlierFactor {
    pub fn new(neighbors: usize, threshold: f64) -> Self {
        Self {
            neighbors,
            threshold,
        }
    }

    /// Indices of the k nearest neighbors of `i`, nearest first.
    fn nearest(&self, series: &[f64], i: usize) -> Vec<usize> {
        let mut others: Vec<usize> = (0..series.len()).filter(|&j| j != i).collect();
        others.sort_by(|&a, &b| {
            let da = (series[a] - series[i]).abs();
            let db = (series[b] - series[i]).abs();
            da.partial_cmp(&db)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.cmp(&b))
        });
        others.truncate(self.neighbors);
        others
    }

    /// Distance from `i` to its k-th nearest neighbor.
    fn k_distance(&self, series: &[f64], i: usize, nearest: &[usize]) -> f64 {
        nearest
            .last()
            .map(|&j| (series[j] - series[i]).abs())
            .unwrap_or(0.0)
    }

    /// Local reachability density of `i`.
    fn lrd(&self, series: &[f64], i: usize, neighborhoods: &[Vec<usize>]) -> f64 {
        let nearest = &neighborhoods[i];
        if nearest.is_empty() {
            return 0.0;
        }
        let mean_reach = nearest
            .iter()
            .map(|&j| {
                let direct = (series[j] - series[i]).abs();
                let k_dist = self.k_distance(series, j, &neighborhoods[j]);
                direct.max(k_dist)
            })
            .sum::<f64>()
            / nearest.len() as f64;

        1.0 / mean_reach.max(1e-12)
    }
}

impl Detector for LocalOutlierFactor {
    fn name(&self) -> &'static str {
        "local_outlier_factor"
    }

    fn min_points(&self) -> usize {
        self.neighbors + 1
    }

    fn evaluate(&self, series: &[f64]) -> Result<Evaluation> {
        require_points(series, self.min_points())?;

        let neighborhoods: Vec<Vec<usize>> = (0..series.len())
            .map(|i| self.nearest(series, i))
            .collect();

        let current = series.len() - 1;
        let lrd_current = self.lrd(series, current, &neighborhoods);

        let neighbor_lrds: Vec<f64> = neighborhoods[current]
            .iter()
            .map(|&j| self.lrd(series, j, &neighborhoods))
            .collect();
        let factor = mean(&neighbor_lrds) / lrd_current.max(1e-12);

        let neighbor_values: Vec<f64> = neighborhoods[current]
            .iter()
            .map(|&j| series[j])
            .collect();

        Ok(Evaluation {
            is_anomalous: factor > self.threshold,
            expected: mean(&neighbor_values),
            deviation: factor,
        })
    }
}
