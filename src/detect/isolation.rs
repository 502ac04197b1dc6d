//! Isolation-based detector.
//!
//! A small isolation forest over the window's values: anomalous points
//! sit close to the root of randomly partitioned trees, so their mean
//! path length is short and their isolation score high. The exact tree
//! construction is internal; only the score contract matters to
//! callers.

use super::{require_points, Detector, Evaluation};
use crate::config::IsolationParams;
use crate::error::Result;
use crate::utils::{median, quantile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

const EULER_MASCHERONI: f64 = 0.577_215_664_901_532_9;

/// Isolation forest over the evaluation window, seeded so repeated
/// runs on identical input stay identical.
#[derive(Debug, Clone)]
pub struct IsolationForest {
    params: IsolationParams,
    seed: u64,
}

enum Node {
    Leaf {
        size: usize,
    },
    Split {
        value: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl IsolationForest {
    pub fn new(params: IsolationParams, seed: u64) -> Self {
        Self { params, seed }
    }

    fn grow(sample: &[f64], depth: usize, max_depth: usize, rng: &mut StdRng) -> Node {
        let lo = sample.iter().copied().fold(f64::INFINITY, f64::min);
        let hi = sample.iter().copied().fold(f64::NEG_INFINITY, f64::max);

        if sample.len() <= 1 || depth >= max_depth || hi - lo < 1e-12 {
            return Node::Leaf {
                size: sample.len(),
            };
        }

        let split = rng.gen_range(lo..hi);
        let left: Vec<f64> = sample.iter().copied().filter(|&x| x < split).collect();
        let right: Vec<f64> = sample.iter().copied().filter(|&x| x >= split).collect();

        Node::Split {
            value: split,
            left: Box::new(Self::grow(&left, depth + 1, max_depth, rng)),
            right: Box::new(Self::grow(&right, depth + 1, max_depth, rng)),
        }
    }

    fn path_length(x: f64, mut node: &Node) -> f64 {
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path(*size),
                Node::Split { value, left, right } => {
                    node = if x < *value { left } else { right };
                    depth += 1.0;
                }
            }
        }
    }
}

/// Expected path length of an unsuccessful BST search over `n` points.
fn average_path(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_MASCHERONI) - 2.0 * (n - 1.0) / n
        }
    }
}

impl Detector for IsolationForest {
    fn name(&self) -> &'static str {
        "isolation_forest"
    }

    fn min_points(&self) -> usize {
        20
    }

    fn evaluate(&self, series: &[f64]) -> Result<Evaluation> {
        require_points(series, self.min_points())?;

        let sample_size = self.params.sample_size.min(series.len());
        let normalizer = average_path(sample_size).max(1e-12);
        let mut rng = StdRng::seed_from_u64(self.seed);

        let mut path_sums = vec![0.0; series.len()];
        for _ in 0..self.params.trees {
            let sample: Vec<f64> = rand::seq::index::sample(&mut rng, series.len(), sample_size)
                .into_iter()
                .map(|i| series[i])
                .collect();
            let max_depth = (sample_size as f64).log2().ceil() as usize;
            let tree = Self::grow(&sample, 0, max_depth, &mut rng);

            for (sum, &x) in path_sums.iter_mut().zip(series.iter()) {
                *sum += Self::path_length(x, &tree);
            }
        }

        let scores: Vec<f64> = path_sums
            .iter()
            .map(|sum| {
                let mean_path = sum / self.params.trees as f64;
                2f64.powf(-mean_path / normalizer)
            })
            .collect();

        let cutoff = quantile(&scores, 1.0 - self.params.contamination);
        let current = scores[scores.len() - 1];
        let history = &series[..series.len() - 1];

        Ok(Evaluation {
            is_anomalous: current > cutoff,
            expected: median(history),
            deviation: current,
        })
    }
}
