//! Distribution-based detectors: 3-sigma, scaled MAD, IQR fences, and
//! the sudden-change spike check.

use super::{require_points, Detector, Evaluation};
use crate::error::Result;
use crate::utils::{mean, median, quantile, scaled_mad, std_dev};

const NEAR_ZERO: f64 = 1e-10;

/// Flags the current value when it sits more than `threshold` standard
/// deviations from the history mean.
#[derive(Debug, Clone)]
pub struct ThreeSigma {
    threshold: f64,
}

impl ThreeSigma {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Detector for ThreeSigma {
    fn name(&self) -> &'static str {
        "three_sigma"
    }

    fn min_points(&self) -> usize {
        3
    }

    fn evaluate(&self, series: &[f64]) -> Result<Evaluation> {
        require_points(series, self.min_points())?;
        let (history, current) = series.split_at(series.len() - 1);
        let current = current[0];

        let expected = mean(history);
        let spread = std_dev(history);
        if !spread.is_finite() || spread < NEAR_ZERO {
            // Flat history; the divide-by-zero guard treats it as normal.
            return Ok(Evaluation::normal(expected));
        }

        let score = (current - expected).abs() / spread;
        Ok(Evaluation {
            is_anomalous: score > self.threshold,
            expected,
            deviation: score,
        })
    }
}

/// Flags the current value by its scaled median-absolute-deviation
/// score against the history median. Robust against outliers in the
/// history, but over-sensitive on flat baselines, hence the
/// near-equality fallback when the MAD collapses.
#[derive(Debug, Clone)]
pub struct Mad {
    threshold: f64,
}

impl Mad {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Detector for Mad {
    fn name(&self) -> &'static str {
        "mad"
    }

    fn min_points(&self) -> usize {
        3
    }

    fn evaluate(&self, series: &[f64]) -> Result<Evaluation> {
        require_points(series, self.min_points())?;
        let (history, current) = series.split_at(series.len() - 1);
        let current = current[0];

        let center = median(history);
        let spread = scaled_mad(history, center);

        if spread < NEAR_ZERO {
            // Flat baseline: any departure from the shared value counts.
            let tolerance = 1e-9 * center.abs().max(1.0);
            let offset = (current - center).abs();
            return Ok(Evaluation {
                is_anomalous: offset > tolerance,
                expected: center,
                deviation: offset,
            });
        }

        let score = (current - center).abs() / spread;
        Ok(Evaluation {
            is_anomalous: score > self.threshold,
            expected: center,
            deviation: score,
        })
    }
}

/// Flags the current value outside the Tukey fences
/// `[Q1 - k*IQR, Q3 + k*IQR]` of the history.
#[derive(Debug, Clone)]
pub struct Iqr {
    multiplier: f64,
}

impl Iqr {
    pub fn new(multiplier: f64) -> Self {
        Self { multiplier }
    }
}

impl Detector for Iqr {
    fn name(&self) -> &'static str {
        "iqr"
    }

    fn min_points(&self) -> usize {
        5
    }

    fn evaluate(&self, series: &[f64]) -> Result<Evaluation> {
        require_points(series, self.min_points())?;
        let (history, current) = series.split_at(series.len() - 1);
        let current = current[0];

        let q1 = quantile(history, 0.25);
        let q3 = quantile(history, 0.75);
        let iqr = q3 - q1;
        let expected = median(history);

        if iqr < NEAR_ZERO {
            return Ok(Evaluation::normal(expected));
        }

        let lower = q1 - self.multiplier * iqr;
        let upper = q3 + self.multiplier * iqr;
        let excess = if current < lower {
            lower - current
        } else if current > upper {
            current - upper
        } else {
            0.0
        };

        Ok(Evaluation {
            is_anomalous: excess > 0.0,
            expected,
            deviation: excess / iqr,
        })
    }
}

/// Flags a jump between the two most recent readings larger than a
/// per-variable physical limit (5 °C for temperature, 10 hPa for
/// pressure in the default network).
#[derive(Debug, Clone)]
pub struct Spike {
    limit: f64,
}

impl Spike {
    pub fn new(limit: f64) -> Self {
        Self { limit }
    }
}

impl Detector for Spike {
    fn name(&self) -> &'static str {
        "spike"
    }

    fn min_points(&self) -> usize {
        2
    }

    fn evaluate(&self, series: &[f64]) -> Result<Evaluation> {
        require_points(series, self.min_points())?;
        let current = series[series.len() - 1];
        let previous = series[series.len() - 2];
        let jump = (current - previous).abs();

        Ok(Evaluation {
            is_anomalous: jump > self.limit,
            expected: previous,
            deviation: jump,
        })
    }
}
