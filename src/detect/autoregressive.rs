//! Autoregressive-forecast detector.
//!
//! Fits an ARIMA(p, d, q) model on the history by conditional least
//! squares, forecasts the current step, and flags the actual reading
//! when it falls outside the forecast's confidence interval.

use super::{require_points, Detector, Evaluation};
use crate::config::ArimaParams;
use crate::error::{EngineError, Result};
use crate::utils::optimization::{simplex_minimize, SimplexConfig};
use statrs::distribution::{ContinuousCDF, Normal};

const NEAR_ZERO: f64 = 1e-10;

/// One-step ARIMA forecaster with an interval test on the current
/// reading. Non-convergence of the coefficient search surfaces as
/// [`EngineError::ModelFit`], never a panic.
#[derive(Debug, Clone)]
pub struct ArimaForecast {
    params: ArimaParams,
}

/// Fitted coefficients on the differenced scale.
struct FittedModel {
    intercept: f64,
    ar: Vec<f64>,
    ma: Vec<f64>,
    residuals: Vec<f64>,
    sigma: f64,
}

impl ArimaForecast {
    pub fn new(params: ArimaParams) -> Self {
        Self { params }
    }

    /// Apply `d` rounds of first differencing.
    fn difference(series: &[f64], d: usize) -> Vec<f64> {
        let mut result = series.to_vec();
        for _ in 0..d {
            if result.len() <= 1 {
                break;
            }
            result = result.windows(2).map(|w| w[1] - w[0]).collect();
        }
        result
    }

    /// Conditional sum of squares and the residual trail it implies.
    fn css(diff: &[f64], p: usize, q: usize, point: &[f64]) -> (f64, Vec<f64>) {
        let intercept = point[0];
        let ar = &point[1..1 + p];
        let ma = &point[1 + p..1 + p + q];
        let n = diff.len();
        let start = p.max(q);

        let mut residuals = vec![0.0; n];
        let mut total = 0.0;
        for t in start..n {
            let mut pred = intercept;
            for (i, phi) in ar.iter().enumerate() {
                pred += phi * (diff[t - 1 - i] - intercept);
            }
            for (i, theta) in ma.iter().enumerate() {
                pred += theta * residuals[t - 1 - i];
            }
            let err = diff[t] - pred;
            residuals[t] = err;
            total += err * err;
        }
        (total, residuals)
    }

    fn fit(&self, history: &[f64]) -> Result<FittedModel> {
        let p = self.params.p;
        let q = self.params.q;
        let diff = Self::difference(history, self.params.d);
        let effective = diff.len().saturating_sub(p.max(q));
        let n_params = p + q + 1;
        if effective <= n_params {
            return Err(EngineError::InsufficientData {
                needed: self.min_points(),
                got: history.len(),
            });
        }

        let mean = diff.iter().sum::<f64>() / diff.len() as f64;
        let mut initial = vec![0.0; n_params];
        initial[0] = mean;
        for i in 0..p {
            initial[1 + i] = 0.1 / (i + 1) as f64;
        }
        for i in 0..q {
            initial[1 + p + i] = 0.1 / (i + 1) as f64;
        }

        // Keep AR/MA coefficients inside the unit interval; the
        // intercept floats freely.
        let mut bounds = vec![(f64::NEG_INFINITY, f64::INFINITY)];
        bounds.extend(std::iter::repeat((-0.99, 0.99)).take(p + q));

        let outcome = simplex_minimize(
            |point| Self::css(&diff, p, q, point).0,
            &initial,
            Some(&bounds),
            &SimplexConfig::default(),
        );
        if !outcome.converged || !outcome.value.is_finite() {
            return Err(EngineError::ModelFit(
                "css minimization did not converge".to_string(),
            ));
        }

        let (css, residuals) = Self::css(&diff, p, q, &outcome.point);
        let variance = css / effective as f64;
        if !variance.is_finite() || variance < 0.0 {
            return Err(EngineError::ModelFit(
                "residual variance is not finite".to_string(),
            ));
        }

        Ok(FittedModel {
            intercept: outcome.point[0],
            ar: outcome.point[1..1 + p].to_vec(),
            ma: outcome.point[1 + p..1 + p + q].to_vec(),
            residuals,
            sigma: variance.sqrt(),
        })
    }

    /// One-step forecast on the original scale.
    fn forecast(&self, history: &[f64], model: &FittedModel) -> f64 {
        let diff = Self::difference(history, self.params.d);
        let n = diff.len();

        let mut pred = model.intercept;
        for (i, phi) in model.ar.iter().enumerate() {
            if i < n {
                pred += phi * (diff[n - 1 - i] - model.intercept);
            }
        }
        for (i, theta) in model.ma.iter().enumerate() {
            if i < n {
                pred += theta * model.residuals[n - 1 - i];
            }
        }

        // Undo differencing one level at a time, anchoring each level
        // on its last observed value.
        let mut value = pred;
        for level in (0..self.params.d).rev() {
            let series = Self::difference(history, level);
            value += series[series.len() - 1];
        }
        value
    }
}

impl Detector for ArimaForecast {
    fn name(&self) -> &'static str {
        "arima"
    }

    fn min_points(&self) -> usize {
        6 * (self.params.p + self.params.d + self.params.q).max(1)
    }

    fn evaluate(&self, series: &[f64]) -> Result<Evaluation> {
        require_points(series, self.min_points())?;
        let (history, current) = series.split_at(series.len() - 1);
        let current = current[0];

        let model = self.fit(history)?;
        let expected = self.forecast(history, &model);

        if model.sigma < NEAR_ZERO {
            // Degenerate fit: the interval has zero width, so anything
            // measurably off the forecast is out.
            let tolerance = 1e-9 * expected.abs().max(1.0);
            let offset = (current - expected).abs();
            return Ok(Evaluation {
                is_anomalous: offset > tolerance,
                expected,
                deviation: offset,
            });
        }

        let normal = Normal::new(0.0, 1.0).unwrap();
        let z = normal.inverse_cdf(0.5 + self.params.confidence / 2.0);
        let score = (current - expected).abs() / model.sigma;

        Ok(Evaluation {
            is_anomalous: score > z,
            expected,
            deviation: score,
        })
    }
}
