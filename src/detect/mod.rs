//! Temporal anomaly detectors.
//!
//! Every detector implements the same capability: evaluate a series
//! whose final element is the current value, with everything before it
//! as history, and report whether that current value is anomalous
//! together with a baseline and a deviation magnitude. New detectors
//! plug in through [`Detector`] alone; the orchestrator carries no
//! per-method logic.

mod autoregressive;
mod density;
mod isolation;
mod seasonal;
mod statistical;

pub use autoregressive::ArimaForecast;
pub use density::LocalOutlierFactor;
pub use isolation::IsolationForest;
pub use seasonal::SeasonalDecomposition;
pub use statistical::{Iqr, Mad, Spike, ThreeSigma};

use crate::config::{DetectorParams, EngineConfig, VariableSpec};
use crate::error::{EngineError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Verdict of one detector over one window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Whether the current (final) value is anomalous.
    pub is_anomalous: bool,
    /// Baseline the current value was compared against.
    pub expected: f64,
    /// Deviation magnitude; unit depends on the method (σ-equivalents
    /// for the statistical and model detectors, a score for the
    /// density and isolation variants).
    pub deviation: f64,
}

impl Evaluation {
    /// A non-anomalous verdict around the given baseline.
    pub fn normal(expected: f64) -> Self {
        Self {
            is_anomalous: false,
            expected,
            deviation: 0.0,
        }
    }
}

/// Common capability of all temporal detectors.
pub trait Detector: Send + Sync {
    /// Stable method name used in reports and diagnostics.
    fn name(&self) -> &'static str;

    /// Fewest valid points (history + current) this detector accepts.
    fn min_points(&self) -> usize;

    /// Evaluate the trailing point of `series` against its history.
    ///
    /// Returns `InsufficientData` when the series is shorter than
    /// [`Detector::min_points`], `ModelFit` when a model-based variant
    /// fails to converge.
    fn evaluate(&self, series: &[f64]) -> Result<Evaluation>;
}

/// Guard shared by all detectors.
pub(crate) fn require_points(series: &[f64], needed: usize) -> Result<()> {
    if series.len() < needed {
        return Err(EngineError::InsufficientData {
            needed,
            got: series.len(),
        });
    }
    Ok(())
}

/// Selectable detection methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorMethod {
    #[serde(alias = "3sigma")]
    ThreeSigma,
    Mad,
    Iqr,
    IsolationForest,
    #[serde(alias = "lof")]
    LocalOutlierFactor,
    #[serde(alias = "stl")]
    Seasonal,
    Arima,
    #[serde(alias = "sudden_change")]
    Spike,
}

impl DetectorMethod {
    /// Every selectable method, in reporting-priority order.
    pub const ALL: [DetectorMethod; 8] = [
        DetectorMethod::ThreeSigma,
        DetectorMethod::Mad,
        DetectorMethod::Iqr,
        DetectorMethod::IsolationForest,
        DetectorMethod::LocalOutlierFactor,
        DetectorMethod::Seasonal,
        DetectorMethod::Arima,
        DetectorMethod::Spike,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DetectorMethod::ThreeSigma => "three_sigma",
            DetectorMethod::Mad => "mad",
            DetectorMethod::Iqr => "iqr",
            DetectorMethod::IsolationForest => "isolation_forest",
            DetectorMethod::LocalOutlierFactor => "local_outlier_factor",
            DetectorMethod::Seasonal => "seasonal",
            DetectorMethod::Arima => "arima",
            DetectorMethod::Spike => "spike",
        }
    }

    /// Instantiate the detector for one variable.
    ///
    /// Returns `None` when the method does not apply to the variable
    /// (spike detection without a configured limit).
    pub fn build(
        &self,
        params: &DetectorParams,
        variable: &VariableSpec,
        seed: u64,
    ) -> Option<Box<dyn Detector>> {
        match self {
            DetectorMethod::ThreeSigma => {
                Some(Box::new(ThreeSigma::new(params.sigma_threshold())))
            }
            DetectorMethod::Mad => Some(Box::new(Mad::new(params.mad_threshold()))),
            DetectorMethod::Iqr => Some(Box::new(Iqr::new(params.iqr_multiplier()))),
            DetectorMethod::IsolationForest => Some(Box::new(IsolationForest::new(
                params.isolation.clone(),
                seed,
            ))),
            DetectorMethod::LocalOutlierFactor => Some(Box::new(LocalOutlierFactor::new(
                params.density.neighbors,
                params.density.threshold,
            ))),
            DetectorMethod::Seasonal => Some(Box::new(SeasonalDecomposition::new(
                params.seasonal.period,
                params.seasonal.threshold,
            ))),
            DetectorMethod::Arima => Some(Box::new(ArimaForecast::new(params.arima.clone()))),
            DetectorMethod::Spike => variable
                .spike_limit
                .map(|limit| Box::new(Spike::new(limit)) as Box<dyn Detector>),
        }
    }
}

impl fmt::Display for DetectorMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectorMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "three_sigma" | "3sigma" => Ok(DetectorMethod::ThreeSigma),
            "mad" => Ok(DetectorMethod::Mad),
            "iqr" => Ok(DetectorMethod::Iqr),
            "isolation_forest" => Ok(DetectorMethod::IsolationForest),
            "local_outlier_factor" | "lof" => Ok(DetectorMethod::LocalOutlierFactor),
            "seasonal" | "stl" => Ok(DetectorMethod::Seasonal),
            "arima" => Ok(DetectorMethod::Arima),
            "spike" | "sudden_change" => Ok(DetectorMethod::Spike),
            other => Err(EngineError::Configuration(format!(
                "unknown detection method '{other}'"
            ))),
        }
    }
}

/// Build the configured detector set for one variable, in
/// configuration order.
pub fn build_detectors(config: &EngineConfig, variable: &VariableSpec) -> Vec<Box<dyn Detector>> {
    config
        .methods
        .iter()
        .filter_map(|method| method.build(&config.detectors, variable, config.seed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_variables;

    #[test]
    fn method_names_round_trip() {
        for method in DetectorMethod::ALL {
            assert_eq!(method.as_str().parse::<DetectorMethod>().unwrap(), method);
        }
    }

    #[test]
    fn legacy_aliases_parse() {
        assert_eq!(
            "3sigma".parse::<DetectorMethod>().unwrap(),
            DetectorMethod::ThreeSigma
        );
        assert_eq!(
            "lof".parse::<DetectorMethod>().unwrap(),
            DetectorMethod::LocalOutlierFactor
        );
        assert_eq!(
            "stl".parse::<DetectorMethod>().unwrap(),
            DetectorMethod::Seasonal
        );
    }

    #[test]
    fn unknown_method_is_a_configuration_error() {
        let err = "kalman".parse::<DetectorMethod>().unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn spike_builds_only_with_a_limit() {
        let params = DetectorParams::default();
        let variables = default_variables();
        let temp = variables.iter().find(|v| v.name == "temp_out").unwrap();
        let hum = variables.iter().find(|v| v.name == "out_hum").unwrap();

        assert!(DetectorMethod::Spike.build(&params, temp, 0).is_some());
        assert!(DetectorMethod::Spike.build(&params, hum, 0).is_none());
    }

    #[test]
    fn configured_set_preserves_order() {
        let config = EngineConfig {
            methods: vec![DetectorMethod::Mad, DetectorMethod::ThreeSigma],
            ..EngineConfig::default()
        };
        let variable = &config.variables[0];
        let detectors = build_detectors(&config, variable);

        assert_eq!(detectors.len(), 2);
        assert_eq!(detectors[0].name(), "mad");
        assert_eq!(detectors[1].name(), "three_sigma");
    }

    #[test]
    fn methods_deserialize_from_snake_case() {
        let methods: Vec<DetectorMethod> =
            serde_json::from_str(r#"["three_sigma", "isolation_forest", "stl"]"#).unwrap();
        assert_eq!(
            methods,
            vec![
                DetectorMethod::ThreeSigma,
                DetectorMethod::IsolationForest,
                DetectorMethod::Seasonal
            ]
        );
    }
}
