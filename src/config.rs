//! Engine configuration.
//!
//! The configuration is owned by the external front end and threaded
//! through the orchestrator and detectors by reference, so concurrent
//! runs with different settings never share mutable state. `validate`
//! fails fast before any evaluation begins.

use crate::detect::DetectorMethod;
use crate::error::{EngineError, Result};
use chrono::Duration;
use serde::Deserialize;

/// Per-variable settings: display metadata plus the checks whose
/// meaning depends on what the variable measures.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VariableSpec {
    pub name: String,
    pub label: String,
    pub unit: String,
    /// Largest plausible jump between consecutive readings; enables the
    /// spike detector for this variable.
    pub spike_limit: Option<f64>,
    /// Whether a high zero ratio indicates a stalled sensor. Off for
    /// variables where zero is an ordinary reading (rain, calm wind).
    pub zero_check: bool,
    /// Variance below this floor flags a possible stuck sensor;
    /// 0.0 disables the check.
    pub variance_floor: f64,
    /// How the variable changes per 100 m of descent, used to bring
    /// neighbor readings onto a station's elevation in the snapshot
    /// check (0.65 °C for temperature, 12 hPa for pressure).
    pub elevation_rate: Option<f64>,
}

impl Default for VariableSpec {
    fn default() -> Self {
        Self {
            name: String::new(),
            label: String::new(),
            unit: String::new(),
            spike_limit: None,
            zero_check: true,
            variance_floor: 0.0,
            elevation_rate: None,
        }
    }
}

impl VariableSpec {
    pub fn new(name: &str, label: &str, unit: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            unit: unit.to_string(),
            ..Self::default()
        }
    }

    pub fn with_spike_limit(mut self, limit: f64) -> Self {
        self.spike_limit = Some(limit);
        self
    }

    pub fn without_zero_check(mut self) -> Self {
        self.zero_check = false;
        self
    }

    pub fn with_variance_floor(mut self, floor: f64) -> Self {
        self.variance_floor = floor;
        self
    }

    pub fn with_elevation_rate(mut self, rate_per_100m: f64) -> Self {
        self.elevation_rate = Some(rate_per_100m);
        self
    }
}

/// Thresholds for the isolation forest detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IsolationParams {
    pub trees: usize,
    pub sample_size: usize,
    /// Expected anomaly fraction; the score quantile above which the
    /// current point is flagged.
    pub contamination: f64,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            trees: 100,
            sample_size: 64,
            contamination: 0.1,
        }
    }
}

/// Thresholds for the local-outlier-factor detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DensityParams {
    /// In-series temporal neighbors considered per point.
    pub neighbors: usize,
    /// Density ratio above which the current point is flagged.
    pub threshold: f64,
}

impl Default for DensityParams {
    fn default() -> Self {
        Self {
            neighbors: 20,
            threshold: 1.5,
        }
    }
}

/// Thresholds for the seasonal-decomposition detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SeasonalParams {
    /// Seasonal period in samples.
    pub period: usize,
    /// Residual threshold in units of residual standard deviation.
    pub threshold: f64,
}

impl Default for SeasonalParams {
    fn default() -> Self {
        Self {
            period: 6,
            threshold: 3.0,
        }
    }
}

/// Order and interval settings for the autoregressive-forecast detector.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ArimaParams {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    /// Confidence level of the one-step forecast interval.
    pub confidence: f64,
}

impl Default for ArimaParams {
    fn default() -> Self {
        Self {
            p: 1,
            d: 0,
            q: 1,
            confidence: 0.95,
        }
    }
}

/// Per-method detector thresholds.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DetectorParams {
    pub sigma_threshold: Option<f64>,
    pub mad_threshold: Option<f64>,
    pub iqr_multiplier: Option<f64>,
    pub isolation: IsolationParams,
    pub density: DensityParams,
    pub seasonal: SeasonalParams,
    pub arima: ArimaParams,
}

impl DetectorParams {
    pub fn sigma_threshold(&self) -> f64 {
        self.sigma_threshold.unwrap_or(3.0)
    }

    pub fn mad_threshold(&self) -> f64 {
        self.mad_threshold.unwrap_or(3.5)
    }

    pub fn iqr_multiplier(&self) -> f64 {
        self.iqr_multiplier.unwrap_or(1.5)
    }
}

/// Spatial verification settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub enabled: bool,
    pub radius_km: f64,
    /// Stations further apart vertically than this are never neighbors;
    /// `None` keeps radius-only filtering.
    pub max_elevation_gap_m: Option<f64>,
    /// Mean correlation at or above this classifies a weather event.
    pub correlation_high: f64,
    /// Mean correlation at or below this classifies a device failure.
    pub correlation_low: f64,
    /// Longest run of consecutive missing points that linear
    /// interpolation will bridge.
    pub max_gap_run: usize,
    /// Minimum points a neighbor series must retain to be usable.
    pub min_overlap: usize,
    /// Scaled-MAD deviation beyond which a reading is a snapshot
    /// outlier against its neighborhood.
    pub snapshot_threshold: f64,
    /// Reporting neighbors a station needs before the snapshot check
    /// applies to it.
    pub snapshot_min_neighbors: usize,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            radius_km: 100.0,
            max_elevation_gap_m: Some(500.0),
            correlation_high: 0.6,
            correlation_low: 0.3,
            max_gap_run: 3,
            min_overlap: 5,
            snapshot_threshold: 3.0,
            snapshot_min_neighbors: 2,
        }
    }
}

/// Long-period health evaluation settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthConfig {
    pub period_days: i64,
    /// Zero ratio above this is a critical stalled-sensor issue.
    pub zero_critical: f64,
    /// Zero ratio above this (up to `zero_critical`) is a warning.
    pub zero_warning: f64,
    /// Missing ratio above this is a critical data-loss issue.
    pub null_critical: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            period_days: 7,
            zero_critical: 0.5,
            zero_warning: 0.3,
            null_critical: 0.5,
        }
    }
}

/// Complete engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Temporal detectors to run, in reporting-priority order.
    pub methods: Vec<DetectorMethod>,
    /// Variables evaluated per station.
    pub variables: Vec<VariableSpec>,
    /// Classification window length.
    pub window_hours: i64,
    /// Nominal sampling interval of the network.
    pub sampling_minutes: i64,
    pub detectors: DetectorParams,
    pub spatial: SpatialConfig,
    pub health: HealthConfig,
    /// Worker threads for the classification batch; `None` lets the
    /// pool pick.
    pub workers: Option<usize>,
    /// Seed for detectors that draw randomness, keeping repeated runs
    /// on identical input identical.
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            methods: vec![DetectorMethod::ThreeSigma],
            variables: default_variables(),
            window_hours: 6,
            sampling_minutes: 10,
            detectors: DetectorParams::default(),
            spatial: SpatialConfig::default(),
            health: HealthConfig::default(),
            workers: None,
            seed: 0,
        }
    }
}

/// The network's standard meteorological variables.
pub fn default_variables() -> Vec<VariableSpec> {
    vec![
        VariableSpec::new("temp_out", "Temperature", "°C")
            .with_spike_limit(5.0)
            .with_variance_floor(1e-3)
            .with_elevation_rate(0.65),
        VariableSpec::new("out_hum", "Humidity", "%").with_variance_floor(1e-3),
        VariableSpec::new("wind_speed", "Wind", "km/h").without_zero_check(),
        VariableSpec::new("bar", "Pressure", "hPa")
            .with_spike_limit(10.0)
            .with_variance_floor(1e-4)
            .with_elevation_rate(12.0),
        VariableSpec::new("rain", "Rain", "mm").without_zero_check(),
    ]
}

impl EngineConfig {
    /// Check the whole surface before any evaluation begins.
    pub fn validate(&self) -> Result<()> {
        if self.methods.is_empty() {
            return Err(EngineError::Configuration(
                "at least one detection method is required".to_string(),
            ));
        }
        if self.variables.is_empty() {
            return Err(EngineError::Configuration(
                "at least one variable is required".to_string(),
            ));
        }
        for (i, var) in self.variables.iter().enumerate() {
            if var.name.is_empty() {
                return Err(EngineError::Configuration(format!(
                    "variable {i} has an empty name"
                )));
            }
            if self.variables[..i].iter().any(|v| v.name == var.name) {
                return Err(EngineError::Configuration(format!(
                    "duplicate variable '{}'",
                    var.name
                )));
            }
        }
        if self.window_hours <= 0 {
            return Err(EngineError::Configuration(
                "window_hours must be positive".to_string(),
            ));
        }
        if self.sampling_minutes <= 0 {
            return Err(EngineError::Configuration(
                "sampling_minutes must be positive".to_string(),
            ));
        }

        let d = &self.detectors;
        for (name, value) in [
            ("sigma_threshold", d.sigma_threshold()),
            ("mad_threshold", d.mad_threshold()),
            ("iqr_multiplier", d.iqr_multiplier()),
            ("density threshold", d.density.threshold),
            ("seasonal threshold", d.seasonal.threshold),
        ] {
            if value <= 0.0 {
                return Err(EngineError::Configuration(format!(
                    "{name} must be positive"
                )));
            }
        }
        if d.isolation.trees == 0 || d.isolation.sample_size < 2 {
            return Err(EngineError::Configuration(
                "isolation forest needs at least one tree and a sample of 2".to_string(),
            ));
        }
        if !(0.0..=0.5).contains(&d.isolation.contamination) || d.isolation.contamination == 0.0 {
            return Err(EngineError::Configuration(
                "isolation contamination must be in (0, 0.5]".to_string(),
            ));
        }
        if d.density.neighbors == 0 {
            return Err(EngineError::Configuration(
                "density neighbor count must be positive".to_string(),
            ));
        }
        if d.seasonal.period < 2 {
            return Err(EngineError::Configuration(
                "seasonal period must be at least 2".to_string(),
            ));
        }
        if d.arima.p + d.arima.q == 0 {
            return Err(EngineError::Configuration(
                "arima order needs p + q >= 1".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&d.arima.confidence) || d.arima.confidence == 0.0 {
            return Err(EngineError::Configuration(
                "arima confidence must be in (0, 1)".to_string(),
            ));
        }

        let s = &self.spatial;
        if s.radius_km <= 0.0 {
            return Err(EngineError::Configuration(
                "neighbor radius must be positive".to_string(),
            ));
        }
        if s.correlation_low > s.correlation_high {
            return Err(EngineError::Configuration(format!(
                "correlation_low ({}) must not exceed correlation_high ({})",
                s.correlation_low, s.correlation_high
            )));
        }
        for (name, value) in [
            ("correlation_high", s.correlation_high),
            ("correlation_low", s.correlation_low),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(EngineError::Configuration(format!(
                    "{name} must be within [-1, 1]"
                )));
            }
        }
        if s.min_overlap < 2 {
            return Err(EngineError::Configuration(
                "min_overlap must be at least 2".to_string(),
            ));
        }
        if s.snapshot_threshold <= 0.0 {
            return Err(EngineError::Configuration(
                "snapshot_threshold must be positive".to_string(),
            ));
        }
        if s.snapshot_min_neighbors == 0 {
            return Err(EngineError::Configuration(
                "snapshot_min_neighbors must be positive".to_string(),
            ));
        }

        let h = &self.health;
        if h.period_days <= 0 {
            return Err(EngineError::Configuration(
                "health period must be positive".to_string(),
            ));
        }
        for (name, value) in [
            ("zero_critical", h.zero_critical),
            ("zero_warning", h.zero_warning),
            ("null_critical", h.null_critical),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(EngineError::Configuration(format!(
                    "{name} must be within [0, 1]"
                )));
            }
        }
        if h.zero_warning > h.zero_critical {
            return Err(EngineError::Configuration(
                "zero_warning must not exceed zero_critical".to_string(),
            ));
        }

        if self.workers == Some(0) {
            return Err(EngineError::Configuration(
                "worker count must be positive".to_string(),
            ));
        }

        Ok(())
    }

    pub fn window_duration(&self) -> Duration {
        Duration::hours(self.window_hours)
    }

    pub fn sampling_interval(&self) -> Duration {
        Duration::minutes(self.sampling_minutes)
    }

    pub fn health_period(&self) -> Duration {
        Duration::days(self.health.period_days)
    }

    /// Look up a variable's settings by name.
    pub fn variable(&self, name: &str) -> Option<&VariableSpec> {
        self.variables.iter().find(|v| v.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn rejects_inverted_correlation_thresholds() {
        let mut config = EngineConfig::default();
        config.spatial.correlation_low = 0.8;
        config.spatial.correlation_high = 0.4;

        let err = config.validate().unwrap_err();
        assert!(matches!(err, EngineError::Configuration(_)));
    }

    #[test]
    fn rejects_empty_method_list() {
        let config = EngineConfig {
            methods: vec![],
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_duplicate_variables() {
        let mut config = EngineConfig::default();
        config.variables.push(VariableSpec::new("temp_out", "Temp", "°C"));
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_workers() {
        let config = EngineConfig {
            workers: Some(0),
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn deserializes_partial_config() {
        let json = r#"{
            "methods": ["mad", "arima"],
            "window_hours": 12,
            "spatial": { "radius_km": 50.0 }
        }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(
            config.methods,
            vec![DetectorMethod::Mad, DetectorMethod::Arima]
        );
        assert_eq!(config.window_hours, 12);
        assert_eq!(config.spatial.radius_km, 50.0);
        // Untouched sections keep their defaults.
        assert_eq!(config.spatial.max_gap_run, 3);
        assert_eq!(config.sampling_minutes, 10);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn variable_lookup_by_name() {
        let config = EngineConfig::default();
        assert!(config.variable("bar").is_some());
        assert!(config.variable("dew_point").is_none());
        assert!(!config.variable("rain").unwrap().zero_check);
    }
}
