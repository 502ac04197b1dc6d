//! Long-period station health evaluation.
//!
//! Independent of the classification pipeline: looks at multi-day
//! windows per variable for stalled sensors (zeros), data loss
//! (missing samples), and stuck sensors (collapsed variance), then
//! rolls the findings up into a station severity.

use crate::config::EngineConfig;
use crate::core::{Station, Window};
use crate::error::Result;
use crate::store::{ObservationStore, WindowReader};
use crate::utils::variance;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

/// Health severity, orderable so the worst finding wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Healthy,
    Warning,
    Critical,
}

/// One concrete finding on a variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthIssue {
    pub severity: Severity,
    pub message: String,
}

impl HealthIssue {
    fn warning(message: &str) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.to_string(),
        }
    }

    fn critical(message: &str) -> Self {
        Self {
            severity: Severity::Critical,
            message: message.to_string(),
        }
    }
}

/// Per-variable metrics over the health period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VariableHealth {
    pub variable: String,
    /// Exact-zero readings over valid readings.
    pub zero_ratio: f64,
    /// Missing samples over expected samples.
    pub null_ratio: f64,
    /// Sample variance of the valid readings; absent with fewer than
    /// two valid points.
    pub variance: Option<f64>,
    pub issues: Vec<HealthIssue>,
    pub severity: Severity,
}

/// Health roll-up for one station.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HealthReport {
    pub station_id: String,
    pub period_days: i64,
    /// Valid readings over expected readings, across all variables.
    pub completeness: f64,
    pub variables: Vec<VariableHealth>,
    pub status: Severity,
}

/// Evaluates long-period health metrics; shares the windowed reader
/// with the classification pipeline but never touches the spatial
/// modules.
pub struct HealthEvaluator<'a, S: ObservationStore + ?Sized> {
    store: &'a S,
    config: &'a EngineConfig,
}

impl<'a, S: ObservationStore + ?Sized> HealthEvaluator<'a, S> {
    pub fn new(store: &'a S, config: &'a EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { store, config })
    }

    /// Evaluate one station over the configured period ending at `end`.
    pub fn evaluate(&self, station_id: &str, end: DateTime<Utc>) -> Result<HealthReport> {
        let reader = WindowReader::new(self.store, self.config.sampling_interval());
        let thresholds = &self.config.health;

        let mut variables = Vec::with_capacity(self.config.variables.len());
        let mut total_valid = 0usize;
        let mut total_expected = 0usize;

        for spec in &self.config.variables {
            let series = reader.read(Window::new(
                station_id.to_string(),
                spec.name.clone(),
                end,
                self.config.health_period(),
            ))?;

            let expected = series.len();
            let values = series.valid_values();
            let valid = values.len();
            total_valid += valid;
            total_expected += expected;

            let zero_count = values.iter().filter(|v| **v == 0.0).count();
            let zero_ratio = if valid > 0 {
                zero_count as f64 / valid as f64
            } else {
                0.0
            };
            let null_ratio = if expected > 0 {
                (expected - valid) as f64 / expected as f64
            } else {
                0.0
            };
            let spread = (valid >= 2).then(|| variance(&values));

            let mut issues = Vec::new();
            if spec.zero_check && valid > 0 {
                if zero_ratio > thresholds.zero_critical {
                    issues.push(HealthIssue::critical("possible stalled sensor"));
                } else if zero_ratio > thresholds.zero_warning {
                    issues.push(HealthIssue::warning("elevated zero ratio"));
                }
            }
            if null_ratio > thresholds.null_critical {
                issues.push(HealthIssue::critical("data loss"));
            }
            if spec.variance_floor > 0.0 {
                if let Some(v) = spread {
                    if v < spec.variance_floor {
                        issues.push(HealthIssue::warning("possible stuck sensor"));
                    }
                }
            }

            let severity = issues
                .iter()
                .map(|i| i.severity)
                .max()
                .unwrap_or(Severity::Healthy);
            debug!(
                station = station_id,
                variable = %spec.name,
                zero_ratio,
                null_ratio,
                ?severity,
                "variable health computed"
            );

            variables.push(VariableHealth {
                variable: spec.name.clone(),
                zero_ratio,
                null_ratio,
                variance: spread,
                issues,
                severity,
            });
        }

        let status = variables
            .iter()
            .map(|v| v.severity)
            .max()
            .unwrap_or(Severity::Healthy);
        let completeness = if total_expected > 0 {
            total_valid as f64 / total_expected as f64
        } else {
            0.0
        };

        Ok(HealthReport {
            station_id: station_id.to_string(),
            period_days: self.config.health.period_days,
            completeness,
            variables,
            status,
        })
    }

    /// Evaluate the whole station table.
    pub fn evaluate_all(
        &self,
        stations: &[Station],
        end: DateTime<Utc>,
    ) -> Result<Vec<HealthReport>> {
        stations
            .iter()
            .map(|station| self.evaluate(&station.id, end))
            .collect()
    }
}
