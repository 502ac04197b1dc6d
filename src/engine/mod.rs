//! Classification orchestrator.
//!
//! Drives the per-(station, variable) pipeline: read the window, run
//! the configured temporal detectors, and, for candidates, let the
//! spatial verifier settle the terminal state. Pairs are independent,
//! so the batch fans out over a bounded worker pool and merges results
//! afterward.

mod report;

pub use report::{AnomalyRecord, ClassificationReport, SkippedDetector, Summary};

use crate::config::{EngineConfig, VariableSpec};
use crate::core::{Station, Window};
use crate::detect::build_detectors;
use crate::error::{EngineError, Result};
use crate::spatial::{
    detect_snapshot_outliers, NeighborGraph, SnapshotOutlier, SpatialVerifier,
};
use crate::store::{ObservationStore, WindowReader};
use chrono::{DateTime, Utc};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// What one (station, variable) pair contributed to the batch.
struct PairOutcome {
    record: Option<AnomalyRecord>,
    skipped: Vec<SkippedDetector>,
    /// Whether at least one detector produced a verdict.
    evaluated: bool,
}

/// The anomaly classification engine.
///
/// Holds only per-run state: the validated configuration, the static
/// station table, and the neighbor graph built once at construction
/// and shared read-only with the workers.
#[derive(Debug)]
pub struct ClassificationEngine<'a, S: ObservationStore> {
    store: &'a S,
    stations: &'a [Station],
    config: &'a EngineConfig,
    graph: NeighborGraph,
}

impl<'a, S: ObservationStore> ClassificationEngine<'a, S> {
    /// Validate the configuration and precompute the neighbor graph.
    ///
    /// Configuration problems surface here, before any evaluation.
    pub fn new(store: &'a S, stations: &'a [Station], config: &'a EngineConfig) -> Result<Self> {
        config.validate()?;
        let graph = NeighborGraph::build(
            stations,
            config.spatial.radius_km,
            config.spatial.max_elevation_gap_m,
        );
        Ok(Self {
            store,
            stations,
            config,
            graph,
        })
    }

    /// The per-run neighbor graph.
    pub fn neighbor_graph(&self) -> &NeighborGraph {
        &self.graph
    }

    /// Classify every configured (station, variable) pair over the
    /// window ending at `end`.
    ///
    /// Detector-level failures are logged and surfaced as report
    /// omissions; a store failure aborts the whole run.
    pub fn classify(&self, end: DateTime<Utc>) -> Result<ClassificationReport> {
        info!(
            stations = self.stations.len(),
            variables = self.config.variables.len(),
            window_hours = self.config.window_hours,
            "starting classification batch"
        );

        let pairs: Vec<(&Station, &VariableSpec)> = self
            .stations
            .iter()
            .flat_map(|s| self.config.variables.iter().map(move |v| (s, v)))
            .collect();

        let evaluate_all = || -> Result<Vec<PairOutcome>> {
            pairs
                .par_iter()
                .map(|(station, variable)| self.evaluate_pair(station, variable, end))
                .collect()
        };

        let outcomes = match self.config.workers {
            Some(workers) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(workers)
                    .build()
                    .map_err(|e| EngineError::Configuration(e.to_string()))?;
                pool.install(evaluate_all)?
            }
            None => evaluate_all()?,
        };

        let mut summary = Summary {
            stations: self.stations.len(),
            ..Summary::default()
        };
        let mut anomalies = Vec::new();
        let mut skipped = Vec::new();
        for outcome in outcomes {
            if outcome.evaluated {
                summary.pairs_evaluated += 1;
            }
            skipped.extend(outcome.skipped);
            match outcome.record {
                Some(record) => {
                    summary.count(&record);
                    anomalies.push(record);
                }
                None if outcome.evaluated => summary.normal += 1,
                None => {}
            }
        }

        info!(
            anomalies = anomalies.len(),
            skipped = skipped.len(),
            "classification batch finished"
        );

        Ok(ClassificationReport {
            window_end: end,
            window_hours: self.config.window_hours,
            anomalies,
            skipped,
            summary,
        })
    }

    /// One pair through the state machine: Normal until a detector
    /// flags the final point (Suspect), then the spatial verdict, or
    /// an unclassified anomaly when verification is disabled.
    fn evaluate_pair(
        &self,
        station: &Station,
        variable: &VariableSpec,
        end: DateTime<Utc>,
    ) -> Result<PairOutcome> {
        let reader = WindowReader::new(self.store, self.config.sampling_interval());
        let series = reader.read(Window::new(
            station.id.clone(),
            variable.name.clone(),
            end,
            self.config.window_duration(),
        ))?;
        let values = series.valid_values();

        let mut skipped = Vec::new();
        let mut evaluated = false;
        let mut candidate = None;
        for detector in build_detectors(self.config, variable) {
            match detector.evaluate(&values) {
                Ok(evaluation) => {
                    evaluated = true;
                    if evaluation.is_anomalous && candidate.is_none() {
                        candidate = Some((detector.name(), evaluation));
                    }
                }
                Err(
                    reason @ (EngineError::InsufficientData { .. } | EngineError::ModelFit(_)),
                ) => {
                    warn!(
                        station = %station.id,
                        variable = %variable.name,
                        detector = detector.name(),
                        %reason,
                        "detector skipped"
                    );
                    skipped.push(SkippedDetector {
                        station_id: station.id.clone(),
                        variable: variable.name.clone(),
                        detector: detector.name().to_string(),
                        reason: reason.to_string(),
                    });
                }
                Err(fatal) => return Err(fatal),
            }
        }

        let Some((method, evaluation)) = candidate else {
            return Ok(PairOutcome {
                record: None,
                skipped,
                evaluated,
            });
        };
        let Some((time, actual)) = series.last_valid() else {
            // A detector cannot flag without data; defensive fallback
            // for detectors added later.
            return Ok(PairOutcome {
                record: None,
                skipped,
                evaluated,
            });
        };

        debug!(
            station = %station.id,
            variable = %variable.name,
            method,
            deviation = evaluation.deviation,
            "temporal candidate raised"
        );

        let verdict = if self.config.spatial.enabled {
            let verifier = SpatialVerifier::new(
                self.store,
                &self.graph,
                &self.config.spatial,
                self.config.sampling_interval(),
            );
            Some(verifier.verify(&series)?)
        } else {
            None
        };

        Ok(PairOutcome {
            record: Some(AnomalyRecord {
                station_id: station.id.clone(),
                variable: variable.name.clone(),
                time,
                actual,
                expected: evaluation.expected,
                method: method.to_string(),
                deviation: evaluation.deviation,
                verdict,
            }),
            skipped,
            evaluated,
        })
    }

    /// Same-instant cross-section check over the whole network for one
    /// variable.
    pub fn snapshot(&self, variable: &str, time: DateTime<Utc>) -> Result<Vec<SnapshotOutlier>> {
        let spec = self
            .config
            .variable(variable)
            .ok_or_else(|| EngineError::Configuration(format!("unknown variable '{variable}'")))?;

        let mut readings = std::collections::HashMap::new();
        for station in self.stations {
            let points = self.store.query(&station.id, variable, time, time)?;
            if let Some((_, value)) = points.last() {
                readings.insert(station.id.clone(), *value);
            }
        }

        Ok(detect_snapshot_outliers(
            &readings,
            spec,
            self.stations,
            &self.graph,
            self.config.spatial.snapshot_threshold,
            self.config.spatial.snapshot_min_neighbors,
        ))
    }
}
