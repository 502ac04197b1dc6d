//! Structured classification output for the external reporter.

use crate::spatial::{SpatialClass, SpatialVerdict};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// One anomalous (station, variable) pair with everything the
/// reporter needs to render it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyRecord {
    pub station_id: String,
    pub variable: String,
    /// Timestamp of the flagged reading.
    pub time: DateTime<Utc>,
    pub actual: f64,
    pub expected: f64,
    /// Detection method that raised the candidate.
    pub method: String,
    pub deviation: f64,
    /// Spatial classification; `None` when spatial verification is
    /// disabled and the anomaly is reported unclassified.
    pub verdict: Option<SpatialVerdict>,
}

/// A detector that could not run for one pair, with the logged reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedDetector {
    pub station_id: String,
    pub variable: String,
    pub detector: String,
    pub reason: String,
}

/// Aggregate counts over the batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub stations: usize,
    pub pairs_evaluated: usize,
    pub normal: usize,
    pub weather_events: usize,
    pub device_failures: usize,
    pub suspected: usize,
    /// Anomalies reported without a spatial label (verification
    /// disabled).
    pub unclassified: usize,
}

impl Summary {
    pub(crate) fn count(&mut self, record: &AnomalyRecord) {
        match record.verdict.as_ref().map(|v| v.classification) {
            Some(SpatialClass::WeatherEvent) => self.weather_events += 1,
            Some(SpatialClass::DeviceFailure) => self.device_failures += 1,
            Some(SpatialClass::Suspected) => self.suspected += 1,
            None => self.unclassified += 1,
        }
    }
}

/// Output of one classification run.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationReport {
    pub window_end: DateTime<Utc>,
    pub window_hours: i64,
    pub anomalies: Vec<AnomalyRecord>,
    /// Per-detector omissions; the batch itself completed.
    pub skipped: Vec<SkippedDetector>,
    pub summary: Summary,
}

impl ClassificationReport {
    pub fn has_anomalies(&self) -> bool {
        !self.anomalies.is_empty()
    }

    /// Records for one station, in variable order.
    pub fn station_anomalies(&self, station_id: &str) -> Vec<&AnomalyRecord> {
        self.anomalies
            .iter()
            .filter(|r| r.station_id == station_id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record(station: &str, verdict: Option<SpatialVerdict>) -> AnomalyRecord {
        AnomalyRecord {
            station_id: station.to_string(),
            variable: "temp_out".to_string(),
            time: Utc.with_ymd_and_hms(2025, 11, 21, 2, 0, 0).unwrap(),
            actual: 99.0,
            expected: 15.0,
            method: "three_sigma".to_string(),
            deviation: 12.0,
            verdict,
        }
    }

    fn verdict(classification: SpatialClass) -> SpatialVerdict {
        SpatialVerdict {
            classification,
            mean_correlation: Some(0.1),
            neighbors_used: 2,
            reason: "trend_inconsistent".to_string(),
        }
    }

    #[test]
    fn summary_counts_by_classification() {
        let mut summary = Summary::default();
        summary.count(&record("a", Some(verdict(SpatialClass::DeviceFailure))));
        summary.count(&record("b", Some(verdict(SpatialClass::WeatherEvent))));
        summary.count(&record("c", Some(verdict(SpatialClass::Suspected))));
        summary.count(&record("d", None));

        assert_eq!(summary.device_failures, 1);
        assert_eq!(summary.weather_events, 1);
        assert_eq!(summary.suspected, 1);
        assert_eq!(summary.unclassified, 1);
    }

    #[test]
    fn report_filters_by_station() {
        let report = ClassificationReport {
            window_end: Utc.with_ymd_and_hms(2025, 11, 21, 2, 0, 0).unwrap(),
            window_hours: 6,
            anomalies: vec![record("a", None), record("b", None), record("a", None)],
            skipped: vec![],
            summary: Summary::default(),
        };

        assert!(report.has_anomalies());
        assert_eq!(report.station_anomalies("a").len(), 2);
        assert_eq!(report.station_anomalies("zzz").len(), 0);
    }

    #[test]
    fn report_serializes_for_the_external_reporter() {
        let report = ClassificationReport {
            window_end: Utc.with_ymd_and_hms(2025, 11, 21, 2, 0, 0).unwrap(),
            window_hours: 6,
            anomalies: vec![record("a", Some(verdict(SpatialClass::DeviceFailure)))],
            skipped: vec![SkippedDetector {
                station_id: "b".to_string(),
                variable: "bar".to_string(),
                detector: "arima".to_string(),
                reason: "insufficient data: need at least 12, got 4".to_string(),
            }],
            summary: Summary {
                stations: 2,
                pairs_evaluated: 8,
                normal: 7,
                device_failures: 1,
                ..Summary::default()
            },
        };

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["anomalies"][0]["verdict"]["classification"], "device_failure");
        assert_eq!(json["summary"]["device_failures"], 1);
        assert_eq!(json["skipped"][0]["detector"], "arima");
    }
}
