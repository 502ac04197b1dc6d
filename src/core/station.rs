//! Station metadata and raw observation records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A fixed-location sensor installation.
///
/// Loaded once per invocation from the external metadata table and
/// treated as static for the engine's lifetime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Station {
    pub id: String,
    pub name: String,
    /// Degrees north.
    pub latitude: f64,
    /// Degrees east.
    pub longitude: f64,
    /// Meters above sea level.
    pub elevation: f64,
}

impl Station {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        elevation: f64,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            latitude,
            longitude,
            elevation,
        }
    }
}

/// One reading cycle from a station.
///
/// Variables missing from `values` were not reported in that cycle.
/// Observations are produced by the external collector and read-only
/// here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub time: DateTime<Utc>,
    pub station_id: String,
    pub values: HashMap<String, f64>,
}

impl Observation {
    pub fn new(time: DateTime<Utc>, station_id: impl Into<String>) -> Self {
        Self {
            time,
            station_id: station_id.into(),
            values: HashMap::new(),
        }
    }

    /// Builder-style insertion of a variable reading.
    pub fn with_value(mut self, variable: impl Into<String>, value: f64) -> Self {
        self.values.insert(variable.into(), value);
        self
    }

    /// The reading for `variable`, if reported.
    pub fn value(&self, variable: &str) -> Option<f64> {
        self.values.get(variable).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn observation_reports_present_and_absent_variables() {
        let time = Utc.with_ymd_and_hms(2025, 11, 21, 2, 0, 0).unwrap();
        let obs = Observation::new(time, "volos")
            .with_value("temp_out", 14.2)
            .with_value("bar", 1013.5);

        assert_eq!(obs.value("temp_out"), Some(14.2));
        assert_eq!(obs.value("bar"), Some(1013.5));
        assert_eq!(obs.value("wind_speed"), None);
    }

    #[test]
    fn station_round_trips_through_serde() {
        let station = Station::new("volos", "Volos", 39.36, 22.94, 15.0);
        let json = serde_json::to_string(&station).unwrap();
        let back: Station = serde_json::from_str(&json).unwrap();
        assert_eq!(station, back);
    }
}
