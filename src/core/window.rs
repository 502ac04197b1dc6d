//! End-anchored evaluation windows and their gap-aware series.

use crate::error::{EngineError, Result};
use chrono::{DateTime, Duration, Utc};

/// A bounded, end-anchored span over one station/variable pair.
///
/// Resolves to the sequence of nominal sampling slots strictly covering
/// `[end - duration, end]`, end-inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    pub station_id: String,
    pub variable: String,
    pub end: DateTime<Utc>,
    pub duration: Duration,
}

impl Window {
    pub fn new(
        station_id: impl Into<String>,
        variable: impl Into<String>,
        end: DateTime<Utc>,
        duration: Duration,
    ) -> Self {
        Self {
            station_id: station_id.into(),
            variable: variable.into(),
            end,
            duration,
        }
    }

    /// Start of the covered span.
    pub fn start(&self) -> DateTime<Utc> {
        self.end - self.duration
    }
}

/// A window resolved against the observation store.
///
/// Every nominal slot is present; slots with no reading hold `None`
/// so detectors and the gap-interpolation step can reason about
/// absences instead of silently losing them.
#[derive(Debug, Clone)]
pub struct WindowSeries {
    window: Window,
    timestamps: Vec<DateTime<Utc>>,
    values: Vec<Option<f64>>,
}

impl WindowSeries {
    /// Construct from aligned slots. Timestamps must be strictly
    /// increasing and match the values in length.
    pub fn new(
        window: Window,
        timestamps: Vec<DateTime<Utc>>,
        values: Vec<Option<f64>>,
    ) -> Result<Self> {
        if timestamps.len() != values.len() {
            return Err(EngineError::Configuration(format!(
                "window slots mismatched: {} timestamps, {} values",
                timestamps.len(),
                values.len()
            )));
        }
        for pair in timestamps.windows(2) {
            if pair[1] <= pair[0] {
                return Err(EngineError::Configuration(
                    "window timestamps must be strictly increasing".to_string(),
                ));
            }
        }
        Ok(Self {
            window,
            timestamps,
            values,
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Number of nominal slots, absent or not.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Slot values with explicit absence markers.
    pub fn slots(&self) -> &[Option<f64>] {
        &self.values
    }

    /// Count of non-missing readings.
    pub fn valid_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    /// The non-missing readings, in time order.
    pub fn valid_values(&self) -> Vec<f64> {
        self.values.iter().filter_map(|v| *v).collect()
    }

    /// The most recent non-missing reading with its timestamp.
    pub fn last_valid(&self) -> Option<(DateTime<Utc>, f64)> {
        self.timestamps
            .iter()
            .zip(self.values.iter())
            .rev()
            .find_map(|(t, v)| v.map(|value| (*t, value)))
    }
}
