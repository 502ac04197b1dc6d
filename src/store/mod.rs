//! Read-only access to the time-indexed observation store.
//!
//! The engine never writes: collection is owned by an external
//! process that may append concurrently, so a read missing the very
//! latest point is acceptable and not an error.

use crate::core::{Observation, Window, WindowSeries};
use crate::error::Result;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Capability for querying stored readings.
///
/// Implementations are read-only and safe to share across worker
/// threads. `query` may block on I/O; it is the engine's only
/// suspension point.
pub trait ObservationStore: Sync {
    /// Ordered `(time, value)` points for one station/variable with
    /// `start <= time <= end`. Missing samples are simply absent from
    /// the result; gap bookkeeping happens in the reader.
    fn query(
        &self,
        station_id: &str,
        variable: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, f64)>>;
}

/// Resolves windows against a store, aligning raw readings onto the
/// nominal sampling grid.
///
/// Gaps become explicit `None` slots rather than silently shrinking
/// the series. The reader imposes no minimum point count; that
/// judgement belongs to each detector.
pub struct WindowReader<'a, S: ObservationStore + ?Sized> {
    store: &'a S,
    interval: Duration,
}

impl<'a, S: ObservationStore + ?Sized> WindowReader<'a, S> {
    pub fn new(store: &'a S, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Read the window as a gap-aware series covering
    /// `[end - duration, end]`, end-inclusive.
    pub fn read(&self, window: Window) -> Result<WindowSeries> {
        let start = window.start();
        let step = self.interval.num_seconds().max(1);
        let slots = (window.duration.num_seconds().max(0) / step) as usize + 1;

        let timestamps: Vec<DateTime<Utc>> = (0..slots)
            .map(|i| start + Duration::seconds(step * i as i64))
            .collect();
        let mut values: Vec<Option<f64>> = vec![None; slots];

        let points = self
            .store
            .query(&window.station_id, &window.variable, start, window.end)?;
        for (time, value) in points {
            let offset = (time - start).num_seconds();
            if offset < 0 {
                continue;
            }
            let idx = ((offset as f64) / (step as f64)).round() as usize;
            if idx >= slots {
                continue;
            }
            // Only claim the slot when the reading is closer to it than
            // to either neighboring slot.
            if (time - timestamps[idx]).num_seconds().abs() * 2 <= step {
                values[idx] = Some(value);
            }
        }

        WindowSeries::new(window, timestamps, values)
    }
}

/// In-memory observation store.
///
/// Backs tests and small embedded deployments; mirrors the shape of
/// the external collector's observations table.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    series: HashMap<(String, String), Vec<(DateTime<Utc>, f64)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a full observation record, one slot per reported variable.
    pub fn insert(&mut self, observation: &Observation) {
        for (variable, value) in &observation.values {
            self.push(&observation.station_id, variable, observation.time, *value);
        }
    }

    /// Insert a single reading.
    pub fn push(&mut self, station_id: &str, variable: &str, time: DateTime<Utc>, value: f64) {
        let series = self
            .series
            .entry((station_id.to_string(), variable.to_string()))
            .or_default();
        series.push((time, value));
        series.sort_by_key(|(t, _)| *t);
        series.dedup_by_key(|(t, _)| *t);
    }

    /// Insert evenly spaced readings ending at `end`, earliest first.
    pub fn push_series(
        &mut self,
        station_id: &str,
        variable: &str,
        end: DateTime<Utc>,
        interval: Duration,
        values: &[f64],
    ) {
        for (i, value) in values.iter().enumerate() {
            let back = (values.len() - 1 - i) as i32;
            self.push(station_id, variable, end - interval * back, *value);
        }
    }
}

impl ObservationStore for MemoryStore {
    fn query(
        &self,
        station_id: &str,
        variable: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<(DateTime<Utc>, f64)>> {
        Ok(self
            .series
            .get(&(station_id.to_string(), variable.to_string()))
            .map(|points| {
                points
                    .iter()
                    .filter(|(t, _)| *t >= start && *t <= end)
                    .copied()
                    .collect()
            })
            .unwrap_or_default())
    }
}
