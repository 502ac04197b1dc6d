//! Shared data model: stations, observations, and evaluation windows.

mod station;
mod window;

pub use station::{Observation, Station};
pub use window::{Window, WindowSeries};
