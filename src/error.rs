//! Error types for the skywatch engine.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors that can occur during classification and health evaluation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// A detector received fewer valid points than its stated minimum.
    ///
    /// Recoverable: the orchestrator skips the detector and continues
    /// the batch.
    #[error("insufficient data: need at least {needed}, got {got}")]
    InsufficientData { needed: usize, got: usize },

    /// A model-based detector failed to converge numerically.
    ///
    /// Recoverable: skipped and logged, never aborts the batch.
    #[error("model fit failed: {0}")]
    ModelFit(String),

    /// The observation store could not be read. Fatal to the run.
    #[error("store access failed: {0}")]
    Store(String),

    /// Invalid configuration (threshold ordering, unknown method name,
    /// empty variable list). Raised before any evaluation begins.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// A station id was not present in the static station table.
    #[error("unknown station: {0}")]
    UnknownStation(String),
}
