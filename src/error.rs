use thiserror::Error;

/// Failures of the usage, forecast and planning pipeline.
#[derive(Debug, Error)]
pub enum Error {
    /// Not enough recorded data to build a profile or a forecast. Planning
    /// falls back to the static schedule.
    #[error("insufficient history: {0}")]
    InsufficientHistory(String),

    /// The forecaster only blends 2, 3 or 4 same-weekday profiles.
    #[error("unsupported history length {0}, expected 2, 3 or 4")]
    UnsupportedHistoryLength(usize),

    /// A formula hit a zero or sign-incompatible denominator.
    #[error("degenerate usage: {0}")]
    DegenerateUsage(String),

    /// The time-series store could not deliver a reading.
    #[error("sensor read failure: {0}")]
    SensorReadFailure(String),
}

pub type Result<T> = std::result::Result<T, Error>;
