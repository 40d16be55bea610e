// ─────────────────────────────────────────────────────────────────────
// Minicode — Error Hierarchy
// ─────────────────────────────────────────────────────────────────────

use thiserror::Error;

/// Root error type for all Minicode failures.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MinicodeError {
    /// Invalid input (instruction, parameters).
    #[error("validation error: {0}")]
    Validation(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// The fixed part of a prompt does not fit the input budget.
    #[error("input too long: {len} chars exceeds budget of {max}")]
    InputTooLong { len: usize, max: usize },

    /// Model weights could not be loaded.
    #[error("model load error: {0}")]
    ModelLoad(String),

    /// The engine failed while generating.
    #[error("engine error: {0}")]
    Engine(String),

    /// Operation refused because a generation is in flight.
    #[error("busy: {0}")]
    Busy(String),
}

pub type MinicodeResult<T> = Result<T, MinicodeError>;
