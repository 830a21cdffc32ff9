//! Grid-specific error types

use thiserror::Error;

use super::types::Direction;

/// Errors that can occur in grid trading operations
#[derive(Error, Debug, Clone)]
pub enum GridError {
    #[error("Invalid grid configuration: {0}")]
    InvalidConfig(String),

    #[error("Bar history unavailable: need {required} completed bars, have {available}")]
    DataUnavailable { required: usize, available: usize },

    #[error("Aggregate requested on empty {0} ladder")]
    EmptySet(Direction),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Position not found: id {0}")]
    PositionNotFound(u64),

    #[error("Bot is in invalid state for operation: {current_state}")]
    InvalidState { current_state: String },

    #[error("Price feed error: {0}")]
    Feed(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("JSON parse error: {0}")]
    JsonParse(String),
}

impl From<serde_json::Error> for GridError {
    fn from(err: serde_json::Error) -> Self {
        GridError::JsonParse(err.to_string())
    }
}

impl From<std::io::Error> for GridError {
    fn from(err: std::io::Error) -> Self {
        GridError::Io(err.to_string())
    }
}

impl From<csv::Error> for GridError {
    fn from(err: csv::Error) -> Self {
        GridError::Feed(err.to_string())
    }
}

/// Result type for grid operations
pub type GridResult<T> = std::result::Result<T, GridError>;
