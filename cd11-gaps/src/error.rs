//! Gap tracking and persistence errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GapError {
    #[error("minimum {min} exceeds maximum {max}")]
    InvalidRange { min: u64, max: u64 },

    #[error("range [{start}, {end}] falls outside the tracked window [{min}, {max}]")]
    RangeOutOfBounds {
        start: u64,
        end: u64,
        min: u64,
        max: u64,
    },

    #[error("invalid state file suffix {0:?}")]
    InvalidSuffix(String),

    #[error("invalid state key {0:?}")]
    InvalidKey(String),

    #[error("encoding gap state: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
