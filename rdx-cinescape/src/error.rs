//! The crate-wide error type.
//!
//! Only programmer errors and I/O surface as `Err`. Malformed input to setters
//! is ignored in place, and looking up an unknown record yields `None`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("challenge of type `solvePuzzleLevel` requires a level")]
    MissingLevel,

    #[error("unknown challenge type `{0}`")]
    UnknownChallengeType(String),

    #[error("storage I/O failed: {0}")]
    Storage(#[from] std::io::Error),

    #[error("malformed stored record: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
