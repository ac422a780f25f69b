//! Error taxonomy shared across the crate.
//!
//! Recognition misses are not errors; they are ordinary "no guess" outcomes
//! carried in `Recognition` and the response statistics.

use thiserror::Error;

/// Result type alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Unreadable or malformed configuration, or a missing training
    /// directory. Fatal at construction/load time.
    #[error("configuration error: {0}")]
    Config(String),

    /// Recoverable failure while carrying out a single experiment, such as a
    /// missing test image or a cache/training hash mismatch. The runner marks
    /// the experiment skipped and continues with the batch.
    #[error("{0}")]
    Data(String),

    /// A cache entry that already exists, or a dirty flag left behind by an
    /// interrupted feature generation. The operator must clear the condition
    /// before the operation can be retried.
    #[error("cache state error: {0}")]
    CacheState(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}
