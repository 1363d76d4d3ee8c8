use std::time::Duration;
use thiserror::Error;

/// Input validation failures. Surfaced to the caller as-is, never corrected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    #[error("Invalid latitude: {0} (must be between -90 and 90)")]
    InvalidLatitude(f64),

    #[error("Invalid longitude: {0} (must be between -180 and 180)")]
    InvalidLongitude(f64),

    #[error("Coordinate is not finite: ({lat}, {lon})")]
    NonFiniteCoordinate { lat: f64, lon: f64 },

    #[error("Invalid geohash precision: {0}")]
    InvalidPrecision(usize),

    #[error("Invalid geohash character '{0}'")]
    InvalidGeohashChar(char),

    #[error("Geohash is empty")]
    EmptyGeohash,

    #[error("Category key is empty")]
    EmptyCategory,

    #[error("Identifier is empty")]
    EmptyIdentifier,

    #[error("Invalid geohash alphabet: {0}")]
    InvalidAlphabet(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LocatorError>;

/// Failure of a single collaborator call (one cell, one identifier).
///
/// Orchestrators absorb these per partition; they never fail a whole query.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("Provider call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Provider call cancelled")]
    Cancelled,
}

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// In-memory store loading/upsert failures.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid record {id:?}: {source}")]
    InvalidRecord {
        id: String,
        #[source]
        source: LocatorError,
    },
}
