//! Error types for the mortality atlas.
//!
//! - [`LoadError`] - a source file could not be read or parsed
//! - [`QueryError`] - a filter parameter is out of range or malformed, or aggregation failed
//! - [`ServerError`] - HTTP server start-up and request errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Load Errors
// =============================================================================

/// Errors while reading one of the input files.
///
/// Fatal for the view that needed the data, never for the process.
#[derive(Debug, Error)]
pub enum LoadError {
    /// File missing or unreadable.
    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Delimited file could not be parsed.
    #[error("Invalid data in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: CsvError,
    },

    /// A required column is absent from the header row.
    #[error("Missing column '{column}' in {path}")]
    MissingColumn { path: PathBuf, column: String },

    /// Boundary file is not a usable GeoJSON FeatureCollection.
    #[error("Invalid GeoJSON in {path}: {message}")]
    GeoJson { path: PathBuf, message: String },
}

impl LoadError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LoadError::Io { path: path.into(), source }
    }

    pub fn csv(path: impl Into<PathBuf>, source: CsvError) -> Self {
        LoadError::Csv { path: path.into(), source }
    }

    pub fn geojson(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        LoadError::GeoJson { path: path.into(), message: message.into() }
    }
}

// =============================================================================
// Query Errors
// =============================================================================

/// Errors in user-supplied filter parameters, or in the aggregation they drive.
#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    /// Start year after end year.
    #[error("Invalid year range: {start} > {end}")]
    InvalidYearRange { start: i32, end: i32 },

    /// Scale factor outside the accepted set.
    #[error("Invalid scale factor {0}: expected one of 100, 1000, 10000, 100000, 1000000")]
    InvalidScale(u64),

    /// Year selector that is neither a year nor the "all" sentinel.
    #[error("Invalid year: '{0}'")]
    InvalidYear(String),

    /// Month name outside the twelve canonical names.
    #[error("Unknown month: '{0}'")]
    UnknownMonth(String),

    /// A frame operation failed while aggregating.
    #[error("Aggregation failed: {0}")]
    Frame(String),
}

impl From<polars::prelude::PolarsError> for QueryError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        QueryError::Frame(err.to_string())
    }
}

// =============================================================================
// Server Errors
// =============================================================================

/// HTTP server errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Dataset could not be loaded.
    #[error("Data unavailable: {0}")]
    Load(#[from] LoadError),

    /// Invalid request parameters.
    #[error("Invalid request: {0}")]
    Query(#[from] QueryError),

    /// Socket bind or accept failure.
    #[error("Server IO error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for loading operations.
pub type LoadResult<T> = Result<T, LoadError>;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;
