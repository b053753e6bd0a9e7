//! Error types for geosync-core.

use std::path::PathBuf;

use thiserror::Error;

/// A record position that cannot be turned into coordinates.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PositionError {
    #[error("position is empty")]
    Empty,

    #[error("expected \"lat,lon\", got {0:?}")]
    Malformed(String),

    #[error("coordinates out of range: lat={lat} lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },
}

/// Errors raised while reading the record source document.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed CSV (bad quoting, invalid UTF-8).
    #[error("invalid CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("invalid header {found:?}; expected uniqueid,name,amenity,building,latlng")]
    InvalidHeader { found: String },

    #[error("line {line}: expected 5 columns, found {found}")]
    MissingColumns { line: u64, found: usize },

    #[error("line {line}: unique id is empty")]
    EmptyUniqueId { line: u64 },

    #[error("line {line}: duplicate unique id '{id}'")]
    DuplicateUniqueId { id: String, line: u64 },

    #[error("line {line}: invalid position for '{id}': {source}")]
    InvalidPosition {
        id: String,
        line: u64,
        #[source]
        source: PositionError,
    },
}

/// Errors raised while loading or saving the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse configuration at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("configuration JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or pass a config path")]
    HomeNotFound,
}

pub(crate) fn source_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.into(),
        source,
    }
}

pub(crate) fn config_io_err(path: impl Into<PathBuf>, source: std::io::Error) -> ConfigError {
    ConfigError::Io {
        path: path.into(),
        source,
    }
}
