use std::path::PathBuf;

use thiserror::Error;

/// Failures surfaced while loading records or view settings.
///
/// The computational stages (evaluation, filtering, sorting, range
/// aggregation) never produce these; they resolve bad input to defaults.
#[derive(Debug, Error)]
pub enum StatError {
    #[error("Opening {path:?}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Reading records from stdin")]
    Stdin(#[source] std::io::Error),
    #[error("Parsing JSON records")]
    Json(#[from] serde_json::Error),
    #[error("Reading CSV records")]
    Csv(#[from] csv::Error),
    #[error("Parsing view file {path:?}")]
    View {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("Record {index} is invalid: {reason}")]
    InvalidRecord { index: usize, reason: String },
    #[error("Expected a JSON array of records, found {found}")]
    NotAnArray { found: &'static str },
    #[error("Derived column {name:?}: {reason}")]
    Derive { name: String, reason: String },
    #[error("Filter expression {expression:?}: {reason}")]
    Filter { expression: String, reason: String },
    #[error("Sort specification {spec:?}: {reason}")]
    Sort { spec: String, reason: String },
    #[error("Unsupported input format for {path:?}; use .json or .csv")]
    UnsupportedFormat { path: PathBuf },
}

pub type StatResult<T> = std::result::Result<T, StatError>;
