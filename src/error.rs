use std::path::PathBuf;
use thiserror::Error;

use crate::feature::{FeatureKind, FeatureType, ValueKind};
use crate::reader::Corruption;
use crate::wire::WireError;

/// The main error type for tfrec operations.
#[derive(Debug, Error)]
pub enum TfrecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read TFRecords from {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write TFRecords to {path}: {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid UTF-8 in bytes value: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Corrupt TFRecords container: {0}")]
    CorruptContainer(#[from] Corruption),

    #[error("Unsupported value for feature '{key}': expected {expected}, got {found}")]
    UnsupportedFeatureType {
        key: String,
        expected: FeatureType,
        found: ValueKind,
    },

    #[error("Feature not found: {0}")]
    FeatureNotFound(#[from] FeatureNotFound),

    #[error("Feature '{key}' requested as {requested} but stored as {found}")]
    FeatureTypeMismatch {
        key: String,
        requested: FeatureType,
        found: FeatureKind,
    },

    #[error("Failed to decode record {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: WireError,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Why a feature lookup came back empty.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum FeatureNotFound {
    #[error("record index {index} out of range (container holds {len} record(s))")]
    RecordOutOfRange { index: usize, len: usize },

    #[error("record {index} has no feature '{key}'")]
    KeyMissing { index: usize, key: String },
}
