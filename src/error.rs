// External imports
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while walking the labeled class folders and parsing samples
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("class folder for '{class}' not found at {}", .path.display())]
    MissingClassDir { class: String, path: PathBuf },

    #[error("class '{class}' has no samples of length {sample_length} in {}", .path.display())]
    EmptyClass {
        class: String,
        path: PathBuf,
        sample_length: usize,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: PolarsError,
    },

    #[error("{} has no '{column}' column", .path.display())]
    MissingColumn { path: PathBuf, column: String },

    #[error("{} has a missing or non-numeric value in column '{column}' at row {row}", .path.display())]
    InvalidValue {
        path: PathBuf,
        column: String,
        row: usize,
    },

    #[error("sample buffer does not match shape {shape:?}")]
    Shape { shape: [usize; 3] },
}

/// Errors raised by the stratified train/test partition
#[derive(Debug, Error)]
pub enum SplitError {
    #[error("split fraction must be in (0, 1), got {0}")]
    InvalidFraction(f64),

    #[error("cannot split an empty dataset")]
    Empty,

    #[error("the least populated class '{class}' has only {count} member(s), which is too few")]
    ClassTooSmall { class: String, count: usize },

    #[error("{side} size {size} should be greater or equal to the number of classes {classes}")]
    TooFewForClasses {
        side: &'static str,
        size: usize,
        classes: usize,
    },
}

/// Errors raised while loading or validating a pipeline configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config value for '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}
