//! Error types for loading and running the matching pipeline.

use std::path::PathBuf;
use thiserror::Error;

use crate::models::Variant;

/// Failures while reading an input dataset.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The dataset is missing or unreadable. Distinct from "no matches".
    #[error("input unavailable: {path}: {source}")]
    InputUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: required column '{column}' not found in header")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("{path}: failed to read CSV header: {source}")]
    Header {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

/// Fatal pipeline failures. Per-record failures never surface here.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to build worker pool: {0}")]
    WorkerPool(#[from] rayon::ThreadPoolBuildError),

    #[error(transparent)]
    Load(#[from] LoadError),
}

/// A scoring task that failed on a worker.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    #[error("{} scoring task for '{query}' panicked: {message}", variant.label())]
    TaskPanicked {
        variant: Variant,
        query: String,
        message: String,
    },
}
