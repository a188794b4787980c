//! Error types for the profiler.
//!
//! `ProfilerError` classifies failures by how far they propagate: only
//! `InvalidLocation` and `Config` abort a run. `AdapterError` is the
//! per-source failure recorded in the analysis result.

use crate::sources::SourceRecords;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProfilerError {
    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Source '{source_name}' failed: {message}")]
    AdapterFailure {
        source_name: String,
        message: String,
    },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Presentation failed: {0}")]
    PresentationFailure(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ProfilerError {
    /// Whether the error must abort the run before any source is fetched.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProfilerError::InvalidLocation(_) | ProfilerError::Config(_))
    }
}

/// Failure of a single source adapter.
#[derive(Error, Debug)]
pub enum AdapterError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("rate limited by upstream API")]
    RateLimited,

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("unexpected response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Some sub-requests failed. `records` holds what the others returned.
    #[error("{} sub-request(s) failed: {}", .errors.len(), .errors.join("; "))]
    Partial {
        records: SourceRecords,
        errors: Vec<String>,
    },

    /// The adapter cannot run for this region (e.g. a name-based search on
    /// a coordinates-only region). Reported as disabled, not failed.
    #[error("skipped: {0}")]
    Skipped(String),
}

pub type AdapterResult<T> = Result<T, AdapterError>;
