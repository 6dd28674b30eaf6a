//! Error taxonomy for fetching, parsing and caching rates.

use std::fmt::Display;
use thiserror::Error;

/// Coarse classification used to pick retry and reporting behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Transport failure; retryable.
    SourceUnavailable,
    /// Page retrieved but its structure no longer matches the scraper.
    SourceShapeChanged,
    /// A single row could not be turned into a record.
    MalformedRecord,
    /// The requested key does not name a registered provider.
    UnknownProvider,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::SourceUnavailable => "source unavailable",
            ErrorKind::SourceShapeChanged => "source shape changed",
            ErrorKind::MalformedRecord => "malformed record",
            ErrorKind::UnknownProvider => "unknown provider",
        };
        write!(f, "{name}")
    }
}

/// Failure of a provider fetch as reported per key to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("{provider} is unavailable: {reason}")]
    SourceUnavailable { provider: String, reason: String },

    #[error("{provider} page layout changed: {reason}")]
    SourceShapeChanged { provider: String, reason: String },

    #[error("{0}")]
    MalformedRecord(MalformedRecord),

    #[error("Provider '{0}' not found")]
    UnknownProvider(String),
}

impl FetchError {
    pub fn unavailable(provider: &str, reason: impl Display) -> Self {
        FetchError::SourceUnavailable {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn shape_changed(provider: &str, reason: impl Display) -> Self {
        FetchError::SourceShapeChanged {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::SourceUnavailable { .. } => ErrorKind::SourceUnavailable,
            FetchError::SourceShapeChanged { .. } => ErrorKind::SourceShapeChanged,
            FetchError::MalformedRecord(_) => ErrorKind::MalformedRecord,
            FetchError::UnknownProvider(_) => ErrorKind::UnknownProvider,
        }
    }

    /// Only transport failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::SourceUnavailable
    }
}

/// A row that was rejected during parsing or normalization.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("malformed row {row}: {reason}")]
pub struct MalformedRecord {
    /// Zero-based row position in the source table.
    pub row: usize,
    pub reason: String,
}

impl MalformedRecord {
    pub fn new(row: usize, reason: impl Display) -> Self {
        Self {
            row,
            reason: reason.to_string(),
        }
    }
}

impl From<MalformedRecord> for FetchError {
    fn from(value: MalformedRecord) -> Self {
        FetchError::MalformedRecord(value)
    }
}

/// Failure of the cache backing store. Never fatal for a rate request.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("cache backend error: {0}")]
    Backend(String),
}

impl From<fjall::Error> for CacheError {
    fn from(value: fjall::Error) -> Self {
        CacheError::Backend(value.to_string())
    }
}
