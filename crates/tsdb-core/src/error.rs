//! The canonical error type for all tsdb operations.
//!
//! This is a clean, stable interface that hides internal error details,
//! following the same layered-error-with-helper-predicates shape used
//! throughout this codebase: internal crates may define their own
//! `thiserror` enums, but callers only ever see this one.

use thiserror::Error;

/// All tsdb errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Bad input: out-of-range id, non-positive step/slots, mismatched
    /// metadata, name/tag redefinition, counter retention rewrite,
    /// `start_ts > end_ts`, selector/alias resolution failures, etc.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// A write targeted a metric_id with no bound descriptor/meta. Range
    /// reads never produce this — they return empty instead.
    #[error("metric not found: {0}")]
    NotFound(MetricId),

    /// The underlying KV-store transaction lost a commit race. The whole
    /// transaction must be retried by the caller (or internally, for
    /// read-only operations bounded by a [`crate::RetryPolicy`] if one is
    /// threaded through the call site).
    #[error("conflict, retry the transaction")]
    ConflictRetryable,

    /// A stored record failed to decode: too short for its fixed format,
    /// or its flag byte has unrecognized bits set. The Ring Store catches
    /// this per-slot during range reads and skips the sample rather than
    /// propagating it; it reaches callers only where skipping doesn't
    /// apply (e.g. direct single-record decoding).
    #[error("decode error: {0}")]
    DecodeError(String),

    /// A SQL parse, plan, or execution error from the query engine.
    #[error("sql error: {0}")]
    Sql(#[from] datafusion::error::DataFusionError),
}

/// Result type for tsdb operations.
pub type Result<T> = std::result::Result<T, Error>;

use crate::metric::MetricId;

impl Error {
    /// True for errors a caller may retry without changing anything else.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConflictRetryable)
    }

    /// True for errors that mean "this metric does not exist".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// True for client-input errors (an HTTP shell would map these to 400).
    pub fn is_validation(&self) -> bool {
        matches!(self, Error::ValidationError(_) | Error::Sql(_))
    }

    /// Construct a `ValidationError` from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Error::ValidationError(msg.into())
    }
}
