use thiserror::Error;

/// Failure taxonomy for the trip workflow. All variants are synchronous
/// caller/business-logic failures with a stable kind and a human-readable
/// message; none are retried internally. Infrastructure failures travel
/// separately as `Storage`.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("not authorized: {0}")]
    Authorization(&'static str),
    #[error("invalid operation: {0}")]
    InvalidOperation(&'static str),
    #[error("conflict: {0}")]
    Conflict(&'static str),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
