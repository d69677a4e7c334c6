use thiserror::Error;

/// Failures surfaced by the store seams. These never abort ingestion: the
/// in-memory profile stays authoritative and writes are retried on the next
/// save.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store call timed out")]
    Timeout,
    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Errors returned to callers of the public engine surface.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// The event was malformed; nothing was mutated.
    #[error("validation error: {0}")]
    Validation(String),
    /// A read path needed the store and it failed.
    #[error(transparent)]
    Persistence(#[from] StoreError),
}
