//! Typed errors for the aggregation pipeline.
//!
//! Per-item errors are recovered where they occur and never propagate past
//! their originating stage; only `PipelineError::Config` and
//! `PipelineError::FatalStore` terminate a run.

use thiserror::Error;

/// Run-terminating and source-level failures.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Missing or invalid run parameter. Aborts before any extraction.
    #[error("config error: {0}")]
    Config(String),

    /// Network/timeout on a single source. The source is skipped and the
    /// run continues.
    #[error("source {src} failed: {message}")]
    TransientSource { src: String, message: String },

    /// Destination store unreachable. Aborts the run; no further batches
    /// are attempted.
    #[error("destination store unreachable: {0}")]
    FatalStore(String),
}

/// Failure modes of the enrichment service, per item.
#[derive(Debug, Clone, Error)]
pub enum EnrichError {
    /// Rate limit, timeout, 5xx. Retried with backoff up to a bound, then
    /// the item is dropped.
    #[error("transient enrichment failure: {0}")]
    Transient(String),

    /// Malformed content or policy rejection. The item is dropped without
    /// retry.
    #[error("permanent enrichment failure: {0}")]
    Permanent(String),
}

/// Failures of the destination store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Connect/timeout errors — the store cannot be reached at all.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    /// The store answered with a non-success status.
    #[error("store API error ({status}): {message}")]
    Api { status: u16, message: String },
}

impl StoreError {
    pub fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            StoreError::Unreachable(e.to_string())
        } else if let Some(status) = e.status() {
            StoreError::Api {
                status: status.as_u16(),
                message: e.to_string(),
            }
        } else {
            StoreError::Unreachable(e.to_string())
        }
    }
}
