//! Error types for the replay engine.

use fatd_core::ChainId;
use thiserror::Error;

/// Errors reported by an [`EntrySource`](crate::source::EntrySource).
///
/// All source errors are treated as transient and retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SourceError {
    /// The source could not be reached.
    #[error("source unreachable: {0}")]
    Unreachable(String),

    /// The source did not answer in time.
    #[error("source timeout: {0}")]
    Timeout(String),

    #[error("source error: {0}")]
    Other(String),
}

/// Errors that stop a replay stream or a supervisor operation.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// A single source call failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Store operation failed. Always fatal to the stream.
    #[error("store error: {0}")]
    Store(#[from] fatd_store::StoreError),

    /// A source call kept failing after every retry.
    #[error("source failed after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: SourceError },

    /// The chain already has a running stream.
    #[error("chain {0} is already tracked")]
    AlreadyTracked(ChainId),

    /// The chain has no running stream.
    #[error("chain {0} is not tracked")]
    NotTracked(ChainId),

    /// The stream was cancelled before finishing.
    #[error("replay cancelled")]
    Cancelled,

    /// A stream task panicked or was aborted.
    #[error("stream task failed: {0}")]
    Join(String),
}

/// Result type for replay operations.
pub type Result<T> = std::result::Result<T, ReplayError>;
