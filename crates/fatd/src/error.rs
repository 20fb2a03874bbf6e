//! Error types for the daemon.

use fatd_core::ChainId;
use fatd_replay::ReplayError;
use fatd_store::StoreError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur during daemon operations.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration could not be loaded or is invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Replay or supervisor error.
    #[error("replay error: {0}")]
    Replay(#[from] ReplayError),

    /// A replay stream stopped on a fatal error.
    #[error("replay of chain {chain_id} failed: {error}")]
    StreamFailed {
        chain_id: ChainId,
        #[source]
        error: ReplayError,
    },

    #[error("daemon is already running")]
    AlreadyRunning,
}

/// Result type for daemon operations.
pub type Result<T> = std::result::Result<T, DaemonError>;
