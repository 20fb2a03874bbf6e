//! Store failures.

use fatd_core::{ChainId, CoreError, EntryHash};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("filesystem: {0}")]
    Io(#[from] std::io::Error),

    /// Stored chain state failed to encode or decode.
    #[error("chain state codec: {0}")]
    Codec(#[from] CoreError),

    /// A transaction record failed to encode or decode.
    #[error("transaction record: {0}")]
    Serialization(String),

    /// A row holds bytes of the wrong shape.
    #[error("corrupt row: {0}")]
    InvalidData(String),

    #[error("schema: {0}")]
    Migration(String),

    /// Nothing was written: the cursor would have gone backwards.
    #[error("chain {chain_id} cursor is {current}, refusing to move it to {proposed}")]
    CursorRegression {
        chain_id: ChainId,
        current: u64,
        proposed: u64,
    },

    /// Nothing was written: history already holds this entry.
    #[error("chain {chain_id} already recorded transaction {entry_hash}")]
    DuplicateTransaction {
        chain_id: ChainId,
        entry_hash: EntryHash,
    },

    /// The backend is refusing work, e.g. a poisoned lock.
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
