//! # fatd Store
//!
//! Where replayed ledgers live: chain state, per-chain replay cursors and
//! accepted transaction history, behind the async [`LedgerStore`] trait.
//!
//! - [`StoreTxn`] stages one chain's writes and commits them as a unit
//! - [`SqliteStore`] is the durable backend the daemon runs on
//! - [`MemoryStore`] mirrors its semantics for tests
//!
//! ## Usage
//!
//! ```rust,no_run
//! use fatd_store::{LedgerStore, LedgerStoreExt, SqliteStore};
//! use fatd_core::ChainId;
//!
//! async fn example() {
//!     let store = SqliteStore::open("fatd.db").unwrap();
//!     let chain_id = ChainId::from_bytes([0x11; 32]);
//!
//!     let mut txn = store.begin(chain_id);
//!     txn.put_cursor(170_000);
//!     txn.commit().await.unwrap();
//!
//!     assert_eq!(store.get_cursor(&chain_id).await.unwrap(), Some(170_000));
//! }
//! ```
//!
//! A commit lands state, history and cursor together or not at all, and is
//! refused outright if it would move a cursor backwards.

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{LedgerStore, LedgerStoreExt, StoreTxn, WriteSet};
