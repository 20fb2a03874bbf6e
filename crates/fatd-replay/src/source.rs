//! Entry source abstraction.
//!
//! The replay engine reads the external log through [`EntrySource`].
//! Implementations may wrap a factomd RPC client or any other block store.

use async_trait::async_trait;
use fatd_core::{ChainId, Entry};

use crate::error::SourceError;

/// Result type for source operations.
pub type Result<T> = std::result::Result<T, SourceError>;

/// Read access to the block-organized external log.
///
/// Implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EntrySource: Send + Sync {
    /// Height of the newest complete block.
    async fn head_height(&self) -> Result<u64>;

    /// Entries of `chain_id` in the block at `height`, in log order.
    ///
    /// A block without entries for the chain yields an empty list.
    async fn fetch_entries_at(&self, chain_id: &ChainId, height: u64) -> Result<Vec<Entry>>;
}

/// An in-memory entry source for tests and embedding.
pub mod memory {
    use super::*;
    use std::collections::{BTreeMap, VecDeque};
    use tokio::sync::RwLock;

    #[derive(Default)]
    struct Blocks {
        entries: BTreeMap<(ChainId, u64), Vec<Entry>>,
        head: u64,

        /// Errors returned by the next calls, one per call.
        failures: VecDeque<SourceError>,

        /// Number of calls served, failed ones included.
        calls: u64,
    }

    impl Blocks {
        fn take_failure(&mut self) -> Result<()> {
            self.calls += 1;
            match self.failures.pop_front() {
                Some(err) => Err(err),
                None => Ok(()),
            }
        }
    }

    /// In-memory entry source.
    #[derive(Default)]
    pub struct MemorySource {
        blocks: RwLock<Blocks>,
    }

    impl MemorySource {
        /// Create an empty source with head height zero.
        pub fn new() -> Self {
            Self::default()
        }

        /// Append an entry to the block given by its own chain id and
        /// height, raising the head if needed.
        pub async fn push_entry(&self, entry: Entry) {
            self.push_entry_at(entry.chain_id, entry.height, entry).await;
        }

        /// Append entries in order.
        pub async fn push_entries<I: IntoIterator<Item = Entry>>(&self, entries: I) {
            for entry in entries {
                self.push_entry(entry).await;
            }
        }

        /// Append an entry to an arbitrary block, whatever the entry's own
        /// chain id and height say.
        pub async fn push_entry_at(&self, chain_id: ChainId, height: u64, entry: Entry) {
            let mut blocks = self.blocks.write().await;
            blocks
                .entries
                .entry((chain_id, height))
                .or_default()
                .push(entry);
            blocks.head = blocks.head.max(height);
        }

        /// Set the head height.
        pub async fn set_head(&self, height: u64) {
            self.blocks.write().await.head = height;
        }

        /// Fail the next `count` calls with `error`.
        pub async fn fail_next(&self, count: usize, error: SourceError) {
            let mut blocks = self.blocks.write().await;
            blocks
                .failures
                .extend(std::iter::repeat(error).take(count));
        }

        /// Total calls served so far.
        pub async fn calls(&self) -> u64 {
            self.blocks.read().await.calls
        }
    }

    #[async_trait]
    impl EntrySource for MemorySource {
        async fn head_height(&self) -> Result<u64> {
            let mut blocks = self.blocks.write().await;
            blocks.take_failure()?;
            Ok(blocks.head)
        }

        async fn fetch_entries_at(&self, chain_id: &ChainId, height: u64) -> Result<Vec<Entry>> {
            let mut blocks = self.blocks.write().await;
            blocks.take_failure()?;
            Ok(blocks
                .entries
                .get(&(*chain_id, height))
                .cloned()
                .unwrap_or_default())
        }
    }
}
