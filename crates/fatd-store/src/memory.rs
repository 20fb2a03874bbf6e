//! In-memory implementation of the LedgerStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use fatd_core::{Address, ChainId, ChainState, EntryHash, Transaction};

use crate::error::{Result, StoreError};
use crate::traits::{LedgerStore, WriteSet};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,

    /// When set, every commit fails with `Unavailable`.
    fail_commits: AtomicBool,
}

#[derive(Default)]
struct MemoryStoreInner {
    chains: BTreeMap<ChainId, ChainState>,
    cursors: BTreeMap<ChainId, u64>,

    /// Accepted transactions per chain, in acceptance order.
    transactions: BTreeMap<ChainId, Vec<Transaction>>,

    /// (chain, entry hash) of every stored transaction.
    transaction_index: HashSet<(ChainId, EntryHash)>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Make subsequent commits fail, or succeed again.
    pub fn set_fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_chain_state(&self, chain_id: &ChainId) -> Result<Option<ChainState>> {
        Ok(self.read()?.chains.get(chain_id).cloned())
    }

    async fn get_balance(&self, chain_id: &ChainId, address: &Address) -> Result<u64> {
        Ok(self
            .read()?
            .chains
            .get(chain_id)
            .map_or(0, |state| state.balance(address)))
    }

    async fn list_chains(&self) -> Result<Vec<ChainId>> {
        Ok(self.read()?.chains.keys().copied().collect())
    }

    async fn get_cursor(&self, chain_id: &ChainId) -> Result<Option<u64>> {
        Ok(self.read()?.cursors.get(chain_id).copied())
    }

    async fn get_sync_height(&self) -> Result<Option<u64>> {
        Ok(self.read()?.cursors.values().copied().min())
    }

    async fn has_transaction(&self, chain_id: &ChainId, entry_hash: &EntryHash) -> Result<bool> {
        Ok(self
            .read()?
            .transaction_index
            .contains(&(*chain_id, *entry_hash)))
    }

    async fn get_transaction(
        &self,
        chain_id: &ChainId,
        entry_hash: &EntryHash,
    ) -> Result<Option<Transaction>> {
        Ok(self.read()?.transactions.get(chain_id).and_then(|txs| {
            txs.iter()
                .find(|tx| tx.entry_hash == *entry_hash)
                .cloned()
        }))
    }

    async fn list_transactions(
        &self,
        chain_id: &ChainId,
        address: Option<&Address>,
    ) -> Result<Vec<Transaction>> {
        let inner = self.read()?;
        let Some(txs) = inner.transactions.get(chain_id) else {
            return Ok(Vec::new());
        };
        Ok(txs
            .iter()
            .filter(|tx| address.map_or(true, |a| tx.involves(a)))
            .cloned()
            .collect())
    }

    async fn commit_writes(&self, writes: WriteSet) -> Result<()> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("commits disabled".into()));
        }

        let mut inner = self.write()?;
        let chain_id = writes.chain_id;

        // Validate everything before touching anything.
        if let (Some(proposed), Some(current)) = (writes.cursor, inner.cursors.get(&chain_id)) {
            if proposed < *current {
                return Err(StoreError::CursorRegression {
                    chain_id,
                    current: *current,
                    proposed,
                });
            }
        }
        let mut staged = HashSet::new();
        for tx in &writes.transactions {
            let key = (chain_id, tx.entry_hash);
            if inner.transaction_index.contains(&key) || !staged.insert(key) {
                return Err(StoreError::DuplicateTransaction {
                    chain_id,
                    entry_hash: tx.entry_hash,
                });
            }
        }

        for tx in writes.transactions {
            inner.transaction_index.insert((chain_id, tx.entry_hash));
            inner.transactions.entry(chain_id).or_default().push(tx);
        }
        if let Some(state) = writes.state {
            inner.chains.insert(chain_id, state);
        }
        if let Some(height) = writes.cursor {
            inner.cursors.insert(chain_id, height);
        }

        Ok(())
    }
}
