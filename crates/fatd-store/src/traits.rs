//! LedgerStore trait: the abstract interface for ledger persistence.
//!
//! Writes go through a [`StoreTxn`], which stages chain state, cursor and
//! transaction records for one chain and hands them to
//! [`LedgerStore::commit_writes`] as a single atomic [`WriteSet`].

use async_trait::async_trait;
use fatd_core::{Address, ChainId, ChainState, EntryHash, Issuance, Transaction};

use crate::error::Result;

/// Everything one commit writes for a chain.
#[derive(Debug, Clone)]
pub struct WriteSet {
    pub chain_id: ChainId,

    /// New chain state, replacing the stored one.
    pub state: Option<ChainState>,

    /// New cursor: the last fully processed height.
    pub cursor: Option<u64>,

    /// Newly accepted transactions, in acceptance order.
    pub transactions: Vec<Transaction>,
}

impl WriteSet {
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            state: None,
            cursor: None,
            transactions: Vec::new(),
        }
    }

    /// True if committing would change nothing.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.cursor.is_none() && self.transactions.is_empty()
    }
}

/// The LedgerStore trait: async interface for ledger persistence.
///
/// # Design Notes
///
/// - **Atomic commits**: a [`WriteSet`] lands entirely or not at all.
/// - **Monotonic cursors**: a commit that would lower a chain's cursor fails
///   with `CursorRegression` and writes nothing.
/// - **Immutable history**: a transaction is stored once per chain.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Chain State
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the state of a chain.
    async fn get_chain_state(&self, chain_id: &ChainId) -> Result<Option<ChainState>>;

    /// Get a chain's issuance, if established.
    async fn get_issuance(&self, chain_id: &ChainId) -> Result<Option<Issuance>> {
        Ok(self
            .get_chain_state(chain_id)
            .await?
            .and_then(|state| state.issuance))
    }

    /// Get the balance of an address on a chain. Unknown addresses hold zero.
    async fn get_balance(&self, chain_id: &ChainId, address: &Address) -> Result<u64>;

    /// List every chain with stored state.
    async fn list_chains(&self) -> Result<Vec<ChainId>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Cursors
    // ─────────────────────────────────────────────────────────────────────────

    /// Get the last fully processed height of a chain.
    async fn get_cursor(&self, chain_id: &ChainId) -> Result<Option<u64>>;

    /// The lowest cursor over all chains, or `None` if no chain has one.
    async fn get_sync_height(&self) -> Result<Option<u64>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Transactions
    // ─────────────────────────────────────────────────────────────────────────

    /// Check if a transaction was accepted on a chain.
    async fn has_transaction(&self, chain_id: &ChainId, entry_hash: &EntryHash) -> Result<bool>;

    /// Get an accepted transaction by its entry hash.
    async fn get_transaction(
        &self,
        chain_id: &ChainId,
        entry_hash: &EntryHash,
    ) -> Result<Option<Transaction>>;

    /// List accepted transactions in acceptance order, optionally only
    /// those touching `address`.
    async fn list_transactions(
        &self,
        chain_id: &ChainId,
        address: Option<&Address>,
    ) -> Result<Vec<Transaction>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Commit
    // ─────────────────────────────────────────────────────────────────────────

    /// Apply a write set atomically.
    async fn commit_writes(&self, writes: WriteSet) -> Result<()>;
}

/// A staged transaction against one chain.
///
/// Reads observe the transaction's own writes. Dropping without
/// [`StoreTxn::commit`] discards everything.
pub struct StoreTxn<'s, S: ?Sized> {
    store: &'s S,
    writes: WriteSet,
}

impl<'s, S: LedgerStore + ?Sized> StoreTxn<'s, S> {
    /// The chain this transaction writes to.
    pub fn chain_id(&self) -> &ChainId {
        &self.writes.chain_id
    }

    pub async fn get_chain_state(&self) -> Result<Option<ChainState>> {
        match &self.writes.state {
            Some(state) => Ok(Some(state.clone())),
            None => self.store.get_chain_state(&self.writes.chain_id).await,
        }
    }

    pub fn put_chain_state(&mut self, state: ChainState) {
        self.writes.state = Some(state);
    }

    pub async fn get_cursor(&self) -> Result<Option<u64>> {
        match self.writes.cursor {
            Some(height) => Ok(Some(height)),
            None => self.store.get_cursor(&self.writes.chain_id).await,
        }
    }

    pub fn put_cursor(&mut self, height: u64) {
        self.writes.cursor = Some(height);
    }

    pub async fn has_transaction(&self, entry_hash: &EntryHash) -> Result<bool> {
        if self
            .writes
            .transactions
            .iter()
            .any(|tx| tx.entry_hash == *entry_hash)
        {
            return Ok(true);
        }
        self.store
            .has_transaction(&self.writes.chain_id, entry_hash)
            .await
    }

    pub fn put_transaction(&mut self, tx: Transaction) {
        self.writes.transactions.push(tx);
    }

    /// Staged writes so far.
    pub fn writes(&self) -> &WriteSet {
        &self.writes
    }

    /// Commit all staged writes atomically.
    pub async fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }
        self.store.commit_writes(self.writes).await
    }

    /// Discard all staged writes.
    pub fn abort(self) {}
}

/// Extension trait for opening store transactions.
pub trait LedgerStoreExt: LedgerStore {
    /// Begin a transaction against one chain.
    fn begin(&self, chain_id: ChainId) -> StoreTxn<'_, Self> {
        StoreTxn {
            store: self,
            writes: WriteSet::new(chain_id),
        }
    }
}

impl<S: LedgerStore + ?Sized> LedgerStoreExt for S {}
