//! Per-chain replay stream.
//!
//! A [`ChainReplayer`] walks one chain block by block. Each block is
//! committed in batches of at most `max_batch_entries` entries; every batch
//! writes the chain state and newly accepted transactions, and the final
//! batch also advances the cursor. A crash between batches leaves the
//! cursor on the previous block and the state's last entry inside the
//! current one, which [`ChainReplayer::replay_block`] uses to resume.

use std::sync::Arc;

use fatd_core::{
    Address, ChainId, ChainPhase, ChainState, Entry, EntryCursor, ValidationError,
};
use fatd_store::{LedgerStore, LedgerStoreExt};
use tokio::sync::watch;
use tracing::Instrument;

use crate::config::ReplayConfig;
use crate::error::{ReplayError, Result};
use crate::machine::{apply_entry, check_entry, EntryOutcome};
use crate::retry::with_retries;
use crate::source::EntrySource;

/// What to replay: a chain, the address allowed to issue on it, and where
/// to start when nothing is stored yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainSpec {
    pub chain_id: ChainId,
    pub issuer: Address,
    pub start_height: u64,
}

impl ChainSpec {
    pub fn new(chain_id: ChainId, issuer: Address, start_height: u64) -> Self {
        Self {
            chain_id,
            issuer,
            start_height,
        }
    }

    /// Spec for the token chain of `token_id` issued by `issuer_chain_id`.
    pub fn for_token(
        token_id: &str,
        issuer_chain_id: &ChainId,
        issuer: Address,
        start_height: u64,
    ) -> Self {
        Self::new(
            fatd_core::token_chain_id(token_id, issuer_chain_id),
            issuer,
            start_height,
        )
    }
}

/// Result of replaying one block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockReport {
    pub height: u64,

    /// Entries the source returned for the block.
    pub entries_seen: usize,

    /// Entries skipped because an earlier run already committed them.
    pub entries_resumed: usize,

    pub issuance_accepted: bool,
    pub transactions_accepted: usize,

    /// Entries that failed validation, duplicates included.
    pub rejected: usize,

    /// Entries that did not belong in the block.
    pub malformed: usize,

    /// Store commits made for the block.
    pub commits: usize,

    /// True if the block was at or below the cursor and left alone.
    pub already_applied: bool,
}

/// Sequential replay stream for one chain.
pub struct ChainReplayer<S: ?Sized, R: ?Sized> {
    spec: ChainSpec,
    store: Arc<S>,
    source: Arc<R>,
    config: ReplayConfig,
}

impl<S, R> ChainReplayer<S, R>
where
    S: LedgerStore + ?Sized,
    R: EntrySource + ?Sized,
{
    pub fn new(spec: ChainSpec, store: Arc<S>, source: Arc<R>, config: ReplayConfig) -> Self {
        Self {
            spec,
            store,
            source,
            config,
        }
    }

    pub fn spec(&self) -> &ChainSpec {
        &self.spec
    }

    pub fn chain_id(&self) -> ChainId {
        self.spec.chain_id
    }

    /// The next height to replay: one past the cursor, or the start height.
    /// `None` once the cursor sits at `u64::MAX`.
    pub async fn next_height(&self) -> Result<Option<u64>> {
        Ok(match self.store.get_cursor(&self.spec.chain_id).await? {
            Some(cursor) => cursor.checked_add(1),
            None => Some(self.spec.start_height),
        })
    }

    /// Current phase of the chain as stored.
    pub async fn phase(&self) -> Result<ChainPhase> {
        let state = self.store.get_chain_state(&self.spec.chain_id).await?;
        Ok(ChainPhase::of(state.as_ref()))
    }

    /// Replay the entries of block `height`.
    ///
    /// Blocks at or below the cursor are left alone. If the stored state
    /// stopped partway through this block, entries up to and including its
    /// last entry are skipped.
    pub async fn replay_block(&self, height: u64, entries: &[Entry]) -> Result<BlockReport> {
        let span = tracing::info_span!("block", chain = %self.spec.chain_id, height);
        self.replay_block_inner(height, entries)
            .instrument(span)
            .await
    }

    async fn replay_block_inner(&self, height: u64, entries: &[Entry]) -> Result<BlockReport> {
        let chain_id = self.spec.chain_id;
        let mut report = BlockReport {
            height,
            entries_seen: entries.len(),
            ..BlockReport::default()
        };

        if let Some(cursor) = self.store.get_cursor(&chain_id).await? {
            if height <= cursor {
                tracing::debug!(cursor, "block already applied");
                report.already_applied = true;
                return Ok(report);
            }
        }

        let mut state = self.store.get_chain_state(&chain_id).await?;

        let resume_from = state
            .as_ref()
            .and_then(|s| s.last_entry)
            .filter(|last| last.height == height)
            .and_then(|last| entries.iter().position(|e| e.hash == last.entry_hash))
            .map_or(0, |pos| pos + 1);
        if resume_from > 0 {
            tracing::info!(skipped = resume_from, "resuming partial block");
        }
        report.entries_resumed = resume_from;

        let pending = &entries[resume_from..];
        if pending.is_empty() {
            let mut txn = self.store.begin(chain_id);
            txn.put_cursor(height);
            txn.commit().await?;
            report.commits = 1;
            return Ok(report);
        }

        let batch_size = self.config.batch_size();
        let batches = (pending.len() + batch_size - 1) / batch_size;

        for (index, batch) in pending.chunks(batch_size).enumerate() {
            let mut working = state
                .clone()
                .unwrap_or_else(|| ChainState::new(chain_id, self.spec.issuer));
            let mut txn = self.store.begin(chain_id);

            for entry in batch {
                let outcome = if working.phase() == ChainPhase::Active
                    && check_entry(&working, height, entry).is_ok()
                    && txn.has_transaction(&entry.hash).await?
                {
                    working.last_entry = Some(EntryCursor {
                        height,
                        entry_hash: entry.hash,
                    });
                    EntryOutcome::Rejected(ValidationError::DuplicateTransaction)
                } else {
                    apply_entry(&mut working, height, entry)
                };

                match outcome {
                    EntryOutcome::IssuanceAccepted => {
                        report.issuance_accepted = true;
                        if let Some(issuance) = &working.issuance {
                            tracing::info!(
                                entry = %entry.hash,
                                supply = issuance.supply.declared(),
                                "issuance established"
                            );
                        }
                    }
                    EntryOutcome::TransactionAccepted(tx) => {
                        report.transactions_accepted += 1;
                        tracing::debug!(
                            entry = %entry.hash,
                            coinbase = tx.is_coinbase(),
                            amount = tx.amount(),
                            "transaction accepted"
                        );
                        txn.put_transaction(tx);
                    }
                    EntryOutcome::Rejected(err) => {
                        report.rejected += 1;
                        tracing::debug!(
                            entry = %entry.hash,
                            class = ?err.class(),
                            error = %err,
                            "entry rejected"
                        );
                    }
                    EntryOutcome::Malformed(reason) => {
                        report.malformed += 1;
                        tracing::debug!(entry = %entry.hash, ?reason, "malformed entry skipped");
                    }
                }
            }

            txn.put_chain_state(working.clone());
            if index + 1 == batches {
                txn.put_cursor(height);
            }
            txn.commit().await?;
            report.commits += 1;
            state = Some(working);
        }

        Ok(report)
    }

    /// Replay every block from the next height up to the source head.
    ///
    /// Returns the number of blocks replayed. Stops early, without error,
    /// once `cancel` is set; the last committed block stays committed.
    pub async fn catch_up(&self, cancel: &mut watch::Receiver<bool>) -> Result<u64> {
        let source = &self.source;
        let head = with_retries(&self.config, cancel, "head_height", || source.head_height()).await?;

        let chain_id = self.spec.chain_id;
        let Some(mut height) = self.next_height().await? else {
            return Ok(0);
        };
        let mut replayed = 0;

        while height <= head {
            if *cancel.borrow() {
                break;
            }
            let entries = with_retries(&self.config, cancel, "fetch_entries_at", || {
                source.fetch_entries_at(&chain_id, height)
            })
            .await?;

            self.replay_block(height, &entries).await?;
            replayed += 1;
            match height.checked_add(1) {
                Some(next) => height = next,
                None => break,
            }
        }

        Ok(replayed)
    }

    /// Follow the chain until cancelled.
    ///
    /// Catches up to the head, then polls every `poll_interval`. Returns
    /// `Ok(())` on cancellation and the first fatal error otherwise.
    pub async fn run(self, mut cancel: watch::Receiver<bool>) -> Result<()> {
        let chain_id = self.spec.chain_id;
        tracing::info!(chain = %chain_id, start = self.spec.start_height, "replay stream started");

        loop {
            match self.catch_up(&mut cancel).await {
                Ok(_) => {}
                Err(ReplayError::Cancelled) => break,
                Err(err) => {
                    tracing::error!(chain = %chain_id, error = %err, "replay stream failed");
                    return Err(err);
                }
            }

            if *cancel.borrow() {
                break;
            }
            tokio::select! {
                _ = tokio::time::sleep(self.config.poll_interval) => {}
                changed = cancel.changed() => {
                    if changed.is_err() || *cancel.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(chain = %chain_id, "replay stream stopped");
        Ok(())
    }
}
