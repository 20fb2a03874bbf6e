//! The Daemon: tracked chains, their replay streams and the query API.

use std::collections::BTreeMap;
use std::sync::Arc;

use fatd_core::{Address, ChainId, ChainPhase, EntryHash, Issuance, Supply, Transaction};
use fatd_replay::{ChainSpec, EntrySource, Fault, ReplayConfig, ReplayError, Supervisor};
use fatd_store::{LedgerStore, SqliteStore};

use crate::config::DaemonConfig;
use crate::error::{DaemonError, Result};

/// Summary of one token chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainStats {
    pub chain_id: ChainId,
    pub phase: ChainPhase,
    /// Declared supply, `None` before the issuance.
    pub supply: Option<Supply>,
    /// Total minted by coinbase transactions.
    pub issued: u64,
    /// Sum of all balances.
    pub circulating: u128,
    pub transactions: u64,
    /// Addresses with a non-zero balance.
    pub holders: usize,
    pub cursor: Option<u64>,
}

/// A FAT-0 ledger daemon.
///
/// Owns the set of tracked chains. While running, each one is replayed by
/// its own stream under a [`Supervisor`]; queries read the store directly
/// and work whether or not the daemon is running.
pub struct Daemon<S: LedgerStore + ?Sized + 'static, R: EntrySource + ?Sized + 'static> {
    store: Arc<S>,
    source: Arc<R>,
    config: ReplayConfig,
    chains: BTreeMap<ChainId, ChainSpec>,
    supervisor: Option<Supervisor<S, R>>,
}

impl<R: EntrySource + ?Sized + 'static> Daemon<SqliteStore, R> {
    /// Open the configured database and register the configured chains.
    pub fn open(config: &DaemonConfig, source: Arc<R>) -> Result<Self> {
        config.validate()?;
        let store = SqliteStore::open(&config.database_path)?;
        tracing::info!(
            path = %config.database_path.display(),
            chains = config.chains.len(),
            "opened ledger database"
        );

        let mut daemon = Self::new(Arc::new(store), source, config.replay.to_replay_config());
        for spec in config.chain_specs() {
            daemon.track(spec)?;
        }
        Ok(daemon)
    }
}

impl<S, R> Daemon<S, R>
where
    S: LedgerStore + ?Sized + 'static,
    R: EntrySource + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, source: Arc<R>, config: ReplayConfig) -> Self {
        Self {
            store,
            source,
            config,
            chains: BTreeMap::new(),
            supervisor: None,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.supervisor.is_some()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Start a replay stream for every tracked chain.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&mut self) -> Result<()> {
        if self.supervisor.is_some() {
            return Err(DaemonError::AlreadyRunning);
        }

        let mut supervisor = Supervisor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.source),
            self.config.clone(),
        );
        for spec in self.chains.values() {
            supervisor.track(*spec)?;
        }

        tracing::info!(chains = self.chains.len(), "daemon started");
        self.supervisor = Some(supervisor);
        Ok(())
    }

    /// Add a chain. Starts replaying it at once if the daemon is running.
    pub fn track(&mut self, spec: ChainSpec) -> Result<()> {
        if self.chains.contains_key(&spec.chain_id) {
            return Err(ReplayError::AlreadyTracked(spec.chain_id).into());
        }
        if let Some(supervisor) = &mut self.supervisor {
            supervisor.track(spec)?;
        }
        self.chains.insert(spec.chain_id, spec);
        Ok(())
    }

    /// Remove a chain, stopping its stream. Stored state is kept.
    pub async fn untrack(&mut self, chain_id: &ChainId) -> Result<()> {
        if self.chains.remove(chain_id).is_none() {
            return Err(ReplayError::NotTracked(*chain_id).into());
        }
        if let Some(supervisor) = &mut self.supervisor {
            supervisor.untrack(chain_id).await?;
        }
        Ok(())
    }

    /// Tracked chains, in order.
    pub fn tracked_chains(&self) -> Vec<ChainId> {
        self.chains.keys().copied().collect()
    }

    /// Wait for a stream to fail. `None` if the daemon is not running.
    pub async fn next_fault(&mut self) -> Option<Fault> {
        match &mut self.supervisor {
            Some(supervisor) => supervisor.next_fault().await,
            None => None,
        }
    }

    /// Stop every stream, letting in-flight commits finish.
    ///
    /// Returns the first unreported stream failure as an error.
    pub async fn shutdown(&mut self) -> Result<()> {
        let Some(mut supervisor) = self.supervisor.take() else {
            return Ok(());
        };

        let fault = supervisor.shutdown().await;
        tracing::info!("daemon stopped");
        match fault {
            Some(Fault { chain_id, error }) => Err(DaemonError::StreamFailed { chain_id, error }),
            None => Ok(()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn get_issuance(&self, chain_id: &ChainId) -> Result<Option<Issuance>> {
        Ok(self.store.get_issuance(chain_id).await?)
    }

    /// Balance of an address. Unknown chains and addresses hold zero.
    pub async fn get_balance(&self, chain_id: &ChainId, address: &Address) -> Result<u64> {
        Ok(self.store.get_balance(chain_id, address).await?)
    }

    /// Last fully replayed height of a chain.
    pub async fn get_cursor(&self, chain_id: &ChainId) -> Result<Option<u64>> {
        Ok(self.store.get_cursor(chain_id).await?)
    }

    /// Lowest cursor over all chains.
    pub async fn get_sync_height(&self) -> Result<Option<u64>> {
        Ok(self.store.get_sync_height().await?)
    }

    pub async fn chain_phase(&self, chain_id: &ChainId) -> Result<ChainPhase> {
        let state = self.store.get_chain_state(chain_id).await?;
        Ok(ChainPhase::of(state.as_ref()))
    }

    /// Accepted transactions in log order, optionally only those touching
    /// `address`.
    pub async fn get_transactions(
        &self,
        chain_id: &ChainId,
        address: Option<&Address>,
    ) -> Result<Vec<Transaction>> {
        Ok(self.store.list_transactions(chain_id, address).await?)
    }

    pub async fn get_transaction(
        &self,
        chain_id: &ChainId,
        entry_hash: &EntryHash,
    ) -> Result<Option<Transaction>> {
        Ok(self.store.get_transaction(chain_id, entry_hash).await?)
    }

    pub async fn get_stats(&self, chain_id: &ChainId) -> Result<ChainStats> {
        let state = self.store.get_chain_state(chain_id).await?;
        let cursor = self.store.get_cursor(chain_id).await?;

        Ok(match state {
            Some(state) => ChainStats {
                chain_id: *chain_id,
                phase: state.phase(),
                supply: state.issuance.as_ref().map(|i| i.supply),
                issued: state.issued,
                circulating: state.circulating(),
                transactions: state.transaction_count,
                holders: state.balances().len(),
                cursor,
            },
            None => ChainStats {
                chain_id: *chain_id,
                phase: ChainPhase::Uninitialized,
                supply: None,
                issued: 0,
                circulating: 0,
                transactions: 0,
                holders: 0,
                cursor,
            },
        })
    }
}
