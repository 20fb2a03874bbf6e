//! Supervisor: the table of tracked chains and their replay streams.
//!
//! Each tracked chain runs one [`ChainReplayer`] in its own tokio task with
//! its own cancellation signal. Streams that stop on a fatal error report a
//! [`Fault`] on a shared queue; other streams keep running.

use std::collections::BTreeMap;
use std::sync::Arc;

use fatd_core::ChainId;
use fatd_store::LedgerStore;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::config::ReplayConfig;
use crate::error::{ReplayError, Result};
use crate::replayer::{ChainReplayer, ChainSpec};
use crate::source::EntrySource;

/// A fatal error from one replay stream.
#[derive(Debug)]
pub struct Fault {
    pub chain_id: ChainId,
    pub error: ReplayError,
}

struct TrackedChain {
    spec: ChainSpec,
    cancel: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Owner of all replay streams.
pub struct Supervisor<S: ?Sized, R: ?Sized> {
    store: Arc<S>,
    source: Arc<R>,
    config: ReplayConfig,
    chains: BTreeMap<ChainId, TrackedChain>,
    faults_tx: mpsc::UnboundedSender<Fault>,
    faults_rx: mpsc::UnboundedReceiver<Fault>,
}

impl<S, R> Supervisor<S, R>
where
    S: LedgerStore + ?Sized + 'static,
    R: EntrySource + ?Sized + 'static,
{
    pub fn new(store: Arc<S>, source: Arc<R>, config: ReplayConfig) -> Self {
        let (faults_tx, faults_rx) = mpsc::unbounded_channel();
        Self {
            store,
            source,
            config,
            chains: BTreeMap::new(),
            faults_tx,
            faults_rx,
        }
    }

    /// Start a replay stream for a chain.
    ///
    /// Must be called from within a tokio runtime.
    pub fn track(&mut self, spec: ChainSpec) -> Result<()> {
        let chain_id = spec.chain_id;
        if self.chains.contains_key(&chain_id) {
            return Err(ReplayError::AlreadyTracked(chain_id));
        }

        let (cancel, cancel_rx) = watch::channel(false);
        let replayer = ChainReplayer::new(
            spec,
            Arc::clone(&self.store),
            Arc::clone(&self.source),
            self.config.clone(),
        );
        let faults = self.faults_tx.clone();

        let handle = tokio::spawn(async move {
            if let Err(error) = replayer.run(cancel_rx).await {
                let _ = faults.send(Fault { chain_id, error });
            }
        });

        tracing::info!(chain = %chain_id, start = spec.start_height, "chain tracked");
        self.chains.insert(
            chain_id,
            TrackedChain {
                spec,
                cancel,
                handle,
            },
        );
        Ok(())
    }

    /// Stop and forget a chain's stream, waiting for its in-flight commit.
    ///
    /// Stored state is kept.
    pub async fn untrack(&mut self, chain_id: &ChainId) -> Result<()> {
        let tracked = self
            .chains
            .remove(chain_id)
            .ok_or(ReplayError::NotTracked(*chain_id))?;

        let _ = tracked.cancel.send(true);
        tracked
            .handle
            .await
            .map_err(|e| ReplayError::Join(e.to_string()))?;

        tracing::info!(chain = %chain_id, "chain untracked");
        Ok(())
    }

    /// Chains currently in the table, in order.
    pub fn tracked(&self) -> Vec<ChainId> {
        self.chains.keys().copied().collect()
    }

    pub fn spec(&self, chain_id: &ChainId) -> Option<&ChainSpec> {
        self.chains.get(chain_id).map(|t| &t.spec)
    }

    /// True if the chain is tracked and its stream has not stopped.
    pub fn is_running(&self, chain_id: &ChainId) -> bool {
        self.chains
            .get(chain_id)
            .map_or(false, |t| !t.handle.is_finished())
    }

    /// Wait for the next fatal fault from any stream.
    ///
    /// Pending while every stream is healthy.
    pub async fn next_fault(&mut self) -> Option<Fault> {
        self.faults_rx.recv().await
    }

    /// Stop every stream and wait for them to finish.
    ///
    /// Each stream completes its in-flight commit first. Returns the first
    /// fault not yet taken through [`Supervisor::next_fault`], if any.
    pub async fn shutdown(&mut self) -> Option<Fault> {
        let chains = std::mem::take(&mut self.chains);
        for tracked in chains.values() {
            let _ = tracked.cancel.send(true);
        }

        let mut first = None;
        for (chain_id, tracked) in chains {
            if let Err(e) = tracked.handle.await {
                tracing::error!(chain = %chain_id, error = %e, "stream task failed");
                first.get_or_insert(Fault {
                    chain_id,
                    error: ReplayError::Join(e.to_string()),
                });
            }
        }

        let queued = self.faults_rx.try_recv().ok();
        while self.faults_rx.try_recv().is_ok() {}

        tracing::info!("supervisor stopped");
        queued.or(first)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::memory::MemorySource;
    use fatd_core::Address;
    use fatd_store::MemoryStore;
    use std::time::Duration;

    fn fast_config() -> ReplayConfig {
        ReplayConfig {
            poll_interval: Duration::from_millis(5),
            max_retries: 1,
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(2),
            ..ReplayConfig::default()
        }
    }

    fn spec(b: u8) -> ChainSpec {
        ChainSpec::new(ChainId::from_bytes([b; 32]), Address::ZERO, 1)
    }

    #[tokio::test]
    async fn test_track_and_untrack() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MemorySource::new());
        source.set_head(3).await;

        let mut supervisor = Supervisor::new(Arc::clone(&store), source, fast_config());
        supervisor.track(spec(1)).unwrap();
        supervisor.track(spec(2)).unwrap();

        assert!(matches!(
            supervisor.track(spec(1)),
            Err(ReplayError::AlreadyTracked(_))
        ));
        assert_eq!(supervisor.tracked().len(), 2);

        // Empty blocks still advance the cursors.
        for _ in 0..200 {
            if store.get_sync_height().await.unwrap() == Some(3) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(store.get_sync_height().await.unwrap(), Some(3));

        supervisor.untrack(&spec(1).chain_id).await.unwrap();
        assert!(!supervisor.is_running(&spec(1).chain_id));
        assert!(supervisor.is_running(&spec(2).chain_id));
        assert!(matches!(
            supervisor.untrack(&spec(1).chain_id).await,
            Err(ReplayError::NotTracked(_))
        ));

        assert!(supervisor.shutdown().await.is_none());
        assert!(supervisor.tracked().is_empty());
    }

    #[tokio::test]
    async fn test_fault_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let source = Arc::new(MemorySource::new());
        source
            .fail_next(10, crate::SourceError::Unreachable("offline".into()))
            .await;

        let mut supervisor = Supervisor::new(store, source, fast_config());
        supervisor.track(spec(1)).unwrap();

        let fault = tokio::time::timeout(Duration::from_secs(5), supervisor.next_fault())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fault.chain_id, spec(1).chain_id);
        assert!(matches!(
            fault.error,
            ReplayError::RetriesExhausted { attempts: 2, .. }
        ));

        assert!(supervisor.shutdown().await.is_none());
    }
}
