//! Replay properties over generated ledgers.

use std::collections::BTreeMap;
use std::sync::Arc;

use fatd_core::{AddressAmount, ChainState, Entry, Supply, Transaction};
use fatd_replay::source::memory::MemorySource;
use fatd_replay::{ChainReplayer, ChainSpec, ReplayConfig};
use fatd_store::{LedgerStore, MemoryStore};
use fatd_testkit::generators::{script_entries, LedgerScript};
use proptest::prelude::*;
use tokio::sync::watch;

fn replay(script: &LedgerScript, max_batch_entries: usize) -> ChainState {
    runtime().block_on(async {
        let token = script.fixture();
        let source = Arc::new(MemorySource::new());
        source.push_entries(script_entries(script)).await;

        let store = Arc::new(MemoryStore::new());
        let spec = ChainSpec::new(token.chain_id, token.issuer_address(), script.start_height);
        let config = ReplayConfig {
            max_batch_entries,
            ..ReplayConfig::default()
        };
        let replayer = ChainReplayer::new(spec, Arc::clone(&store), source, config);

        let (_tx, mut cancel) = watch::channel(false);
        replayer.catch_up(&mut cancel).await.unwrap();

        assert_eq!(
            store.get_cursor(&token.chain_id).await.unwrap(),
            Some(script.last_height())
        );
        store
            .get_chain_state(&token.chain_id)
            .await
            .unwrap()
            .unwrap()
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn total(items: &[AddressAmount]) -> u128 {
    items.iter().map(|item| item.amount as u128).sum()
}

/// Replays one block at a time, returning the committed state after every
/// block and the final accepted history.
fn replay_by_block(script: &LedgerScript) -> (Vec<ChainState>, Vec<Transaction>) {
    runtime().block_on(async {
        let token = script.fixture();
        let mut blocks: BTreeMap<u64, Vec<Entry>> = BTreeMap::new();
        for entry in script_entries(script) {
            blocks.entry(entry.height).or_default().push(entry);
        }

        let store = Arc::new(MemoryStore::new());
        let spec = ChainSpec::new(token.chain_id, token.issuer_address(), script.start_height);
        let config = ReplayConfig {
            max_batch_entries: 2,
            ..ReplayConfig::default()
        };
        let replayer =
            ChainReplayer::new(spec, Arc::clone(&store), Arc::new(MemorySource::new()), config);

        let mut snapshots = Vec::new();
        for height in script.start_height..=script.last_height() {
            let entries = blocks.get(&height).map(Vec::as_slice).unwrap_or(&[]);
            replayer.replay_block(height, entries).await.unwrap();
            if let Some(state) = store.get_chain_state(&token.chain_id).await.unwrap() {
                snapshots.push(state);
            }
        }
        let history = store.list_transactions(&token.chain_id, None).await.unwrap();
        (snapshots, history)
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_replay_is_deterministic(script: LedgerScript, batch in 1usize..=4) {
        let whole = replay(&script, 500);
        let batched = replay(&script, batch);

        prop_assert_eq!(whole.state_hash().unwrap(), batched.state_hash().unwrap());
        prop_assert_eq!(
            whole.canonical_bytes().unwrap(),
            batched.canonical_bytes().unwrap()
        );
    }

    #[test]
    fn prop_supply_is_conserved(script: LedgerScript) {
        let state = replay(&script, 500);

        prop_assert!(state.issuance.is_some());
        prop_assert_eq!(state.circulating(), state.issued as u128);
        if let Supply::Limited(max) = state.issuance.as_ref().unwrap().supply {
            prop_assert!(state.issued <= max);
        }
    }

    #[test]
    fn prop_every_commit_conserves_supply(script: LedgerScript) {
        let (snapshots, history) = replay_by_block(&script);

        prop_assert!(!snapshots.is_empty());
        for state in &snapshots {
            prop_assert_eq!(state.circulating(), state.issued as u128);
            prop_assert!(state.balances().values().all(|amount| *amount > 0));
            if let Some(Supply::Limited(max)) = state.issuance.as_ref().map(|i| i.supply) {
                prop_assert!(state.issued <= max);
            }
        }

        let last = snapshots.last().unwrap();
        let minted: u128 = history
            .iter()
            .filter(|tx| tx.inputs.iter().any(|input| input.address.is_coinbase()))
            .map(|tx| total(&tx.outputs))
            .sum();
        prop_assert_eq!(minted, last.issued as u128);
        for tx in &history {
            prop_assert_eq!(total(&tx.inputs), total(&tx.outputs));
        }
    }
}
