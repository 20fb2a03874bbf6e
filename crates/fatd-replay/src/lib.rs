//! # fatd Replay
//!
//! Chain replay engine for fatd: one sequential stream per token chain,
//! folding validated entries into [`fatd_core::ChainState`] and committing
//! every block through a [`fatd_store::LedgerStore`].
//!
//! ## Key Properties
//!
//! - **Deterministic**: the same entry sequence always yields the same state
//! - **Resumable**: a stream restarts from its stored cursor, mid-block if a
//!   partial block was committed
//! - **Idempotent**: entries at or before the cursor are never reprocessed
//! - **Isolated**: a fatal error stops one stream and is reported as a
//!   [`Fault`]; other chains keep running
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fatd_replay::{ChainSpec, ReplayConfig, Supervisor};
//! use fatd_replay::source::memory::MemorySource;
//! use fatd_store::MemoryStore;
//! use fatd_core::{Address, ChainId};
//!
//! async fn example() {
//!     let store = Arc::new(MemoryStore::new());
//!     let source = Arc::new(MemorySource::new());
//!     let mut supervisor = Supervisor::new(store, source, ReplayConfig::default());
//!
//!     let spec = ChainSpec::new(ChainId::from_bytes([0x11; 32]), Address::ZERO, 0);
//!     supervisor.track(spec).unwrap();
//!
//!     if let Some(fault) = supervisor.next_fault().await {
//!         eprintln!("chain {} failed: {}", fault.chain_id, fault.error);
//!     }
//!     supervisor.shutdown().await;
//! }
//! ```
//!
//! ## Chain Lifecycle
//!
//! ```text
//! Uninitialized --first block--> AwaitingIssuance --valid issuance--> Active
//!                                   |      ^                          |    ^
//!                                   +------+                          +----+
//!                                 rejected entries              transactions
//! ```

pub mod config;
pub mod error;
pub mod machine;
pub mod replayer;
pub mod retry;
pub mod source;
pub mod supervisor;

pub use config::ReplayConfig;
pub use error::{Result, ReplayError, SourceError};
pub use machine::{apply_entry, EntryOutcome};
pub use replayer::{BlockReport, ChainReplayer, ChainSpec};
pub use retry::Backoff;
pub use source::EntrySource;
pub use supervisor::{Fault, Supervisor};
