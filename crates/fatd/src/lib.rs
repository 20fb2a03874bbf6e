//! # fatd
//!
//! A ledger daemon for FAT-0 tokens recorded on Factom.
//!
//! ## Overview
//!
//! fatd follows a set of token chains, identifies each chain's issuance,
//! replays every later entry as a candidate transaction and keeps balances,
//! transaction history and a replay cursor per chain in a durable store.
//!
//! - **Validation**: entries are checked for structure, protocol rules and
//!   signatures before they touch any balance
//! - **Replay**: one sequential stream per chain, resumable after a crash
//! - **Queries**: issuance, balances, history and sync progress
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fatd::{Daemon, DaemonConfig};
//! use fatd::replay::source::memory::MemorySource;
//!
//! async fn example() -> anyhow::Result<()> {
//!     let config = DaemonConfig::from_file("fatd.toml".as_ref())?;
//!     let source = Arc::new(MemorySource::new());
//!
//!     let mut daemon = Daemon::open(&config, source)?;
//!     daemon.start()?;
//!
//!     let chain = config.chains[0].chain_id();
//!     let holder = config.chains[0].issuer_address;
//!     println!("balance: {}", daemon.get_balance(&chain, &holder).await?);
//!
//!     daemon.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `fatd::core` - Protocol primitives and validation
//! - `fatd::store` - Ledger storage and SQLite
//! - `fatd::replay` - Replay streams and supervisor

pub mod config;
pub mod daemon;
pub mod error;

pub use fatd_core as core;
pub use fatd_replay as replay;
pub use fatd_store as store;

pub use config::{ChainConfig, ConfigError, DaemonConfig, ReplaySettings};
pub use daemon::{ChainStats, Daemon};
pub use error::{DaemonError, Result};

pub use fatd_core::{
    Address, ChainId, ChainPhase, ChainState, Entry, EntryHash, Issuance, Supply, Transaction,
};
pub use fatd_replay::{ChainSpec, EntrySource, Fault, ReplayConfig};
pub use fatd_store::{LedgerStore, MemoryStore, SqliteStore};
