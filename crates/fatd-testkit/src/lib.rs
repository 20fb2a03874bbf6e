//! # fatd Testkit
//!
//! Testing utilities for fatd.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: chain ids, RCD addresses and entry hashes that must
//!   match the Factom network bit for bit
//! - **Generators**: Proptest strategies producing whole token ledgers
//! - **Fixtures**: Signed issuance and transaction entries for one token
//!
//! ## Test Fixtures
//!
//! ```rust
//! use fatd_testkit::fixtures::{user, TokenFixture};
//!
//! let token = TokenFixture::new("test");
//! let issuance = token.issuance(1, 1_000);
//! let mint = token.mint(2, user(1).address(), 100);
//! assert_eq!(issuance.chain_id, mint.chain_id);
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use fatd_testkit::generators::{script_entries, LedgerScript};
//!
//! proptest! {
//!     #[test]
//!     fn replay_is_deterministic(script: LedgerScript) {
//!         let entries = script_entries(&script);
//!         // replay twice, compare state hashes
//!     }
//! }
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{user, TokenFixture};
pub use generators::{script_entries, LedgerOp, LedgerScript};
pub use vectors::{verify_all_vectors, VectorFailure};
