//! # fatd Core
//!
//! Pure protocol primitives for FAT-0 token chains recorded on Factom.
//!
//! This crate contains no I/O, no storage, no networking. Every function is a
//! deterministic computation over entries and chain state.
//!
//! ## Key Types
//!
//! - [`Entry`] - One immutable record from the external log
//! - [`Rcd`] - Redeem Condition Datum binding a public key to an [`Address`]
//! - [`Issuance`] - The single token-definition record of a chain
//! - [`Transaction`] - A validated balance transfer or coinbase mint
//! - [`ChainState`] - Balances, issuance and replay position of one chain
//!
//! ## Validation
//!
//! [`validate_issuance`] and [`validate_transaction`] classify one untrusted
//! entry. Both run cheap structural checks before signature verification and
//! return the first failure as a [`ValidationError`].

pub mod canonical;
pub mod chain;
pub mod content;
pub mod crypto;
pub mod entry;
pub mod error;
pub mod issuance;
pub mod state;
pub mod transaction;
pub mod types;
pub mod validation;

pub use canonical::{decode_chain_state, encode_chain_state};
pub use chain::{token_chain_id, token_name_ids, valid_token_name_ids};
pub use content::RawMetadata;
pub use crypto::{
    blake3_fingerprint, sha256, sha256d, Ed25519PublicKey, Ed25519Signature, Keypair, Rcd,
    RCD_SIZE, RCD_TYPE, SIGNATURE_SIZE,
};
pub use entry::{compute_entry_hash, Entry, EntryBuilder};
pub use error::{CoreError, ErrorClass, ValidationError};
pub use issuance::{
    decode_issuance_content, validate_issuance, validate_issuance_data,
    validate_issuance_structure, Issuance, IssuanceBuilder, IssuanceFields, Supply, TokenType,
};
pub use state::{ChainPhase, ChainState, EntryCursor};
pub use transaction::{
    decode_transaction_content, validate_transaction, AddressAmount, Transaction,
    TransactionBuilder, TransactionFields,
};
pub use types::{Address, ChainId, EntryHash, StateHash};
pub use validation::{derive_address, signed_message, verify_signature, ParsedExtIds};
