//! Error types for fatd Core.

use thiserror::Error;

use crate::types::Address;

/// Errors from encoding and decoding protocol data.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid signature")]
    InvalidSignature,

    #[error("entry decode error: {0}")]
    EntryDecode(String),

    #[error("entry encode error: {0}")]
    EntryEncode(String),

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("decoding error: {0}")]
    Decoding(String),
}

/// Broad category of a [`ValidationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// The entry is malformed: wrong shape, sizes or field types.
    Structural,
    /// The entry is well formed but breaks a protocol rule.
    Semantic,
    /// An identity or signature check failed.
    Cryptographic,
}

/// Why an entry was rejected as an issuance or transaction.
///
/// Every variant is non-fatal to replay: the entry is discarded and the
/// chain continues with the next one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    // Structural
    #[error("insufficient number of ExtIDs: need {required}, got {actual}")]
    InsufficientExtIds { required: usize, actual: usize },

    #[error("invalid RCD size: expected {expected}, got {actual}")]
    InvalidRcdSize { expected: usize, actual: usize },

    #[error("invalid signature size: expected {expected}, got {actual}")]
    InvalidSignatureSize { expected: usize, actual: usize },

    #[error("invalid RCD type: {0:#04x}")]
    InvalidRcdType(u8),

    #[error("malformed content: {0}")]
    MalformedContent(String),

    #[error("unrecognized field: {field}")]
    UnrecognizedField { field: String },

    #[error("missing field: {field}")]
    MissingField { field: &'static str },

    #[error("invalid type for field {field}: expected {expected}")]
    InvalidFieldType {
        field: &'static str,
        expected: &'static str,
    },

    // Semantic
    #[error("invalid token type: {0:?}")]
    InvalidTokenType(String),

    #[error("invalid supply: {0}")]
    InvalidSupply(i64),

    #[error("issuance has not been established")]
    IssuanceNotEstablished,

    #[error("issuance already established")]
    IssuanceAlreadyEstablished,

    #[error("transaction has no inputs")]
    EmptyInputs,

    #[error("transaction has no outputs")]
    EmptyOutputs,

    #[error("zero amount for address {address}")]
    ZeroAmount { address: Address },

    #[error("duplicate input address {address}")]
    DuplicateInput { address: Address },

    #[error("duplicate output address {address}")]
    DuplicateOutput { address: Address },

    #[error("amount overflow")]
    AmountOverflow,

    #[error("unbalanced transaction: inputs {inputs}, outputs {outputs}")]
    Unbalanced { inputs: u64, outputs: u64 },

    #[error("insufficient balance for {address}: balance {balance}, amount {amount}")]
    InsufficientBalance {
        address: Address,
        balance: u64,
        amount: u64,
    },

    #[error("coinbase transaction must have exactly one input")]
    CoinbaseWithOtherInputs,

    #[error("coinbase address cannot receive outputs")]
    CoinbaseOutput,

    #[error("supply exceeded: requested {requested}, remaining {remaining}")]
    SupplyExceeded { requested: u64, remaining: u64 },

    #[error("duplicate transaction")]
    DuplicateTransaction,

    // Cryptographic
    #[error("invalid RCD")]
    InvalidRcd,

    #[error("input {index} address does not match its RCD")]
    InputAddressMismatch { index: usize },

    #[error("coinbase RCD does not belong to the issuer")]
    InvalidCoinbaseRcd,

    #[error("invalid signature")]
    InvalidSignature,
}

impl ValidationError {
    /// The category this rejection belongs to.
    pub fn class(&self) -> ErrorClass {
        use ValidationError::*;
        match self {
            InsufficientExtIds { .. }
            | InvalidRcdSize { .. }
            | InvalidSignatureSize { .. }
            | InvalidRcdType(_)
            | MalformedContent(_)
            | UnrecognizedField { .. }
            | MissingField { .. }
            | InvalidFieldType { .. } => ErrorClass::Structural,

            InvalidRcd | InputAddressMismatch { .. } | InvalidCoinbaseRcd | InvalidSignature => {
                ErrorClass::Cryptographic
            }

            _ => ErrorClass::Semantic,
        }
    }
}
