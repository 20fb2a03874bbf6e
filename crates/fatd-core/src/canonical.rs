//! Canonical CBOR encoding of chain state.
//!
//! RFC 8949 core deterministic encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats
//!
//! Two replays of the same entries must produce identical bytes, so the
//! state hash can be compared across runs and machines.

use bytes::Bytes;
use ciborium::value::{Integer, Value};

use crate::content::RawMetadata;
use crate::error::CoreError;
use crate::issuance::{Issuance, Supply, TokenType};
use crate::state::{ChainState, EntryCursor};
use crate::types::{Address, ChainId, EntryHash};

/// Current chain state encoding version.
pub const STATE_VERSION: u8 = 0;

mod state_keys {
    pub const VERSION: u64 = 0;
    pub const CHAIN_ID: u64 = 1;
    pub const ISSUER: u64 = 2;
    pub const ISSUANCE: u64 = 3;
    pub const BALANCES: u64 = 4;
    pub const ISSUED: u64 = 5;
    pub const TRANSACTION_COUNT: u64 = 6;
    pub const LAST_ENTRY: u64 = 7;
}

mod issuance_keys {
    pub const TOKEN_TYPE: u64 = 0;
    pub const SYMBOL: u64 = 1;
    pub const NAME: u64 = 2;
    pub const SUPPLY: u64 = 3;
    pub const METADATA: u64 = 4;
    pub const ENTRY_HASH: u64 = 5;
    pub const TIMESTAMP: u64 = 6;
}

/// Encode chain state to canonical CBOR bytes.
pub fn encode_chain_state(state: &ChainState) -> Result<Vec<u8>, CoreError> {
    let value = chain_state_to_value(state);
    let mut buf = Vec::new();
    encode_value_to(&mut buf, &value)?;
    Ok(buf)
}

/// Decode chain state from CBOR bytes.
pub fn decode_chain_state(bytes: &[u8]) -> Result<ChainState, CoreError> {
    let value: Value =
        ciborium::from_reader(bytes).map_err(|e| CoreError::Decoding(e.to_string()))?;
    value_to_chain_state(&value)
}

fn key(k: u64) -> Value {
    Value::Integer(k.into())
}

fn optional_text(s: &Option<String>) -> Value {
    match s {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    }
}

fn chain_state_to_value(state: &ChainState) -> Value {
    let issuance = match &state.issuance {
        Some(issuance) => issuance_to_value(issuance),
        None => Value::Null,
    };

    // Ordered by address already; zero balances are never stored.
    let balances = state
        .balances()
        .iter()
        .map(|(address, amount)| {
            Value::Array(vec![
                Value::Bytes(address.0.to_vec()),
                Value::Integer((*amount).into()),
            ])
        })
        .collect();

    let last_entry = match &state.last_entry {
        Some(cursor) => Value::Array(vec![
            Value::Integer(cursor.height.into()),
            Value::Bytes(cursor.entry_hash.0.to_vec()),
        ]),
        None => Value::Null,
    };

    Value::Map(vec![
        (key(state_keys::VERSION), Value::Integer(STATE_VERSION.into())),
        (key(state_keys::CHAIN_ID), Value::Bytes(state.chain_id.0.to_vec())),
        (key(state_keys::ISSUER), Value::Bytes(state.issuer.0.to_vec())),
        (key(state_keys::ISSUANCE), issuance),
        (key(state_keys::BALANCES), Value::Array(balances)),
        (key(state_keys::ISSUED), Value::Integer(state.issued.into())),
        (
            key(state_keys::TRANSACTION_COUNT),
            Value::Integer(state.transaction_count.into()),
        ),
        (key(state_keys::LAST_ENTRY), last_entry),
    ])
}

fn issuance_to_value(issuance: &Issuance) -> Value {
    let metadata = match &issuance.metadata {
        Some(raw) => Value::Bytes(raw.as_bytes().to_vec()),
        None => Value::Null,
    };

    Value::Map(vec![
        (
            key(issuance_keys::TOKEN_TYPE),
            Value::Text(issuance.token_type.as_str().to_string()),
        ),
        (key(issuance_keys::SYMBOL), optional_text(&issuance.symbol)),
        (key(issuance_keys::NAME), optional_text(&issuance.name)),
        (
            key(issuance_keys::SUPPLY),
            Value::Integer(issuance.supply.declared().into()),
        ),
        (key(issuance_keys::METADATA), metadata),
        (
            key(issuance_keys::ENTRY_HASH),
            Value::Bytes(issuance.entry_hash.0.to_vec()),
        ),
        (
            key(issuance_keys::TIMESTAMP),
            Value::Integer(issuance.timestamp.into()),
        ),
    ])
}

/// Recursively encode a CBOR value.
fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<(), CoreError> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        _ => {
            return Err(CoreError::Encoding(
                "unsupported value in canonical encoding".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: Integer) {
    let n: i128 = i.into();

    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // -1 encodes as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map with keys sorted by their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<(), CoreError> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}

// Decoding helpers

fn malformed(what: &str) -> CoreError {
    CoreError::Decoding(format!("malformed chain state: {}", what))
}

fn as_map<'a>(value: &'a Value, what: &str) -> Result<&'a [(Value, Value)], CoreError> {
    match value {
        Value::Map(m) => Ok(m),
        _ => Err(malformed(what)),
    }
}

fn get(map: &[(Value, Value)], k: u64) -> Option<&Value> {
    map.iter()
        .find(|(key, _)| matches!(key, Value::Integer(i) if i128::from(*i) == k as i128))
        .map(|(_, v)| v)
}

fn bytes32(value: Option<&Value>, what: &str) -> Result<[u8; 32], CoreError> {
    match value {
        Some(Value::Bytes(b)) => b.as_slice().try_into().map_err(|_| malformed(what)),
        _ => Err(malformed(what)),
    }
}

fn int<T: TryFrom<i128>>(value: Option<&Value>, what: &str) -> Result<T, CoreError> {
    match value {
        Some(Value::Integer(i)) => T::try_from(i128::from(*i)).map_err(|_| malformed(what)),
        _ => Err(malformed(what)),
    }
}

fn opt_text(value: Option<&Value>, what: &str) -> Result<Option<String>, CoreError> {
    match value {
        Some(Value::Text(s)) => Ok(Some(s.clone())),
        Some(Value::Null) | None => Ok(None),
        _ => Err(malformed(what)),
    }
}

fn value_to_chain_state(value: &Value) -> Result<ChainState, CoreError> {
    let map = as_map(value, "expected map")?;

    let version: u8 = int(get(map, state_keys::VERSION), "version")?;
    if version != STATE_VERSION {
        return Err(CoreError::Decoding(format!(
            "unsupported chain state version: {}",
            version
        )));
    }

    let mut state = ChainState::new(
        ChainId(bytes32(get(map, state_keys::CHAIN_ID), "chain_id")?),
        Address(bytes32(get(map, state_keys::ISSUER), "issuer")?),
    );

    state.issuance = match get(map, state_keys::ISSUANCE) {
        Some(Value::Null) | None => None,
        Some(v) => Some(value_to_issuance(v)?),
    };

    match get(map, state_keys::BALANCES) {
        Some(Value::Array(items)) => {
            for item in items {
                match item {
                    Value::Array(pair) if pair.len() == 2 => {
                        let address = Address(bytes32(pair.first(), "balance address")?);
                        let amount: u64 = int(pair.get(1), "balance amount")?;
                        state.set_balance(address, amount);
                    }
                    _ => return Err(malformed("balance entry")),
                }
            }
        }
        _ => return Err(malformed("balances")),
    }

    state.issued = int(get(map, state_keys::ISSUED), "issued")?;
    state.transaction_count = int(get(map, state_keys::TRANSACTION_COUNT), "transaction_count")?;

    state.last_entry = match get(map, state_keys::LAST_ENTRY) {
        Some(Value::Null) | None => None,
        Some(Value::Array(pair)) if pair.len() == 2 => Some(EntryCursor {
            height: int(pair.first(), "last_entry height")?,
            entry_hash: EntryHash(bytes32(pair.get(1), "last_entry hash")?),
        }),
        _ => return Err(malformed("last_entry")),
    };

    Ok(state)
}

fn value_to_issuance(value: &Value) -> Result<Issuance, CoreError> {
    let map = as_map(value, "issuance")?;

    let token_type = match get(map, issuance_keys::TOKEN_TYPE) {
        Some(Value::Text(s)) => TokenType::from_name(s).ok_or_else(|| malformed("token type"))?,
        _ => return Err(malformed("token type")),
    };

    let supply: i64 = int(get(map, issuance_keys::SUPPLY), "supply")?;
    let supply = Supply::from_declared(supply).map_err(|_| malformed("supply"))?;

    let metadata = match get(map, issuance_keys::METADATA) {
        Some(Value::Bytes(b)) => Some(RawMetadata::from_bytes(Bytes::copy_from_slice(b))),
        Some(Value::Null) | None => None,
        _ => return Err(malformed("metadata")),
    };

    Ok(Issuance {
        token_type,
        symbol: opt_text(get(map, issuance_keys::SYMBOL), "symbol")?,
        name: opt_text(get(map, issuance_keys::NAME), "name")?,
        supply,
        metadata,
        entry_hash: EntryHash(bytes32(get(map, issuance_keys::ENTRY_HASH), "entry_hash")?),
        timestamp: int(get(map, issuance_keys::TIMESTAMP), "timestamp")?,
    })
}
