//! Chain identifier derivation.
//!
//! A chain id is the sha256 of the concatenated sha256 hashes of the chain's
//! name IDs. Token chains use four fixed name IDs.

use sha2::{Digest, Sha256};

use crate::crypto::sha256;
use crate::types::ChainId;

/// Name ID marking a token chain.
pub const TOKEN_NAME_ID: &[u8] = b"token";

/// Name ID preceding the issuer's identity chain id.
pub const ISSUER_NAME_ID: &[u8] = b"issuer";

impl ChainId {
    /// Derive a chain id from its name IDs.
    pub fn from_name_ids<I, B>(name_ids: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: AsRef<[u8]>,
    {
        let mut hasher = Sha256::new();
        for id in name_ids {
            hasher.update(sha256(id.as_ref()));
        }
        Self(hasher.finalize().into())
    }
}

/// Name IDs of the chain for `token_id` issued by `issuer_chain_id`.
pub fn token_name_ids(token_id: &str, issuer_chain_id: &ChainId) -> [Vec<u8>; 4] {
    [
        TOKEN_NAME_ID.to_vec(),
        token_id.as_bytes().to_vec(),
        ISSUER_NAME_ID.to_vec(),
        issuer_chain_id.as_bytes().to_vec(),
    ]
}

/// Chain id for `token_id` issued by `issuer_chain_id`.
pub fn token_chain_id(token_id: &str, issuer_chain_id: &ChainId) -> ChainId {
    ChainId::from_name_ids(token_name_ids(token_id, issuer_chain_id))
}

/// Check whether name IDs describe a token chain.
pub fn valid_token_name_ids<B: AsRef<[u8]>>(name_ids: &[B]) -> bool {
    if name_ids.len() != 4 {
        return false;
    }
    if name_ids.iter().any(|id| id.as_ref().is_empty()) {
        return false;
    }
    name_ids[0].as_ref() == TOKEN_NAME_ID
        && name_ids[2].as_ref() == ISSUER_NAME_ID
        && name_ids[3].as_ref().len() == 32
}
