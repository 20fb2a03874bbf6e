//! ChainState: balances, issuance and replay position of one token chain.
//!
//! State only changes through [`ChainState::apply_issuance`],
//! [`ChainState::apply_transaction`] and [`ChainState::record_entry`], and
//! each of those either fully applies or leaves the state untouched.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::canonical::{decode_chain_state, encode_chain_state};
use crate::crypto::blake3_fingerprint;
use crate::entry::Entry;
use crate::error::{CoreError, ValidationError};
use crate::issuance::Issuance;
use crate::transaction::Transaction;
use crate::types::{Address, ChainId, EntryHash, StateHash};

/// Domain separator for state hashes.
const STATE_HASH_DOMAIN: &[u8] = b"fatd-chain-state-v0:";

/// Where a chain is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChainPhase {
    /// Nothing stored for the chain yet.
    Uninitialized,
    /// State exists but no valid issuance has been seen.
    AwaitingIssuance,
    /// Issuance established; entries are read as transactions.
    Active,
}

impl ChainPhase {
    /// The phase of a possibly missing chain state.
    pub fn of(state: Option<&ChainState>) -> Self {
        state.map_or(Self::Uninitialized, ChainState::phase)
    }
}

/// The position of the last entry folded into a chain state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryCursor {
    pub height: u64,
    pub entry_hash: EntryHash,
}

/// Aggregate state of one token chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainState {
    pub chain_id: ChainId,

    /// Address whose RCD must sign the issuance and coinbase transactions.
    pub issuer: Address,

    pub issuance: Option<Issuance>,

    /// Non-zero balances only.
    balances: BTreeMap<Address, u64>,

    /// Total minted by coinbase transactions.
    pub issued: u64,

    /// Accepted transactions, coinbase included.
    pub transaction_count: u64,

    pub last_entry: Option<EntryCursor>,
}

impl ChainState {
    /// Empty state for a chain awaiting its issuance.
    pub fn new(chain_id: ChainId, issuer: Address) -> Self {
        Self {
            chain_id,
            issuer,
            issuance: None,
            balances: BTreeMap::new(),
            issued: 0,
            transaction_count: 0,
            last_entry: None,
        }
    }

    pub fn phase(&self) -> ChainPhase {
        if self.issuance.is_some() {
            ChainPhase::Active
        } else {
            ChainPhase::AwaitingIssuance
        }
    }

    /// Balance of an address. Unknown addresses hold zero.
    pub fn balance(&self, address: &Address) -> u64 {
        self.balances.get(address).copied().unwrap_or(0)
    }

    /// All non-zero balances, ordered by address.
    pub fn balances(&self) -> &BTreeMap<Address, u64> {
        &self.balances
    }

    /// Sum of all balances.
    pub fn circulating(&self) -> u128 {
        self.balances.values().map(|b| *b as u128).sum()
    }

    pub(crate) fn set_balance(&mut self, address: Address, amount: u64) {
        if amount == 0 {
            self.balances.remove(&address);
        } else {
            self.balances.insert(address, amount);
        }
    }

    /// Establish the chain's issuance.
    pub fn apply_issuance(&mut self, issuance: Issuance) -> Result<(), ValidationError> {
        if self.issuance.is_some() {
            return Err(ValidationError::IssuanceAlreadyEstablished);
        }
        self.issuance = Some(issuance);
        Ok(())
    }

    /// Apply a validated transaction's balance changes.
    ///
    /// Rechecks balances, overflow and supply; on error nothing changes.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<(), ValidationError> {
        let issuance = self
            .issuance
            .as_ref()
            .ok_or(ValidationError::IssuanceNotEstablished)?;

        let mut updates: BTreeMap<Address, u64> = BTreeMap::new();
        let mut issued = self.issued;

        if tx.is_coinbase() {
            let amount = tx.inputs[0].amount;
            if let Some(remaining) = issuance.supply.remaining(issued) {
                if amount > remaining {
                    return Err(ValidationError::SupplyExceeded {
                        requested: amount,
                        remaining,
                    });
                }
            }
            issued = issued
                .checked_add(amount)
                .ok_or(ValidationError::AmountOverflow)?;
        } else {
            for input in &tx.inputs {
                let balance = updates
                    .get(&input.address)
                    .copied()
                    .unwrap_or_else(|| self.balance(&input.address));
                let remaining = balance.checked_sub(input.amount).ok_or(
                    ValidationError::InsufficientBalance {
                        address: input.address,
                        balance,
                        amount: input.amount,
                    },
                )?;
                updates.insert(input.address, remaining);
            }
        }

        for output in &tx.outputs {
            let balance = updates
                .get(&output.address)
                .copied()
                .unwrap_or_else(|| self.balance(&output.address));
            let credited = balance
                .checked_add(output.amount)
                .ok_or(ValidationError::AmountOverflow)?;
            updates.insert(output.address, credited);
        }

        for (address, amount) in updates {
            self.set_balance(address, amount);
        }
        self.issued = issued;
        self.transaction_count += 1;
        Ok(())
    }

    /// Mark an entry as processed, whether or not it was accepted.
    pub fn record_entry(&mut self, entry: &Entry) {
        self.last_entry = Some(EntryCursor {
            height: entry.height,
            entry_hash: entry.hash,
        });
    }

    /// Canonical CBOR encoding.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, CoreError> {
        encode_chain_state(self)
    }

    /// Decode from [`ChainState::canonical_bytes`] output.
    pub fn from_canonical_bytes(bytes: &[u8]) -> Result<Self, CoreError> {
        decode_chain_state(bytes)
    }

    /// Domain-separated blake3 hash of the canonical encoding.
    pub fn state_hash(&self) -> Result<StateHash, CoreError> {
        let mut buf = STATE_HASH_DOMAIN.to_vec();
        buf.extend_from_slice(&self.canonical_bytes()?);
        Ok(blake3_fingerprint(&buf))
    }
}
