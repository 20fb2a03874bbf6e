//! Proptest generators for property-based testing.
//!
//! The main generator is [`LedgerScript`]: an issuance followed by a random
//! mix of mints, transfers and junk entries spread over several blocks.
//! Scripts are not guaranteed to be valid; overspends and supply overruns
//! are expected and must be rejected deterministically.

use proptest::prelude::*;

use fatd_core::{Address, ChainId, Entry, Keypair};

use crate::fixtures::{user, TokenFixture};

/// Number of distinct users a script moves funds between.
pub const SCRIPT_USERS: u8 = 4;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random Address.
pub fn address() -> impl Strategy<Value = Address> {
    any::<[u8; 32]>().prop_map(Address::from_bytes)
}

/// Generate a random ChainId.
pub fn chain_id() -> impl Strategy<Value = ChainId> {
    any::<[u8; 32]>().prop_map(ChainId::from_bytes)
}

/// Generate a token id.
pub fn token_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,15}".prop_map(String::from)
}

/// One step of a ledger script. Users are indices into [`user`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerOp {
    Mint { to: u8, amount: u64 },
    Transfer { from: u8, to: u8, amount: u64 },
    Garbage(Vec<u8>),
}

fn user_index() -> impl Strategy<Value = u8> {
    1..=SCRIPT_USERS
}

/// Generate one ledger step.
pub fn ledger_op() -> impl Strategy<Value = LedgerOp> {
    prop_oneof![
        3 => (user_index(), 1u64..=1_000).prop_map(|(to, amount)| LedgerOp::Mint { to, amount }),
        6 => (user_index(), user_index(), 1u64..=400)
            .prop_map(|(from, to, amount)| LedgerOp::Transfer { from, to, amount }),
        1 => prop::collection::vec(any::<u8>(), 0..=64).prop_map(LedgerOp::Garbage),
    ]
}

/// A token ledger to replay.
#[derive(Debug, Clone)]
pub struct LedgerScript {
    pub token_id: String,
    /// Declared supply; `-1` for unlimited.
    pub supply: i64,
    pub ops: Vec<LedgerOp>,
    /// Entries per block, at least one.
    pub entries_per_block: usize,
    pub start_height: u64,
}

impl Arbitrary for LedgerScript {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            token_id(),
            prop_oneof![Just(-1i64), 1i64..=5_000],
            prop::collection::vec(ledger_op(), 0..=40),
            1usize..=6,
            0u64..=1_000,
        )
            .prop_map(
                |(token_id, supply, ops, entries_per_block, start_height)| LedgerScript {
                    token_id,
                    supply,
                    ops,
                    entries_per_block,
                    start_height,
                },
            )
            .boxed()
    }
}

impl LedgerScript {
    pub fn fixture(&self) -> TokenFixture {
        TokenFixture::new(&self.token_id)
    }

    /// Height of the last block the script writes to.
    pub fn last_height(&self) -> u64 {
        let per_block = self.entries_per_block.max(1);
        let blocks = (self.ops.len() + 1 + per_block - 1) / per_block;
        self.start_height + blocks.saturating_sub(1) as u64
    }
}

/// Signed entries for a script, in log order.
///
/// The issuance comes first; the remaining entries fill blocks of
/// `entries_per_block` starting at `start_height`.
pub fn script_entries(script: &LedgerScript) -> Vec<Entry> {
    let token = script.fixture();
    let per_block = script.entries_per_block.max(1);
    let height_of = |index: usize| script.start_height + (index / per_block) as u64;

    let mut entries = Vec::with_capacity(script.ops.len() + 1);
    entries.push(token.issuance(height_of(0), script.supply));

    for (i, op) in script.ops.iter().enumerate() {
        let height = height_of(i + 1);
        let entry = match op {
            LedgerOp::Mint { to, amount } => token.mint(height, user(*to).address(), *amount),
            LedgerOp::Transfer { from, to, amount } => {
                token.transfer(height, &user(*from), user(*to).address(), *amount)
            }
            LedgerOp::Garbage(content) => token.garbage(height, content),
        };
        entries.push(entry);
    }

    entries
}
