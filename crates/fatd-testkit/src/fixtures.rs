//! Test fixtures and helpers.
//!
//! Signed entries for one token chain, with deterministic keys so that
//! every run produces the same entry hashes.

use fatd_core::{
    token_chain_id, Address, ChainId, Entry, EntryBuilder, IssuanceBuilder, Keypair,
    TransactionBuilder,
};

/// Seed of the default issuer key.
pub const ISSUER_SEED: [u8; 32] = [0x42; 32];

/// Default issuer identity chain.
pub const ISSUER_CHAIN_ID: ChainId = ChainId::from_bytes([0x88; 32]);

/// Seconds between blocks, used for fixture timestamps.
const BLOCK_SECONDS: i64 = 600;

/// Deterministic user key `n`. Distinct from the issuer for every `n`.
pub fn user(n: u8) -> Keypair {
    let mut seed = [n; 32];
    seed[31] = 0xee;
    Keypair::from_seed(&seed)
}

/// A token chain with its issuer key.
#[derive(Debug, Clone)]
pub struct TokenFixture {
    pub token_id: String,
    pub issuer: Keypair,
    pub issuer_chain_id: ChainId,
    pub chain_id: ChainId,
}

impl TokenFixture {
    /// Token `token_id` issued by the default issuer.
    pub fn new(token_id: &str) -> Self {
        Self::with_issuer(token_id, Keypair::from_seed(&ISSUER_SEED), ISSUER_CHAIN_ID)
    }

    pub fn with_issuer(token_id: &str, issuer: Keypair, issuer_chain_id: ChainId) -> Self {
        Self {
            token_id: token_id.to_string(),
            chain_id: token_chain_id(token_id, &issuer_chain_id),
            issuer,
            issuer_chain_id,
        }
    }

    pub fn issuer_address(&self) -> Address {
        self.issuer.address()
    }

    /// Finish an entry builder at `height`.
    pub fn entry(&self, height: u64, builder: EntryBuilder) -> Entry {
        builder
            .height(height)
            .timestamp(height as i64 * BLOCK_SECONDS)
            .build()
            .expect("fixture entry")
    }

    /// A valid FAT-0 issuance with the given supply.
    pub fn issuance(&self, height: u64, supply: i64) -> Entry {
        self.entry(
            height,
            IssuanceBuilder::new(supply)
                .symbol(self.token_id.to_uppercase())
                .sign(self.chain_id, &self.issuer),
        )
    }

    /// An issuance signed by someone other than the issuer.
    pub fn forged_issuance(&self, height: u64, signer: &Keypair, supply: i64) -> Entry {
        self.entry(height, IssuanceBuilder::new(supply).sign(self.chain_id, signer))
    }

    /// A coinbase transaction minting `amount` to `to`.
    pub fn mint(&self, height: u64, to: Address, amount: u64) -> Entry {
        self.transaction(
            height,
            TransactionBuilder::new()
                .coinbase_input(&self.issuer, amount)
                .output(to, amount),
        )
    }

    /// A single-input transfer.
    pub fn transfer(&self, height: u64, from: &Keypair, to: Address, amount: u64) -> Entry {
        self.transaction(
            height,
            TransactionBuilder::new()
                .input(from, amount)
                .output(to, amount),
        )
    }

    /// Sign an arbitrary transaction for this chain.
    pub fn transaction(&self, height: u64, tx: TransactionBuilder) -> Entry {
        self.entry(height, tx.sign(self.chain_id))
    }

    /// An unsigned entry with arbitrary content.
    pub fn garbage(&self, height: u64, content: &[u8]) -> Entry {
        self.entry(height, EntryBuilder::new(self.chain_id).content(content.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatd_core::{validate_issuance, validate_transaction, ChainState};

    #[test]
    fn test_fixture_entries_validate() {
        let token = TokenFixture::new("test");
        let issuance = token.issuance(10, 1_000);
        assert_eq!(issuance.height, 10);
        assert_eq!(issuance.timestamp, 6_000);

        let mut state = ChainState::new(token.chain_id, token.issuer_address());
        let parsed = validate_issuance(&issuance, &token.issuer_address()).unwrap();
        state.apply_issuance(parsed).unwrap();

        let mint = token.mint(11, user(1).address(), 100);
        let tx = validate_transaction(&mint, &state).unwrap();
        state.apply_transaction(&tx).unwrap();

        let transfer = token.transfer(11, &user(1), user(2).address(), 40);
        assert!(validate_transaction(&transfer, &state).is_ok());

        assert!(validate_issuance(
            &token.forged_issuance(10, &user(3), 1_000),
            &token.issuer_address()
        )
        .is_err());
    }

    #[test]
    fn test_users_are_distinct() {
        let issuer = Keypair::from_seed(&ISSUER_SEED).address();
        let addresses: Vec<_> = (0..=255u8).map(|n| user(n).address()).collect();
        assert!(!addresses.contains(&issuer));
        assert_ne!(addresses[1], addresses[2]);
    }

    #[test]
    fn test_deterministic_hashes() {
        let a = TokenFixture::new("test").mint(5, user(1).address(), 7);
        let b = TokenFixture::new("test").mint(5, user(1).address(), 7);
        assert_eq!(a.hash, b.hash);
    }
}
