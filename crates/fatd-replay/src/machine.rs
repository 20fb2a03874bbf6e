//! Per-entry state machine.
//!
//! [`apply_entry`] folds one entry into a chain state according to the
//! chain's phase. It never fails: every entry ends as one
//! [`EntryOutcome`], and the state is left untouched unless the entry was
//! accepted.

use fatd_core::{
    validate_issuance, validate_transaction, ChainPhase, ChainState, Entry, EntryCursor,
    Transaction, ValidationError,
};

/// Why an entry was skipped before validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Malformed {
    /// The entry belongs to another chain.
    WrongChain,
    /// The entry claims a different block than the one being replayed.
    WrongHeight { expected: u64, actual: u64 },
    /// The entry's hash does not match its contents.
    HashMismatch,
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// The chain's issuance was established by this entry.
    IssuanceAccepted,
    /// A transaction was validated and applied.
    TransactionAccepted(Transaction),
    /// The entry failed validation.
    Rejected(ValidationError),
    /// The entry did not fit the block it came in.
    Malformed(Malformed),
}

impl EntryOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(
            self,
            EntryOutcome::IssuanceAccepted | EntryOutcome::TransactionAccepted(_)
        )
    }
}

/// Check that an entry belongs at `(state.chain_id, height)`.
pub fn check_entry(state: &ChainState, height: u64, entry: &Entry) -> Result<(), Malformed> {
    if entry.chain_id != state.chain_id {
        return Err(Malformed::WrongChain);
    }
    if entry.height != height {
        return Err(Malformed::WrongHeight {
            expected: height,
            actual: entry.height,
        });
    }
    if !entry.verify_hash() {
        return Err(Malformed::HashMismatch);
    }
    Ok(())
}

/// Fold one entry of block `height` into `state`.
///
/// The entry is recorded as the state's last processed entry whatever the
/// outcome, so a resumed replay knows where a partial block stopped.
pub fn apply_entry(state: &mut ChainState, height: u64, entry: &Entry) -> EntryOutcome {
    let outcome = classify(state, height, entry);
    state.last_entry = Some(EntryCursor {
        height,
        entry_hash: entry.hash,
    });
    outcome
}

fn classify(state: &mut ChainState, height: u64, entry: &Entry) -> EntryOutcome {
    if let Err(malformed) = check_entry(state, height, entry) {
        return EntryOutcome::Malformed(malformed);
    }

    match state.phase() {
        ChainPhase::Uninitialized | ChainPhase::AwaitingIssuance => {
            let issuance = match validate_issuance(entry, &state.issuer) {
                Ok(issuance) => issuance,
                Err(err) => return EntryOutcome::Rejected(err),
            };
            match state.apply_issuance(issuance) {
                Ok(()) => EntryOutcome::IssuanceAccepted,
                Err(err) => EntryOutcome::Rejected(err),
            }
        }
        ChainPhase::Active => {
            let tx = match validate_transaction(entry, state) {
                Ok(tx) => tx,
                Err(err) => return EntryOutcome::Rejected(err),
            };
            match state.apply_transaction(&tx) {
                Ok(()) => EntryOutcome::TransactionAccepted(tx),
                Err(err) => EntryOutcome::Rejected(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fatd_core::{
        ChainId, EntryBuilder, EntryHash, IssuanceBuilder, Keypair, Supply, TransactionBuilder,
    };

    fn issuer() -> Keypair {
        Keypair::from_seed(&[0x42; 32])
    }

    fn alice() -> Keypair {
        Keypair::from_seed(&[0x01; 32])
    }

    fn chain() -> ChainId {
        ChainId::from_bytes([0x77; 32])
    }

    fn issuance_entry(height: u64, supply: i64) -> Entry {
        IssuanceBuilder::new(supply)
            .symbol("TEST")
            .sign(chain(), &issuer())
            .height(height)
            .build()
            .unwrap()
    }

    fn mint_entry(height: u64, amount: u64) -> Entry {
        TransactionBuilder::new()
            .coinbase_input(&issuer(), amount)
            .output(alice().address(), amount)
            .sign(chain())
            .height(height)
            .build()
            .unwrap()
    }

    #[test]
    fn test_issuance_then_transactions() {
        let mut state = ChainState::new(chain(), issuer().address());

        // A transaction before the issuance is just an invalid issuance.
        let early = mint_entry(1, 10);
        assert!(matches!(
            apply_entry(&mut state, 1, &early),
            EntryOutcome::Rejected(_)
        ));
        assert_eq!(state.phase(), ChainPhase::AwaitingIssuance);
        assert_eq!(state.last_entry.unwrap().entry_hash, early.hash);

        let issuance = issuance_entry(1, 1000);
        assert_eq!(
            apply_entry(&mut state, 1, &issuance),
            EntryOutcome::IssuanceAccepted
        );
        assert_eq!(state.phase(), ChainPhase::Active);
        assert_eq!(
            state.issuance.as_ref().unwrap().supply,
            Supply::Limited(1000)
        );

        // A second issuance is read as a transaction and fails to decode.
        let again = issuance_entry(2, 5);
        assert!(matches!(
            apply_entry(&mut state, 2, &again),
            EntryOutcome::Rejected(ValidationError::UnrecognizedField { .. })
        ));
        assert_eq!(
            state.issuance.as_ref().unwrap().supply,
            Supply::Limited(1000)
        );

        let mint = mint_entry(2, 700);
        match apply_entry(&mut state, 2, &mint) {
            EntryOutcome::TransactionAccepted(tx) => assert_eq!(tx.entry_hash, mint.hash),
            other => panic!("expected acceptance, got {:?}", other),
        }
        assert_eq!(state.balance(&alice().address()), 700);
    }

    #[test]
    fn test_rejection_leaves_balances() {
        let mut state = ChainState::new(chain(), issuer().address());
        apply_entry(&mut state, 1, &issuance_entry(1, 100));

        let before = state.clone();
        let over = mint_entry(1, 101);
        assert!(matches!(
            apply_entry(&mut state, 1, &over),
            EntryOutcome::Rejected(ValidationError::SupplyExceeded { .. })
        ));

        assert_eq!(state.balances(), before.balances());
        assert_eq!(state.issued, before.issued);
        assert_eq!(state.transaction_count, before.transaction_count);
    }

    #[test]
    fn test_malformed_entries() {
        let mut state = ChainState::new(chain(), issuer().address());

        let other_chain = EntryBuilder::new(ChainId::from_bytes([0x99; 32]))
            .height(1)
            .build()
            .unwrap();
        assert_eq!(
            apply_entry(&mut state, 1, &other_chain),
            EntryOutcome::Malformed(Malformed::WrongChain)
        );

        let wrong_height = issuance_entry(2, 10);
        assert_eq!(
            apply_entry(&mut state, 1, &wrong_height),
            EntryOutcome::Malformed(Malformed::WrongHeight {
                expected: 1,
                actual: 2
            })
        );

        let mut tampered = issuance_entry(1, 10);
        tampered.hash = EntryHash::from_bytes([0xab; 32]);
        assert_eq!(
            apply_entry(&mut state, 1, &tampered),
            EntryOutcome::Malformed(Malformed::HashMismatch)
        );

        assert_eq!(state.phase(), ChainPhase::AwaitingIssuance);
        assert!(state.issuance.is_none());
    }
}
