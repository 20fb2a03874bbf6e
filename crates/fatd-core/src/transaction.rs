//! Transaction: a balance-moving record on an active token chain.
//!
//! Input `i` is authorized by the RCD and signature at external IDs `2i` and
//! `2i + 1`. External IDs past the last pair are ignored.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::content::{ContentObject, RawMetadata};
use crate::crypto::Keypair;
use crate::entry::{Entry, EntryBuilder};
use crate::error::ValidationError;
use crate::state::ChainState;
use crate::types::{Address, ChainId, EntryHash};
use crate::validation::{signed_message, verify_signature, ParsedExtIds};

/// Top-level fields a transaction may carry.
const TRANSACTION_FIELDS: &[&str] = &["inputs", "outputs", "metadata"];

/// An address and an amount, as listed in transaction content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AddressAmount {
    pub address: Address,
    pub amount: u64,
}

impl AddressAmount {
    pub fn new(address: Address, amount: u64) -> Self {
        Self { address, amount }
    }
}

/// Transaction content as decoded, before protocol rules are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionFields {
    pub inputs: Vec<AddressAmount>,
    pub outputs: Vec<AddressAmount>,
    pub metadata: Option<RawMetadata>,
}

/// An accepted transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The entry carrying the transaction.
    pub entry_hash: EntryHash,

    /// Block height of that entry.
    pub height: u64,

    /// Block timestamp of that entry.
    pub timestamp: i64,

    pub inputs: Vec<AddressAmount>,
    pub outputs: Vec<AddressAmount>,
    pub metadata: Option<RawMetadata>,
}

impl Transaction {
    /// A coinbase transaction mints new tokens.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].address.is_coinbase()
    }

    /// Total amount moved. Inputs and outputs are equal once validated.
    pub fn amount(&self) -> u64 {
        self.outputs.iter().map(|o| o.amount).sum()
    }

    /// Check whether an address appears as an input or output.
    pub fn involves(&self, address: &Address) -> bool {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .any(|io| io.address == *address)
    }

    /// Every distinct address the transaction touches, in order.
    pub fn addresses(&self) -> BTreeSet<Address> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .map(|io| io.address)
            .collect()
    }
}

/// Decode transaction content against its schema.
pub fn decode_transaction_content(content: &[u8]) -> Result<TransactionFields, ValidationError> {
    let obj = ContentObject::parse(content, TRANSACTION_FIELDS)?;

    Ok(TransactionFields {
        inputs: obj.required("inputs", "array of {address, amount}")?,
        outputs: obj.required("outputs", "array of {address, amount}")?,
        metadata: obj.raw("metadata"),
    })
}

/// Fully validate a transaction entry against the current chain state.
///
/// Checks run cheapest first: content, external IDs, amounts, coinbase
/// rules, address binding, balances, then signatures.
pub fn validate_transaction(
    entry: &Entry,
    state: &ChainState,
) -> Result<Transaction, ValidationError> {
    let issuance = state
        .issuance
        .as_ref()
        .ok_or(ValidationError::IssuanceNotEstablished)?;

    let fields = decode_transaction_content(&entry.content)?;

    // 1. One RCD/signature pair per input, and never fewer than one pair
    let required = fields.inputs.len() * 2;
    if entry.ext_ids.len() < required.max(2) {
        return Err(ValidationError::InsufficientExtIds {
            required: required.max(2),
            actual: entry.ext_ids.len(),
        });
    }
    let pairs = entry.ext_ids[..required]
        .chunks_exact(2)
        .map(|pair| ParsedExtIds::parse(&pair[0], &pair[1]))
        .collect::<Result<Vec<_>, _>>()?;

    // 2. Amounts
    if fields.inputs.is_empty() {
        return Err(ValidationError::EmptyInputs);
    }
    if fields.outputs.is_empty() {
        return Err(ValidationError::EmptyOutputs);
    }
    if let Some(zero) = fields
        .inputs
        .iter()
        .chain(fields.outputs.iter())
        .find(|io| io.amount == 0)
    {
        return Err(ValidationError::ZeroAmount {
            address: zero.address,
        });
    }
    check_unique(&fields.inputs, |address| ValidationError::DuplicateInput { address })?;
    check_unique(&fields.outputs, |address| ValidationError::DuplicateOutput { address })?;

    let inputs_total = checked_total(&fields.inputs)?;
    let outputs_total = checked_total(&fields.outputs)?;
    if inputs_total != outputs_total {
        return Err(ValidationError::Unbalanced {
            inputs: inputs_total,
            outputs: outputs_total,
        });
    }

    // 3. Coinbase
    if fields.outputs.iter().any(|o| o.address.is_coinbase()) {
        return Err(ValidationError::CoinbaseOutput);
    }
    let coinbase = fields.inputs.iter().any(|i| i.address.is_coinbase());
    if coinbase {
        if fields.inputs.len() != 1 {
            return Err(ValidationError::CoinbaseWithOtherInputs);
        }
        if pairs[0].address() != state.issuer {
            return Err(ValidationError::InvalidCoinbaseRcd);
        }
        if let Some(remaining) = issuance.supply.remaining(state.issued) {
            if inputs_total > remaining {
                return Err(ValidationError::SupplyExceeded {
                    requested: inputs_total,
                    remaining,
                });
            }
        }
    }

    // 4. Each pair must control its input
    if !coinbase {
        for (index, (input, pair)) in fields.inputs.iter().zip(&pairs).enumerate() {
            if pair.address() != input.address {
                return Err(ValidationError::InputAddressMismatch { index });
            }
        }

        // 5. Balances
        for input in &fields.inputs {
            let balance = state.balance(&input.address);
            if input.amount > balance {
                return Err(ValidationError::InsufficientBalance {
                    address: input.address,
                    balance,
                    amount: input.amount,
                });
            }
        }
    }

    // 6. Signatures
    for pair in &pairs {
        if !verify_signature(entry, &pair.rcd, &pair.signature) {
            return Err(ValidationError::InvalidSignature);
        }
    }

    Ok(Transaction {
        entry_hash: entry.hash,
        height: entry.height,
        timestamp: entry.timestamp,
        inputs: fields.inputs,
        outputs: fields.outputs,
        metadata: fields.metadata,
    })
}

fn check_unique(
    items: &[AddressAmount],
    err: impl Fn(Address) -> ValidationError,
) -> Result<(), ValidationError> {
    let mut seen = BTreeSet::new();
    for item in items {
        if !seen.insert(item.address) {
            return Err(err(item.address));
        }
    }
    Ok(())
}

fn checked_total(items: &[AddressAmount]) -> Result<u64, ValidationError> {
    items.iter().try_fold(0u64, |acc, item| {
        acc.checked_add(item.amount)
            .ok_or(ValidationError::AmountOverflow)
    })
}

#[derive(Serialize)]
struct TransactionContent<'a> {
    inputs: &'a [AddressAmount],
    outputs: &'a [AddressAmount],
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a serde_json::Value>,
}

/// Builder for signed transaction entries.
#[derive(Debug, Clone, Default)]
pub struct TransactionBuilder {
    inputs: Vec<AddressAmount>,
    signers: Vec<Keypair>,
    outputs: Vec<AddressAmount>,
    metadata: Option<serde_json::Value>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spend `amount` from the address `keypair` controls.
    pub fn input(self, keypair: &Keypair, amount: u64) -> Self {
        let address = keypair.address();
        self.input_from(address, keypair, amount)
    }

    /// Mint `amount`, signed by the issuer's key.
    pub fn coinbase_input(self, issuer: &Keypair, amount: u64) -> Self {
        self.input_from(Address::COINBASE, issuer, amount)
    }

    /// Spend from `address`, signing with `keypair` whether or not it
    /// controls the address.
    pub fn input_from(mut self, address: Address, keypair: &Keypair, amount: u64) -> Self {
        self.inputs.push(AddressAmount::new(address, amount));
        self.signers.push(keypair.clone());
        self
    }

    /// Pay `amount` to `address`.
    pub fn output(mut self, address: Address, amount: u64) -> Self {
        self.outputs.push(AddressAmount::new(address, amount));
        self
    }

    /// Attach metadata.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The JSON content bytes.
    pub fn content(&self) -> Vec<u8> {
        let content = TransactionContent {
            inputs: &self.inputs,
            outputs: &self.outputs,
            metadata: self.metadata.as_ref(),
        };
        serde_json::to_vec(&content).unwrap_or_default()
    }

    /// Sign for `chain_id`, giving an entry ready to be placed at a height.
    pub fn sign(self, chain_id: ChainId) -> EntryBuilder {
        let content = self.content();
        let message = signed_message(&chain_id, &content);

        let mut builder = EntryBuilder::new(chain_id);
        for signer in &self.signers {
            builder = builder
                .ext_id(signer.rcd().as_bytes().to_vec())
                .ext_id(signer.sign(&message).as_bytes().to_vec());
        }
        builder.content(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::issuance::{Issuance, Supply, TokenType};
    use bytes::Bytes;

    fn issuer() -> Keypair {
        Keypair::from_seed(&[0x42; 32])
    }

    fn alice() -> Keypair {
        Keypair::from_seed(&[0x01; 32])
    }

    fn bob() -> Keypair {
        Keypair::from_seed(&[0x02; 32])
    }

    fn chain() -> ChainId {
        ChainId::from_bytes([0x77; 32])
    }

    fn active_state(supply: Supply) -> ChainState {
        let mut state = ChainState::new(chain(), issuer().address());
        state
            .apply_issuance(Issuance {
                token_type: TokenType::Fat0,
                symbol: None,
                name: None,
                supply,
                metadata: None,
                entry_hash: EntryHash::from_bytes([1; 32]),
                timestamp: 0,
            })
            .unwrap();
        state
    }

    fn funded(balance: u64) -> ChainState {
        let mut state = active_state(Supply::Unlimited);
        let mint = TransactionBuilder::new()
            .coinbase_input(&issuer(), balance)
            .output(alice().address(), balance)
            .sign(chain())
            .build()
            .unwrap();
        let tx = validate_transaction(&mint, &state).unwrap();
        state.apply_transaction(&tx).unwrap();
        state
    }

    fn transfer(from: &Keypair, to: Address, amount: u64) -> Entry {
        TransactionBuilder::new()
            .input(from, amount)
            .output(to, amount)
            .sign(chain())
            .build()
            .unwrap()
    }

    #[test]
    fn test_requires_issuance() {
        let state = ChainState::new(chain(), issuer().address());
        let entry = transfer(&alice(), bob().address(), 1);
        assert_eq!(
            validate_transaction(&entry, &state),
            Err(ValidationError::IssuanceNotEstablished)
        );
    }

    #[test]
    fn test_valid_transfer() {
        let state = funded(1000);
        let entry = transfer(&alice(), bob().address(), 100);
        let tx = validate_transaction(&entry, &state).unwrap();
        assert_eq!(tx.entry_hash, entry.hash);
        assert_eq!(tx.amount(), 100);
        assert!(!tx.is_coinbase());
        assert!(tx.involves(&bob().address()));
    }

    #[test]
    fn test_insufficient_balance() {
        let state = funded(400);
        let entry = transfer(&alice(), bob().address(), 500);
        assert_eq!(
            validate_transaction(&entry, &state),
            Err(ValidationError::InsufficientBalance {
                address: alice().address(),
                balance: 400,
                amount: 500
            })
        );
    }

    #[test]
    fn test_unbalanced() {
        let state = funded(1000);
        let entry = TransactionBuilder::new()
            .input(&alice(), 100)
            .output(bob().address(), 90)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&entry, &state),
            Err(ValidationError::Unbalanced {
                inputs: 100,
                outputs: 90
            })
        );
    }

    #[test]
    fn test_overflow_is_rejected() {
        let state = funded(1000);
        let entry = TransactionBuilder::new()
            .input(&alice(), 10)
            .output(bob().address(), u64::MAX)
            .output(issuer().address(), 2)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&entry, &state),
            Err(ValidationError::AmountOverflow)
        );
    }

    #[test]
    fn test_empty_and_zero() {
        let state = funded(1000);
        let no_outputs = TransactionBuilder::new()
            .input(&alice(), 10)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&no_outputs, &state),
            Err(ValidationError::EmptyOutputs)
        );

        // A full pair is present, so the empty input list is what fails.
        let mut no_inputs = TransactionBuilder::new()
            .output(bob().address(), 10)
            .sign(chain())
            .build()
            .unwrap();
        no_inputs.ext_ids = alice_pair();
        assert_eq!(
            validate_transaction(&no_inputs, &state),
            Err(ValidationError::EmptyInputs)
        );

        let zero = transfer(&alice(), bob().address(), 0);
        assert_eq!(
            validate_transaction(&zero, &state),
            Err(ValidationError::ZeroAmount {
                address: alice().address()
            })
        );
    }

    #[test]
    fn test_duplicates() {
        let state = funded(1000);
        let dup_out = TransactionBuilder::new()
            .input(&alice(), 10)
            .output(bob().address(), 5)
            .output(bob().address(), 5)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&dup_out, &state),
            Err(ValidationError::DuplicateOutput {
                address: bob().address()
            })
        );

        let dup_in = TransactionBuilder::new()
            .input(&alice(), 5)
            .input(&alice(), 5)
            .output(bob().address(), 10)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&dup_in, &state),
            Err(ValidationError::DuplicateInput {
                address: alice().address()
            })
        );
    }

    #[test]
    fn test_positional_matching() {
        let mut state = funded(1000);
        // Give bob funds too.
        let tx = validate_transaction(&transfer(&alice(), bob().address(), 300), &state).unwrap();
        state.apply_transaction(&tx).unwrap();

        let two_inputs = TransactionBuilder::new()
            .input(&alice(), 10)
            .input(&bob(), 20)
            .output(issuer().address(), 30)
            .sign(chain())
            .build()
            .unwrap();
        assert!(validate_transaction(&two_inputs, &state).is_ok());

        // Same pairs, swapped order: pair 0 no longer controls input 0.
        let mut swapped = two_inputs.clone();
        swapped.ext_ids.swap(0, 2);
        swapped.ext_ids.swap(1, 3);
        assert_eq!(
            validate_transaction(&swapped, &state),
            Err(ValidationError::InputAddressMismatch { index: 0 })
        );

        // Key that does not control the address.
        let wrong_key = TransactionBuilder::new()
            .input_from(alice().address(), &bob(), 10)
            .output(issuer().address(), 10)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&wrong_key, &state),
            Err(ValidationError::InputAddressMismatch { index: 0 })
        );
    }

    #[test]
    fn test_missing_pair() {
        let state = funded(1000);
        let mut entry = transfer(&alice(), bob().address(), 10);
        entry.ext_ids.truncate(1);
        assert_eq!(
            validate_transaction(&entry, &state),
            Err(ValidationError::InsufficientExtIds {
                required: 2,
                actual: 1
            })
        );
    }

    fn alice_pair() -> Vec<Bytes> {
        let signer = alice();
        vec![
            Bytes::copy_from_slice(signer.rcd().as_bytes()),
            Bytes::copy_from_slice(signer.sign(b"unused").as_bytes()),
        ]
    }

    #[test]
    fn test_under_two_ext_ids_is_structural_even_without_inputs() {
        let state = funded(1000);
        for kept in 0..2 {
            let mut entry = TransactionBuilder::new()
                .output(bob().address(), 10)
                .sign(chain())
                .build()
                .unwrap();
            entry.ext_ids = alice_pair();
            entry.ext_ids.truncate(kept);

            let err = validate_transaction(&entry, &state).unwrap_err();
            assert_eq!(
                err,
                ValidationError::InsufficientExtIds {
                    required: 2,
                    actual: kept
                }
            );
            assert_eq!(err.class(), crate::error::ErrorClass::Structural);
        }
    }

    #[test]
    fn test_trailing_ext_ids_ignored() {
        let state = funded(1000);
        let mut entry = transfer(&alice(), bob().address(), 10);
        entry.ext_ids.push(Bytes::from_static(b"memo"));
        assert!(validate_transaction(&entry, &state).is_ok());
    }

    #[test]
    fn test_bad_signature() {
        let state = funded(1000);
        let mut entry = transfer(&alice(), bob().address(), 10);
        let mut sig = entry.ext_ids[1].to_vec();
        sig[10] ^= 0xff;
        entry.ext_ids[1] = sig.into();
        assert_eq!(
            validate_transaction(&entry, &state),
            Err(ValidationError::InvalidSignature)
        );
    }

    #[test]
    fn test_signature_domain_separated() {
        let state = funded(1000);
        // Signed for another chain, replayed here.
        let mut entry = TransactionBuilder::new()
            .input(&alice(), 10)
            .output(bob().address(), 10)
            .sign(ChainId::from_bytes([0x99; 32]))
            .build()
            .unwrap();
        entry.chain_id = chain();
        assert_eq!(
            validate_transaction(&entry, &state),
            Err(ValidationError::InvalidSignature)
        );
    }

    #[test]
    fn test_coinbase_rules() {
        let state = active_state(Supply::Limited(100));

        let not_issuer = TransactionBuilder::new()
            .coinbase_input(&alice(), 10)
            .output(alice().address(), 10)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&not_issuer, &state),
            Err(ValidationError::InvalidCoinbaseRcd)
        );

        let over_supply = TransactionBuilder::new()
            .coinbase_input(&issuer(), 101)
            .output(alice().address(), 101)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&over_supply, &state),
            Err(ValidationError::SupplyExceeded {
                requested: 101,
                remaining: 100
            })
        );

        let mixed = TransactionBuilder::new()
            .coinbase_input(&issuer(), 10)
            .input(&alice(), 10)
            .output(bob().address(), 20)
            .sign(chain())
            .build()
            .unwrap();
        assert_eq!(
            validate_transaction(&mixed, &state),
            Err(ValidationError::CoinbaseWithOtherInputs)
        );

        let to_coinbase = transfer(&issuer(), Address::COINBASE, 10);
        assert_eq!(
            validate_transaction(&to_coinbase, &state),
            Err(ValidationError::CoinbaseOutput)
        );
    }

    #[test]
    fn test_decode_rejects_unknown_item_field() {
        let content = format!(
            r#"{{"inputs":[{{"address":"{}","amount":1,"memo":"x"}}],"outputs":[]}}"#,
            alice().address()
        );
        assert!(matches!(
            decode_transaction_content(content.as_bytes()),
            Err(ValidationError::InvalidFieldType { field: "inputs", .. })
        ));
    }

    #[test]
    fn test_decode_rejects_negative_amount() {
        let content = format!(
            r#"{{"inputs":[{{"address":"{}","amount":-1}}],"outputs":[]}}"#,
            alice().address()
        );
        assert!(matches!(
            decode_transaction_content(content.as_bytes()),
            Err(ValidationError::InvalidFieldType { field: "inputs", .. })
        ));
    }
}
