//! Shared validation helpers: RCD/signature pairs, addresses, signatures.

use crate::crypto::{sha256d, Ed25519Signature, Rcd, RCD_SIZE, RCD_TYPE, SIGNATURE_SIZE};
use crate::entry::Entry;
use crate::error::ValidationError;
use crate::types::{Address, ChainId};

/// An RCD and signature pair taken from two external IDs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedExtIds {
    pub rcd: Rcd,
    pub signature: Ed25519Signature,
}

impl ParsedExtIds {
    /// Check sizes and type tag of a raw pair.
    ///
    /// Checked in order: RCD size, signature size, RCD type.
    pub fn parse(rcd: &[u8], signature: &[u8]) -> Result<Self, ValidationError> {
        let rcd: [u8; RCD_SIZE] = rcd.try_into().map_err(|_| ValidationError::InvalidRcdSize {
            expected: RCD_SIZE,
            actual: rcd.len(),
        })?;

        let signature: [u8; SIGNATURE_SIZE] =
            signature
                .try_into()
                .map_err(|_| ValidationError::InvalidSignatureSize {
                    expected: SIGNATURE_SIZE,
                    actual: signature.len(),
                })?;

        if rcd[0] != RCD_TYPE {
            return Err(ValidationError::InvalidRcdType(rcd[0]));
        }

        Ok(Self {
            rcd: Rcd::from_bytes(rcd),
            signature: Ed25519Signature::from_bytes(signature),
        })
    }

    /// The address the RCD controls.
    pub fn address(&self) -> Address {
        self.rcd.address()
    }
}

/// sha256d of raw RCD bytes.
pub fn derive_address(rcd: &[u8]) -> Address {
    Address(sha256d(rcd))
}

/// The message an entry signature covers: `chain_id || content`.
///
/// Binding the chain id keeps a signature from being replayed on another
/// chain with the same content.
pub fn signed_message(chain_id: &ChainId, content: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + content.len());
    buf.extend_from_slice(chain_id.as_bytes());
    buf.extend_from_slice(content);
    buf
}

/// Verify `signature` over the entry's chain id and content with the RCD key.
///
/// False on any failure, including keys that are not valid curve points.
pub fn verify_signature(entry: &Entry, rcd: &Rcd, signature: &Ed25519Signature) -> bool {
    let message = signed_message(&entry.chain_id, &entry.content);
    rcd.public_key().verify(&message, signature).is_ok()
}
