//! Key material and hash constructions used by FAT-0.
//!
//! Factom addresses are the double SHA-256 of a Redeem Condition Datum, and
//! every signature in a token entry is Ed25519. Blake3 only fingerprints
//! local ledger state (see [`crate::state::ChainState::state_hash`]).

use ed25519_dalek::{Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::CoreError;
use crate::types::{Address, ChainId, StateHash};

/// Type tag of an RCD holding one Ed25519 key.
pub const RCD_TYPE: u8 = 0x01;

pub const PUBLIC_KEY_SIZE: usize = 32;

/// Tag byte plus key.
pub const RCD_SIZE: usize = 1 + PUBLIC_KEY_SIZE;

pub const SIGNATURE_SIZE: usize = 64;

pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// `sha256(sha256(data))`, the address construction.
pub fn sha256d(data: &[u8]) -> [u8; 32] {
    sha256(&sha256(data))
}

/// Fingerprint bytes of local state.
pub fn blake3_fingerprint(data: &[u8]) -> StateHash {
    StateHash(*blake3::hash(data).as_bytes())
}

/// Public half of an RCD. Not checked to be a curve point until it verifies
/// something.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ed25519PublicKey([u8; PUBLIC_KEY_SIZE]);

impl Ed25519PublicKey {
    pub const fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Check `signature` over `message`.
    ///
    /// Key bytes that do not decode to a point yield `InvalidPublicKey`;
    /// anything else that fails yields `InvalidSignature`.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        key.verify(message, &ed25519_dalek::Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

impl fmt::Debug for Ed25519PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PublicKey")
            .field(&format_args!("{}", &self.to_hex()[..16]))
            .finish()
    }
}

/// Raw signature bytes as carried in an entry's external IDs.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Ed25519Signature([u8; SIGNATURE_SIZE]);

impl Ed25519Signature {
    pub const fn from_bytes(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }
}

impl fmt::Debug for Ed25519Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Signature")
            .field(&format_args!("{}..", hex::encode(&self.0[..8])))
            .finish()
    }
}

/// Redeem Condition Datum: `RCD_TYPE || public key`.
///
/// Hashing the whole datum with [`sha256d`] gives the [`Address`] it
/// controls, so the tag byte is part of the address preimage.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rcd([u8; RCD_SIZE]);

impl Rcd {
    pub fn from_public_key(public_key: &Ed25519PublicKey) -> Self {
        let mut bytes = [RCD_TYPE; RCD_SIZE];
        bytes[1..].copy_from_slice(public_key.as_bytes());
        Self(bytes)
    }

    /// Tag byte is taken as given; callers check [`Rcd::rcd_type`].
    pub const fn from_bytes(bytes: [u8; RCD_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn as_bytes(&self) -> &[u8; RCD_SIZE] {
        &self.0
    }

    pub fn rcd_type(&self) -> u8 {
        self.0[0]
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        let mut key = [0u8; PUBLIC_KEY_SIZE];
        key.copy_from_slice(&self.0[1..]);
        Ed25519PublicKey(key)
    }

    pub fn address(&self) -> Address {
        Address(sha256d(&self.0))
    }
}

impl fmt::Debug for Rcd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rcd{}({:?})", self.rcd_type(), self.public_key())
    }
}

impl AsRef<[u8]> for Rcd {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// An Ed25519 secret key that controls one FAT address.
#[derive(Clone)]
pub struct Keypair {
    secret: SigningKey,
}

impl Keypair {
    /// Fresh key from the thread RNG.
    pub fn generate() -> Self {
        Self {
            secret: SigningKey::generate(&mut rand::thread_rng()),
        }
    }

    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            secret: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.secret.verifying_key().to_bytes())
    }

    pub fn rcd(&self) -> Rcd {
        Rcd::from_public_key(&self.public_key())
    }

    pub fn address(&self) -> Address {
        self.rcd().address()
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.secret.sign(message).to_bytes())
    }

    /// Signature over `chain_id || content`, the form issuance entries carry.
    pub fn sign_content(&self, chain_id: &ChainId, content: &[u8]) -> Ed25519Signature {
        self.sign(&crate::validation::signed_message(chain_id, content))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Keypair({})", self.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_binds_chain_and_content() {
        let key = Keypair::from_seed(&[0x07; 32]);
        let chain = ChainId::from_bytes([0x33; 32]);
        let content = br#"{"type":"FAT-0","supply":-1}"#;
        let signature = key.sign_content(&chain, content);

        let message = crate::validation::signed_message(&chain, content);
        assert!(key.public_key().verify(&message, &signature).is_ok());

        let other_chain =
            crate::validation::signed_message(&ChainId::from_bytes([0x34; 32]), content);
        assert!(matches!(
            key.public_key().verify(&other_chain, &signature),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_random_keys_control_distinct_addresses() {
        let (a, b) = (Keypair::generate(), Keypair::generate());
        assert_ne!(a.address(), b.address());
        assert!(b.public_key().verify(b"m", &a.sign(b"m")).is_err());
    }

    #[test]
    fn test_rcd_is_tag_then_key() {
        let key = Keypair::from_seed(&[0x42; 32]);
        let rcd = key.rcd();
        assert_eq!(rcd.as_bytes()[0], RCD_TYPE);
        assert_eq!(&rcd.as_bytes()[1..], key.public_key().as_bytes());
        assert_eq!(Rcd::from_bytes(*rcd.as_bytes()).public_key(), key.public_key());
    }

    #[test]
    fn test_known_addresses() {
        let kp = Keypair::from_seed(&[0x42; 32]);
        assert_eq!(
            kp.public_key().to_hex(),
            "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12"
        );
        assert_eq!(
            kp.address().to_hex(),
            "65d0b6e430b31a73f32803e694be39977a41bae9e13316b58bbe5b64a95de39e"
        );
        assert_eq!(
            Keypair::from_seed(&[0x01; 32]).address().to_hex(),
            "d6ef0d0edbfcba01000afa5de08c92dc809b488499abbf1700a865362003ddb6"
        );
    }

    #[test]
    fn test_off_curve_key_is_invalid_public_key() {
        // y = 2 has no matching x
        let mut bytes = [0u8; 32];
        bytes[0] = 2;
        let result = Ed25519PublicKey::from_bytes(bytes)
            .verify(b"msg", &Ed25519Signature::from_bytes([0u8; 64]));
        assert!(matches!(result, Err(CoreError::InvalidPublicKey)));
    }

    #[test]
    fn test_address_uses_double_sha256() {
        let rcd = Keypair::from_seed(&[0x09; 32]).rcd();
        assert_eq!(rcd.address().0, sha256(&sha256(rcd.as_bytes())));
        assert_ne!(rcd.address().0, sha256(rcd.as_bytes()));
    }

    #[test]
    fn test_fingerprint_is_blake3() {
        assert_eq!(
            blake3_fingerprint(b"").to_hex(),
            "af1349b9f5f9a1a6a0404dea36dcc9499bcb25c9adc112b7cc9a93cae41f3262"
        );
    }
}
