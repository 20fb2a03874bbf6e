//! Fixed-width identifiers.
//!
//! Every 32-byte value the ledger handles gets its own type so a chain ID can
//! never be passed where an address is expected. All of them travel as
//! lowercase hex, in serde output and inside transaction content alike.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

macro_rules! bytes32_newtype {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const ZERO: Self = Self([0u8; 32]);

            pub const fn from_bytes(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub const fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Exactly 64 hex digits, either case.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let mut out = [0u8; 32];
                hex::decode_to_slice(s, &mut out)?;
                Ok(Self(out))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), &self.to_hex()[..16])
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<&[u8]> for $name {
            type Error = std::array::TryFromSliceError;

            fn try_from(slice: &[u8]) -> Result<Self, Self::Error> {
                let arr: [u8; 32] = slice.try_into()?;
                Ok(Self(arr))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }
    };
}

bytes32_newtype!(
    /// A 32-byte Factom chain identifier.
    ///
    /// Token chains derive theirs from name IDs, see [`crate::chain`].
    ChainId,
    "ChainId"
);

bytes32_newtype!(
    /// A 32-byte entry hash, assigned by the entry source.
    EntryHash,
    "EntryHash"
);

bytes32_newtype!(
    /// A 32-byte address: the sha256d hash of an RCD.
    Address,
    "Address"
);

bytes32_newtype!(
    /// Blake3 fingerprint of a canonically encoded [`crate::ChainState`].
    ///
    /// Local only; two replays of the same entries agree on it.
    StateHash,
    "StateHash"
);

impl Address {
    /// The coinbase address. Spending from it mints new tokens.
    pub const COINBASE: Self = Self::ZERO;

    /// Check whether this is the coinbase address.
    pub fn is_coinbase(&self) -> bool {
        *self == Self::COINBASE
    }
}
