//! Issuance: the single token-definition record of a chain.
//!
//! The first entry on a token chain that passes [`validate_issuance`] defines
//! the token. It is never replaced.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::content::{ContentObject, RawMetadata};
use crate::crypto::Keypair;
use crate::entry::{Entry, EntryBuilder};
use crate::error::ValidationError;
use crate::types::{Address, ChainId, EntryHash};
use crate::validation::{signed_message, verify_signature, ParsedExtIds};

/// Top-level fields an issuance may carry.
const ISSUANCE_FIELDS: &[&str] = &["type", "symbol", "supply", "name", "metadata"];

/// The token protocol a chain follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TokenType {
    #[serde(rename = "FAT-0")]
    Fat0,
}

impl TokenType {
    /// The name used in issuance content.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Fat0 => "FAT-0",
        }
    }

    /// Parse the name used in issuance content.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FAT-0" => Some(Self::Fat0),
            _ => None,
        }
    }
}

impl fmt::Display for TokenType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Maximum number of tokens a chain may ever mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Supply {
    /// A fixed cap.
    Limited(u64),
    /// No cap.
    Unlimited,
}

impl Supply {
    /// The `supply` value that declares an unlimited token.
    pub const UNLIMITED: i64 = -1;

    /// Interpret a declared supply.
    ///
    /// Positive values are caps, `-1` is unlimited, anything else is invalid.
    pub fn from_declared(supply: i64) -> Result<Self, ValidationError> {
        match supply {
            Self::UNLIMITED => Ok(Self::Unlimited),
            n if n > 0 => Ok(Self::Limited(n as u64)),
            n => Err(ValidationError::InvalidSupply(n)),
        }
    }

    /// The value as written in issuance content.
    pub fn declared(self) -> i64 {
        match self {
            // Caps come from a positive i64 and always fit.
            Self::Limited(cap) => cap as i64,
            Self::Unlimited => Self::UNLIMITED,
        }
    }

    /// How many more tokens may be minted after `issued`.
    ///
    /// `None` means unlimited.
    pub fn remaining(self, issued: u64) -> Option<u64> {
        match self {
            Self::Limited(cap) => Some(cap.saturating_sub(issued)),
            Self::Unlimited => None,
        }
    }
}

/// Issuance content as decoded, before protocol rules are applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuanceFields {
    pub token_type: String,
    pub symbol: Option<String>,
    pub supply: i64,
    pub name: Option<String>,
    pub metadata: Option<RawMetadata>,
}

/// A validated issuance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issuance {
    pub token_type: TokenType,
    pub symbol: Option<String>,
    pub name: Option<String>,
    pub supply: Supply,
    pub metadata: Option<RawMetadata>,

    /// The entry that established the issuance.
    pub entry_hash: EntryHash,

    /// Block timestamp of that entry.
    pub timestamp: i64,
}

/// Check an issuance entry's external IDs.
///
/// Needs at least an RCD and a signature; extra external IDs are ignored.
pub fn validate_issuance_structure(entry: &Entry) -> Result<ParsedExtIds, ValidationError> {
    if entry.ext_ids.len() < 2 {
        return Err(ValidationError::InsufficientExtIds {
            required: 2,
            actual: entry.ext_ids.len(),
        });
    }
    ParsedExtIds::parse(&entry.ext_ids[0], &entry.ext_ids[1])
}

/// Decode issuance content against its schema.
pub fn decode_issuance_content(content: &[u8]) -> Result<IssuanceFields, ValidationError> {
    let obj = ContentObject::parse(content, ISSUANCE_FIELDS)?;

    Ok(IssuanceFields {
        token_type: obj.required("type", "string")?,
        symbol: obj.optional("symbol", "string")?,
        supply: obj.required("supply", "integer")?,
        name: obj.optional("name", "string")?,
        metadata: obj.raw("metadata"),
    })
}

/// Apply the protocol rules to decoded issuance fields.
pub fn validate_issuance_data(
    fields: &IssuanceFields,
) -> Result<(TokenType, Supply), ValidationError> {
    let token_type = TokenType::from_name(&fields.token_type)
        .ok_or_else(|| ValidationError::InvalidTokenType(fields.token_type.clone()))?;
    let supply = Supply::from_declared(fields.supply)?;
    Ok((token_type, supply))
}

/// Fully validate an issuance entry signed by `expected_address`.
///
/// Runs structure, address, content and data checks before the signature.
pub fn validate_issuance(
    entry: &Entry,
    expected_address: &Address,
) -> Result<Issuance, ValidationError> {
    let pair = validate_issuance_structure(entry)?;

    if pair.address() != *expected_address {
        return Err(ValidationError::InvalidRcd);
    }

    let fields = decode_issuance_content(&entry.content)?;
    let (token_type, supply) = validate_issuance_data(&fields)?;

    if !verify_signature(entry, &pair.rcd, &pair.signature) {
        return Err(ValidationError::InvalidSignature);
    }

    Ok(Issuance {
        token_type,
        symbol: fields.symbol,
        name: fields.name,
        supply,
        metadata: fields.metadata,
        entry_hash: entry.hash,
        timestamp: entry.timestamp,
    })
}

#[derive(Serialize)]
struct IssuanceContent<'a> {
    #[serde(rename = "type")]
    token_type: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    symbol: Option<&'a str>,
    supply: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    metadata: Option<&'a serde_json::Value>,
}

/// Builder for signed issuance entries.
#[derive(Debug, Clone)]
pub struct IssuanceBuilder {
    token_type: String,
    symbol: Option<String>,
    supply: i64,
    name: Option<String>,
    metadata: Option<serde_json::Value>,
}

impl IssuanceBuilder {
    /// Start a FAT-0 issuance with the given declared supply.
    pub fn new(supply: i64) -> Self {
        Self {
            token_type: TokenType::Fat0.as_str().to_string(),
            symbol: None,
            supply,
            name: None,
            metadata: None,
        }
    }

    /// Override the token type string.
    pub fn token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }

    /// Set the symbol.
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Set the name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Attach metadata.
    pub fn metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// The JSON content bytes.
    pub fn content(&self) -> Vec<u8> {
        let content = IssuanceContent {
            token_type: &self.token_type,
            symbol: self.symbol.as_deref(),
            supply: self.supply,
            name: self.name.as_deref(),
            metadata: self.metadata.as_ref(),
        };
        // Plain strings, integers and a JSON value always serialize.
        serde_json::to_vec(&content).unwrap_or_default()
    }

    /// Sign for `chain_id`, giving an entry ready to be placed at a height.
    pub fn sign(self, chain_id: ChainId, keypair: &Keypair) -> EntryBuilder {
        let content = self.content();
        let signature = keypair.sign(&signed_message(&chain_id, &content));
        EntryBuilder::new(chain_id)
            .ext_id(keypair.rcd().as_bytes().to_vec())
            .ext_id(signature.as_bytes().to_vec())
            .content(content)
    }
}
