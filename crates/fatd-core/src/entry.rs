//! Entry: one immutable record from the external log.
//!
//! Entries are never edited. The entry source assigns the hash, height and
//! timestamp; external IDs and content are the author's bytes.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};

use crate::error::CoreError;
use crate::types::{ChainId, EntryHash};

/// The only entry binary version in use.
pub const ENTRY_VERSION: u8 = 0;

/// Fixed header: version, chain id, total external ID size.
pub const ENTRY_HEADER_SIZE: usize = 1 + 32 + 2;

/// Largest external ID section and content the network accepts.
pub const MAX_ENTRY_PAYLOAD_SIZE: usize = 10_240;

/// One record from the external log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Content hash, the entry's identity.
    pub hash: EntryHash,

    /// The chain this entry was written to.
    pub chain_id: ChainId,

    /// Height of the directory block that contains the entry.
    pub height: u64,

    /// Block timestamp (Unix seconds). Untrusted.
    pub timestamp: i64,

    /// Ordered external IDs.
    pub ext_ids: Vec<Bytes>,

    /// Content bytes.
    pub content: Bytes,
}

impl Entry {
    /// Encode in the network binary layout.
    ///
    /// Only the chain id, external IDs and content are covered; height and
    /// timestamp come from the enclosing block.
    pub fn marshal_binary(&self) -> Result<Vec<u8>, CoreError> {
        let ext_ids_size: usize = self.ext_ids.iter().map(|id| 2 + id.len()).sum();
        let ext_ids_size = u16::try_from(ext_ids_size).map_err(|_| {
            CoreError::EntryEncode(format!("external IDs too large: {} bytes", ext_ids_size))
        })?;

        let mut buf = BytesMut::with_capacity(
            ENTRY_HEADER_SIZE + ext_ids_size as usize + self.content.len(),
        );
        buf.put_u8(ENTRY_VERSION);
        buf.put_slice(self.chain_id.as_bytes());
        buf.put_u16(ext_ids_size);
        for id in &self.ext_ids {
            // Each fits since the total fits.
            buf.put_u16(id.len() as u16);
            buf.put_slice(id);
        }
        buf.put_slice(&self.content);

        Ok(buf.to_vec())
    }

    /// Decode the network binary layout.
    ///
    /// The result carries the computed hash, height 0 and timestamp 0.
    pub fn unmarshal_binary(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() < ENTRY_HEADER_SIZE {
            return Err(CoreError::EntryDecode(format!(
                "insufficient length: {} bytes",
                data.len()
            )));
        }
        if data[0] != ENTRY_VERSION {
            return Err(CoreError::EntryDecode(format!(
                "invalid version byte: {}",
                data[0]
            )));
        }

        let chain_id = ChainId::try_from(&data[1..33])
            .map_err(|e| CoreError::EntryDecode(e.to_string()))?;
        let ext_ids_size = u16::from_be_bytes([data[33], data[34]]) as usize;

        let body = &data[ENTRY_HEADER_SIZE..];
        if ext_ids_size > body.len() {
            return Err(CoreError::EntryDecode(format!(
                "external ID size {} exceeds remaining {} bytes",
                ext_ids_size,
                body.len()
            )));
        }

        let mut ext_ids = Vec::new();
        let mut section = &body[..ext_ids_size];
        while !section.is_empty() {
            if section.len() < 2 {
                return Err(CoreError::EntryDecode("truncated external ID length".into()));
            }
            let len = u16::from_be_bytes([section[0], section[1]]) as usize;
            section = &section[2..];
            if len > section.len() {
                return Err(CoreError::EntryDecode(format!(
                    "external ID length {} exceeds remaining {} bytes",
                    len,
                    section.len()
                )));
            }
            ext_ids.push(Bytes::copy_from_slice(&section[..len]));
            section = &section[len..];
        }

        Ok(Self {
            hash: compute_entry_hash(data),
            chain_id,
            height: 0,
            timestamp: 0,
            ext_ids,
            content: Bytes::copy_from_slice(&body[ext_ids_size..]),
        })
    }

    /// Compute the entry hash from the binary encoding.
    pub fn compute_hash(&self) -> Result<EntryHash, CoreError> {
        Ok(compute_entry_hash(&self.marshal_binary()?))
    }

    /// Check that the stored hash matches the contents.
    pub fn verify_hash(&self) -> bool {
        matches!(self.compute_hash(), Ok(hash) if hash == self.hash)
    }

    /// Size of the external IDs and content, excluding the fixed header.
    pub fn payload_size(&self) -> usize {
        self.ext_ids.iter().map(|id| 2 + id.len()).sum::<usize>() + self.content.len()
    }
}

/// sha256(sha512(data) || data)
pub fn compute_entry_hash(data: &[u8]) -> EntryHash {
    let inner = Sha512::digest(data);
    let mut hasher = Sha256::new();
    hasher.update(inner);
    hasher.update(data);
    EntryHash(hasher.finalize().into())
}

/// Builder for entries not yet placed in a block.
#[derive(Debug, Clone)]
pub struct EntryBuilder {
    chain_id: ChainId,
    height: u64,
    timestamp: i64,
    ext_ids: Vec<Bytes>,
    content: Bytes,
}

impl EntryBuilder {
    /// Start an entry on a chain.
    pub fn new(chain_id: ChainId) -> Self {
        Self {
            chain_id,
            height: 0,
            timestamp: 0,
            ext_ids: Vec::new(),
            content: Bytes::new(),
        }
    }

    /// Set the block height.
    pub fn height(mut self, height: u64) -> Self {
        self.height = height;
        self
    }

    /// Set the block timestamp.
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    /// Append an external ID.
    pub fn ext_id(mut self, ext_id: impl Into<Bytes>) -> Self {
        self.ext_ids.push(ext_id.into());
        self
    }

    /// Replace all external IDs.
    pub fn ext_ids<I, B>(mut self, ext_ids: I) -> Self
    where
        I: IntoIterator<Item = B>,
        B: Into<Bytes>,
    {
        self.ext_ids = ext_ids.into_iter().map(Into::into).collect();
        self
    }

    /// Set the content.
    pub fn content(mut self, content: impl Into<Bytes>) -> Self {
        self.content = content.into();
        self
    }

    /// Build the entry, computing its hash.
    pub fn build(self) -> Result<Entry, CoreError> {
        let mut entry = Entry {
            hash: EntryHash::ZERO,
            chain_id: self.chain_id,
            height: self.height,
            timestamp: self.timestamp,
            ext_ids: self.ext_ids,
            content: self.content,
        };
        entry.hash = entry.compute_hash()?;
        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Entry {
        EntryBuilder::new(ChainId::from_bytes([0x11; 32]))
            .ext_id(&b"hello"[..])
            .ext_id(&b"world"[..])
            .content(&b"content"[..])
            .build()
            .unwrap()
    }

    #[test]
    fn test_marshal_binary_vector() {
        let entry = sample();
        assert_eq!(
            hex::encode(entry.marshal_binary().unwrap()),
            "001111111111111111111111111111111111111111111111111111111111111111\
             000e000568656c6c6f0005776f726c64636f6e74656e74"
        );
        assert_eq!(
            entry.hash.to_hex(),
            "368d0fb53cb8a6600b1fa3f552a65569916dc33726a0c3f8506bf1a2b2d417fe"
        );
    }

    #[test]
    fn test_unmarshal_recovers_fields() {
        let entry = sample();
        let decoded = Entry::unmarshal_binary(&entry.marshal_binary().unwrap()).unwrap();
        assert_eq!(decoded.chain_id, entry.chain_id);
        assert_eq!(decoded.ext_ids, entry.ext_ids);
        assert_eq!(decoded.content, entry.content);
        assert_eq!(decoded.hash, entry.hash);
    }

    #[test]
    fn test_unmarshal_rejects_short_and_bad_version() {
        assert!(matches!(
            Entry::unmarshal_binary(&[0u8; 10]),
            Err(CoreError::EntryDecode(_))
        ));

        let mut data = sample().marshal_binary().unwrap();
        data[0] = 1;
        assert!(matches!(
            Entry::unmarshal_binary(&data),
            Err(CoreError::EntryDecode(_))
        ));
    }

    #[test]
    fn test_unmarshal_rejects_overlong_ext_id() {
        let mut data = sample().marshal_binary().unwrap();
        // First ext id claims 0xffff bytes.
        data[35] = 0xff;
        data[36] = 0xff;
        assert!(Entry::unmarshal_binary(&data).is_err());
    }

    #[test]
    fn test_verify_hash_detects_tampering() {
        let mut entry = sample();
        assert!(entry.verify_hash());
        entry.content = Bytes::from_static(b"tampered");
        assert!(!entry.verify_hash());
    }

    #[test]
    fn test_empty_entry() {
        let entry = EntryBuilder::new(ChainId::ZERO).build().unwrap();
        let data = entry.marshal_binary().unwrap();
        assert_eq!(data.len(), ENTRY_HEADER_SIZE);
        assert_eq!(entry.payload_size(), 0);
        assert!(Entry::unmarshal_binary(&data).unwrap().ext_ids.is_empty());
    }
}
