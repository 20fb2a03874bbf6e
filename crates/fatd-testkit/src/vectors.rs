//! Golden test vectors.
//!
//! These values come from the Factom network and must be reproduced
//! exactly; any drift breaks compatibility with existing chains.

use fatd_core::{token_chain_id, ChainId, EntryBuilder, Keypair};

/// Chain id derived from name ids.
#[derive(Debug, Clone)]
pub struct ChainIdVector {
    pub name: &'static str,
    pub name_ids: &'static [&'static [u8]],
    pub expected: &'static str,
}

/// Token chain id derived from a token id and issuer chain.
#[derive(Debug, Clone)]
pub struct TokenChainVector {
    pub token_id: &'static str,
    pub issuer_chain_id: [u8; 32],
    pub expected: &'static str,
}

/// Public key and RCD address for a seed.
#[derive(Debug, Clone)]
pub struct AddressVector {
    pub seed: [u8; 32],
    /// Empty when only the address is pinned.
    pub public_key: &'static str,
    pub address: &'static str,
}

/// Binary encoding and hash of an entry.
#[derive(Debug, Clone)]
pub struct EntryVector {
    pub chain_id: [u8; 32],
    pub ext_ids: &'static [&'static [u8]],
    pub content: &'static [u8],
    pub binary: &'static str,
    pub hash: &'static str,
}

pub fn chain_id_vectors() -> Vec<ChainIdVector> {
    vec![ChainIdVector {
        name: "foo/bar",
        name_ids: &[b"foo", b"bar"],
        expected: "92475004e70f41b94750f4a77bf7b430551113b25d3d57169eadca5692bb043d",
    }]
}

pub fn token_chain_vectors() -> Vec<TokenChainVector> {
    vec![TokenChainVector {
        token_id: "test",
        issuer_chain_id: [0x88; 32],
        expected: "59d489a371f2f83462457dca894a5aa871e31c826a3880dd8b0a92900cca6ca2",
    }]
}

pub fn address_vectors() -> Vec<AddressVector> {
    vec![
        AddressVector {
            seed: [0x42; 32],
            public_key: "2152f8d19b791d24453242e15f2eab6cb7cffa7b6a5ed30097960e069881db12",
            address: "65d0b6e430b31a73f32803e694be39977a41bae9e13316b58bbe5b64a95de39e",
        },
        AddressVector {
            seed: [0x01; 32],
            public_key: "",
            address: "d6ef0d0edbfcba01000afa5de08c92dc809b488499abbf1700a865362003ddb6",
        },
    ]
}

pub fn entry_vectors() -> Vec<EntryVector> {
    vec![EntryVector {
        chain_id: [0x11; 32],
        ext_ids: &[b"hello", b"world"],
        content: b"content",
        binary: "0011111111111111111111111111111111111111111111111111111111111111\
                 11000e000568656c6c6f0005776f726c64636f6e74656e74",
        hash: "368d0fb53cb8a6600b1fa3f552a65569916dc33726a0c3f8506bf1a2b2d417fe",
    }]
}

/// A vector whose computed value differs from the expected one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VectorFailure {
    pub vector: String,
    pub expected: String,
    pub actual: String,
}

fn check(failures: &mut Vec<VectorFailure>, vector: String, expected: &str, actual: String) {
    if expected != actual {
        failures.push(VectorFailure {
            vector,
            expected: expected.to_string(),
            actual,
        });
    }
}

/// Recompute every vector, returning the mismatches.
pub fn verify_all_vectors() -> Result<(), Vec<VectorFailure>> {
    let mut failures = Vec::new();

    for v in chain_id_vectors() {
        let id = ChainId::from_name_ids(v.name_ids.iter().copied());
        check(&mut failures, format!("chain id {}", v.name), v.expected, id.to_hex());
    }

    for v in token_chain_vectors() {
        let id = token_chain_id(v.token_id, &ChainId::from_bytes(v.issuer_chain_id));
        check(
            &mut failures,
            format!("token chain {}", v.token_id),
            v.expected,
            id.to_hex(),
        );
    }

    for v in address_vectors() {
        let keypair = Keypair::from_seed(&v.seed);
        let label = hex::encode(&v.seed[..4]);
        if !v.public_key.is_empty() {
            check(
                &mut failures,
                format!("public key {}", label),
                v.public_key,
                keypair.public_key().to_hex(),
            );
        }
        check(
            &mut failures,
            format!("address {}", label),
            v.address,
            keypair.address().to_hex(),
        );
    }

    for v in entry_vectors() {
        let built = EntryBuilder::new(ChainId::from_bytes(v.chain_id))
            .ext_ids(v.ext_ids.iter().map(|id| id.to_vec()))
            .content(v.content.to_vec())
            .build();
        match built {
            Ok(entry) => {
                let binary = entry.marshal_binary().map(hex::encode).unwrap_or_default();
                check(&mut failures, "entry binary".into(), v.binary, binary);
                check(&mut failures, "entry hash".into(), v.hash, entry.hash.to_hex());
            }
            Err(e) => failures.push(VectorFailure {
                vector: "entry build".into(),
                expected: v.hash.to_string(),
                actual: e.to_string(),
            }),
        }
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_vectors_pass() {
        if let Err(failures) = verify_all_vectors() {
            panic!("golden vector mismatches: {:#?}", failures);
        }
    }
}
