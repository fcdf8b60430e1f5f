use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

/// Stake amounts are counted in the chain's base unit.
pub type Amount = u64;

/// Identifier the transport assigns to a connected remote node.
pub type NodeId = u64;

/// Milliseconds since the unix epoch.
pub type TimestampMs = u64;

/// Double SHA-256 over `data`.
pub fn hash256(data: &[u8]) -> [u8; 32] {
    let first = Sha256::digest(data);
    Sha256::digest(first).into()
}

/// Incremental double SHA-256 writer.
#[derive(Default)]
pub struct HashWriter {
    inner: Sha256,
}

impl HashWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write(&mut self, bytes: &[u8]) -> &mut Self {
        self.inner.update(bytes);
        self
    }

    pub fn write_u32(&mut self, value: u32) -> &mut Self {
        self.write(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> &mut Self {
        self.write(&value.to_le_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> &mut Self {
        self.write_u64(bytes.len() as u64);
        self.write(bytes)
    }

    pub fn finish(self) -> [u8; 32] {
        let first = self.inner.finalize();
        Sha256::digest(first).into()
    }
}

macro_rules! hash_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            pub const fn new(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            pub fn from_hex(data: &str) -> Result<Self, hex::FromHexError> {
                let mut bytes = [0u8; 32];
                hex::decode_to_slice(data, &mut bytes)?;
                Ok(Self(bytes))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), &self.to_hex()[..16])
            }
        }

        impl FromStr for $name {
            type Err = hex::FromHexError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                Self::from_hex(&raw).map_err(serde::de::Error::custom)
            }
        }
    };
}

hash_id!(
    /// Identifier of a stake proof, derived from its signed content.
    ProofId
);
hash_id!(BlockHash);
hash_id!(TxId);
hash_id!(
    /// `hash256(prev_block_hash || proofid)`.
    StakeContenderId
);

impl StakeContenderId {
    pub fn derive(prev_block: &BlockHash, proofid: &ProofId) -> Self {
        let mut writer = HashWriter::new();
        writer.write(prev_block.as_bytes()).write(proofid.as_bytes());
        Self(writer.finish())
    }
}

/// Reference to a transaction output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: TxId,
    pub vout: u32,
}

impl Outpoint {
    pub fn new(txid: TxId, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.vout)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contender_id_depends_on_both_inputs() {
        let block_a = BlockHash::new([1; 32]);
        let block_b = BlockHash::new([2; 32]);
        let proof = ProofId::new([9; 32]);

        let first = StakeContenderId::derive(&block_a, &proof);
        assert_eq!(first, StakeContenderId::derive(&block_a, &proof));
        assert_ne!(first, StakeContenderId::derive(&block_b, &proof));
    }

    #[test]
    fn ids_serialize_as_hex() {
        let id = ProofId::new([0xab; 32]);
        let encoded = serde_json::to_string(&id).expect("encode");
        assert_eq!(encoded, format!("\"{}\"", "ab".repeat(32)));
        let decoded: ProofId = serde_json::from_str(&encoded).expect("decode");
        assert_eq!(decoded, id);
    }
}
