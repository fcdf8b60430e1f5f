use std::collections::HashSet;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{Amount, HashWriter, Outpoint, ProofId};

/// Upper bound on the number of stakes a single proof may carry.
pub const MAX_PROOF_STAKES: usize = 1_000;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub outpoint: Outpoint,
    pub amount: Amount,
    pub height: u32,
}

/// A signed claim that a master key controls a set of staked outputs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    pub sequence: u64,
    /// Unix seconds; zero never expires.
    pub expiration_time: u64,
    #[serde(with = "hex_array")]
    pub master: [u8; 32],
    pub stakes: Vec<Stake>,
    #[serde(with = "hex::serde")]
    pub payout_script: Vec<u8>,
    #[serde(with = "hex_array")]
    pub signature: [u8; 64],
}

#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum ProofRejection {
    #[error("proof carries no stake")]
    NoStake,
    #[error("proof stakes the same outpoint twice")]
    DuplicateStake,
    #[error("proof carries more than 1000 stakes")]
    TooManyStakes,
    #[error("proof expired")]
    Expired,
    #[error("master key is not a valid verifying key")]
    InvalidMasterKey,
    #[error("proof signature does not verify")]
    InvalidSignature,
    #[error("stake rejected: {0}")]
    StakeRejected(String),
    #[error("proof was recently found invalid")]
    RecentlyInvalid,
}

impl Proof {
    pub fn id(&self) -> ProofId {
        let mut writer = HashWriter::new();
        writer
            .write_u64(self.sequence)
            .write_u64(self.expiration_time)
            .write(&self.master)
            .write_u64(self.stakes.len() as u64);
        for stake in &self.stakes {
            writer
                .write(stake.outpoint.txid.as_bytes())
                .write_u32(stake.outpoint.vout)
                .write_u64(stake.amount)
                .write_u32(stake.height);
        }
        writer.write_bytes(&self.payout_script);
        ProofId::new(writer.finish())
    }

    /// Total staked amount.
    pub fn stake_amount(&self) -> Amount {
        self.stakes
            .iter()
            .fold(0, |total: Amount, stake| total.saturating_add(stake.amount))
    }

    pub fn outpoints(&self) -> impl Iterator<Item = &Outpoint> {
        self.stakes.iter().map(|stake| &stake.outpoint)
    }

    pub fn conflicts_with(&self, other: &Proof) -> bool {
        let ours: HashSet<&Outpoint> = self.outpoints().collect();
        other.outpoints().any(|outpoint| ours.contains(outpoint))
    }

    pub fn is_expired(&self, now_secs: u64) -> bool {
        self.expiration_time != 0 && self.expiration_time <= now_secs
    }

    pub fn master_key(&self) -> Result<VerifyingKey, ProofRejection> {
        VerifyingKey::from_bytes(&self.master).map_err(|_| ProofRejection::InvalidMasterKey)
    }

    /// Checks everything that does not need chain state.
    pub fn verify_structure(&self, now_secs: u64) -> Result<(), ProofRejection> {
        if self.stakes.is_empty() {
            return Err(ProofRejection::NoStake);
        }
        if self.stakes.len() > MAX_PROOF_STAKES {
            return Err(ProofRejection::TooManyStakes);
        }
        let mut seen = HashSet::with_capacity(self.stakes.len());
        if !self.outpoints().all(|outpoint| seen.insert(*outpoint)) {
            return Err(ProofRejection::DuplicateStake);
        }
        if self.is_expired(now_secs) {
            return Err(ProofRejection::Expired);
        }
        let master = self.master_key()?;
        let signature = Signature::from_bytes(&self.signature);
        master
            .verify(self.id().as_bytes(), &signature)
            .map_err(|_| ProofRejection::InvalidSignature)
    }
}

/// Assembles and signs a [`Proof`].
pub struct ProofBuilder<'a> {
    sequence: u64,
    expiration_time: u64,
    master: &'a SigningKey,
    stakes: Vec<Stake>,
    payout_script: Vec<u8>,
}

impl<'a> ProofBuilder<'a> {
    pub fn new(sequence: u64, expiration_time: u64, master: &'a SigningKey) -> Self {
        Self {
            sequence,
            expiration_time,
            master,
            stakes: Vec::new(),
            payout_script: Vec::new(),
        }
    }

    pub fn stake(mut self, outpoint: Outpoint, amount: Amount, height: u32) -> Self {
        self.stakes.push(Stake {
            outpoint,
            amount,
            height,
        });
        self
    }

    pub fn payout_script(mut self, script: Vec<u8>) -> Self {
        self.payout_script = script;
        self
    }

    pub fn build(self) -> Proof {
        let mut proof = Proof {
            sequence: self.sequence,
            expiration_time: self.expiration_time,
            master: self.master.verifying_key().to_bytes(),
            stakes: self.stakes,
            payout_script: self.payout_script,
            signature: [0u8; 64],
        };
        proof.signature = self.master.sign(proof.id().as_bytes()).to_bytes();
        proof
    }
}

mod hex_array {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S, const N: usize>(bytes: &[u8; N], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D, const N: usize>(deserializer: D) -> Result<[u8; N], D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        let mut bytes = [0u8; N];
        hex::decode_to_slice(raw, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(bytes)
    }
}
