use std::fmt;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::types::{BlockHash, ProofId, StakeContenderId, TxId};

/// Protocol maximum number of targets in one poll.
pub const MAX_ELEMENT_POLL: usize = 16;

/// Round identifier carried by a poll and echoed by its response.
pub type RoundId = u64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    Proof,
    Block,
    StakeContender,
    Transaction,
}

/// Something the network votes on. Ordered by kind first so proofs are
/// polled ahead of blocks, contenders and transactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Target {
    Proof(ProofId),
    Block(BlockHash),
    StakeContender(StakeContenderId),
    Transaction(TxId),
}

impl Target {
    pub fn kind(&self) -> TargetKind {
        match self {
            Target::Proof(_) => TargetKind::Proof,
            Target::Block(_) => TargetKind::Block,
            Target::StakeContender(_) => TargetKind::StakeContender,
            Target::Transaction(_) => TargetKind::Transaction,
        }
    }

    pub fn id_bytes(&self) -> [u8; 32] {
        match self {
            Target::Proof(id) => id.0,
            Target::Block(hash) => hash.0,
            Target::StakeContender(id) => id.0,
            Target::Transaction(txid) => txid.0,
        }
    }

    /// Interprets a wire vote code in this target's vocabulary.
    pub fn polarity_of(&self, code: VoteCode) -> Option<Polarity> {
        match self.kind() {
            TargetKind::Block => BlockVote::from_code(code).and_then(|vote| vote.polarity()),
            TargetKind::Transaction => TxVote::from_code(code).and_then(|vote| vote.polarity()),
            TargetKind::Proof => ProofVote::from_code(code).and_then(|vote| vote.polarity()),
            TargetKind::StakeContender => {
                ContenderVote::from_code(code).and_then(|vote| vote.polarity())
            }
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Proof(id) => write!(f, "proof:{id}"),
            Target::Block(hash) => write!(f, "block:{hash}"),
            Target::StakeContender(id) => write!(f, "contender:{id}"),
            Target::Transaction(txid) => write!(f, "tx:{txid}"),
        }
    }
}

/// Direction of a vote or of a finalization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Accept,
    Reject,
}

impl Polarity {
    pub fn from_accepted(accepted: bool) -> Self {
        if accepted {
            Polarity::Accept
        } else {
            Polarity::Reject
        }
    }
}

/// Wire-level vote code shared by every target kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum VoteCode {
    Accepted = 0,
    Invalid = 1,
    /// Rejected for proofs, parked for blocks.
    Rejected = 2,
    Orphan = 3,
    Unknown = 4,
    Pending = 5,
}

impl VoteCode {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Per-kind vote vocabulary mapped onto the shared wire code.
pub trait TargetVote: Sized + Copy {
    fn from_code(code: VoteCode) -> Option<Self>;
    fn code(self) -> VoteCode;
    /// `None` for votes that carry no opinion.
    fn polarity(self) -> Option<Polarity>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockVote {
    Accepted,
    Parked,
    Invalid,
    Unknown,
}

impl TargetVote for BlockVote {
    fn from_code(code: VoteCode) -> Option<Self> {
        match code {
            VoteCode::Accepted => Some(BlockVote::Accepted),
            VoteCode::Rejected => Some(BlockVote::Parked),
            VoteCode::Invalid => Some(BlockVote::Invalid),
            VoteCode::Unknown => Some(BlockVote::Unknown),
            VoteCode::Orphan | VoteCode::Pending => None,
        }
    }

    fn code(self) -> VoteCode {
        match self {
            BlockVote::Accepted => VoteCode::Accepted,
            BlockVote::Parked => VoteCode::Rejected,
            BlockVote::Invalid => VoteCode::Invalid,
            BlockVote::Unknown => VoteCode::Unknown,
        }
    }

    fn polarity(self) -> Option<Polarity> {
        match self {
            BlockVote::Accepted => Some(Polarity::Accept),
            BlockVote::Parked | BlockVote::Invalid => Some(Polarity::Reject),
            BlockVote::Unknown => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxVote {
    Accepted,
    Invalid,
    Orphan,
    Unknown,
}

impl TargetVote for TxVote {
    fn from_code(code: VoteCode) -> Option<Self> {
        match code {
            VoteCode::Accepted => Some(TxVote::Accepted),
            VoteCode::Invalid => Some(TxVote::Invalid),
            VoteCode::Orphan => Some(TxVote::Orphan),
            VoteCode::Unknown => Some(TxVote::Unknown),
            VoteCode::Rejected | VoteCode::Pending => None,
        }
    }

    fn code(self) -> VoteCode {
        match self {
            TxVote::Accepted => VoteCode::Accepted,
            TxVote::Invalid => VoteCode::Invalid,
            TxVote::Orphan => VoteCode::Orphan,
            TxVote::Unknown => VoteCode::Unknown,
        }
    }

    fn polarity(self) -> Option<Polarity> {
        match self {
            TxVote::Accepted => Some(Polarity::Accept),
            TxVote::Invalid | TxVote::Orphan => Some(Polarity::Reject),
            TxVote::Unknown => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ProofVote {
    /// Registered and favorite.
    Active,
    /// Known but losing its conflict set, or not yet usable.
    Rejected,
    Invalid,
    Unknown,
}

impl TargetVote for ProofVote {
    fn from_code(code: VoteCode) -> Option<Self> {
        match code {
            VoteCode::Accepted => Some(ProofVote::Active),
            VoteCode::Rejected => Some(ProofVote::Rejected),
            VoteCode::Invalid => Some(ProofVote::Invalid),
            VoteCode::Unknown => Some(ProofVote::Unknown),
            VoteCode::Orphan | VoteCode::Pending => None,
        }
    }

    fn code(self) -> VoteCode {
        match self {
            ProofVote::Active => VoteCode::Accepted,
            ProofVote::Rejected => VoteCode::Rejected,
            ProofVote::Invalid => VoteCode::Invalid,
            ProofVote::Unknown => VoteCode::Unknown,
        }
    }

    fn polarity(self) -> Option<Polarity> {
        match self {
            ProofVote::Active => Some(Polarity::Accept),
            ProofVote::Rejected | ProofVote::Invalid => Some(Polarity::Reject),
            ProofVote::Unknown => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContenderVote {
    /// Winners for the block are not known locally yet.
    Pending,
    Accepted,
    Invalid,
    Unknown,
}

impl TargetVote for ContenderVote {
    fn from_code(code: VoteCode) -> Option<Self> {
        match code {
            VoteCode::Pending => Some(ContenderVote::Pending),
            VoteCode::Accepted => Some(ContenderVote::Accepted),
            VoteCode::Invalid | VoteCode::Rejected => Some(ContenderVote::Invalid),
            VoteCode::Unknown => Some(ContenderVote::Unknown),
            VoteCode::Orphan => None,
        }
    }

    fn code(self) -> VoteCode {
        match self {
            ContenderVote::Pending => VoteCode::Pending,
            ContenderVote::Accepted => VoteCode::Accepted,
            ContenderVote::Invalid => VoteCode::Invalid,
            ContenderVote::Unknown => VoteCode::Unknown,
        }
    }

    fn polarity(self) -> Option<Polarity> {
        match self {
            ContenderVote::Accepted => Some(Polarity::Accept),
            ContenderVote::Invalid => Some(Polarity::Reject),
            ContenderVote::Pending | ContenderVote::Unknown => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    pub round: RoundId,
    pub targets: Vec<Target>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    #[serde(with = "hex::serde")]
    pub id: [u8; 32],
    pub code: VoteCode,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub round: RoundId,
    pub votes: Vec<Vote>,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}

impl Response {
    pub fn signing_digest(round: RoundId, votes: &[Vote]) -> blake3::Hash {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&round.to_le_bytes());
        hasher.update(&(votes.len() as u64).to_le_bytes());
        for vote in votes {
            hasher.update(&vote.id);
            hasher.update(&[vote.code.as_u8()]);
        }
        hasher.finalize()
    }

    pub fn signed(round: RoundId, votes: Vec<Vote>, key: &SigningKey) -> Self {
        let digest = Self::signing_digest(round, &votes);
        let signature = key.sign(digest.as_bytes()).to_bytes().to_vec();
        Self {
            round,
            votes,
            signature,
        }
    }

    pub fn verify(&self, key: &VerifyingKey) -> bool {
        let Ok(bytes) = <[u8; 64]>::try_from(self.signature.as_slice()) else {
            return false;
        };
        let digest = Self::signing_digest(self.round, &self.votes);
        key.verify(digest.as_bytes(), &Signature::from_bytes(&bytes))
            .is_ok()
    }
}
