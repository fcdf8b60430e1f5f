//! Stake-weighted repeated polling that drives blocks, transactions, proofs
//! and staking reward contenders to finality.
//!
//! Nodes back their votes with proofs of staked outputs. [`ProofStore`]
//! arbitrates between conflicting proofs, [`PeerSet`] and [`QuorumTracker`]
//! decide when enough stake is connected, and [`FinalityTable`] turns rounds
//! of votes into [`VoteUpdate`]s. [`Engine`] owns all of them;
//! [`AvalancheHandle`] runs it on a tokio task.

pub mod clock;
pub mod config;
pub mod contender;
pub mod engine;
pub mod event_loop;
pub mod finality;
pub mod interfaces;
pub mod messages;
pub mod peers;
pub mod persistence;
pub mod poller;
pub mod proof;
pub mod proof_store;
pub mod quorum;
mod recent;
pub mod response;
pub mod types;
pub mod vote_record;

use thiserror::Error;

pub use clock::{Clock, MockClock, SystemClock};
pub use config::{ConfigError, EngineConfig};
pub use contender::{Candidate, StakeContenderCache};
pub use engine::{Collaborators, Engine, PersistedProof, ProofReport};
pub use event_loop::AvalancheHandle;
pub use finality::{FinalityTable, VoteStatus, VoteUpdate};
pub use interfaces::{
    BlockInfo, BlockStatus, ChainView, FinalityListener, MempoolView, PeerTransport, StakeCheck,
    StakeVerifier, TransportError, TxStatus,
};
pub use messages::{Poll, Polarity, Response, Target, TargetKind, Vote, VoteCode};
pub use peers::PeerSet;
pub use persistence::{PeersStore, PersistenceError};
pub use proof::{Proof, ProofBuilder, ProofRejection, Stake};
pub use proof_store::{
    ProofStatus, ProofStore, ProofStoreError, RegistrationOutcome, RejectMode, Removal,
};
pub use quorum::{QuorumStatus, QuorumTracker};
pub use response::ResponseError;
pub use types::{Amount, BlockHash, NodeId, Outpoint, ProofId, StakeContenderId, TxId};

#[derive(Debug, Error)]
pub enum AvalancheError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Proof(#[from] ProofStoreError),
    #[error(transparent)]
    Response(#[from] ResponseError),
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("avalanche channel closed")]
    ChannelClosed,
}

pub type AvalancheResult<T> = Result<T, AvalancheError>;

#[cfg(test)]
mod tests;
