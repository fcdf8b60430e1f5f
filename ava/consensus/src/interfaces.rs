//! Collaborators the engine talks to but does not own.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::finality::VoteUpdate;
use crate::messages::{Poll, Response};
use crate::proof::Proof;
use crate::types::{BlockHash, NodeId, TxId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub hash: BlockHash,
    pub height: u64,
    /// Block header time in unix seconds.
    pub time: u64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockStatus {
    /// Part of the active chain.
    Active,
    /// Valid but on a fork.
    Fork,
    Parked,
    Invalid,
    Unknown,
}

/// Read-only view of the block chain.
pub trait ChainView: Send + Sync {
    fn tip(&self) -> Option<BlockInfo>;
    fn block(&self, hash: &BlockHash) -> Option<BlockInfo>;
    fn block_status(&self, hash: &BlockHash) -> BlockStatus;
    /// Inclusive: a block is its own ancestor.
    fn is_ancestor(&self, ancestor: &BlockHash, descendant: &BlockHash) -> bool;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StakeCheck {
    Valid,
    /// Some staked output does not exist in the UTXO set.
    Missing,
    /// Outputs exist but are not mature yet.
    Immature,
    Invalid(String),
}

pub trait StakeVerifier: Send + Sync {
    fn check(&self, proof: &Proof) -> StakeCheck;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Accepted,
    Invalid,
    Orphan,
    Unknown,
}

pub trait MempoolView: Send + Sync {
    fn tx_status(&self, txid: &TxId) -> TxStatus;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("node {0} is not connected")]
    Disconnected(NodeId),
    #[error("transport closed")]
    Closed,
}

pub trait PeerTransport: Send + Sync {
    fn is_connected(&self, node: NodeId) -> bool;
    fn send_poll(&self, node: NodeId, poll: Poll) -> Result<(), TransportError>;
    fn send_response(&self, node: NodeId, response: Response) -> Result<(), TransportError>;
    fn report_misbehavior(&self, node: NodeId, score: u32, reason: &str);
}

/// Receives finality notifications; the chain and indexers react to these.
pub trait FinalityListener: Send + Sync {
    fn on_vote_update(&self, update: &VoteUpdate);
}
