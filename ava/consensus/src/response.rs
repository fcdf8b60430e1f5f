use std::collections::HashMap;

use ed25519_dalek::VerifyingKey;
use thiserror::Error;

use crate::messages::{Response, RoundId, Target, VoteCode};
use crate::poller::Query;
use crate::types::NodeId;

/// Score reported to the transport for a malformed response.
pub const MISBEHAVIOR_SCORE: u32 = 100;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("unexpected response from node {node} for round {round}")]
    Unexpected { node: NodeId, round: RoundId },
    #[error("node {0} is not attached")]
    UnknownNode(NodeId),
    #[error("invalid response signature from node {0}")]
    InvalidSignature(NodeId),
    #[error("response carries {got} votes, poll had {expected}")]
    InvalidSize { expected: usize, got: usize },
    #[error("response votes do not match the polled targets")]
    InvalidContent,
}

impl ResponseError {
    pub fn misbehavior_score(&self) -> u32 {
        match self {
            ResponseError::Unexpected { .. } | ResponseError::UnknownNode(_) => 0,
            _ => MISBEHAVIOR_SCORE,
        }
    }

    pub fn reason(&self) -> &'static str {
        match self {
            ResponseError::Unexpected { .. } => "unexpected-ava-response",
            ResponseError::UnknownNode(_) => "unknown-ava-node",
            ResponseError::InvalidSignature(_) => "invalid-ava-response-signature",
            ResponseError::InvalidSize { .. } => "invalid-ava-response-size",
            ResponseError::InvalidContent => "invalid-ava-response-content",
        }
    }
}

/// Checks a response against the poll it answers and pairs each vote with
/// its target. Votes may come back in any order.
pub fn validate(
    query: &Query,
    key: &VerifyingKey,
    response: &Response,
) -> Result<Vec<(Target, VoteCode)>, ResponseError> {
    if !response.verify(key) {
        return Err(ResponseError::InvalidSignature(query.node));
    }
    if response.votes.len() != query.targets.len() {
        return Err(ResponseError::InvalidSize {
            expected: query.targets.len(),
            got: response.votes.len(),
        });
    }

    let mut expected: HashMap<[u8; 32], Vec<Target>> = HashMap::new();
    for target in &query.targets {
        expected.entry(target.id_bytes()).or_default().push(*target);
    }
    response
        .votes
        .iter()
        .map(|vote| {
            expected
                .get_mut(&vote.id)
                .and_then(Vec::pop)
                .map(|target| (target, vote.code))
                .ok_or(ResponseError::InvalidContent)
        })
        .collect()
}
