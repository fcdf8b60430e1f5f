use std::collections::{BTreeSet, HashMap};

use ed25519_dalek::VerifyingKey;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::debug;

use crate::types::{Amount, NodeId, ProofId, TimestampMs};

#[derive(Clone, Debug)]
pub struct NodeEntry {
    pub proofid: ProofId,
    pub key: VerifyingKey,
    pub next_request_time: TimestampMs,
}

/// `previous` is the binding the node dropped to take the new one.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AttachOutcome {
    /// The node now contributes its proof's stake.
    Attached { previous: Option<Detached> },
    /// The proof is known but not registered; the node waits for it.
    Pending { previous: Option<Detached> },
    Unchanged,
}

impl AttachOutcome {
    pub fn previous(&self) -> Option<&Detached> {
        match self {
            Self::Attached { previous } | Self::Pending { previous } => previous.as_ref(),
            Self::Unchanged => None,
        }
    }

    pub fn is_attached(&self) -> bool {
        matches!(self, Self::Attached { .. })
    }
}

/// Result of dropping a node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Detached {
    pub proofid: ProofId,
    /// The proof has no attached node left.
    pub orphaned: bool,
}

#[derive(Debug, Default)]
struct AttachedProof {
    stake: Amount,
    nodes: BTreeSet<NodeId>,
}

/// Connected nodes and the proofs that back them.
#[derive(Debug, Default)]
pub struct PeerSet {
    nodes: HashMap<NodeId, NodeEntry>,
    by_proof: HashMap<ProofId, AttachedProof>,
    pending: HashMap<NodeId, NodeEntry>,
    connected_stake: Amount,
}

impl PeerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// `stake` is `Some` when the proof is registered.
    pub fn attach(
        &mut self,
        node: NodeId,
        key: VerifyingKey,
        proofid: ProofId,
        stake: Option<Amount>,
        now: TimestampMs,
    ) -> AttachOutcome {
        let same = |entry: &NodeEntry| entry.proofid == proofid && entry.key == key;
        match (self.nodes.get(&node), self.pending.get(&node), stake) {
            (Some(entry), _, Some(_)) if same(entry) => return AttachOutcome::Unchanged,
            (_, Some(entry), None) if same(entry) => return AttachOutcome::Unchanged,
            _ => {}
        }
        let previous = self.detach(node);

        let entry = NodeEntry {
            proofid,
            key,
            next_request_time: now,
        };
        match stake {
            Some(stake) => {
                self.insert_active(node, entry, stake);
                AttachOutcome::Attached { previous }
            }
            None => {
                self.pending.insert(node, entry);
                AttachOutcome::Pending { previous }
            }
        }
    }

    pub fn detach(&mut self, node: NodeId) -> Option<Detached> {
        if let Some(entry) = self.pending.remove(&node) {
            return Some(Detached {
                proofid: entry.proofid,
                orphaned: false,
            });
        }
        let entry = self.nodes.remove(&node)?;
        let orphaned = self.unlink(node, &entry.proofid);
        Some(Detached {
            proofid: entry.proofid,
            orphaned,
        })
    }

    /// The proof lost its registration: its nodes wait until it comes back.
    pub fn demote_proof(&mut self, proofid: &ProofId) -> Vec<NodeId> {
        let Some(attached) = self.by_proof.remove(proofid) else {
            return Vec::new();
        };
        self.connected_stake = self.connected_stake.saturating_sub(attached.stake);
        let mut moved = Vec::with_capacity(attached.nodes.len());
        for node in attached.nodes {
            if let Some(entry) = self.nodes.remove(&node) {
                self.pending.insert(node, entry);
                moved.push(node);
            }
        }
        if !moved.is_empty() {
            debug!(target: "avalanche.peers", proof = %proofid, nodes = moved.len(), "nodes moved to pending");
        }
        moved
    }

    /// The proof became registered: nodes waiting for it start counting.
    pub fn promote_proof(&mut self, proofid: &ProofId, stake: Amount) -> Vec<NodeId> {
        let waiting: Vec<NodeId> = self
            .pending
            .iter()
            .filter(|(_, entry)| entry.proofid == *proofid)
            .map(|(node, _)| *node)
            .collect();
        for node in &waiting {
            if let Some(entry) = self.pending.remove(node) {
                self.insert_active(*node, entry, stake);
            }
        }
        waiting
    }

    pub fn has_pending_for(&self, proofid: &ProofId) -> bool {
        self.pending.values().any(|entry| entry.proofid == *proofid)
    }

    pub fn node_key(&self, node: NodeId) -> Option<&VerifyingKey> {
        self.nodes
            .get(&node)
            .or_else(|| self.pending.get(&node))
            .map(|entry| &entry.key)
    }

    pub fn node(&self, node: NodeId) -> Option<&NodeEntry> {
        self.nodes.get(&node)
    }

    pub fn is_pending(&self, node: NodeId) -> bool {
        self.pending.contains_key(&node)
    }

    pub fn nodes_of(&self, proofid: &ProofId) -> Vec<NodeId> {
        self.by_proof
            .get(proofid)
            .map(|attached| attached.nodes.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_attached(&self, proofid: &ProofId) -> bool {
        self.by_proof.contains_key(proofid)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn attached_proof_count(&self) -> usize {
        self.by_proof.len()
    }

    pub fn connected_stake(&self) -> Amount {
        self.connected_stake
    }

    /// Uniformly samples up to `count` nodes that are not cooling down.
    pub fn sample<R: Rng + ?Sized>(
        &self,
        count: usize,
        now: TimestampMs,
        rng: &mut R,
    ) -> Vec<NodeId> {
        let mut available: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|(_, entry)| entry.next_request_time <= now)
            .map(|(node, _)| *node)
            .collect();
        available.sort_unstable();
        available
            .choose_multiple(rng, count)
            .copied()
            .collect()
    }

    pub fn set_next_request_time(&mut self, node: NodeId, at: TimestampMs) {
        if let Some(entry) = self.nodes.get_mut(&node) {
            entry.next_request_time = at;
        }
    }

    fn insert_active(&mut self, node: NodeId, entry: NodeEntry, stake: Amount) {
        if !self.by_proof.contains_key(&entry.proofid) {
            self.connected_stake = self.connected_stake.saturating_add(stake);
        }
        self.by_proof
            .entry(entry.proofid)
            .or_insert_with(|| AttachedProof {
                stake,
                nodes: BTreeSet::new(),
            })
            .nodes
            .insert(node);
        self.nodes.insert(node, entry);
    }

    fn unlink(&mut self, node: NodeId, proofid: &ProofId) -> bool {
        let Some(attached) = self.by_proof.get_mut(proofid) else {
            return false;
        };
        attached.nodes.remove(&node);
        if attached.nodes.is_empty() {
            let stake = attached.stake;
            self.by_proof.remove(proofid);
            self.connected_stake = self.connected_stake.saturating_sub(stake);
            return true;
        }
        false
    }
}
