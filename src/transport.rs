//! Channel-backed [`PeerTransport`] used by the node runtime.
//!
//! The engine never blocks on the network: outbound messages are queued on an
//! unbounded channel and a network task drains them.

use std::collections::{HashMap, HashSet};

use ava_consensus::interfaces::{PeerTransport, TransportError};
use ava_consensus::{NodeId, Poll, Response};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Score at which a peer is considered for disconnection.
pub const BAN_THRESHOLD: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    Poll { node: NodeId, poll: Poll },
    Response { node: NodeId, response: Response },
    Misbehavior { node: NodeId, score: u32, reason: String },
}

pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Outbound>,
    connected: RwLock<HashSet<NodeId>>,
    scores: RwLock<HashMap<NodeId, u32>>,
}

impl ChannelTransport {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let transport = Self {
            outbound,
            connected: RwLock::new(HashSet::new()),
            scores: RwLock::new(HashMap::new()),
        };
        (transport, receiver)
    }

    pub fn connect(&self, node: NodeId) {
        self.connected.write().insert(node);
    }

    pub fn disconnect(&self, node: NodeId) -> bool {
        self.connected.write().remove(&node)
    }

    pub fn misbehavior_score(&self, node: NodeId) -> u32 {
        self.scores.read().get(&node).copied().unwrap_or_default()
    }

    fn send(&self, node: NodeId, message: Outbound) -> Result<(), TransportError> {
        if !self.is_connected(node) {
            return Err(TransportError::Disconnected(node));
        }
        self.outbound
            .send(message)
            .map_err(|_| TransportError::Closed)
    }
}

impl PeerTransport for ChannelTransport {
    fn is_connected(&self, node: NodeId) -> bool {
        self.connected.read().contains(&node)
    }

    fn send_poll(&self, node: NodeId, poll: Poll) -> Result<(), TransportError> {
        self.send(node, Outbound::Poll { node, poll })
    }

    fn send_response(&self, node: NodeId, response: Response) -> Result<(), TransportError> {
        self.send(node, Outbound::Response { node, response })
    }

    fn report_misbehavior(&self, node: NodeId, score: u32, reason: &str) {
        let total = {
            let mut scores = self.scores.write();
            let entry = scores.entry(node).or_default();
            *entry = entry.saturating_add(score);
            *entry
        };
        if total >= BAN_THRESHOLD {
            warn!(target: "avalanche.net", node, total, reason, "peer crossed ban threshold");
        } else {
            debug!(target: "avalanche.net", node, score, total, reason, "peer misbehaved");
        }
        let _ = self.outbound.send(Outbound::Misbehavior {
            node,
            score,
            reason: reason.to_string(),
        });
    }
}
