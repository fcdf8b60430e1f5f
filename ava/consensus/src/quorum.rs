use serde::{Deserialize, Serialize};
use tracing::info;

use crate::types::Amount;

/// Snapshot returned by the quorum status query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuorumStatus {
    pub ready: bool,
    pub node_count: usize,
    pub pending_node_count: usize,
    pub connected_stake: Amount,
    pub total_stake: Amount,
    pub min_quorum_stake: Amount,
    pub min_connected_stake_ratio: f64,
}

/// Decides when enough stake is connected to start polling.
///
/// Once the thresholds are met the tracker stays ready until every node is
/// gone.
#[derive(Clone, Debug)]
pub struct QuorumTracker {
    min_node_count: usize,
    min_quorum_stake: Amount,
    min_connected_stake_ratio: f64,
    latched: bool,
}

impl QuorumTracker {
    pub fn new(min_node_count: usize, min_quorum_stake: Amount, min_connected_stake_ratio: f64) -> Self {
        Self {
            min_node_count,
            min_quorum_stake,
            min_connected_stake_ratio,
            latched: false,
        }
    }

    pub fn evaluate(&mut self, node_count: usize, connected_stake: Amount, total_stake: Amount) -> bool {
        if self.latched {
            if node_count == 0 {
                info!(target: "avalanche.quorum", "all nodes gone, quorum released");
                self.latched = false;
            }
            return self.latched;
        }
        if node_count < self.min_node_count || connected_stake < self.min_quorum_stake {
            return false;
        }
        let required = (total_stake as f64 * self.min_connected_stake_ratio).round();
        if (connected_stake as f64) < required {
            return false;
        }
        info!(
            target: "avalanche.quorum",
            node_count,
            connected_stake,
            total_stake,
            "quorum established"
        );
        self.latched = true;
        true
    }

    pub fn is_ready(&self) -> bool {
        self.latched
    }

    pub fn status(
        &self,
        node_count: usize,
        pending_node_count: usize,
        connected_stake: Amount,
        total_stake: Amount,
    ) -> QuorumStatus {
        QuorumStatus {
            ready: self.latched,
            node_count,
            pending_node_count,
            connected_stake,
            total_stake,
            min_quorum_stake: self.min_quorum_stake,
            min_connected_stake_ratio: self.min_connected_stake_ratio,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latch_survives_stake_drop() {
        let mut quorum = QuorumTracker::new(2, 100, 0.8);
        assert!(!quorum.evaluate(1, 1_000, 1_000));
        assert!(!quorum.evaluate(2, 799, 1_000));
        assert!(quorum.evaluate(2, 800, 1_000));
        assert!(quorum.is_ready());

        assert!(quorum.evaluate(1, 10, 1_000));
        assert!(!quorum.evaluate(0, 0, 1_000));
        assert!(!quorum.is_ready());
        assert!(!quorum.evaluate(1, 10, 1_000));
    }

    #[test]
    fn minimum_stake_applies_to_connected_stake() {
        let mut quorum = QuorumTracker::new(1, 500, 0.0);
        assert!(!quorum.evaluate(3, 499, 499));
        assert!(quorum.evaluate(3, 500, 10_000));
    }
}
