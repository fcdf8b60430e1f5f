use std::collections::HashMap;

use tracing::debug;

use crate::messages::{Poll, RoundId, Target};
use crate::types::{NodeId, TimestampMs};

/// A poll waiting for its response.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Query {
    pub node: NodeId,
    pub round: RoundId,
    pub cycle: u64,
    pub targets: Vec<Target>,
    pub deadline: TimestampMs,
}

/// Polls produced by one scheduling pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PollCycle {
    pub cycle: u64,
    pub polls: Vec<(NodeId, Poll)>,
}

/// Hands out round ids and remembers which node owes which answer.
#[derive(Debug)]
pub struct Poller {
    next_round: RoundId,
    next_cycle: u64,
    query_timeout_ms: u64,
    queries: HashMap<(NodeId, RoundId), Query>,
}

impl Poller {
    pub fn new(query_timeout_ms: u64) -> Self {
        Self {
            next_round: 0,
            next_cycle: 0,
            query_timeout_ms,
            queries: HashMap::new(),
        }
    }

    /// Sends the same batch to every sampled node, each under a fresh round id.
    pub fn plan(&mut self, targets: &[Target], nodes: &[NodeId], now: TimestampMs) -> PollCycle {
        if targets.is_empty() || nodes.is_empty() {
            return PollCycle::default();
        }
        let cycle = self.next_cycle;
        self.next_cycle += 1;
        let deadline = now.saturating_add(self.query_timeout_ms);

        let polls = nodes
            .iter()
            .map(|node| {
                let round = self.next_round;
                self.next_round += 1;
                self.queries.insert(
                    (*node, round),
                    Query {
                        node: *node,
                        round,
                        cycle,
                        targets: targets.to_vec(),
                        deadline,
                    },
                );
                (
                    *node,
                    Poll {
                        round,
                        targets: targets.to_vec(),
                    },
                )
            })
            .collect();
        debug!(
            target: "avalanche.poller",
            cycle,
            targets = targets.len(),
            nodes = nodes.len(),
            "poll cycle planned"
        );
        PollCycle { cycle, polls }
    }

    pub fn take(&mut self, node: NodeId, round: RoundId) -> Option<Query> {
        self.queries.remove(&(node, round))
    }

    pub fn is_outstanding(&self, node: NodeId, round: RoundId) -> bool {
        self.queries.contains_key(&(node, round))
    }

    /// Removes and returns every query past its deadline.
    pub fn expire(&mut self, now: TimestampMs) -> Vec<Query> {
        let expired: Vec<(NodeId, RoundId)> = self
            .queries
            .iter()
            .filter(|(_, query)| query.deadline <= now)
            .map(|(key, _)| *key)
            .collect();
        let mut queries: Vec<Query> = expired
            .into_iter()
            .filter_map(|key| self.queries.remove(&key))
            .collect();
        queries.sort_by_key(|query| query.round);
        queries
    }

    /// Queries owed by a node that went away.
    pub fn forget_node(&mut self, node: NodeId) -> Vec<Query> {
        let keys: Vec<(NodeId, RoundId)> = self
            .queries
            .keys()
            .filter(|(owner, _)| *owner == node)
            .copied()
            .collect();
        keys.into_iter()
            .filter_map(|key| self.queries.remove(&key))
            .collect()
    }

    pub fn outstanding(&self) -> usize {
        self.queries.len()
    }

    pub fn last_round(&self) -> Option<RoundId> {
        self.next_round.checked_sub(1)
    }
}
