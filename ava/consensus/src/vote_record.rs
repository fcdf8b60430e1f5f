use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::messages::Polarity;
use crate::types::{NodeId, TimestampMs};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "polarity", rename_all = "snake_case")]
pub enum RecordStatus {
    Pending,
    Finalized(Polarity),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Enough counted votes, all in one direction.
    Decisive(Polarity),
    Inconclusive,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    DirectionChanged(Polarity),
    Finalized(Polarity),
    Stale,
}

#[derive(Clone, Debug)]
struct OpenRound {
    cycle: u64,
    awaiting: usize,
    accepts: usize,
    rejects: usize,
    voters: HashSet<NodeId>,
}

impl OpenRound {
    fn outcome(&self, min_votes: usize) -> RoundOutcome {
        let counted = self.accepts + self.rejects;
        if counted < min_votes {
            return RoundOutcome::Inconclusive;
        }
        match (self.accepts, self.rejects) {
            (_, 0) => RoundOutcome::Decisive(Polarity::Accept),
            (0, _) => RoundOutcome::Decisive(Polarity::Reject),
            _ => RoundOutcome::Inconclusive,
        }
    }
}

/// Confidence state for one target.
#[derive(Clone, Debug)]
pub struct VoteRecord {
    direction: Polarity,
    confidence: u32,
    status: RecordStatus,
    rounds: u32,
    last_poll: Option<TimestampMs>,
    last_response: Option<TimestampMs>,
    open: Option<OpenRound>,
}

impl VoteRecord {
    /// Starts leaning towards our own view of the target.
    pub fn new(local: Polarity) -> Self {
        Self {
            direction: local,
            confidence: 0,
            status: RecordStatus::Pending,
            rounds: 0,
            last_poll: None,
            last_response: None,
            open: None,
        }
    }

    pub fn direction(&self) -> Polarity {
        self.direction
    }

    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    pub fn status(&self) -> RecordStatus {
        self.status
    }

    pub fn last_poll(&self) -> Option<TimestampMs> {
        self.last_poll
    }

    pub fn last_response(&self) -> Option<TimestampMs> {
        self.last_response
    }

    pub fn is_finalized(&self) -> bool {
        matches!(self.status, RecordStatus::Finalized(_))
    }

    pub fn has_open_round(&self) -> bool {
        self.open.is_some()
    }

    pub fn open_round(&mut self, cycle: u64, expected: usize, now: TimestampMs) {
        self.last_poll = Some(now);
        self.open = Some(OpenRound {
            cycle,
            awaiting: expected,
            accepts: 0,
            rejects: 0,
            voters: HashSet::new(),
        });
    }

    /// Counts one node's answer. Returns the round outcome once every polled
    /// node is accounted for.
    pub fn record_vote(
        &mut self,
        cycle: u64,
        node: NodeId,
        vote: Option<Polarity>,
        now: TimestampMs,
        min_votes: usize,
    ) -> Option<RoundOutcome> {
        let round = self.open.as_mut().filter(|round| round.cycle == cycle)?;
        if !round.voters.insert(node) {
            return None;
        }
        match vote {
            Some(Polarity::Accept) => round.accepts += 1,
            Some(Polarity::Reject) => round.rejects += 1,
            None => {}
        }
        round.awaiting = round.awaiting.saturating_sub(1);
        self.last_response = Some(now);
        self.close_if_complete(min_votes)
    }

    /// Accounts for a node that timed out or sent garbage.
    pub fn record_missing(&mut self, cycle: u64, min_votes: usize) -> Option<RoundOutcome> {
        let round = self.open.as_mut().filter(|round| round.cycle == cycle)?;
        round.awaiting = round.awaiting.saturating_sub(1);
        self.close_if_complete(min_votes)
    }

    /// Folds a closed round into the confidence counter.
    pub fn apply(&mut self, outcome: RoundOutcome, threshold: u32, stale_after: u32) -> Option<Transition> {
        if self.is_finalized() {
            return None;
        }
        self.rounds = self.rounds.saturating_add(1);
        let transition = match outcome {
            RoundOutcome::Inconclusive => None,
            RoundOutcome::Decisive(polarity) if polarity == self.direction => {
                self.confidence = self.confidence.saturating_add(1);
                if self.confidence >= threshold {
                    self.status = RecordStatus::Finalized(polarity);
                    return Some(Transition::Finalized(polarity));
                }
                None
            }
            RoundOutcome::Decisive(polarity) => {
                self.direction = polarity;
                self.confidence = 0;
                Some(Transition::DirectionChanged(polarity))
            }
        };
        if self.rounds >= stale_after {
            return Some(Transition::Stale);
        }
        transition
    }

    fn close_if_complete(&mut self, min_votes: usize) -> Option<RoundOutcome> {
        if self.open.as_ref().is_some_and(|round| round.awaiting == 0) {
            return self.open.take().map(|round| round.outcome(min_votes));
        }
        None
    }
}
