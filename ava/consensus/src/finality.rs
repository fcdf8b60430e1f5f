use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::messages::{Polarity, Target};
use crate::recent::RecentMap;
use crate::types::{NodeId, TimestampMs};
use crate::vote_record::{RoundOutcome, Transition, VoteRecord};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteStatus {
    /// Network leaning flipped to accept.
    Accepted,
    /// Network leaning flipped to reject.
    Rejected,
    Finalized,
    Invalidated,
    /// Polled for too long without converging; dropped.
    Stale,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoteUpdate {
    pub target: Target,
    pub status: VoteStatus,
}

impl VoteUpdate {
    pub fn new(target: Target, status: VoteStatus) -> Self {
        Self { target, status }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct FinalityParams {
    pub confidence_threshold: u32,
    pub min_round_votes: usize,
    pub stale_round_threshold: u32,
    pub finalized_filter_size: usize,
}

/// Vote records keyed by target, plus a filter of recently finalized ones.
pub struct FinalityTable {
    params: FinalityParams,
    records: BTreeMap<Target, VoteRecord>,
    finalized: RecentMap<Target, Polarity>,
}

impl FinalityTable {
    pub fn new(params: FinalityParams) -> Self {
        Self {
            params,
            records: BTreeMap::new(),
            finalized: RecentMap::with_capacity(params.finalized_filter_size),
        }
    }

    /// Starts tracking `target`. No-op when it is tracked or already final.
    pub fn add(&mut self, target: Target, local: Polarity) -> bool {
        if self.records.contains_key(&target) || self.finalized.contains(&target) {
            return false;
        }
        let record = VoteRecord::new(local);
        self.records.insert(target, record);
        true
    }

    /// Forgets any prior outcome and starts a fresh record at zero confidence.
    pub fn reset(&mut self, target: Target, local: Polarity) {
        self.finalized.remove(&target);
        let record = VoteRecord::new(local);
        self.records.insert(target, record);
        debug!(target: "avalanche.finality", item = %target, "vote record reset");
    }

    pub fn remove(&mut self, target: &Target) -> bool {
        self.records.remove(target).is_some()
    }

    pub fn contains(&self, target: &Target) -> bool {
        self.records.contains_key(target)
    }

    pub fn record(&self, target: &Target) -> Option<&VoteRecord> {
        self.records.get(target)
    }

    pub fn finalized(&self, target: &Target) -> Option<Polarity> {
        self.finalized.get(target).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn targets(&self) -> impl Iterator<Item = &Target> {
        self.records.keys()
    }

    /// Targets waiting for a new round, in target order.
    pub fn pollable<F: FnMut(&Target) -> bool>(&self, limit: usize, mut eligible: F) -> Vec<Target> {
        self.records
            .iter()
            .filter(|(_, record)| !record.has_open_round() && !record.is_finalized())
            .map(|(target, _)| *target)
            .filter(|target| eligible(target))
            .take(limit)
            .collect()
    }

    pub fn open_round(&mut self, targets: &[Target], cycle: u64, expected: usize, now: TimestampMs) {
        for target in targets {
            if let Some(record) = self.records.get_mut(target) {
                record.open_round(cycle, expected, now);
            }
        }
    }

    pub fn register_vote(
        &mut self,
        target: Target,
        cycle: u64,
        node: NodeId,
        vote: Option<Polarity>,
        now: TimestampMs,
    ) -> Option<VoteUpdate> {
        let min_votes = self.params.min_round_votes;
        let outcome = self
            .records
            .get_mut(&target)?
            .record_vote(cycle, node, vote, now, min_votes)?;
        self.finish_round(target, outcome)
    }

    pub fn register_missing(&mut self, target: Target, cycle: u64) -> Option<VoteUpdate> {
        let min_votes = self.params.min_round_votes;
        let outcome = self
            .records
            .get_mut(&target)?
            .record_missing(cycle, min_votes)?;
        self.finish_round(target, outcome)
    }

    fn finish_round(&mut self, target: Target, outcome: RoundOutcome) -> Option<VoteUpdate> {
        let record = self.records.get_mut(&target)?;
        let transition = record.apply(
            outcome,
            self.params.confidence_threshold,
            self.params.stale_round_threshold,
        )?;
        let status = match transition {
            Transition::DirectionChanged(Polarity::Accept) => VoteStatus::Accepted,
            Transition::DirectionChanged(Polarity::Reject) => VoteStatus::Rejected,
            Transition::Finalized(polarity) => {
                self.records.remove(&target);
                self.finalized.insert(target, polarity);
                info!(target: "avalanche.finality", item = %target, ?polarity, "target finalized");
                match polarity {
                    Polarity::Accept => VoteStatus::Finalized,
                    Polarity::Reject => VoteStatus::Invalidated,
                }
            }
            Transition::Stale => {
                self.records.remove(&target);
                debug!(target: "avalanche.finality", item = %target, "vote record went stale");
                VoteStatus::Stale
            }
        };
        Some(VoteUpdate::new(target, status))
    }
}
