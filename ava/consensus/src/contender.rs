//! Staking reward contenders: one per (block, proof) pair.
//!
//! The cache answers contender polls and picks the local reward winner. A
//! block's contender set is built on first use and then kept until cleanup
//! drops its height.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::interfaces::BlockInfo;
use crate::messages::{ContenderVote, Polarity};
use crate::types::{Amount, BlockHash, ProofId, StakeContenderId, TimestampMs};

/// Registered proof as seen by winner selection.
#[derive(Clone, Debug)]
pub struct Candidate {
    pub proofid: ProofId,
    pub stake: Amount,
    pub payout_script: Vec<u8>,
    pub registration_time: TimestampMs,
    pub registration_height: u64,
    pub has_finalized: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContenderEntry {
    pub prev_block: BlockHash,
    pub height: u64,
    pub proofid: ProofId,
    #[serde(with = "hex::serde")]
    pub payout_script: Vec<u8>,
    pub stake: Amount,
    pub registration_time: TimestampMs,
    pub has_finalized: bool,
    pub accepted: bool,
    pub in_winner_set: bool,
    pub rank: f64,
}

#[derive(Clone, Debug, Default)]
struct BlockContenders {
    height: u64,
    /// Unix seconds.
    block_time: u64,
    contenders: BTreeSet<StakeContenderId>,
    winners_computed: bool,
    manual_winners: Vec<Vec<u8>>,
}

/// `(256 - log2(hash)) / stake`; the lowest rank wins.
pub fn reward_rank(id: &StakeContenderId, stake: Amount) -> f64 {
    if stake == 0 {
        return f64::INFINITY;
    }
    let value = id
        .as_bytes()
        .iter()
        .rev()
        .fold(0f64, |acc, byte| acc * 256.0 + f64::from(*byte));
    let log2 = if value > 0.0 { value.log2() } else { 0.0 };
    (256.0 - log2) / stake as f64
}

fn by_rank(a: (&StakeContenderId, &ContenderEntry), b: (&StakeContenderId, &ContenderEntry)) -> Ordering {
    a.1.rank
        .total_cmp(&b.1.rank)
        .then_with(|| a.0.cmp(b.0))
        .then_with(|| a.1.proofid.cmp(&b.1.proofid))
}

#[derive(Debug, Default)]
pub struct StakeContenderCache {
    entries: HashMap<StakeContenderId, ContenderEntry>,
    blocks: HashMap<BlockHash, BlockContenders>,
}

impl StakeContenderCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the contender already exists, after catching up
    /// on its proof's finalization.
    pub fn add(&mut self, block: &BlockInfo, candidate: &Candidate) -> bool {
        let id = StakeContenderId::derive(&block.hash, &candidate.proofid);
        if let Some(entry) = self.entries.get_mut(&id) {
            entry.has_finalized |= candidate.has_finalized;
            return false;
        }
        let slot = self.blocks.entry(block.hash).or_insert_with(|| BlockContenders {
            height: block.height,
            block_time: block.time,
            ..BlockContenders::default()
        });
        slot.contenders.insert(id);
        self.entries.insert(
            id,
            ContenderEntry {
                prev_block: block.hash,
                height: block.height,
                proofid: candidate.proofid,
                payout_script: candidate.payout_script.clone(),
                stake: candidate.stake,
                registration_time: candidate.registration_time,
                has_finalized: candidate.has_finalized,
                accepted: false,
                in_winner_set: false,
                rank: reward_rank(&id, candidate.stake),
            },
        );
        true
    }

    pub fn has_block(&self, block: &BlockHash) -> bool {
        self.blocks.contains_key(block)
    }

    pub fn has_winners(&self, block: &BlockHash) -> bool {
        self.blocks
            .get(block)
            .is_some_and(|slot| slot.winners_computed)
    }

    /// Materializes contenders for every candidate first seen at or before
    /// the block's height.
    pub fn build_for_block<'a, I>(&mut self, block: &BlockInfo, candidates: I) -> usize
    where
        I: IntoIterator<Item = &'a Candidate>,
    {
        let mut added = 0;
        for candidate in candidates {
            if candidate.registration_height <= block.height && self.add(block, candidate) {
                added += 1;
            }
        }
        self.blocks.entry(block.hash).or_insert_with(|| BlockContenders {
            height: block.height,
            block_time: block.time,
            ..BlockContenders::default()
        });
        debug!(target: "avalanche.contenders", block = %block.hash, added, "contenders built");
        added
    }

    /// Carries the previous tip's contenders over to a new tip.
    pub fn promote_to_block(&mut self, from: &BlockHash, to: &BlockInfo) -> usize {
        let carried: Vec<Candidate> = self
            .blocks
            .get(from)
            .map(|slot| {
                slot.contenders
                    .iter()
                    .filter_map(|id| self.entries.get(id))
                    .map(|entry| Candidate {
                        proofid: entry.proofid,
                        stake: entry.stake,
                        payout_script: entry.payout_script.clone(),
                        registration_time: entry.registration_time,
                        registration_height: entry.height,
                        has_finalized: entry.has_finalized,
                    })
                    .collect()
            })
            .unwrap_or_default();
        carried
            .iter()
            .filter(|candidate| self.add(to, candidate))
            .count()
    }

    /// Picks the best-ranked eligible contender as the local winner. Returns
    /// `false` while no contender is eligible yet.
    pub fn compute_local_winners(
        &mut self,
        block: &BlockHash,
        now_secs: u64,
        registration_delay_secs: u64,
    ) -> bool {
        let Some(slot) = self.blocks.get(block) else {
            return false;
        };
        if slot.winners_computed {
            return true;
        }
        let cutoff = slot.block_time.min(now_secs);
        let winner = slot
            .contenders
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| (id, entry)))
            .filter(|(_, entry)| {
                entry.has_finalized
                    && (entry.registration_time / 1_000).saturating_add(registration_delay_secs)
                        <= cutoff
            })
            .min_by(|a, b| by_rank(*a, *b))
            .map(|(id, _)| *id);

        let Some(winner) = winner else {
            return false;
        };
        if let Some(entry) = self.entries.get_mut(&winner) {
            entry.accepted = true;
            entry.in_winner_set = true;
        }
        if let Some(slot) = self.blocks.get_mut(block) {
            slot.winners_computed = true;
        }
        debug!(target: "avalanche.contenders", %block, contender = %winner, "local reward winner selected");
        true
    }

    pub fn vote_status(&self, id: &StakeContenderId) -> ContenderVote {
        let Some(entry) = self.entries.get(id) else {
            return ContenderVote::Unknown;
        };
        let computed = self
            .blocks
            .get(&entry.prev_block)
            .is_some_and(|slot| slot.winners_computed);
        if !computed {
            ContenderVote::Pending
        } else if entry.accepted || entry.in_winner_set {
            ContenderVote::Accepted
        } else {
            ContenderVote::Invalid
        }
    }

    pub fn local_polarity(&self, id: &StakeContenderId) -> Option<Polarity> {
        self.entries
            .get(id)
            .map(|entry| Polarity::from_accepted(entry.accepted || entry.in_winner_set))
    }

    pub fn contains(&self, id: &StakeContenderId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn accept(&mut self, id: &StakeContenderId) -> bool {
        self.update(id, |entry| entry.accepted = true)
    }

    pub fn reject(&mut self, id: &StakeContenderId) -> bool {
        self.update(id, |entry| entry.accepted = false)
    }

    pub fn finalize(&mut self, id: &StakeContenderId) -> bool {
        self.update(id, |entry| {
            entry.accepted = true;
            entry.in_winner_set = true;
        })
    }

    pub fn invalidate(&mut self, id: &StakeContenderId) -> bool {
        self.update(id, |entry| {
            entry.accepted = false;
            entry.in_winner_set = false;
        })
    }

    pub fn set_manual_winners(&mut self, block: &BlockInfo, payout_scripts: Vec<Vec<u8>>) {
        let slot = self.blocks.entry(block.hash).or_insert_with(|| BlockContenders {
            height: block.height,
            block_time: block.time,
            ..BlockContenders::default()
        });
        slot.manual_winners = payout_scripts;
    }

    /// Manual winners first, then winner-set contenders by rank.
    pub fn winners(&self, block: &BlockHash) -> Vec<Vec<u8>> {
        let Some(slot) = self.blocks.get(block) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&StakeContenderId, &ContenderEntry)> = slot
            .contenders
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| (id, entry)))
            .filter(|(_, entry)| entry.in_winner_set)
            .collect();
        ranked.sort_by(|a, b| by_rank(*a, *b));

        let mut winners = slot.manual_winners.clone();
        for (_, entry) in ranked {
            if !winners.contains(&entry.payout_script) {
                winners.push(entry.payout_script.clone());
            }
        }
        winners
    }

    /// Best-ranked contenders of a block whose local winners are known.
    pub fn pollable(&self, block: &BlockHash, max: usize) -> Vec<StakeContenderId> {
        let Some(slot) = self.blocks.get(block).filter(|slot| slot.winners_computed) else {
            return Vec::new();
        };
        let mut ranked: Vec<(&StakeContenderId, &ContenderEntry)> = slot
            .contenders
            .iter()
            .filter_map(|id| self.entries.get(id).map(|entry| (id, entry)))
            .collect();
        ranked.sort_by(|a, b| by_rank(*a, *b));
        ranked.into_iter().take(max).map(|(id, _)| *id).collect()
    }

    /// Drops every block below `min_height` with its contenders.
    pub fn cleanup(&mut self, min_height: u64) -> usize {
        let expired: Vec<BlockHash> = self
            .blocks
            .iter()
            .filter(|(_, slot)| slot.height < min_height)
            .map(|(hash, _)| *hash)
            .collect();
        let mut removed = 0;
        for hash in expired {
            if let Some(slot) = self.blocks.remove(&hash) {
                for id in slot.contenders {
                    removed += usize::from(self.entries.remove(&id).is_some());
                }
            }
        }
        removed
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.blocks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    fn update<F: FnOnce(&mut ContenderEntry)>(&mut self, id: &StakeContenderId, apply: F) -> bool {
        match self.entries.get_mut(id) {
            Some(entry) => {
                apply(entry);
                true
            }
            None => false,
        }
    }
}
