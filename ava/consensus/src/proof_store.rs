//! Registered, conflicting, orphan, dangling and invalidated proofs.
//!
//! Every outpoint is staked by at most one registered proof. A registered proof
//! is the favorite of its conflict set; contenders that lost (or are waiting for
//! the conflict cooldown) sit in the conflicting pool, which itself keeps at most
//! one proof per outpoint. Callers learn about weight changes through the ids
//! returned by each operation and update the peer set accordingly.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::interfaces::{StakeCheck, StakeVerifier};
use crate::messages::ProofVote;
use crate::proof::{Proof, ProofRejection};
use crate::recent::RecentMap;
use crate::types::{Amount, Outpoint, ProofId, TimestampMs};

const RECENTLY_INVALID_CAPACITY: usize = 10_000;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProofStoreError {
    #[error("unknown proof {0}")]
    UnknownProof(ProofId),
    #[error("proof conflicts with favorite {favorite}")]
    Conflict { favorite: ProofId },
    #[error("proof is invalid: {0}")]
    Invalid(ProofRejection),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictReason {
    CooldownNotElapsed,
    NotPreferred,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Now the favorite of its conflict set; `replaced` lost their weight.
    Registered { replaced: Vec<ProofId> },
    /// Staked outputs are missing or immature; retried on tip updates.
    Orphan,
    Invalid(ProofRejection),
    /// Lost against `favorite`. `tracked` tells whether the conflicting pool kept it.
    Rejected {
        favorite: ProofId,
        reason: ConflictReason,
        tracked: bool,
    },
    Duplicate,
    /// Purged for lack of attached nodes; needs a node before it comes back.
    Dangling,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProofStatus {
    Registered,
    Conflicting,
    Orphan,
    Dangling,
    Invalidated,
    Invalid,
    Unknown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RejectMode {
    /// Keep the proof around in the conflicting pool.
    Default,
    /// Forget the proof and remember it as invalid.
    Invalidate,
}

#[derive(Clone, Debug)]
pub struct RegisteredProof {
    pub proof: Arc<Proof>,
    pub registration_time: TimestampMs,
    pub registration_height: u64,
    pub next_conflict_time: TimestampMs,
    pub has_finalized: bool,
    unattached_since: Option<TimestampMs>,
}

impl RegisteredProof {
    pub fn stake(&self) -> Amount {
        self.proof.stake_amount()
    }
}

#[derive(Clone, Debug)]
struct PooledProof {
    proof: Arc<Proof>,
    cooldown_until: TimestampMs,
}

/// Result of removing a favorite: proofs that got their weight back.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Removal {
    pub removed: Vec<ProofId>,
    pub restored: Vec<ProofId>,
}

impl Removal {
    fn extend(&mut self, other: Removal) {
        self.removed.extend(other.removed);
        self.restored.extend(other.restored);
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Resolution {
    Normal,
    Reconsider,
    ForceAccept,
}

pub struct ProofStore {
    verifier: Arc<dyn StakeVerifier>,
    conflict_cooldown_ms: u64,
    dangling_timeout_ms: u64,
    max_orphans: usize,
    registered: HashMap<ProofId, RegisteredProof>,
    utxo_owner: HashMap<Outpoint, ProofId>,
    conflicting: HashMap<ProofId, PooledProof>,
    conflicting_utxos: HashMap<Outpoint, ProofId>,
    orphans: HashMap<ProofId, Arc<Proof>>,
    dangling: HashMap<ProofId, Arc<Proof>>,
    invalidated: HashMap<ProofId, Arc<Proof>>,
    recently_invalid: RecentMap<ProofId, ProofRejection>,
    total_stake: Amount,
}

impl ProofStore {
    pub fn new(
        verifier: Arc<dyn StakeVerifier>,
        conflict_cooldown_ms: u64,
        dangling_timeout_ms: u64,
        max_orphans: usize,
    ) -> Self {
        Self {
            verifier,
            conflict_cooldown_ms,
            dangling_timeout_ms,
            max_orphans: max_orphans.max(1),
            registered: HashMap::new(),
            utxo_owner: HashMap::new(),
            conflicting: HashMap::new(),
            conflicting_utxos: HashMap::new(),
            orphans: HashMap::new(),
            dangling: HashMap::new(),
            invalidated: HashMap::new(),
            recently_invalid: RecentMap::with_capacity(RECENTLY_INVALID_CAPACITY),
            total_stake: 0,
        }
    }

    /// Validates `proof` and resolves it against its conflict set.
    ///
    /// `allow_dangling` lets a previously purged proof back in, which the
    /// engine does when a node is waiting for it.
    pub fn register(
        &mut self,
        proof: Proof,
        now: TimestampMs,
        tip_height: u64,
        allow_dangling: bool,
    ) -> RegistrationOutcome {
        let id = proof.id();
        if self.registered.contains_key(&id) || self.orphans.contains_key(&id) {
            return RegistrationOutcome::Duplicate;
        }
        if self.invalidated.contains_key(&id) || self.recently_invalid.contains(&id) {
            return RegistrationOutcome::Invalid(ProofRejection::RecentlyInvalid);
        }
        if self.dangling.contains_key(&id) && !allow_dangling {
            return RegistrationOutcome::Dangling;
        }

        let proof = Arc::new(proof);
        if let Err(rejection) = self.check(&proof, now) {
            return match rejection {
                Check::Orphan => {
                    self.dangling.remove(&id);
                    self.insert_orphan(id, proof);
                    RegistrationOutcome::Orphan
                }
                Check::Invalid(rejection) => {
                    self.dangling.remove(&id);
                    self.remove_conflicting(&id);
                    self.mark_invalid(id, rejection.clone());
                    RegistrationOutcome::Invalid(rejection)
                }
            };
        }

        self.dangling.remove(&id);
        self.remove_conflicting(&id);
        self.resolve(proof, now, tip_height, Resolution::Normal)
    }

    /// Manually removes a proof from every pool and keeps it as history.
    pub fn invalidate(
        &mut self,
        id: &ProofId,
        now: TimestampMs,
        tip_height: u64,
    ) -> Result<Removal, ProofStoreError> {
        let (proof, removal) = if let Some(entry) = self.remove_registered(id) {
            let restored = self.pull_back(&entry.proof, now, tip_height);
            (
                entry.proof,
                Removal {
                    removed: vec![*id],
                    restored,
                },
            )
        } else if let Some(pooled) = self.remove_conflicting(id) {
            (pooled.proof, Removal::default())
        } else if let Some(proof) = self.orphans.remove(id) {
            (proof, Removal::default())
        } else if let Some(proof) = self.dangling.remove(id) {
            (proof, Removal::default())
        } else {
            return Err(ProofStoreError::UnknownProof(*id));
        };
        info!(target: "avalanche.proofs", proof = %id, "proof invalidated");
        self.invalidated.insert(*id, proof);
        Ok(removal)
    }

    /// Brings an invalidated or conflicting proof back, ignoring the cooldown
    /// but not the sequence ordering of its conflict set.
    pub fn reconsider(
        &mut self,
        id: &ProofId,
        now: TimestampMs,
        tip_height: u64,
    ) -> Result<RegistrationOutcome, ProofStoreError> {
        if self.registered.contains_key(id) {
            return Ok(RegistrationOutcome::Duplicate);
        }
        let proof = if let Some(proof) = self.invalidated.remove(id) {
            proof
        } else if let Some(pooled) = self.remove_conflicting(id) {
            pooled.proof
        } else {
            return Err(ProofStoreError::UnknownProof(*id));
        };
        self.recently_invalid.remove(id);

        match self.check(&proof, now) {
            Err(Check::Invalid(rejection)) => {
                self.invalidated.insert(*id, proof);
                return Err(ProofStoreError::Invalid(rejection));
            }
            Err(Check::Orphan) => {
                self.insert_orphan(*id, proof);
                return Ok(RegistrationOutcome::Orphan);
            }
            Ok(()) => {}
        }

        match self.resolve(proof, now, tip_height, Resolution::Reconsider) {
            RegistrationOutcome::Rejected { favorite, .. } => {
                Err(ProofStoreError::Conflict { favorite })
            }
            outcome => Ok(outcome),
        }
    }

    /// Makes a pooled proof the favorite regardless of sequence or cooldown.
    pub fn force_accept(
        &mut self,
        id: &ProofId,
        now: TimestampMs,
        tip_height: u64,
    ) -> Option<Vec<ProofId>> {
        let pooled = self.remove_conflicting(id)?;
        match self.resolve(pooled.proof, now, tip_height, Resolution::ForceAccept) {
            RegistrationOutcome::Registered { replaced } => Some(replaced),
            _ => None,
        }
    }

    pub fn reject(
        &mut self,
        id: &ProofId,
        mode: RejectMode,
        now: TimestampMs,
        tip_height: u64,
    ) -> Removal {
        if let Some(entry) = self.remove_registered(id) {
            let restored = self.pull_back(&entry.proof, now, tip_height);
            match mode {
                RejectMode::Default => {
                    self.add_conflicting(entry.proof, now + self.conflict_cooldown_ms);
                }
                RejectMode::Invalidate => {
                    self.mark_invalid(*id, ProofRejection::StakeRejected("rejected by vote".into()))
                }
            }
            debug!(target: "avalanche.proofs", proof = %id, ?mode, "favorite rejected");
            return Removal {
                removed: vec![*id],
                restored,
            };
        }
        if mode == RejectMode::Invalidate && self.remove_conflicting(id).is_some() {
            self.mark_invalid(*id, ProofRejection::StakeRejected("rejected by vote".into()));
        }
        Removal::default()
    }

    /// Re-verifies registered proofs and retries orphans after a tip change.
    pub fn rescan(&mut self, now: TimestampMs, tip_height: u64) -> (Removal, Vec<ProofId>) {
        let mut removal = Removal::default();
        let registered: Vec<ProofId> = self.registered.keys().copied().collect();
        for id in registered {
            let Some(proof) = self.registered.get(&id).map(|entry| entry.proof.clone()) else {
                continue;
            };
            match self.check(&proof, now) {
                Ok(()) => {}
                Err(failure) => {
                    if let Some(entry) = self.remove_registered(&id) {
                        match failure {
                            Check::Orphan => self.insert_orphan(id, entry.proof.clone()),
                            Check::Invalid(rejection) => self.mark_invalid(id, rejection),
                        }
                        removal.extend(Removal {
                            removed: vec![id],
                            restored: self.pull_back(&entry.proof, now, tip_height),
                        });
                    }
                }
            }
        }

        let pooled: Vec<ProofId> = self.conflicting.keys().copied().collect();
        for id in pooled {
            let Some(proof) = self.conflicting.get(&id).map(|entry| entry.proof.clone()) else {
                continue;
            };
            if let Err(Check::Invalid(rejection)) = self.check(&proof, now) {
                self.remove_conflicting(&id);
                self.mark_invalid(id, rejection);
            }
        }

        let mut promoted = Vec::new();
        let orphans: Vec<ProofId> = self.orphans.keys().copied().collect();
        for id in orphans {
            let Some(proof) = self.orphans.get(&id).cloned() else {
                continue;
            };
            match self.check(&proof, now) {
                Err(Check::Orphan) => {}
                Err(Check::Invalid(rejection)) => {
                    self.orphans.remove(&id);
                    self.mark_invalid(id, rejection);
                }
                Ok(()) => {
                    self.orphans.remove(&id);
                    if let RegistrationOutcome::Registered { replaced } =
                        self.resolve(proof, now, tip_height, Resolution::Normal)
                    {
                        promoted.push(id);
                        removal.removed.extend(replaced);
                    }
                }
            }
        }
        if !promoted.is_empty() {
            info!(target: "avalanche.proofs", count = promoted.len(), "orphan proofs registered");
        }
        (removal, promoted)
    }

    /// Moves favorites that had no attached node for the dangling timeout to
    /// the dangling pool.
    pub fn purge_dangling(&mut self, now: TimestampMs, tip_height: u64) -> Removal {
        let expired: Vec<ProofId> = self
            .registered
            .iter()
            .filter(|(_, entry)| {
                entry
                    .unattached_since
                    .is_some_and(|since| now >= since.saturating_add(self.dangling_timeout_ms))
            })
            .map(|(id, _)| *id)
            .collect();

        let mut removal = Removal::default();
        for id in expired {
            if let Some(entry) = self.remove_registered(&id) {
                let restored = self.pull_back(&entry.proof, now, tip_height);
                self.dangling.insert(id, entry.proof);
                removal.removed.push(id);
                removal.restored.extend(restored);
            }
        }
        if !removal.removed.is_empty() {
            info!(target: "avalanche.proofs", count = removal.removed.len(), "dangling proofs purged");
        }
        removal
    }

    /// Tracks whether any node currently backs the registered proof.
    pub fn mark_attached(&mut self, id: &ProofId, attached: bool, now: TimestampMs) {
        if let Some(entry) = self.registered.get_mut(id) {
            if attached {
                entry.unattached_since = None;
            } else if entry.unattached_since.is_none() {
                entry.unattached_since = Some(now);
            }
        }
    }

    pub fn set_finalized(&mut self, id: &ProofId) -> bool {
        match self.registered.get_mut(id) {
            Some(entry) => {
                entry.has_finalized = true;
                true
            }
            None => false,
        }
    }

    /// Restores bookkeeping persisted across restarts.
    pub fn restore_metadata(
        &mut self,
        id: &ProofId,
        has_finalized: bool,
        registration_time: TimestampMs,
        next_conflict_time: TimestampMs,
    ) {
        if let Some(entry) = self.registered.get_mut(id) {
            entry.has_finalized = has_finalized;
            entry.registration_time = registration_time;
            entry.next_conflict_time = entry.next_conflict_time.max(next_conflict_time);
        }
    }

    pub fn get(&self, id: &ProofId) -> Option<Arc<Proof>> {
        self.registered
            .get(id)
            .map(|entry| entry.proof.clone())
            .or_else(|| self.conflicting.get(id).map(|pooled| pooled.proof.clone()))
            .or_else(|| self.orphans.get(id).cloned())
            .or_else(|| self.dangling.get(id).cloned())
            .or_else(|| self.invalidated.get(id).cloned())
    }

    pub fn registered_entry(&self, id: &ProofId) -> Option<&RegisteredProof> {
        self.registered.get(id)
    }

    pub fn registered(&self) -> impl Iterator<Item = (&ProofId, &RegisteredProof)> {
        self.registered.iter()
    }

    pub fn is_registered(&self, id: &ProofId) -> bool {
        self.registered.contains_key(id)
    }

    pub fn is_dangling(&self, id: &ProofId) -> bool {
        self.dangling.contains_key(id)
    }

    pub fn status(&self, id: &ProofId) -> ProofStatus {
        if self.registered.contains_key(id) {
            ProofStatus::Registered
        } else if self.conflicting.contains_key(id) {
            ProofStatus::Conflicting
        } else if self.orphans.contains_key(id) {
            ProofStatus::Orphan
        } else if self.dangling.contains_key(id) {
            ProofStatus::Dangling
        } else if self.invalidated.contains_key(id) {
            ProofStatus::Invalidated
        } else if self.recently_invalid.contains(id) {
            ProofStatus::Invalid
        } else {
            ProofStatus::Unknown
        }
    }

    /// Our own answer when a peer polls this proof.
    pub fn local_vote(&self, id: &ProofId) -> ProofVote {
        match self.status(id) {
            ProofStatus::Registered => ProofVote::Active,
            ProofStatus::Conflicting | ProofStatus::Orphan | ProofStatus::Dangling => {
                ProofVote::Rejected
            }
            ProofStatus::Invalidated | ProofStatus::Invalid => ProofVote::Invalid,
            ProofStatus::Unknown => ProofVote::Unknown,
        }
    }

    /// Registered proofs poll freely unless they have rivals in the
    /// conflicting pool, in which case the conflict-set cooldown applies to
    /// both sides.
    pub fn is_poll_eligible(&self, id: &ProofId, now: TimestampMs) -> bool {
        if let Some(entry) = self.registered.get(id) {
            let contested = entry
                .proof
                .outpoints()
                .any(|outpoint| self.conflicting_utxos.contains_key(outpoint));
            return !contested || now >= entry.next_conflict_time;
        }
        self.conflicting
            .get(id)
            .is_some_and(|pooled| now >= pooled.cooldown_until)
    }

    pub fn favorite_for(&self, outpoint: &Outpoint) -> Option<ProofId> {
        self.utxo_owner.get(outpoint).copied()
    }

    pub fn total_stake(&self) -> Amount {
        self.total_stake
    }

    pub fn stake_of(&self, id: &ProofId) -> Option<Amount> {
        self.registered.get(id).map(RegisteredProof::stake)
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }

    pub fn conflicting_count(&self) -> usize {
        self.conflicting.len()
    }

    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    fn check(&self, proof: &Proof, now: TimestampMs) -> Result<(), Check> {
        proof
            .verify_structure(now / 1_000)
            .map_err(Check::Invalid)?;
        match self.verifier.check(proof) {
            StakeCheck::Valid => Ok(()),
            StakeCheck::Missing | StakeCheck::Immature => Err(Check::Orphan),
            StakeCheck::Invalid(reason) => Err(Check::Invalid(ProofRejection::StakeRejected(reason))),
        }
    }

    fn resolve(
        &mut self,
        proof: Arc<Proof>,
        now: TimestampMs,
        tip_height: u64,
        resolution: Resolution,
    ) -> RegistrationOutcome {
        let id = proof.id();
        let rivals: BTreeSet<ProofId> = proof
            .outpoints()
            .filter_map(|outpoint| self.utxo_owner.get(outpoint).copied())
            .collect();

        if rivals.is_empty() {
            self.insert_registered(proof, now, tip_height);
            info!(target: "avalanche.proofs", proof = %id, "proof registered");
            return RegistrationOutcome::Registered {
                replaced: Vec::new(),
            };
        }

        let rival_entries: Vec<&RegisteredProof> = rivals
            .iter()
            .filter_map(|rival| self.registered.get(rival))
            .collect();
        let cooldown_until = rival_entries
            .iter()
            .map(|entry| entry.next_conflict_time)
            .max()
            .unwrap_or_default();
        let preferred = rival_entries
            .iter()
            .all(|entry| proof.sequence > entry.proof.sequence);
        let favorite = rival_entries
            .iter()
            .max_by_key(|entry| entry.proof.sequence)
            .map(|entry| entry.proof.id())
            .unwrap_or(id);

        if resolution == Resolution::Normal {
            let rearmed = now.saturating_add(self.conflict_cooldown_ms);
            for rival in &rivals {
                if let Some(entry) = self.registered.get_mut(rival) {
                    entry.next_conflict_time = entry.next_conflict_time.max(rearmed);
                }
            }
            if now < cooldown_until {
                let tracked = self.add_conflicting(proof, cooldown_until.max(rearmed));
                debug!(
                    target: "avalanche.proofs",
                    proof = %id,
                    %favorite,
                    "conflicting proof arrived before cooldown elapsed"
                );
                return RegistrationOutcome::Rejected {
                    favorite,
                    reason: ConflictReason::CooldownNotElapsed,
                    tracked,
                };
            }
        }

        if resolution == Resolution::ForceAccept || preferred {
            let mut replaced = Vec::with_capacity(rivals.len());
            for rival in rivals {
                if let Some(entry) = self.remove_registered(&rival) {
                    self.add_conflicting(entry.proof, now + self.conflict_cooldown_ms);
                    replaced.push(rival);
                }
            }
            self.insert_registered(proof, now, tip_height);
            info!(
                target: "avalanche.proofs",
                proof = %id,
                replaced = replaced.len(),
                "proof replaced its conflict set favorite"
            );
            return RegistrationOutcome::Registered { replaced };
        }

        let tracked = self.add_conflicting(proof, now + self.conflict_cooldown_ms);
        debug!(target: "avalanche.proofs", proof = %id, %favorite, tracked, "proof not preferred");
        RegistrationOutcome::Rejected {
            favorite,
            reason: ConflictReason::NotPreferred,
            tracked,
        }
    }

    fn insert_registered(&mut self, proof: Arc<Proof>, now: TimestampMs, tip_height: u64) {
        let id = proof.id();
        for outpoint in proof.outpoints() {
            self.utxo_owner.insert(*outpoint, id);
        }
        self.total_stake = self.total_stake.saturating_add(proof.stake_amount());
        self.registered.insert(
            id,
            RegisteredProof {
                proof,
                registration_time: now,
                registration_height: tip_height,
                next_conflict_time: now.saturating_add(self.conflict_cooldown_ms),
                has_finalized: false,
                unattached_since: Some(now),
            },
        );
    }

    fn remove_registered(&mut self, id: &ProofId) -> Option<RegisteredProof> {
        let entry = self.registered.remove(id)?;
        for outpoint in entry.proof.outpoints() {
            if self.utxo_owner.get(outpoint) == Some(id) {
                self.utxo_owner.remove(outpoint);
            }
        }
        self.total_stake = self.total_stake.saturating_sub(entry.stake());
        Some(entry)
    }

    /// Keeps the proof if it beats every pooled proof sharing an outpoint.
    fn add_conflicting(&mut self, proof: Arc<Proof>, cooldown_until: TimestampMs) -> bool {
        let id = proof.id();
        let rivals: BTreeSet<ProofId> = proof
            .outpoints()
            .filter_map(|outpoint| self.conflicting_utxos.get(outpoint).copied())
            .filter(|rival| *rival != id)
            .collect();
        let beaten = rivals.iter().all(|rival| {
            self.conflicting
                .get(rival)
                .map_or(true, |pooled| proof.sequence > pooled.proof.sequence)
        });
        if !beaten {
            return false;
        }
        for rival in rivals {
            self.remove_conflicting(&rival);
        }
        for outpoint in proof.outpoints() {
            self.conflicting_utxos.insert(*outpoint, id);
        }
        self.conflicting.insert(
            id,
            PooledProof {
                proof,
                cooldown_until,
            },
        );
        true
    }

    fn remove_conflicting(&mut self, id: &ProofId) -> Option<PooledProof> {
        let pooled = self.conflicting.remove(id)?;
        for outpoint in pooled.proof.outpoints() {
            if self.conflicting_utxos.get(outpoint) == Some(id) {
                self.conflicting_utxos.remove(outpoint);
            }
        }
        Some(pooled)
    }

    /// Registers pooled proofs whose outpoints were freed by `released`.
    fn pull_back(&mut self, released: &Proof, now: TimestampMs, tip_height: u64) -> Vec<ProofId> {
        let released_id = released.id();
        let unique: HashMap<ProofId, Arc<Proof>> = released
            .outpoints()
            .filter_map(|outpoint| self.conflicting_utxos.get(outpoint))
            .filter(|candidate| **candidate != released_id)
            .filter_map(|candidate| {
                self.conflicting
                    .get(candidate)
                    .map(|pooled| (*candidate, pooled.proof.clone()))
            })
            .collect();
        let mut candidates: Vec<Arc<Proof>> = unique.into_values().collect();
        candidates.sort_by(|a, b| b.sequence.cmp(&a.sequence).then_with(|| a.id().cmp(&b.id())));

        let mut restored = Vec::new();
        for proof in candidates {
            let id = proof.id();
            let free = proof
                .outpoints()
                .all(|outpoint| !self.utxo_owner.contains_key(outpoint));
            if !free || self.check(&proof, now).is_err() {
                continue;
            }
            self.remove_conflicting(&id);
            self.insert_registered(proof, now, tip_height);
            restored.push(id);
        }
        if !restored.is_empty() {
            debug!(target: "avalanche.proofs", count = restored.len(), "conflicting proofs pulled back");
        }
        restored
    }

    fn insert_orphan(&mut self, id: ProofId, proof: Arc<Proof>) {
        if self.orphans.len() >= self.max_orphans {
            let weakest = self
                .orphans
                .iter()
                .min_by_key(|(_, orphan)| orphan.stake_amount())
                .map(|(orphan_id, orphan)| (*orphan_id, orphan.stake_amount()));
            match weakest {
                Some((weakest_id, stake)) if stake < proof.stake_amount() => {
                    self.orphans.remove(&weakest_id);
                }
                _ => {
                    warn!(target: "avalanche.proofs", proof = %id, "orphan pool full, dropping proof");
                    return;
                }
            }
        }
        self.orphans.insert(id, proof);
    }

    fn mark_invalid(&mut self, id: ProofId, rejection: ProofRejection) {
        warn!(target: "avalanche.proofs", proof = %id, %rejection, "proof rejected");
        self.recently_invalid.insert(id, rejection);
    }
}

enum Check {
    Orphan,
    Invalid(ProofRejection),
}
