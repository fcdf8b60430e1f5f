//! The finality engine: every store behind one single-writer owner.
//!
//! Collaborators are consulted through traits, and side effects on the chain
//! are never applied directly: they leave as [`VoteUpdate`]s collected with
//! [`Engine::take_updates`].

use std::collections::HashSet;
use std::mem;
use std::sync::Arc;

use ed25519_dalek::{SigningKey, VerifyingKey};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::contender::{Candidate, StakeContenderCache};
use crate::finality::{FinalityParams, FinalityTable, VoteStatus, VoteUpdate};
use crate::interfaces::{
    BlockInfo, BlockStatus, ChainView, MempoolView, PeerTransport, StakeVerifier, TxStatus,
};
use crate::messages::{
    BlockVote, Poll, Polarity, Response, Target, TargetVote, TxVote, Vote, VoteCode,
    MAX_ELEMENT_POLL,
};
use crate::peers::{AttachOutcome, PeerSet};
use crate::poller::{Poller, Query};
use crate::proof::Proof;
use crate::proof_store::{ProofStatus, ProofStore, RegistrationOutcome, RejectMode, Removal};
use crate::quorum::{QuorumStatus, QuorumTracker};
use crate::response::{self, ResponseError};
use crate::types::{Amount, BlockHash, NodeId, ProofId, StakeContenderId, TimestampMs, TxId};
use crate::AvalancheResult;

const OVERSIZED_POLL_SCORE: u32 = 20;

/// Everything outside the engine that it needs to talk to.
#[derive(Clone)]
pub struct Collaborators {
    pub chain: Arc<dyn ChainView>,
    pub verifier: Arc<dyn StakeVerifier>,
    pub transport: Arc<dyn PeerTransport>,
    pub mempool: Option<Arc<dyn MempoolView>>,
}

/// Answer to the proof status query.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProofReport {
    pub proofid: ProofId,
    pub status: ProofStatus,
    pub finalized: bool,
    pub stake: Option<Amount>,
    pub attached_nodes: Vec<NodeId>,
    pub confidence: Option<u32>,
}

/// Registered proof state worth keeping across restarts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PersistedProof {
    pub proof: Proof,
    pub has_finalized: bool,
    pub registration_time: TimestampMs,
    pub next_conflict_time: TimestampMs,
}

pub struct Engine {
    config: EngineConfig,
    clock: Arc<dyn Clock>,
    chain: Arc<dyn ChainView>,
    transport: Arc<dyn PeerTransport>,
    mempool: Option<Arc<dyn MempoolView>>,
    session_key: SigningKey,
    proofs: ProofStore,
    peers: PeerSet,
    quorum: QuorumTracker,
    finality: FinalityTable,
    poller: Poller,
    contenders: StakeContenderCache,
    rng: StdRng,
    last_tip: Option<BlockInfo>,
    finalization_tip: Option<BlockInfo>,
    invalid_blocks: HashSet<BlockHash>,
    updates: Vec<VoteUpdate>,
    running: bool,
}

impl Engine {
    pub fn new(
        config: EngineConfig,
        collaborators: Collaborators,
        clock: Arc<dyn Clock>,
        session_key: SigningKey,
    ) -> AvalancheResult<Self> {
        config.validate()?;
        let rng = match config.rng_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let proofs = ProofStore::new(
            collaborators.verifier,
            config.conflicting_proof_cooldown_ms(),
            config.dangling_timeout_ms(),
            config.max_orphan_proofs,
        );
        let quorum = QuorumTracker::new(
            config.min_node_count,
            config.min_quorum_stake,
            config.min_connected_stake_ratio,
        );
        let finality = FinalityTable::new(FinalityParams {
            confidence_threshold: config.confidence_threshold,
            min_round_votes: config.min_round_votes,
            stale_round_threshold: config.stale_round_threshold,
            finalized_filter_size: config.finalized_filter_size,
        });
        let poller = Poller::new(config.query_timeout_ms);

        Ok(Self {
            clock,
            chain: collaborators.chain,
            transport: collaborators.transport,
            mempool: collaborators.mempool,
            session_key,
            proofs,
            peers: PeerSet::new(),
            quorum,
            finality,
            poller,
            contenders: StakeContenderCache::new(),
            rng,
            last_tip: None,
            finalization_tip: None,
            invalid_blocks: HashSet::new(),
            updates: Vec::new(),
            running: false,
            config,
        })
    }

    pub fn start(&mut self) {
        if !self.running {
            info!(target: "avalanche.engine", "engine started");
            self.running = true;
            self.updated_block_tip();
        }
    }

    /// Stops polling and abandons every outstanding query.
    pub fn stop(&mut self) {
        if self.running {
            self.running = false;
            let abandoned = self.poller.expire(TimestampMs::MAX);
            info!(target: "avalanche.engine", abandoned = abandoned.len(), "engine stopped");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn session_key(&self) -> VerifyingKey {
        self.session_key.verifying_key()
    }

    pub fn now(&self) -> TimestampMs {
        self.clock.now_ms()
    }

    /// Vote updates produced since the last call, in emission order.
    pub fn take_updates(&mut self) -> Vec<VoteUpdate> {
        mem::take(&mut self.updates)
    }

    pub fn register_proof(&mut self, proof: Proof) -> RegistrationOutcome {
        let now = self.now();
        let id = proof.id();
        let allow_dangling = self.peers.has_pending_for(&id);
        let outcome = self
            .proofs
            .register(proof, now, self.tip_height(), allow_dangling);
        if let RegistrationOutcome::Registered { replaced } = &outcome {
            self.apply_removal(Removal {
                removed: replaced.clone(),
                restored: Vec::new(),
            });
            self.on_proof_registered(id);
        } else if let RegistrationOutcome::Rejected { tracked: true, .. } = &outcome {
            self.sync_proof_target(id);
        }
        debug!(target: "avalanche.engine", proof = %id, ?outcome, "proof offered");
        outcome
    }

    pub fn invalidate_proof(&mut self, id: &ProofId) -> AvalancheResult<()> {
        let removal = self.proofs.invalidate(id, self.now(), self.tip_height())?;
        self.apply_removal(removal);
        self.finality.remove(&Target::Proof(*id));
        Ok(())
    }

    pub fn reconsider_proof(&mut self, id: &ProofId) -> AvalancheResult<RegistrationOutcome> {
        let outcome = self.proofs.reconsider(id, self.now(), self.tip_height())?;
        if let RegistrationOutcome::Registered { replaced } = &outcome {
            self.apply_removal(Removal {
                removed: replaced.clone(),
                restored: Vec::new(),
            });
            self.on_proof_registered(*id);
            self.finality.reset(Target::Proof(*id), Polarity::Accept);
        }
        Ok(outcome)
    }

    /// Associates a connected node with the proof it claims to stake for.
    pub fn add_node(&mut self, node: NodeId, key: VerifyingKey, proofid: ProofId) -> bool {
        if !self.transport.is_connected(node) {
            debug!(target: "avalanche.engine", node, "refusing unconnected node");
            return false;
        }
        let Some(proof) = self.proofs.get(&proofid) else {
            return false;
        };
        if matches!(
            self.proofs.status(&proofid),
            ProofStatus::Invalid | ProofStatus::Invalidated
        ) || proof.master != key.to_bytes()
        {
            return false;
        }

        let now = self.now();
        if self.proofs.is_dangling(&proofid) {
            let outcome = self.peers.attach(node, key, proofid, None, now);
            self.release_previous(&outcome, now);
            self.register_proof((*proof).clone());
            return true;
        }

        let stake = self.proofs.stake_of(&proofid);
        let outcome = self.peers.attach(node, key, proofid, stake, now);
        self.release_previous(&outcome, now);
        if outcome.is_attached() {
            self.proofs.mark_attached(&proofid, true, now);
            debug!(target: "avalanche.engine", node, proof = %proofid, "node attached");
        }
        true
    }

    /// A node that moved to another proof may leave its old one unattached.
    fn release_previous(&mut self, outcome: &AttachOutcome, now: TimestampMs) {
        if let Some(previous) = outcome.previous().filter(|previous| previous.orphaned) {
            self.proofs.mark_attached(&previous.proofid, false, now);
            debug!(target: "avalanche.engine", proof = %previous.proofid, "proof lost its last node");
        }
    }

    pub fn remove_node(&mut self, node: NodeId) -> bool {
        let Some(detached) = self.peers.detach(node) else {
            return false;
        };
        let now = self.now();
        if detached.orphaned {
            self.proofs.mark_attached(&detached.proofid, false, now);
        }
        for query in self.poller.forget_node(node) {
            self.count_missing(&query);
        }
        self.ready_to_poll();
        true
    }

    pub fn connected_stake(&self) -> Amount {
        self.peers.connected_stake()
    }

    pub fn ready_to_poll(&mut self) -> bool {
        self.quorum.evaluate(
            self.peers.node_count(),
            self.peers.connected_stake(),
            self.proofs.total_stake(),
        )
    }

    pub fn quorum_status(&self) -> QuorumStatus {
        self.quorum.status(
            self.peers.node_count(),
            self.peers.pending_count(),
            self.peers.connected_stake(),
            self.proofs.total_stake(),
        )
    }

    /// Starts polling `target` if it is worth it. Idempotent.
    pub fn add_to_reconcile(&mut self, target: Target) -> bool {
        if !self.is_tracked(&target) {
            return false;
        }
        let local = self.local_polarity(&target);
        self.finality.add(target, local)
    }

    /// Re-reads the chain tip: rescans proofs, rolls staking contenders over
    /// and queues the new tip for polling.
    pub fn updated_block_tip(&mut self) {
        let Some(tip) = self.chain.tip() else {
            return;
        };
        if self.last_tip == Some(tip) {
            return;
        }
        let now = self.now();
        let (removal, promoted) = self.proofs.rescan(now, tip.height);
        self.apply_removal(removal);
        for id in promoted {
            self.on_proof_registered(id);
        }

        let previous = self.last_tip.replace(tip);
        if self.staking_active() {
            if let Some(previous) = previous {
                self.contenders.promote_to_block(&previous.hash, &tip);
            }
            let candidates = self.candidates();
            self.contenders.build_for_block(&tip, &candidates);
        }
        self.add_to_reconcile(Target::Block(tip.hash));
        debug!(target: "avalanche.engine", tip = %tip.hash, height = tip.height, "tip updated");
    }

    pub fn transaction_added(&mut self, txid: TxId) -> bool {
        self.config.preconsensus && self.add_to_reconcile(Target::Transaction(txid))
    }

    /// One scheduler pass. Returns the number of polls handed to the transport.
    pub fn tick(&mut self) -> usize {
        if !self.running {
            return 0;
        }
        let now = self.now();
        for query in self.poller.expire(now) {
            debug!(target: "avalanche.engine", node = query.node, round = query.round, "query timed out");
            self.count_missing(&query);
        }
        if !self.ready_to_poll() {
            return 0;
        }

        let untracked: Vec<Target> = self
            .finality
            .targets()
            .filter(|target| !self.is_tracked(target))
            .copied()
            .collect();
        for target in &untracked {
            self.finality.remove(target);
        }
        self.refresh_contenders(now);

        let targets = self
            .finality
            .pollable(self.config.max_element_poll, |target| {
                self.is_poll_eligible(target, now)
            });
        if targets.is_empty() {
            return 0;
        }
        let nodes = self.peers.sample(self.config.sample_size, now, &mut self.rng);
        if nodes.is_empty() {
            return 0;
        }

        let cycle = self.poller.plan(&targets, &nodes, now);
        self.finality.open_round(&targets, cycle.cycle, nodes.len(), now);
        let busy_until = now.saturating_add(self.config.query_timeout_ms);
        let mut sent = 0;
        for (node, poll) in cycle.polls {
            self.peers.set_next_request_time(node, busy_until);
            let round = poll.round;
            match self.transport.send_poll(node, poll) {
                Ok(()) => sent += 1,
                Err(err) => {
                    warn!(target: "avalanche.engine", node, %err, "failed to send poll");
                    if let Some(query) = self.poller.take(node, round) {
                        self.count_missing(&query);
                    }
                }
            }
        }
        sent
    }

    /// Periodic housekeeping: dangling proofs and old staking contenders.
    pub fn cleanup(&mut self) {
        let now = self.now();
        let removal = self.proofs.purge_dangling(now, self.tip_height());
        self.apply_removal(removal);
        if let Some(tip) = self.finalization_tip {
            self.contenders.cleanup(tip.height);
        }
    }

    /// Answers a peer's poll with our own votes, signed by the session key.
    pub fn on_poll(&mut self, node: NodeId, poll: Poll) -> Option<Response> {
        if poll.targets.len() > MAX_ELEMENT_POLL {
            self.transport
                .report_misbehavior(node, OVERSIZED_POLL_SCORE, "too-many-ava-poll");
            return None;
        }
        let votes = poll
            .targets
            .iter()
            .map(|target| Vote {
                id: target.id_bytes(),
                code: self.local_vote(target),
            })
            .collect();
        let response = Response::signed(poll.round, votes, &self.session_key);
        if let Err(err) = self.transport.send_response(node, response.clone()) {
            warn!(target: "avalanche.engine", node, %err, "failed to send response");
        }
        Some(response)
    }

    /// Folds a peer's response into the vote records. Returns the number of
    /// votes counted.
    pub fn on_response(&mut self, node: NodeId, response: Response) -> Result<usize, ResponseError> {
        let Some(query) = self.poller.take(node, response.round) else {
            debug!(target: "avalanche.engine", node, round = response.round, "unexpected response");
            return Err(ResponseError::Unexpected {
                node,
                round: response.round,
            });
        };
        let Some(key) = self.peers.node_key(node).copied() else {
            self.count_missing(&query);
            return Err(ResponseError::UnknownNode(node));
        };

        let votes = match response::validate(&query, &key, &response) {
            Ok(votes) => votes,
            Err(err) => {
                warn!(target: "avalanche.engine", node, %err, "invalid response");
                let score = err.misbehavior_score();
                if score > 0 {
                    self.transport.report_misbehavior(node, score, err.reason());
                }
                self.count_missing(&query);
                return Err(err);
            }
        };

        let now = self.now();
        self.peers
            .set_next_request_time(node, now.saturating_add(self.config.poll_cooldown_ms));
        let counted = votes.len();
        for (target, code) in votes {
            let polarity = target.polarity_of(code);
            if let Some(update) = self
                .finality
                .register_vote(target, query.cycle, node, polarity, now)
            {
                self.apply_update(update);
            }
        }
        Ok(counted)
    }

    pub fn reconsider_block(&mut self, hash: &BlockHash) -> bool {
        self.invalid_blocks.remove(hash);
        let target = Target::Block(*hash);
        if !self.is_tracked(&target) {
            return false;
        }
        let local = self.local_polarity(&target);
        self.finality.reset(target, local);
        true
    }

    pub fn is_block_final(&self, hash: &BlockHash) -> bool {
        if self.finality.finalized(&Target::Block(*hash)) == Some(Polarity::Accept) {
            return true;
        }
        self.finalization_tip
            .is_some_and(|tip| self.chain.is_ancestor(hash, &tip.hash))
    }

    /// Final on its own or through a final block that includes it.
    pub fn is_transaction_final(&self, txid: &TxId, block: Option<&BlockHash>) -> bool {
        self.finality.finalized(&Target::Transaction(*txid)) == Some(Polarity::Accept)
            || block.is_some_and(|hash| self.is_block_final(hash))
    }

    pub fn finalization_tip(&self) -> Option<BlockInfo> {
        self.finalization_tip
    }

    pub fn confidence(&self, target: &Target) -> Option<u32> {
        self.finality.record(target).map(|record| record.confidence())
    }

    pub fn proof_report(&self, id: &ProofId) -> ProofReport {
        let target = Target::Proof(*id);
        let finalized = self
            .proofs
            .registered_entry(id)
            .is_some_and(|entry| entry.has_finalized)
            || self.finality.finalized(&target) == Some(Polarity::Accept);
        ProofReport {
            proofid: *id,
            status: self.proofs.status(id),
            finalized,
            stake: self.proofs.get(id).map(|proof| proof.stake_amount()),
            attached_nodes: self.peers.nodes_of(id),
            confidence: self.confidence(&target),
        }
    }

    pub fn set_staking_reward_winners(&mut self, block: &BlockHash, payout_scripts: Vec<Vec<u8>>) -> bool {
        let Some(info) = self.chain.block(block) else {
            return false;
        };
        self.contenders.set_manual_winners(&info, payout_scripts);
        true
    }

    pub fn staking_reward_winners(&self, block: &BlockHash) -> Vec<Vec<u8>> {
        self.contenders.winners(block)
    }

    pub fn export_proofs(&self) -> Vec<PersistedProof> {
        self.proofs
            .registered()
            .map(|(_, entry)| PersistedProof {
                proof: (*entry.proof).clone(),
                has_finalized: entry.has_finalized,
                registration_time: entry.registration_time,
                next_conflict_time: entry.next_conflict_time,
            })
            .collect()
    }

    /// Re-registers persisted proofs. Returns how many became favorites.
    pub fn import_proofs(&mut self, persisted: Vec<PersistedProof>) -> usize {
        let mut registered = 0;
        for entry in persisted {
            let id = entry.proof.id();
            if let RegistrationOutcome::Registered { .. } = self.register_proof(entry.proof) {
                self.proofs.restore_metadata(
                    &id,
                    entry.has_finalized,
                    entry.registration_time,
                    entry.next_conflict_time,
                );
                registered += 1;
            }
        }
        registered
    }

    pub fn proof_store(&self) -> &ProofStore {
        &self.proofs
    }

    pub fn peer_set(&self) -> &PeerSet {
        &self.peers
    }

    pub fn finality(&self) -> &FinalityTable {
        &self.finality
    }

    pub fn contenders(&self) -> &StakeContenderCache {
        &self.contenders
    }

    pub fn outstanding_queries(&self) -> usize {
        self.poller.outstanding()
    }

    fn tip_height(&self) -> u64 {
        self.chain.tip().map_or(0, |tip| tip.height)
    }

    fn staking_active(&self) -> bool {
        self.config.staking_preconsensus
            && self
                .last_tip
                .is_some_and(|tip| tip.height >= self.config.staking_rewards_activation_height)
    }

    fn candidates(&self) -> Vec<Candidate> {
        self.proofs
            .registered()
            .map(|(id, entry)| Candidate {
                proofid: *id,
                stake: entry.stake(),
                payout_script: entry.proof.payout_script.clone(),
                registration_time: entry.registration_time,
                registration_height: entry.registration_height,
                has_finalized: entry.has_finalized,
            })
            .collect()
    }

    fn refresh_contenders(&mut self, now: TimestampMs) {
        if !self.staking_active() {
            return;
        }
        let Some(tip) = self.last_tip else {
            return;
        };
        if !self.contenders.has_winners(&tip.hash) {
            let candidates = self.candidates();
            self.contenders.build_for_block(&tip, &candidates);
        }
        let delay = self.config.staking_registration_delay_secs;
        if self
            .contenders
            .compute_local_winners(&tip.hash, now / 1_000, delay)
        {
            for id in self
                .contenders
                .pollable(&tip.hash, self.config.max_contenders_pollable)
            {
                self.add_to_reconcile(Target::StakeContender(id));
            }
        }
    }

    /// Whether a record for `target` should exist at all.
    fn is_tracked(&self, target: &Target) -> bool {
        match target {
            Target::Proof(id) => match self.proofs.status(id) {
                ProofStatus::Registered => !self.proof_finalized(id),
                ProofStatus::Conflicting => true,
                _ => false,
            },
            Target::Block(hash) => {
                if self.invalid_blocks.contains(hash) {
                    return false;
                }
                if matches!(
                    self.chain.block_status(hash),
                    BlockStatus::Invalid | BlockStatus::Unknown
                ) {
                    return false;
                }
                !self
                    .finalization_tip
                    .is_some_and(|tip| self.chain.is_ancestor(hash, &tip.hash))
            }
            Target::Transaction(txid) => {
                self.config.preconsensus
                    && self
                        .mempool
                        .as_ref()
                        .is_some_and(|mempool| mempool.tx_status(txid) != TxStatus::Unknown)
            }
            Target::StakeContender(id) => {
                self.config.staking_preconsensus && self.contenders.contains(id)
            }
        }
    }

    fn is_poll_eligible(&self, target: &Target, now: TimestampMs) -> bool {
        match target {
            Target::Proof(id) => self.proofs.is_poll_eligible(id, now),
            other => self.is_tracked(other),
        }
    }

    fn local_polarity(&self, target: &Target) -> Polarity {
        match target {
            Target::Proof(id) => Polarity::from_accepted(self.proofs.is_registered(id)),
            Target::StakeContender(id) => self
                .contenders
                .local_polarity(id)
                .unwrap_or(Polarity::Reject),
            other => Polarity::from_accepted(self.local_vote(other) == VoteCode::Accepted),
        }
    }

    fn local_vote(&self, target: &Target) -> VoteCode {
        match target {
            Target::Block(hash) => {
                let vote = if self.invalid_blocks.contains(hash) {
                    BlockVote::Parked
                } else {
                    match self.chain.block_status(hash) {
                        BlockStatus::Active => BlockVote::Accepted,
                        BlockStatus::Fork | BlockStatus::Parked => BlockVote::Parked,
                        BlockStatus::Invalid => BlockVote::Invalid,
                        BlockStatus::Unknown => BlockVote::Unknown,
                    }
                };
                vote.code()
            }
            Target::Transaction(txid) => {
                let status = self
                    .mempool
                    .as_ref()
                    .map_or(TxStatus::Unknown, |mempool| mempool.tx_status(txid));
                match status {
                    TxStatus::Accepted => TxVote::Accepted,
                    TxStatus::Invalid => TxVote::Invalid,
                    TxStatus::Orphan => TxVote::Orphan,
                    TxStatus::Unknown => TxVote::Unknown,
                }
                .code()
            }
            Target::Proof(id) => self.proofs.local_vote(id).code(),
            Target::StakeContender(id) => self.contender_vote(id),
        }
    }

    fn contender_vote(&self, id: &StakeContenderId) -> VoteCode {
        if !self.config.staking_preconsensus {
            return VoteCode::Unknown;
        }
        self.contenders.vote_status(id).code()
    }

    fn count_missing(&mut self, query: &Query) {
        for target in &query.targets {
            if let Some(update) = self.finality.register_missing(*target, query.cycle) {
                self.apply_update(update);
            }
        }
    }

    fn on_proof_registered(&mut self, id: ProofId) {
        let now = self.now();
        if let Some(stake) = self.proofs.stake_of(&id) {
            self.peers.promote_proof(&id, stake);
            let attached = self.peers.is_attached(&id);
            self.proofs.mark_attached(&id, attached, now);
        }
        self.sync_proof_target(id);
    }

    fn apply_removal(&mut self, removal: Removal) {
        for id in removal.removed {
            self.peers.demote_proof(&id);
            self.sync_proof_target(id);
        }
        for id in removal.restored {
            self.on_proof_registered(id);
        }
    }

    /// Finalization outlives the bounded filter in the finality table.
    fn proof_finalized(&self, id: &ProofId) -> bool {
        self.proofs
            .registered_entry(id)
            .is_some_and(|entry| entry.has_finalized)
    }

    fn sync_proof_target(&mut self, id: ProofId) {
        let target = Target::Proof(id);
        match self.proofs.status(&id) {
            ProofStatus::Registered if self.proof_finalized(&id) => {
                self.finality.remove(&target);
            }
            ProofStatus::Registered => {
                self.finality.add(target, Polarity::Accept);
            }
            ProofStatus::Conflicting => {
                self.finality.add(target, Polarity::Reject);
            }
            _ => {
                self.finality.remove(&target);
            }
        }
    }

    /// Bookkeeping for our own stores, then queued for collaborators.
    fn apply_update(&mut self, update: VoteUpdate) {
        let now = self.now();
        match (update.target, update.status) {
            (Target::Block(hash), VoteStatus::Finalized) => {
                if let Some(info) = self.chain.block(&hash) {
                    let advances = self
                        .finalization_tip
                        .map_or(true, |tip| info.height > tip.height);
                    if advances {
                        self.finalization_tip = Some(info);
                    }
                }
            }
            (Target::Block(hash), VoteStatus::Invalidated) => {
                self.invalid_blocks.insert(hash);
            }
            (Target::Proof(id), VoteStatus::Finalized) => {
                if self.proofs.status(&id) == ProofStatus::Conflicting {
                    if let Some(replaced) = self.proofs.force_accept(&id, now, self.tip_height()) {
                        self.apply_removal(Removal {
                            removed: replaced,
                            restored: Vec::new(),
                        });
                        self.on_proof_registered(id);
                    }
                }
                self.proofs.set_finalized(&id);
            }
            (Target::Proof(id), VoteStatus::Invalidated) => {
                let removal = self
                    .proofs
                    .reject(&id, RejectMode::Invalidate, now, self.tip_height());
                self.apply_removal(removal);
            }
            (Target::StakeContender(id), VoteStatus::Accepted) => {
                self.contenders.accept(&id);
            }
            (Target::StakeContender(id), VoteStatus::Rejected) => {
                self.contenders.reject(&id);
            }
            (Target::StakeContender(id), VoteStatus::Finalized) => {
                self.contenders.finalize(&id);
            }
            (Target::StakeContender(id), VoteStatus::Invalidated) => {
                self.contenders.invalidate(&id);
            }
            _ => {}
        }
        self.updates.push(update);
    }
}
