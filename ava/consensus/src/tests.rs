use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ed25519_dalek::SigningKey;
use parking_lot::{Mutex, RwLock};

use super::clock::{Clock, MockClock};
use super::config::EngineConfig;
use super::engine::{Collaborators, Engine};
use super::finality::{VoteStatus, VoteUpdate};
use super::interfaces::{
    BlockInfo, BlockStatus, ChainView, MempoolView, PeerTransport, StakeCheck, StakeVerifier,
    TransportError, TxStatus,
};
use super::messages::{Poll, Response, Target, Vote, VoteCode};
use super::proof::{Proof, ProofBuilder, ProofRejection};
use super::proof_store::{
    ConflictReason, ProofStatus, ProofStore, ProofStoreError, RegistrationOutcome,
};
use super::response::ResponseError;
use super::types::{hash256, Amount, BlockHash, NodeId, Outpoint, ProofId, TxId};
use super::AvalancheError;

const START_MS: u64 = 1_700_000_000_000;

struct ChainBlock {
    info: BlockInfo,
    parent: Option<BlockHash>,
    status: BlockStatus,
}

#[derive(Default)]
struct ChainState {
    blocks: HashMap<BlockHash, ChainBlock>,
    tip: Option<BlockHash>,
}

#[derive(Default)]
struct TestChain {
    state: RwLock<ChainState>,
}

impl TestChain {
    fn extend(&self, time: u64) -> BlockInfo {
        let mut state = self.state.write();
        let parent = state
            .tip
            .and_then(|hash| state.blocks.get(&hash).map(|block| block.info));
        let height = parent.map_or(0, |info| info.height + 1);
        let hash = BlockHash::new(hash256(&height.to_le_bytes()));
        let info = BlockInfo { hash, height, time };
        state.blocks.insert(
            hash,
            ChainBlock {
                info,
                parent: parent.map(|info| info.hash),
                status: BlockStatus::Active,
            },
        );
        state.tip = Some(hash);
        info
    }
}

impl ChainView for TestChain {
    fn tip(&self) -> Option<BlockInfo> {
        let state = self.state.read();
        state
            .tip
            .and_then(|hash| state.blocks.get(&hash))
            .map(|block| block.info)
    }

    fn block(&self, hash: &BlockHash) -> Option<BlockInfo> {
        self.state.read().blocks.get(hash).map(|block| block.info)
    }

    fn block_status(&self, hash: &BlockHash) -> BlockStatus {
        self.state
            .read()
            .blocks
            .get(hash)
            .map_or(BlockStatus::Unknown, |block| block.status)
    }

    fn is_ancestor(&self, ancestor: &BlockHash, descendant: &BlockHash) -> bool {
        let state = self.state.read();
        let mut cursor = Some(*descendant);
        while let Some(hash) = cursor {
            if hash == *ancestor {
                return true;
            }
            cursor = state.blocks.get(&hash).and_then(|block| block.parent);
        }
        false
    }
}

#[derive(Default)]
struct TestVerifier {
    checks: RwLock<HashMap<Outpoint, StakeCheck>>,
}

impl TestVerifier {
    fn set(&self, outpoint: Outpoint, check: StakeCheck) {
        self.checks.write().insert(outpoint, check);
    }
}

impl StakeVerifier for TestVerifier {
    fn check(&self, proof: &Proof) -> StakeCheck {
        let checks = self.checks.read();
        proof
            .outpoints()
            .find_map(|outpoint| {
                checks
                    .get(outpoint)
                    .filter(|check| **check != StakeCheck::Valid)
                    .cloned()
            })
            .unwrap_or(StakeCheck::Valid)
    }
}

#[derive(Default)]
struct TestTransport {
    connected: RwLock<HashSet<NodeId>>,
    polls: Mutex<Vec<(NodeId, Poll)>>,
    responses: Mutex<Vec<(NodeId, Response)>>,
    misbehavior: Mutex<Vec<(NodeId, u32, String)>>,
}

impl TestTransport {
    fn connect(&self, node: NodeId) {
        self.connected.write().insert(node);
    }

    fn take_polls(&self) -> Vec<(NodeId, Poll)> {
        std::mem::take(&mut *self.polls.lock())
    }
}

impl PeerTransport for TestTransport {
    fn is_connected(&self, node: NodeId) -> bool {
        self.connected.read().contains(&node)
    }

    fn send_poll(&self, node: NodeId, poll: Poll) -> Result<(), TransportError> {
        if !self.is_connected(node) {
            return Err(TransportError::Disconnected(node));
        }
        self.polls.lock().push((node, poll));
        Ok(())
    }

    fn send_response(&self, node: NodeId, response: Response) -> Result<(), TransportError> {
        self.responses.lock().push((node, response));
        Ok(())
    }

    fn report_misbehavior(&self, node: NodeId, score: u32, reason: &str) {
        self.misbehavior.lock().push((node, score, reason.to_string()));
    }
}

#[derive(Default)]
struct TestMempool {
    txs: RwLock<HashMap<TxId, TxStatus>>,
}

impl MempoolView for TestMempool {
    fn tx_status(&self, txid: &TxId) -> TxStatus {
        self.txs
            .read()
            .get(txid)
            .copied()
            .unwrap_or(TxStatus::Unknown)
    }
}

struct Staker {
    node: NodeId,
    key: SigningKey,
    outpoint: Outpoint,
    proof: Proof,
}

impl Staker {
    fn id(&self) -> ProofId {
        self.proof.id()
    }
}

fn staker(node: NodeId, amount: Amount) -> Staker {
    let key = SigningKey::from_bytes(&hash256(&node.to_le_bytes()));
    let outpoint = Outpoint::new(TxId::new(hash256(&[b'o', node as u8])), 0);
    let proof = ProofBuilder::new(1, 0, &key)
        .stake(outpoint, amount, 1)
        .payout_script(vec![0x51, node as u8])
        .build();
    Staker {
        node,
        key,
        outpoint,
        proof,
    }
}

fn test_config() -> EngineConfig {
    EngineConfig {
        min_quorum_stake: 100,
        min_connected_stake_ratio: 0.5,
        min_node_count: 1,
        confidence_threshold: 3,
        min_round_votes: 2,
        sample_size: 4,
        stale_round_threshold: 100,
        persist_peers: false,
        rng_seed: Some(7),
        ..EngineConfig::default()
    }
}

struct Harness {
    engine: Engine,
    clock: MockClock,
    chain: Arc<TestChain>,
    verifier: Arc<TestVerifier>,
    transport: Arc<TestTransport>,
    mempool: Arc<TestMempool>,
    keys: HashMap<NodeId, SigningKey>,
    tip: BlockInfo,
}

impl Harness {
    fn new(config: EngineConfig) -> Self {
        let clock = MockClock::new(START_MS);
        let chain = Arc::new(TestChain::default());
        let tip = chain.extend(clock.now_secs());
        let verifier = Arc::new(TestVerifier::default());
        let transport = Arc::new(TestTransport::default());
        let mempool = Arc::new(TestMempool::default());
        let collaborators = Collaborators {
            chain: chain.clone(),
            verifier: verifier.clone(),
            transport: transport.clone(),
            mempool: Some(mempool.clone()),
        };
        let mut engine = Engine::new(
            config,
            collaborators,
            Arc::new(clock.clone()),
            SigningKey::from_bytes(&[7; 32]),
        )
        .expect("engine");
        engine.start();
        Self {
            engine,
            clock,
            chain,
            verifier,
            transport,
            mempool,
            keys: HashMap::new(),
            tip,
        }
    }

    fn join(&mut self, staker: &Staker) -> bool {
        self.transport.connect(staker.node);
        self.engine.register_proof(staker.proof.clone());
        self.keys.insert(staker.node, staker.key.clone());
        self.engine
            .add_node(staker.node, staker.key.verifying_key(), staker.id())
    }

    fn with_stakers(config: EngineConfig, count: u64) -> (Self, Vec<Staker>) {
        let mut harness = Self::new(config);
        let stakers: Vec<Staker> = (1..=count).map(|node| staker(node, 100)).collect();
        for staker in &stakers {
            assert!(harness.join(staker));
        }
        (harness, stakers)
    }

    /// One poll cycle where every polled node answers with `vote`.
    fn run_cycle<F>(&mut self, vote: F) -> Vec<VoteUpdate>
    where
        F: Fn(NodeId, &Target) -> VoteCode,
    {
        self.clock.advance_ms(200);
        self.engine.tick();
        for (node, poll) in self.transport.take_polls() {
            let votes = poll
                .targets
                .iter()
                .map(|target| Vote {
                    id: target.id_bytes(),
                    code: vote(node, target),
                })
                .collect();
            let response = Response::signed(poll.round, votes, &self.keys[&node]);
            self.engine
                .on_response(node, response)
                .expect("response accepted");
        }
        self.engine.take_updates()
    }
}

fn accept_all(_: NodeId, _: &Target) -> VoteCode {
    VoteCode::Accepted
}

fn has(updates: &[VoteUpdate], target: Target, status: VoteStatus) -> bool {
    updates.contains(&VoteUpdate::new(target, status))
}

#[test]
fn block_finalizes_after_consecutive_agreeing_rounds() {
    let (mut h, stakers) = Harness::with_stakers(test_config(), 4);
    let block = Target::Block(h.tip.hash);

    let first = h.run_cycle(accept_all);
    assert!(first.is_empty());
    assert_eq!(h.engine.confidence(&block), Some(1));
    let second = h.run_cycle(accept_all);
    assert!(second.is_empty());

    let third = h.run_cycle(accept_all);
    assert!(has(&third, block, VoteStatus::Finalized));
    for staker in &stakers {
        assert!(has(&third, Target::Proof(staker.id()), VoteStatus::Finalized));
        assert!(h.engine.proof_report(&staker.id()).finalized);
    }
    assert!(h.engine.is_block_final(&h.tip.hash));
    assert_eq!(h.engine.finalization_tip(), Some(h.tip));

    // Finalized targets are not polled again.
    assert!(h.run_cycle(accept_all).is_empty());
    assert!(h.transport.take_polls().is_empty());

    let txid = TxId::new([3; 32]);
    assert!(!h.engine.is_transaction_final(&txid, None));
    assert!(h.engine.is_transaction_final(&txid, Some(&h.tip.hash)));
}

#[test]
fn finalized_proofs_stay_final_after_leaving_the_filter() {
    let config = EngineConfig {
        finalized_filter_size: 1,
        ..test_config()
    };
    let (mut h, stakers) = Harness::with_stakers(config, 4);
    h.run_cycle(accept_all);
    h.run_cycle(accept_all);
    let third = h.run_cycle(accept_all);
    for staker in &stakers {
        assert!(has(&third, Target::Proof(staker.id()), VoteStatus::Finalized));
    }

    for staker in &stakers {
        let target = Target::Proof(staker.id());
        assert!(!h.engine.add_to_reconcile(target));
        assert!(!h.engine.finality().contains(&target));
    }

    h.chain.extend(h.clock.now_secs());
    h.engine.updated_block_tip();
    for _ in 0..4 {
        let updates = h.run_cycle(accept_all);
        assert!(updates
            .iter()
            .all(|update| !matches!(update.target, Target::Proof(_))));
    }
    for staker in &stakers {
        assert!(h.engine.proof_report(&staker.id()).finalized);
    }
}

#[test]
fn opposite_rounds_flip_direction_then_invalidate() {
    let (mut h, _) = Harness::with_stakers(test_config(), 4);
    let block = Target::Block(h.tip.hash);
    let reject_block = |_: NodeId, target: &Target| match target {
        Target::Block(_) => VoteCode::Rejected,
        _ => VoteCode::Accepted,
    };

    let first = h.run_cycle(reject_block);
    assert!(has(&first, block, VoteStatus::Rejected));
    assert_eq!(h.engine.confidence(&block), Some(0));

    h.run_cycle(reject_block);
    h.run_cycle(reject_block);
    let fourth = h.run_cycle(reject_block);
    assert!(has(&fourth, block, VoteStatus::Invalidated));
    assert!(!h.engine.is_block_final(&h.tip.hash));
    assert!(!h.engine.add_to_reconcile(block));

    assert!(h.engine.reconsider_block(&h.tip.hash));
    assert_eq!(h.engine.confidence(&block), Some(0));
}

#[test]
fn accept_round_after_parked_flip_resets_instead_of_finalizing() {
    let (mut h, _) = Harness::with_stakers(test_config(), 4);
    let block = Target::Block(h.tip.hash);

    h.run_cycle(accept_all);
    h.run_cycle(accept_all);
    assert_eq!(h.engine.confidence(&block), Some(2));

    let parked = h.run_cycle(|_, target| match target {
        Target::Block(_) => VoteCode::Rejected,
        _ => VoteCode::Accepted,
    });
    assert!(has(&parked, block, VoteStatus::Rejected));
    assert_eq!(h.engine.confidence(&block), Some(0));

    let back = h.run_cycle(accept_all);
    assert!(has(&back, block, VoteStatus::Accepted));
    assert!(!has(&back, block, VoteStatus::Finalized));
    assert_eq!(h.engine.confidence(&block), Some(0));
    assert!(!h.engine.is_block_final(&h.tip.hash));
}

#[test]
fn split_and_unknown_rounds_leave_confidence_unchanged() {
    let (mut h, _) = Harness::with_stakers(test_config(), 4);
    let block = Target::Block(h.tip.hash);

    let split = h.run_cycle(|node, target| match target {
        Target::Block(_) if node > 2 => VoteCode::Rejected,
        _ => VoteCode::Accepted,
    });
    assert!(split.iter().all(|update| update.target != block));
    assert_eq!(h.engine.confidence(&block), Some(0));

    // A single counted vote is below `min_round_votes`.
    h.run_cycle(|node, target| match target {
        Target::Block(_) if node > 1 => VoteCode::Unknown,
        _ => VoteCode::Accepted,
    });
    assert_eq!(h.engine.confidence(&block), Some(0));

    h.run_cycle(accept_all);
    assert_eq!(h.engine.confidence(&block), Some(1));
}

#[test]
fn undecided_record_goes_stale() {
    let config = EngineConfig {
        stale_round_threshold: 3,
        ..test_config()
    };
    let (mut h, _) = Harness::with_stakers(config, 4);
    let block = Target::Block(h.tip.hash);
    let split = |node: NodeId, target: &Target| match target {
        Target::Block(_) if node % 2 == 0 => VoteCode::Rejected,
        _ => VoteCode::Accepted,
    };

    h.run_cycle(split);
    h.run_cycle(split);
    let third = h.run_cycle(split);
    assert!(has(&third, block, VoteStatus::Stale));
    assert!(!h.engine.finality().contains(&block));
}

#[test]
fn quorum_needs_nodes_and_stake_then_latches() {
    let config = EngineConfig {
        min_node_count: 2,
        min_quorum_stake: 150,
        ..test_config()
    };
    let mut h = Harness::new(config);
    let first = staker(1, 100);
    let second = staker(2, 100);

    h.join(&first);
    assert!(!h.engine.ready_to_poll());
    h.join(&second);
    assert!(h.engine.ready_to_poll());

    let whale = staker(3, 1_000);
    h.engine.register_proof(whale.proof.clone());
    assert!(h.engine.ready_to_poll());
    let status = h.engine.quorum_status();
    assert!(status.ready);
    assert_eq!(status.node_count, 2);
    assert_eq!(status.connected_stake, 200);
    assert_eq!(status.total_stake, 1_200);

    assert!(h.engine.remove_node(1));
    assert!(h.engine.ready_to_poll());
    assert!(h.engine.remove_node(2));
    assert!(!h.engine.ready_to_poll());
    assert!(!h.engine.remove_node(2));
}

#[test]
fn no_polls_without_quorum() {
    let config = EngineConfig {
        min_node_count: 5,
        ..test_config()
    };
    let (mut h, _) = Harness::with_stakers(config, 2);
    h.clock.advance_ms(200);
    assert_eq!(h.engine.tick(), 0);
    assert!(h.transport.take_polls().is_empty());
}

#[test]
fn forged_response_is_reported_and_consumes_the_query() {
    let (mut h, _) = Harness::with_stakers(test_config(), 4);
    h.clock.advance_ms(200);
    assert_eq!(h.engine.tick(), 4);
    let polls = h.transport.take_polls();
    let (node, poll) = polls[0].clone();
    let votes: Vec<Vote> = poll
        .targets
        .iter()
        .map(|target| Vote {
            id: target.id_bytes(),
            code: VoteCode::Accepted,
        })
        .collect();

    let forged = Response::signed(poll.round, votes.clone(), &SigningKey::from_bytes(&[42; 32]));
    assert_eq!(
        h.engine.on_response(node, forged),
        Err(ResponseError::InvalidSignature(node))
    );
    assert_eq!(
        h.transport.misbehavior.lock().as_slice(),
        &[(node, 100, "invalid-ava-response-signature".to_string())]
    );

    let genuine = Response::signed(poll.round, votes, &h.keys[&node]);
    assert_eq!(
        h.engine.on_response(node, genuine),
        Err(ResponseError::Unexpected {
            node,
            round: poll.round
        })
    );
    assert_eq!(h.transport.misbehavior.lock().len(), 1);
}

#[test]
fn polls_are_answered_from_local_state() {
    let (mut h, stakers) = Harness::with_stakers(test_config(), 1);
    let poll = Poll {
        round: 9,
        targets: vec![
            Target::Block(h.tip.hash),
            Target::Block(BlockHash::new([9; 32])),
            Target::Proof(stakers[0].id()),
            Target::Proof(ProofId::new([9; 32])),
        ],
    };
    let response = h.engine.on_poll(77, poll).expect("answered");
    let codes: Vec<VoteCode> = response.votes.iter().map(|vote| vote.code).collect();
    assert_eq!(
        codes,
        vec![
            VoteCode::Accepted,
            VoteCode::Unknown,
            VoteCode::Accepted,
            VoteCode::Unknown
        ]
    );
    assert_eq!(response.round, 9);
    assert!(response.verify(&h.engine.session_key()));
    assert_eq!(h.transport.responses.lock().len(), 1);

    let oversized = Poll {
        round: 10,
        targets: (0..17u8)
            .map(|i| Target::Block(BlockHash::new([i; 32])))
            .collect(),
    };
    assert!(h.engine.on_poll(77, oversized).is_none());
    assert_eq!(
        h.transport.misbehavior.lock().as_slice(),
        &[(77, 20, "too-many-ava-poll".to_string())]
    );
}

#[test]
fn invalidated_proof_stops_counting_until_reconsidered() {
    let (mut h, stakers) = Harness::with_stakers(test_config(), 2);
    let id = stakers[0].id();
    assert_eq!(h.engine.connected_stake(), 200);

    h.engine.invalidate_proof(&id).expect("invalidate");
    assert_eq!(h.engine.connected_stake(), 100);
    assert!(h.engine.peer_set().is_pending(1));
    assert_eq!(h.engine.proof_report(&id).status, ProofStatus::Invalidated);
    assert!(!h.engine.finality().contains(&Target::Proof(id)));
    assert_eq!(
        h.engine.register_proof(stakers[0].proof.clone()),
        RegistrationOutcome::Invalid(ProofRejection::RecentlyInvalid)
    );

    let outcome = h.engine.reconsider_proof(&id).expect("reconsider");
    assert_eq!(
        outcome,
        RegistrationOutcome::Registered {
            replaced: Vec::new()
        }
    );
    assert_eq!(h.engine.connected_stake(), 200);

    let unknown = ProofId::new([1; 32]);
    assert!(matches!(
        h.engine.invalidate_proof(&unknown),
        Err(AvalancheError::Proof(ProofStoreError::UnknownProof(id))) if id == unknown
    ));
}

#[test]
fn conflicting_proof_waits_for_cooldown() {
    let mut h = Harness::new(test_config());
    let first = staker(1, 100);
    h.join(&first);
    let better = ProofBuilder::new(2, 0, &first.key)
        .stake(first.outpoint, 100, 1)
        .build();
    let better_id = better.id();

    assert_eq!(
        h.engine.register_proof(better.clone()),
        RegistrationOutcome::Rejected {
            favorite: first.id(),
            reason: ConflictReason::CooldownNotElapsed,
            tracked: true,
        }
    );
    assert_eq!(h.engine.proof_report(&better_id).status, ProofStatus::Conflicting);
    assert!(h.engine.finality().contains(&Target::Proof(better_id)));

    h.clock.advance_ms(60_001);
    assert_eq!(
        h.engine.register_proof(better),
        RegistrationOutcome::Registered {
            replaced: vec![first.id()]
        }
    );
    assert_eq!(h.engine.proof_report(&first.id()).status, ProofStatus::Conflicting);
    assert_eq!(h.engine.connected_stake(), 0);
    assert!(h.engine.peer_set().is_pending(1));

    let older = ProofBuilder::new(0, 0, &first.key)
        .stake(first.outpoint, 100, 1)
        .build();
    assert!(matches!(
        h.engine.register_proof(older),
        RegistrationOutcome::Rejected { favorite, .. } if favorite == better_id
    ));
}

#[test]
fn orphan_proof_registers_once_its_stake_confirms() {
    let mut h = Harness::new(test_config());
    let orphan = staker(1, 100);
    h.verifier.set(orphan.outpoint, StakeCheck::Missing);
    assert_eq!(
        h.engine.register_proof(orphan.proof.clone()),
        RegistrationOutcome::Orphan
    );
    assert_eq!(h.engine.proof_report(&orphan.id()).status, ProofStatus::Orphan);

    h.verifier.set(orphan.outpoint, StakeCheck::Valid);
    h.chain.extend(h.clock.now_secs());
    h.engine.updated_block_tip();
    assert_eq!(h.engine.proof_report(&orphan.id()).status, ProofStatus::Registered);
    assert_eq!(h.engine.proof_store().total_stake(), 100);
}

#[test]
fn dangling_proof_returns_with_a_node() {
    let config = EngineConfig {
        dangling_timeout_secs: 60,
        ..test_config()
    };
    let mut h = Harness::new(config);
    let lonely = staker(1, 100);
    h.engine.register_proof(lonely.proof.clone());

    h.clock.advance_secs(61);
    h.engine.cleanup();
    assert_eq!(h.engine.proof_report(&lonely.id()).status, ProofStatus::Dangling);
    assert_eq!(
        h.engine.register_proof(lonely.proof.clone()),
        RegistrationOutcome::Dangling
    );

    h.transport.connect(1);
    assert!(h.engine.add_node(1, lonely.key.verifying_key(), lonely.id()));
    assert_eq!(h.engine.proof_report(&lonely.id()).status, ProofStatus::Registered);
    assert!(h.engine.peer_set().is_attached(&lonely.id()));
    assert_eq!(h.engine.connected_stake(), 100);
}

#[test]
fn proof_left_behind_by_its_node_becomes_dangling() {
    let config = EngineConfig {
        dangling_timeout_secs: 60,
        ..test_config()
    };
    let mut h = Harness::new(config);
    let first = staker(1, 100);
    assert!(h.join(&first));
    let second = ProofBuilder::new(1, 0, &first.key)
        .stake(Outpoint::new(TxId::new([0x2b; 32]), 0), 50, 1)
        .build();
    let second_id = second.id();
    h.engine.register_proof(second);
    assert_eq!(h.engine.proof_store().total_stake(), 150);

    assert!(h.engine.add_node(1, first.key.verifying_key(), second_id));
    assert!(!h.engine.peer_set().is_attached(&first.id()));
    assert_eq!(h.engine.connected_stake(), 50);

    h.clock.advance_secs(61);
    h.engine.cleanup();
    assert_eq!(h.engine.proof_report(&first.id()).status, ProofStatus::Dangling);
    assert_eq!(h.engine.proof_report(&second_id).status, ProofStatus::Registered);
    assert_eq!(h.engine.proof_store().total_stake(), 50);
}

#[test]
fn add_node_checks_connection_and_key() {
    let mut h = Harness::new(test_config());
    let honest = staker(1, 100);
    h.engine.register_proof(honest.proof.clone());

    assert!(!h.engine.add_node(1, honest.key.verifying_key(), honest.id()));
    h.transport.connect(1);
    let impostor = SigningKey::from_bytes(&[5; 32]);
    assert!(!h.engine.add_node(1, impostor.verifying_key(), honest.id()));
    assert!(!h.engine.add_node(1, honest.key.verifying_key(), ProofId::new([8; 32])));
    assert!(h.engine.add_node(1, honest.key.verifying_key(), honest.id()));
}

#[test]
fn mempool_transactions_finalize_with_preconsensus() {
    let config = EngineConfig {
        preconsensus: true,
        ..test_config()
    };
    let (mut h, _) = Harness::with_stakers(config, 4);
    let txid = TxId::new([4; 32]);
    h.mempool.txs.write().insert(txid, TxStatus::Accepted);
    assert!(h.engine.transaction_added(txid));
    assert!(!h.engine.transaction_added(TxId::new([5; 32])));

    h.run_cycle(accept_all);
    h.run_cycle(accept_all);
    let third = h.run_cycle(accept_all);
    assert!(has(&third, Target::Transaction(txid), VoteStatus::Finalized));
    assert!(h.engine.is_transaction_final(&txid, None));
}

#[test]
fn staking_winner_is_picked_among_finalized_proofs() {
    let config = EngineConfig {
        staking_preconsensus: true,
        staking_registration_delay_secs: 0,
        ..test_config()
    };
    let (mut h, stakers) = Harness::with_stakers(config, 4);
    let tip = h.tip.hash;

    for _ in 0..3 {
        h.run_cycle(accept_all);
    }
    assert!(!h.engine.contenders().has_winners(&tip));
    h.run_cycle(accept_all);
    assert!(h.engine.contenders().has_winners(&tip));

    let winners = h.engine.staking_reward_winners(&tip);
    assert_eq!(winners.len(), 1);
    assert!(stakers
        .iter()
        .any(|staker| staker.proof.payout_script == winners[0]));

    assert!(h.engine.set_staking_reward_winners(&tip, vec![vec![0xaa]]));
    let winners = h.engine.staking_reward_winners(&tip);
    assert_eq!(winners.len(), 2);
    assert_eq!(winners[0], vec![0xaa]);
}

fn store() -> (ProofStore, Arc<TestVerifier>) {
    let verifier = Arc::new(TestVerifier::default());
    (ProofStore::new(verifier.clone(), 1_000, 10_000, 4), verifier)
}

#[test]
fn force_accept_and_invalidate_move_the_favorite() {
    let (mut store, _) = store();
    let owner = staker(1, 100);
    let low = owner.proof.clone();
    let high = ProofBuilder::new(2, 0, &owner.key)
        .stake(owner.outpoint, 100, 1)
        .build();
    let (low_id, high_id) = (low.id(), high.id());
    let now = START_MS;

    assert!(matches!(
        store.register(low, now, 0, false),
        RegistrationOutcome::Registered { .. }
    ));
    assert!(matches!(
        store.register(high, now, 0, false),
        RegistrationOutcome::Rejected {
            reason: ConflictReason::CooldownNotElapsed,
            tracked: true,
            ..
        }
    ));

    assert_eq!(store.force_accept(&high_id, now + 10, 0), Some(vec![low_id]));
    assert_eq!(store.favorite_for(&owner.outpoint), Some(high_id));
    assert_eq!(store.status(&low_id), ProofStatus::Conflicting);
    assert_eq!(store.registered_count(), 1);
    assert_eq!(store.conflicting_count(), 1);

    let removal = store.invalidate(&high_id, now + 20, 0).expect("invalidate");
    assert_eq!(removal.removed, vec![high_id]);
    assert_eq!(removal.restored, vec![low_id]);
    assert_eq!(store.favorite_for(&owner.outpoint), Some(low_id));
    assert_eq!(store.conflicting_count(), 0);
    assert_eq!(store.total_stake(), 100);
}

#[test]
fn reconsider_skips_cooldown_but_not_ordering() {
    let (mut store, _) = store();
    let owner = staker(1, 100);
    let low = owner.proof.clone();
    let high = ProofBuilder::new(2, 0, &owner.key)
        .stake(owner.outpoint, 100, 1)
        .build();
    let (low_id, high_id) = (low.id(), high.id());
    let now = START_MS;

    store.register(low, now, 0, false);
    store.register(high, now, 0, false);
    assert_eq!(store.status(&high_id), ProofStatus::Conflicting);

    assert_eq!(
        store.reconsider(&high_id, now + 1, 0),
        Ok(RegistrationOutcome::Registered {
            replaced: vec![low_id]
        })
    );
    assert_eq!(
        store.reconsider(&low_id, now + 2, 0),
        Err(ProofStoreError::Conflict { favorite: high_id })
    );
    assert_eq!(
        store.reconsider(&ProofId::new([3; 32]), now, 0),
        Err(ProofStoreError::UnknownProof(ProofId::new([3; 32])))
    );
}

#[test]
fn immature_stake_is_an_orphan_and_invalid_stake_is_remembered() {
    let (mut store, verifier) = store();
    let young = staker(1, 100);
    let bogus = staker(2, 100);
    verifier.set(young.outpoint, StakeCheck::Immature);
    verifier.set(bogus.outpoint, StakeCheck::Invalid("spent".into()));

    assert_eq!(
        store.register(young.proof.clone(), START_MS, 0, false),
        RegistrationOutcome::Orphan
    );
    assert_eq!(store.orphan_count(), 1);
    assert_eq!(
        store.register(bogus.proof.clone(), START_MS, 0, false),
        RegistrationOutcome::Invalid(ProofRejection::StakeRejected("spent".into()))
    );
    assert_eq!(store.status(&bogus.id()), ProofStatus::Invalid);
    assert_eq!(
        store.register(bogus.proof.clone(), START_MS, 0, false),
        RegistrationOutcome::Invalid(ProofRejection::RecentlyInvalid)
    );
}
