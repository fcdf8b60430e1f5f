//! Runs an [`Engine`] inside one tokio task.
//!
//! Every mutation and query goes through the command channel, so the engine
//! only ever has a single writer and callers observe a linear history.

use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::engine::{Engine, ProofReport};
use crate::finality::VoteUpdate;
use crate::interfaces::{BlockInfo, FinalityListener};
use crate::messages::{Poll, Response, Target};
use crate::persistence::PeersStore;
use crate::proof::Proof;
use crate::proof_store::RegistrationOutcome;
use crate::quorum::QuorumStatus;
use crate::response::ResponseError;
use crate::types::{BlockHash, NodeId, ProofId, TxId};
use crate::{AvalancheError, AvalancheResult};

const UPDATE_CHANNEL_CAPACITY: usize = 1024;

type Job = Box<dyn FnOnce(&mut Engine) + Send>;

pub(crate) enum Command {
    Poll { node: NodeId, poll: Poll },
    Response { node: NodeId, response: Response },
    UpdatedBlockTip,
    TransactionAdded(TxId),
    Run(Job),
    Shutdown(oneshot::Sender<()>),
}

/// Cloneable front door to a running engine.
#[derive(Clone)]
pub struct AvalancheHandle {
    commands: mpsc::UnboundedSender<Command>,
    updates: broadcast::Sender<VoteUpdate>,
    listeners: Arc<RwLock<Vec<Arc<dyn FinalityListener>>>>,
}

impl AvalancheHandle {
    /// Moves `engine` into a new task and starts it. `store` receives a dump
    /// of the registered proofs on shutdown.
    pub fn spawn(engine: Engine, store: Option<PeersStore>) -> (Self, JoinHandle<()>) {
        let (commands, receiver) = mpsc::unbounded_channel();
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        let handle = Self {
            commands,
            updates,
            listeners: Arc::new(RwLock::new(Vec::new())),
        };
        let publisher = handle.clone();
        let task = tokio::spawn(run_loop(engine, receiver, publisher, store));
        (handle, task)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoteUpdate> {
        self.updates.subscribe()
    }

    pub fn add_listener(&self, listener: Arc<dyn FinalityListener>) {
        self.listeners.write().push(listener);
    }

    pub fn submit_poll(&self, node: NodeId, poll: Poll) -> AvalancheResult<()> {
        self.send(Command::Poll { node, poll })
    }

    pub fn submit_response(&self, node: NodeId, response: Response) -> AvalancheResult<()> {
        self.send(Command::Response { node, response })
    }

    pub fn updated_block_tip(&self) -> AvalancheResult<()> {
        self.send(Command::UpdatedBlockTip)
    }

    pub fn transaction_added(&self, txid: TxId) -> AvalancheResult<()> {
        self.send(Command::TransactionAdded(txid))
    }

    /// Runs `job` on the engine task and waits for its result.
    pub async fn call<R, F>(&self, job: F) -> AvalancheResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&mut Engine) -> R + Send + 'static,
    {
        let (reply, result) = oneshot::channel();
        self.send(Command::Run(Box::new(move |engine| {
            let _ = reply.send(job(engine));
        })))?;
        result.await.map_err(|_| AvalancheError::ChannelClosed)
    }

    pub async fn register_proof(&self, proof: Proof) -> AvalancheResult<RegistrationOutcome> {
        self.call(move |engine| engine.register_proof(proof)).await
    }

    pub async fn add_node(
        &self,
        node: NodeId,
        key: VerifyingKey,
        proofid: ProofId,
    ) -> AvalancheResult<bool> {
        self.call(move |engine| engine.add_node(node, key, proofid))
            .await
    }

    pub async fn remove_node(&self, node: NodeId) -> AvalancheResult<bool> {
        self.call(move |engine| engine.remove_node(node)).await
    }

    /// Delivers a response and reports how it was judged.
    pub async fn process_response(
        &self,
        node: NodeId,
        response: Response,
    ) -> AvalancheResult<Result<usize, ResponseError>> {
        self.call(move |engine| engine.on_response(node, response))
            .await
    }

    pub async fn add_to_reconcile(&self, target: Target) -> AvalancheResult<bool> {
        self.call(move |engine| engine.add_to_reconcile(target))
            .await
    }

    pub async fn invalidate_proof(&self, id: ProofId) -> AvalancheResult<()> {
        self.call(move |engine| engine.invalidate_proof(&id))
            .await?
    }

    pub async fn reconsider_proof(&self, id: ProofId) -> AvalancheResult<RegistrationOutcome> {
        self.call(move |engine| engine.reconsider_proof(&id))
            .await?
    }

    pub async fn reconsider_block(&self, hash: BlockHash) -> AvalancheResult<bool> {
        self.call(move |engine| engine.reconsider_block(&hash))
            .await
    }

    pub async fn quorum_status(&self) -> AvalancheResult<QuorumStatus> {
        self.call(|engine| engine.quorum_status()).await
    }

    pub async fn proof_status(&self, id: ProofId) -> AvalancheResult<ProofReport> {
        self.call(move |engine| engine.proof_report(&id)).await
    }

    pub async fn is_block_final(&self, hash: BlockHash) -> AvalancheResult<bool> {
        self.call(move |engine| engine.is_block_final(&hash))
            .await
    }

    pub async fn is_transaction_final(
        &self,
        txid: TxId,
        block: Option<BlockHash>,
    ) -> AvalancheResult<bool> {
        self.call(move |engine| engine.is_transaction_final(&txid, block.as_ref()))
            .await
    }

    pub async fn confidence(&self, target: Target) -> AvalancheResult<Option<u32>> {
        self.call(move |engine| engine.confidence(&target)).await
    }

    pub async fn finalization_tip(&self) -> AvalancheResult<Option<BlockInfo>> {
        self.call(|engine| engine.finalization_tip()).await
    }

    pub async fn staking_reward_winners(&self, block: BlockHash) -> AvalancheResult<Vec<Vec<u8>>> {
        self.call(move |engine| engine.staking_reward_winners(&block))
            .await
    }

    pub async fn set_staking_reward_winners(
        &self,
        block: BlockHash,
        payout_scripts: Vec<Vec<u8>>,
    ) -> AvalancheResult<bool> {
        self.call(move |engine| engine.set_staking_reward_winners(&block, payout_scripts))
            .await
    }

    /// Stops polling, persists peers when configured and ends the task.
    pub async fn shutdown(&self) -> AvalancheResult<()> {
        let (ack, done) = oneshot::channel();
        self.send(Command::Shutdown(ack))?;
        done.await.map_err(|_| AvalancheError::ChannelClosed)
    }

    fn send(&self, command: Command) -> AvalancheResult<()> {
        self.commands
            .send(command)
            .map_err(|_| AvalancheError::ChannelClosed)
    }

    fn publish(&self, updates: Vec<VoteUpdate>) {
        if updates.is_empty() {
            return;
        }
        let listeners = self.listeners.read().clone();
        for update in updates {
            for listener in &listeners {
                listener.on_vote_update(&update);
            }
            // No subscribers is not an error.
            let _ = self.updates.send(update);
        }
    }
}

async fn run_loop(
    mut engine: Engine,
    mut commands: mpsc::UnboundedReceiver<Command>,
    handle: AvalancheHandle,
    store: Option<PeersStore>,
) {
    let mut ticks = interval(engine.config().tick_interval());
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cleanups = interval(engine.config().cleanup_interval());
    cleanups.set_missed_tick_behavior(MissedTickBehavior::Delay);

    engine.start();
    handle.publish(engine.take_updates());
    loop {
        tokio::select! {
            _ = ticks.tick() => {
                engine.tick();
            }
            _ = cleanups.tick() => {
                engine.cleanup();
            }
            command = commands.recv() => {
                match command {
                    Some(Command::Shutdown(ack)) => {
                        shutdown(&mut engine, store.as_ref());
                        handle.publish(engine.take_updates());
                        let _ = ack.send(());
                        break;
                    }
                    Some(command) => handle_command(&mut engine, command),
                    None => {
                        shutdown(&mut engine, store.as_ref());
                        break;
                    }
                }
            }
        }
        handle.publish(engine.take_updates());
    }
    info!(target: "avalanche.runtime", "event loop exited");
}

fn handle_command(engine: &mut Engine, command: Command) {
    match command {
        Command::Poll { node, poll } => {
            engine.on_poll(node, poll);
        }
        Command::Response { node, response } => {
            if let Err(err) = engine.on_response(node, response) {
                debug!(target: "avalanche.runtime", node, %err, "response discarded");
            }
        }
        Command::UpdatedBlockTip => engine.updated_block_tip(),
        Command::TransactionAdded(txid) => {
            engine.transaction_added(txid);
        }
        Command::Run(job) => job(engine),
        Command::Shutdown(_) => {}
    }
}

fn shutdown(engine: &mut Engine, store: Option<&PeersStore>) {
    engine.stop();
    if !engine.config().persist_peers {
        return;
    }
    if let Some(store) = store {
        if let Err(err) = store.dump(engine) {
            warn!(target: "avalanche.runtime", %err, "failed to persist peers");
        }
    }
}
