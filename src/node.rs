use std::sync::Arc;

use ava_consensus::{
    AvalancheHandle, BlockHash, BlockInfo, Clock, Collaborators, Engine, NodeId, PeersStore,
    Poll, Response, SystemClock, TxId, TxStatus,
};
use ed25519_dalek::VerifyingKey;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

use crate::config::NodeConfig;
use crate::crypto::load_or_generate_keypair;
use crate::errors::{ChainError, ChainResult};
use crate::ledger::Ledger;
use crate::transport::{ChannelTransport, Outbound};

/// A node that has been configured but not started yet.
pub struct Node {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    transport: Arc<ChannelTransport>,
    engine: Engine,
    store: PeersStore,
    outbound: Option<mpsc::UnboundedReceiver<Outbound>>,
}

struct NodeInner {
    config: NodeConfig,
    ledger: Arc<Ledger>,
    transport: Arc<ChannelTransport>,
    avalanche: AvalancheHandle,
    session_key: VerifyingKey,
}

#[derive(Clone)]
pub struct NodeHandle {
    inner: Arc<NodeInner>,
}

impl Node {
    pub fn new(config: NodeConfig) -> ChainResult<Self> {
        let ledger = Ledger::with_genesis(config.stake_maturity, SystemClock.now_secs());
        Self::with_ledger(config, Arc::new(ledger))
    }

    /// Builds a node over an existing ledger. Persisted proofs are restored
    /// against it, so coins backing them should already be present.
    pub fn with_ledger(config: NodeConfig, ledger: Arc<Ledger>) -> ChainResult<Self> {
        config.validate()?;
        config.ensure_directories()?;
        let session_key = load_or_generate_keypair(&config.session_key_path)?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let (transport, outbound) = ChannelTransport::new();
        let transport = Arc::new(transport);

        let mut engine = Engine::new(
            config.avalanche.clone(),
            Collaborators {
                chain: ledger.clone(),
                verifier: ledger.clone(),
                transport: transport.clone(),
                mempool: Some(ledger.clone()),
            },
            clock,
            session_key,
        )?;

        let store = PeersStore::in_dir(&config.data_dir);
        if config.avalanche.persist_peers {
            let restored = store.restore(&mut engine)?;
            info!(target: "avalanche.node", restored, path = %store.path().display(), "restored persisted proofs");
        }

        Ok(Self {
            config,
            ledger,
            transport,
            engine,
            store,
            outbound: Some(outbound),
        })
    }

    pub fn ledger(&self) -> Arc<Ledger> {
        self.ledger.clone()
    }

    pub fn transport(&self) -> Arc<ChannelTransport> {
        self.transport.clone()
    }

    /// Hands the outbound message stream to a network layer. When nobody
    /// takes it, [`Node::start`] drains and discards it.
    pub fn take_outbound(&mut self) -> Option<mpsc::UnboundedReceiver<Outbound>> {
        self.outbound.take()
    }

    /// Spawns the engine task. The returned task resolves once the engine
    /// has shut down.
    pub fn start(self) -> (NodeHandle, JoinHandle<ChainResult<()>>) {
        let session_key = self.engine.session_key();
        let store = self.config.avalanche.persist_peers.then_some(self.store);
        let (avalanche, engine_task) = AvalancheHandle::spawn(self.engine, store);
        info!(
            target: "avalanche.node",
            session_key = %hex::encode(session_key.to_bytes()),
            data_dir = %self.config.data_dir.display(),
            "node started"
        );

        let drain = self.outbound.map(|mut outbound| {
            tokio::spawn(async move {
                while let Some(message) = outbound.recv().await {
                    trace!(target: "avalanche.node", ?message, "dropping outbound message");
                }
            })
        });

        let task = tokio::spawn(async move {
            let result = engine_task
                .await
                .map_err(|err| ChainError::Runtime(format!("engine task failed: {err}")));
            if let Some(drain) = drain {
                drain.abort();
            }
            result
        });

        let handle = NodeHandle {
            inner: Arc::new(NodeInner {
                config: self.config,
                ledger: self.ledger,
                transport: self.transport,
                avalanche,
                session_key,
            }),
        };
        (handle, task)
    }
}

impl NodeHandle {
    pub fn avalanche(&self) -> &AvalancheHandle {
        &self.inner.avalanche
    }

    pub fn ledger(&self) -> &Ledger {
        &self.inner.ledger
    }

    pub fn config(&self) -> &NodeConfig {
        &self.inner.config
    }

    pub fn session_key(&self) -> VerifyingKey {
        self.inner.session_key
    }

    pub fn connect_peer(&self, node: NodeId) {
        self.inner.transport.connect(node);
    }

    /// Drops the peer from the transport and from the engine's peer set.
    pub async fn disconnect_peer(&self, node: NodeId) -> ChainResult<bool> {
        self.inner.transport.disconnect(node);
        Ok(self.inner.avalanche.remove_node(node).await?)
    }

    pub fn connect_block(
        &self,
        parent: &BlockHash,
        hash: BlockHash,
        time: u64,
    ) -> ChainResult<BlockInfo> {
        let info = self.inner.ledger.connect_block(parent, hash, time)?;
        self.inner.avalanche.updated_block_tip()?;
        Ok(info)
    }

    pub fn extend_tip(&self, time: u64) -> ChainResult<BlockInfo> {
        let info = self.inner.ledger.extend_tip(time)?;
        self.inner.avalanche.updated_block_tip()?;
        Ok(info)
    }

    /// Accepts `txid` into the mempool and offers it for preconsensus.
    pub fn add_transaction(&self, txid: TxId) -> ChainResult<()> {
        self.inner.ledger.set_tx_status(txid, TxStatus::Accepted);
        self.inner.avalanche.transaction_added(txid)?;
        Ok(())
    }

    pub fn deliver_poll(&self, node: NodeId, poll: Poll) -> ChainResult<()> {
        Ok(self.inner.avalanche.submit_poll(node, poll)?)
    }

    pub fn deliver_response(&self, node: NodeId, response: Response) -> ChainResult<()> {
        Ok(self.inner.avalanche.submit_response(node, response)?)
    }

    pub async fn shutdown(&self) -> ChainResult<()> {
        if let Err(err) = self.inner.avalanche.shutdown().await {
            warn!(target: "avalanche.node", %err, "engine already stopped");
        }
        info!(target: "avalanche.node", "node stopped");
        Ok(())
    }
}
