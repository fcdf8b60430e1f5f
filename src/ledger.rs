//! In-memory chain, UTXO and mempool state backing the finality engine.

use std::collections::HashMap;

use ava_consensus::interfaces::{
    BlockInfo, BlockStatus, ChainView, MempoolView, StakeCheck, StakeVerifier, TxStatus,
};
use ava_consensus::types::hash256;
use ava_consensus::{Amount, BlockHash, Outpoint, Proof, TxId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::{ChainError, ChainResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coin {
    pub amount: Amount,
    pub height: u32,
}

#[derive(Clone, Debug)]
struct BlockRecord {
    info: BlockInfo,
    parent: Option<BlockHash>,
    /// Overrides the derived active/fork status when set.
    status: Option<BlockStatus>,
}

#[derive(Default)]
struct LedgerState {
    blocks: HashMap<BlockHash, BlockRecord>,
    tip: Option<BlockHash>,
    utxos: HashMap<Outpoint, Coin>,
    mempool: HashMap<TxId, TxStatus>,
}

impl LedgerState {
    fn tip_info(&self) -> Option<BlockInfo> {
        self.tip
            .and_then(|hash| self.blocks.get(&hash))
            .map(|record| record.info)
    }

    fn is_ancestor(&self, ancestor: &BlockHash, descendant: &BlockHash) -> bool {
        let Some(target) = self.blocks.get(ancestor) else {
            return false;
        };
        let mut cursor = Some(*descendant);
        while let Some(hash) = cursor {
            if hash == *ancestor {
                return true;
            }
            let Some(record) = self.blocks.get(&hash) else {
                return false;
            };
            if record.info.height <= target.info.height {
                return false;
            }
            cursor = record.parent;
        }
        false
    }
}

/// Shared ledger; every accessor takes the lock for the duration of one call.
pub struct Ledger {
    state: RwLock<LedgerState>,
    stake_maturity: u64,
}

impl Ledger {
    pub fn new(stake_maturity: u64) -> Self {
        Self {
            state: RwLock::new(LedgerState::default()),
            stake_maturity,
        }
    }

    /// Creates a ledger holding a single genesis block.
    pub fn with_genesis(stake_maturity: u64, time: u64) -> Self {
        let ledger = Self::new(stake_maturity);
        let genesis = BlockHash::new(hash256(b"genesis"));
        ledger.state.write().insert_root(genesis, time);
        ledger
    }

    pub fn tip_height(&self) -> Option<u64> {
        self.state.read().tip_info().map(|info| info.height)
    }

    /// Connects `hash` on top of `parent`. The tip moves when the new block
    /// is strictly higher than the current one.
    pub fn connect_block(
        &self,
        parent: &BlockHash,
        hash: BlockHash,
        time: u64,
    ) -> ChainResult<BlockInfo> {
        let mut state = self.state.write();
        if state.blocks.contains_key(&hash) {
            return Err(ChainError::Ledger(format!("block {hash} already connected")));
        }
        let parent_info = state
            .blocks
            .get(parent)
            .map(|record| record.info)
            .ok_or_else(|| ChainError::Ledger(format!("unknown parent block {parent}")))?;
        let info = BlockInfo {
            hash,
            height: parent_info.height + 1,
            time,
        };
        state.blocks.insert(
            hash,
            BlockRecord {
                info,
                parent: Some(*parent),
                status: None,
            },
        );
        let advances = state
            .tip_info()
            .map_or(true, |tip| info.height > tip.height);
        if advances {
            state.tip = Some(hash);
        }
        debug!(target: "avalanche.ledger", block = %hash, height = info.height, advances, "connected block");
        Ok(info)
    }

    /// Extends the current tip with a block whose hash derives from its height.
    pub fn extend_tip(&self, time: u64) -> ChainResult<BlockInfo> {
        let tip = self
            .state
            .read()
            .tip_info()
            .ok_or_else(|| ChainError::Ledger("ledger has no genesis block".into()))?;
        let mut preimage = tip.hash.as_bytes().to_vec();
        preimage.extend_from_slice(&(tip.height + 1).to_le_bytes());
        self.connect_block(&tip.hash, BlockHash::new(hash256(&preimage)), time)
    }

    /// Overrides the status reported for a block, e.g. after a parking decision.
    pub fn set_block_status(&self, hash: &BlockHash, status: BlockStatus) -> ChainResult<()> {
        let mut state = self.state.write();
        let record = state
            .blocks
            .get_mut(hash)
            .ok_or_else(|| ChainError::Ledger(format!("unknown block {hash}")))?;
        record.status = Some(status);
        Ok(())
    }

    pub fn add_coin(&self, outpoint: Outpoint, coin: Coin) {
        self.state.write().utxos.insert(outpoint, coin);
    }

    pub fn spend_coin(&self, outpoint: &Outpoint) -> Option<Coin> {
        self.state.write().utxos.remove(outpoint)
    }

    pub fn set_tx_status(&self, txid: TxId, status: TxStatus) {
        self.state.write().mempool.insert(txid, status);
    }
}

impl LedgerState {
    fn insert_root(&mut self, hash: BlockHash, time: u64) {
        self.blocks.insert(
            hash,
            BlockRecord {
                info: BlockInfo {
                    hash,
                    height: 0,
                    time,
                },
                parent: None,
                status: None,
            },
        );
        self.tip = Some(hash);
    }
}

impl ChainView for Ledger {
    fn tip(&self) -> Option<BlockInfo> {
        self.state.read().tip_info()
    }

    fn block(&self, hash: &BlockHash) -> Option<BlockInfo> {
        self.state.read().blocks.get(hash).map(|record| record.info)
    }

    fn block_status(&self, hash: &BlockHash) -> BlockStatus {
        let state = self.state.read();
        let Some(record) = state.blocks.get(hash) else {
            return BlockStatus::Unknown;
        };
        if let Some(status) = record.status {
            return status;
        }
        match state.tip {
            Some(tip) if state.is_ancestor(hash, &tip) => BlockStatus::Active,
            _ => BlockStatus::Fork,
        }
    }

    fn is_ancestor(&self, ancestor: &BlockHash, descendant: &BlockHash) -> bool {
        self.state.read().is_ancestor(ancestor, descendant)
    }
}

impl StakeVerifier for Ledger {
    fn check(&self, proof: &Proof) -> StakeCheck {
        let state = self.state.read();
        let tip_height = state.tip_info().map_or(0, |info| info.height);
        let mut outcome = StakeCheck::Valid;
        for stake in &proof.stakes {
            let Some(coin) = state.utxos.get(&stake.outpoint) else {
                outcome = StakeCheck::Missing;
                continue;
            };
            if coin.amount != stake.amount || coin.height != stake.height {
                return StakeCheck::Invalid(format!(
                    "stake {} does not match its coin",
                    stake.outpoint
                ));
            }
            let depth = tip_height.saturating_sub(u64::from(coin.height)) + 1;
            if depth < self.stake_maturity && outcome == StakeCheck::Valid {
                outcome = StakeCheck::Immature;
            }
        }
        outcome
    }
}

impl MempoolView for Ledger {
    fn tx_status(&self, txid: &TxId) -> TxStatus {
        self.state
            .read()
            .mempool
            .get(txid)
            .copied()
            .unwrap_or(TxStatus::Unknown)
    }
}
