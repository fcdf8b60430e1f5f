#![allow(dead_code)]

use ava_consensus::interfaces::{BlockInfo, BlockStatus, ChainView, StakeCheck, StakeVerifier};
use ava_consensus::types::hash256;
use ava_consensus::{BlockHash, NodeId, Outpoint, Proof, ProofBuilder, TxId};
use ed25519_dalek::SigningKey;

/// A chain that never moves past its genesis block.
pub struct StaticChain {
    pub tip: BlockInfo,
}

impl StaticChain {
    pub fn new() -> Self {
        Self {
            tip: BlockInfo {
                hash: BlockHash::new([1; 32]),
                height: 0,
                time: 0,
            },
        }
    }
}

impl ChainView for StaticChain {
    fn tip(&self) -> Option<BlockInfo> {
        Some(self.tip)
    }

    fn block(&self, hash: &BlockHash) -> Option<BlockInfo> {
        (*hash == self.tip.hash).then_some(self.tip)
    }

    fn block_status(&self, hash: &BlockHash) -> BlockStatus {
        if *hash == self.tip.hash {
            BlockStatus::Active
        } else {
            BlockStatus::Unknown
        }
    }

    fn is_ancestor(&self, ancestor: &BlockHash, descendant: &BlockHash) -> bool {
        ancestor == descendant
    }
}

pub struct AcceptAll;

impl StakeVerifier for AcceptAll {
    fn check(&self, _: &Proof) -> StakeCheck {
        StakeCheck::Valid
    }
}

pub fn signing_key(seed: u64) -> SigningKey {
    SigningKey::from_bytes(&hash256(&seed.to_le_bytes()))
}

pub fn outpoint(index: u8) -> Outpoint {
    Outpoint::new(TxId::new(hash256(&[b'u', index])), u32::from(index))
}

pub fn staked_proof(node: NodeId, amount: u64) -> (SigningKey, Proof) {
    let key = signing_key(node);
    let proof = ProofBuilder::new(1, 0, &key)
        .stake(outpoint(node as u8), amount, 1)
        .payout_script(vec![0x51, node as u8])
        .build();
    (key, proof)
}
