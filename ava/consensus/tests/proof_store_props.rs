use std::sync::Arc;

use ava_consensus::{Amount, ProofBuilder, ProofId, ProofStore};
use proptest::prelude::*;

mod common;

use common::{outpoint, signing_key, AcceptAll};

const COOLDOWN_MS: u64 = 1_000;
const START_MS: u64 = 1_700_000_000_000;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(64);
    ProptestConfig {
        cases,
        ..ProptestConfig::default()
    }
}

#[derive(Clone, Debug)]
enum Op {
    Offer { master: u64, sequence: u64, mask: u8 },
    Advance(u64),
    Invalidate(usize),
    Reconsider(usize),
    ForceAccept(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (0u64..3, 0u64..6, 1u8..16).prop_map(|(master, sequence, mask)| Op::Offer {
            master,
            sequence,
            mask
        }),
        2 => (0u64..3 * COOLDOWN_MS).prop_map(Op::Advance),
        1 => any::<usize>().prop_map(Op::Invalidate),
        1 => any::<usize>().prop_map(Op::Reconsider),
        1 => any::<usize>().prop_map(Op::ForceAccept),
    ]
}

fn assert_single_favorite(store: &ProofStore) {
    let registered: Vec<_> = store.registered().collect();
    for (i, (_, a)) in registered.iter().enumerate() {
        for (_, b) in registered.iter().skip(i + 1) {
            assert!(!a.proof.conflicts_with(&b.proof), "two favorites share an outpoint");
        }
    }
    for (id, entry) in &registered {
        for outpoint in entry.proof.outpoints() {
            assert_eq!(store.favorite_for(outpoint), Some(**id));
        }
    }
    let stake: Amount = registered.iter().map(|(_, entry)| entry.stake()).sum();
    assert_eq!(store.total_stake(), stake);
}

proptest! {
    #![proptest_config(proptest_config())]
    #[test]
    fn every_outpoint_has_at_most_one_favorite(ops in prop::collection::vec(op(), 1..48)) {
        let mut store = ProofStore::new(Arc::new(AcceptAll), COOLDOWN_MS, 60_000, 16);
        let mut now = START_MS;
        let mut seen: Vec<ProofId> = Vec::new();

        for op in ops {
            match op {
                Op::Offer { master, sequence, mask } => {
                    let key = signing_key(master);
                    let mut builder = ProofBuilder::new(sequence, 0, &key);
                    for bit in 0..4u8 {
                        if mask & (1 << bit) != 0 {
                            builder = builder.stake(outpoint(bit), 10 + u64::from(bit), 1);
                        }
                    }
                    let proof = builder.build();
                    seen.push(proof.id());
                    store.register(proof, now, 0, false);
                }
                Op::Advance(delta) => now += delta,
                Op::Invalidate(pick) if !seen.is_empty() => {
                    let _ = store.invalidate(&seen[pick % seen.len()], now, 0);
                }
                Op::Reconsider(pick) if !seen.is_empty() => {
                    let _ = store.reconsider(&seen[pick % seen.len()], now, 0);
                }
                Op::ForceAccept(pick) if !seen.is_empty() => {
                    store.force_accept(&seen[pick % seen.len()], now, 0);
                }
                _ => {}
            }
            assert_single_favorite(&store);
        }
    }
}
