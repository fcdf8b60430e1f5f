//! Node wiring around the stake-weighted polling finality engine.
//!
//! [`config::NodeConfig`] bootstraps a [`node::Node`], which owns an in-memory
//! [`ledger::Ledger`] serving as chain, stake and mempool view, and a
//! [`transport::ChannelTransport`] that queues outbound engine messages for a
//! network layer. The engine itself lives in `ava_consensus` and is
//! re-exported as [`consensus_engine`].

pub mod config;
pub mod crypto;
pub mod errors;
pub mod ledger;
pub mod node;
pub mod transport;

pub use ava_consensus as consensus_engine;
