use std::io;

use ava_consensus::{AvalancheError, PersistenceError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("cryptography error: {0}")]
    Crypto(String),
    #[error("ledger error: {0}")]
    Ledger(String),
    #[error("consensus error: {0}")]
    Consensus(#[from] AvalancheError),
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),
    #[error("runtime error: {0}")]
    Runtime(String),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

pub type ChainResult<T> = Result<T, ChainError>;
