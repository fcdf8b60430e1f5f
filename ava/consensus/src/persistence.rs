use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::engine::{Engine, PersistedProof};

/// Bumped whenever the on-disk layout changes; other versions are ignored.
pub const PEERS_FILE_VERSION: u32 = 1;
pub const PEERS_FILE_NAME: &str = "avapeers.json";

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("encoding error: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PeersFile {
    version: u32,
    proofs: Vec<PersistedProof>,
}

/// JSON snapshot of the registered proofs, reloaded on restart.
#[derive(Debug, Clone)]
pub struct PeersStore {
    path: PathBuf,
}

impl PeersStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(PEERS_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn save(&self, proofs: Vec<PersistedProof>) -> Result<usize, PersistenceError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let count = proofs.len();
        let file = PeersFile {
            version: PEERS_FILE_VERSION,
            proofs,
        };
        let encoded = serde_json::to_string_pretty(&file)
            .map_err(|err| PersistenceError::Encoding(err.to_string()))?;
        let staging = self.path.with_extension("json.new");
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &self.path)?;
        Ok(count)
    }

    /// Missing files and unknown versions load as empty.
    pub fn load(&self) -> Result<Vec<PersistedProof>, PersistenceError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        let file: PeersFile =
            serde_json::from_str(&raw).map_err(|err| PersistenceError::Encoding(err.to_string()))?;
        if file.version != PEERS_FILE_VERSION {
            warn!(
                target: "avalanche.persistence",
                version = file.version,
                expected = PEERS_FILE_VERSION,
                "ignoring peers file with unsupported version"
            );
            return Ok(Vec::new());
        }
        Ok(file.proofs)
    }

    pub fn dump(&self, engine: &Engine) -> Result<usize, PersistenceError> {
        let count = self.save(engine.export_proofs())?;
        info!(target: "avalanche.persistence", count, path = %self.path.display(), "peers dumped");
        Ok(count)
    }

    /// Returns how many persisted proofs were registered again.
    pub fn restore(&self, engine: &mut Engine) -> Result<usize, PersistenceError> {
        let proofs = self.load()?;
        let offered = proofs.len();
        let registered = engine.import_proofs(proofs);
        info!(
            target: "avalanche.persistence",
            offered,
            registered,
            path = %self.path.display(),
            "peers restored"
        );
        Ok(registered)
    }
}
