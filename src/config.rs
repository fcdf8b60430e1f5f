use std::fs;
use std::path::{Path, PathBuf};

use ava_consensus::EngineConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{ChainError, ChainResult};

/// How strictly unknown TOML keys are treated on load.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConfigValidation {
    Relaxed,
    #[default]
    Strict,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub session_key_path: PathBuf,
    /// Stake below this maturity depth is treated as immature.
    #[serde(default = "default_stake_maturity")]
    pub stake_maturity: u64,
    #[serde(default)]
    pub avalanche: EngineConfig,
}

fn default_stake_maturity() -> u64 {
    100
}

impl NodeConfig {
    pub fn load(path: &Path) -> ChainResult<Self> {
        Self::load_with(path, ConfigValidation::Strict)
    }

    pub fn load_with(path: &Path, validation: ConfigValidation) -> ChainResult<Self> {
        let content = fs::read_to_string(path)?;
        let label = path.display().to_string();
        let config: Self = parse_toml(&content, &label, validation)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> ChainResult<()> {
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| ChainError::Config(format!("unable to encode config: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn validate(&self) -> ChainResult<()> {
        self.avalanche
            .validate()
            .map_err(|err| ChainError::Config(err.to_string()))
    }

    pub fn ensure_directories(&self) -> ChainResult<()> {
        fs::create_dir_all(&self.data_dir)?;
        if let Some(parent) = self.session_key_path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(())
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            session_key_path: PathBuf::from("./keys/session.toml"),
            stake_maturity: default_stake_maturity(),
            avalanche: EngineConfig::default(),
        }
    }
}

fn parse_toml<T: DeserializeOwned>(
    content: &str,
    label: &str,
    validation: ConfigValidation,
) -> ChainResult<T> {
    match validation {
        ConfigValidation::Relaxed => {
            toml::from_str(content).map_err(|err| ChainError::Config(format!("{label}: {err}")))
        }
        ConfigValidation::Strict => {
            let mut unknown_keys = Vec::new();
            let deserializer = toml::de::Deserializer::new(content);

            let value = serde_ignored::deserialize(deserializer, |path| {
                unknown_keys.push(path.to_string());
            })
            .map_err(|err| ChainError::Config(format!("{label}: {err}")))?;

            if !unknown_keys.is_empty() {
                return Err(ChainError::Config(format!(
                    "{label}: unknown configuration key(s): {}",
                    unknown_keys.join(", ")
                )));
            }

            Ok(value)
        }
    }
}
