use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::messages::MAX_ELEMENT_POLL;
use crate::types::Amount;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("invalid avalanche configuration: {0}")]
    Invalid(String),
}

/// Tunables of the finality engine. Every field has a default so partial
/// TOML tables deserialize.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Connected stake required before polling starts.
    pub min_quorum_stake: Amount,
    /// Share of the known stake that must be connected, in `[0, 1]`.
    pub min_connected_stake_ratio: f64,
    pub min_node_count: usize,
    pub poll_cooldown_ms: u64,
    pub query_timeout_ms: u64,
    pub conflicting_proof_cooldown_secs: u64,
    pub dangling_timeout_secs: u64,
    pub cleanup_interval_secs: u64,
    pub tick_interval_ms: u64,
    /// Consecutive decisive rounds needed to finalize.
    pub confidence_threshold: u32,
    /// Counted votes a round needs to be decisive.
    pub min_round_votes: usize,
    /// Rounds after which a record that never finalized is dropped.
    pub stale_round_threshold: u32,
    pub max_element_poll: usize,
    pub sample_size: usize,
    pub max_contenders_pollable: usize,
    pub finalized_filter_size: usize,
    pub max_orphan_proofs: usize,
    /// Poll mempool transactions.
    pub preconsensus: bool,
    /// Poll staking reward contenders.
    pub staking_preconsensus: bool,
    pub staking_rewards_activation_height: u64,
    pub staking_registration_delay_secs: u64,
    pub persist_peers: bool,
    /// Deterministic peer sampling; entropy-seeded when absent.
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let dangling_timeout_secs = 15 * 60;
        Self {
            min_quorum_stake: 100_000_000,
            min_connected_stake_ratio: 0.8,
            min_node_count: 8,
            poll_cooldown_ms: 100,
            query_timeout_ms: 10_000,
            conflicting_proof_cooldown_secs: 60,
            dangling_timeout_secs,
            cleanup_interval_secs: 5 * 60,
            tick_interval_ms: 10,
            confidence_threshold: 16,
            min_round_votes: 4,
            stale_round_threshold: 1_024,
            max_element_poll: MAX_ELEMENT_POLL,
            sample_size: 8,
            max_contenders_pollable: 12,
            finalized_filter_size: 2_048,
            max_orphan_proofs: 4_000,
            preconsensus: false,
            staking_preconsensus: false,
            staking_rewards_activation_height: 0,
            staking_registration_delay_secs: 2 * dangling_timeout_secs,
            persist_peers: true,
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.min_connected_stake_ratio) {
            return Err(ConfigError::Invalid(format!(
                "min_connected_stake_ratio must be within [0, 1], got {}",
                self.min_connected_stake_ratio
            )));
        }
        if self.max_element_poll == 0 || self.max_element_poll > MAX_ELEMENT_POLL {
            return Err(ConfigError::Invalid(format!(
                "max_element_poll must be within 1..={MAX_ELEMENT_POLL}"
            )));
        }
        if self.sample_size == 0 {
            return Err(ConfigError::Invalid("sample_size must be positive".into()));
        }
        if self.min_round_votes == 0 || self.min_round_votes > self.sample_size {
            return Err(ConfigError::Invalid(format!(
                "min_round_votes must be within 1..={}",
                self.sample_size
            )));
        }
        if self.confidence_threshold == 0 {
            return Err(ConfigError::Invalid(
                "confidence_threshold must be positive".into(),
            ));
        }
        if self.stale_round_threshold < self.confidence_threshold {
            return Err(ConfigError::Invalid(
                "stale_round_threshold must not be below confidence_threshold".into(),
            ));
        }
        if self.tick_interval_ms == 0 || self.cleanup_interval_secs == 0 {
            return Err(ConfigError::Invalid("intervals must be positive".into()));
        }
        if self.query_timeout_ms == 0 {
            return Err(ConfigError::Invalid("query_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub(crate) fn conflicting_proof_cooldown_ms(&self) -> u64 {
        self.conflicting_proof_cooldown_secs.saturating_mul(1_000)
    }

    pub(crate) fn dangling_timeout_ms(&self) -> u64 {
        self.dangling_timeout_secs.saturating_mul(1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        EngineConfig::default().validate().expect("defaults are valid");
    }

    #[test]
    fn rejects_out_of_range_values() {
        let mut config = EngineConfig::default();
        config.min_connected_stake_ratio = 1.5;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.max_element_poll = MAX_ELEMENT_POLL + 1;
        assert!(config.validate().is_err());

        let mut config = EngineConfig::default();
        config.min_round_votes = config.sample_size + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn partial_tables_fill_defaults() {
        let config: EngineConfig =
            serde_json::from_str(r#"{"confidence_threshold": 3, "min_node_count": 1}"#)
                .expect("decode");
        assert_eq!(config.confidence_threshold, 3);
        assert_eq!(config.min_node_count, 1);
        assert_eq!(config.sample_size, EngineConfig::default().sample_size);
    }
}
