use anyhow::Result;
use ava_chain::config::{ConfigValidation, NodeConfig};
use ava_chain::crypto::{load_keypair, load_or_generate_keypair};
use ava_chain::errors::ChainError;
use std::fs;

#[test]
fn generated_config_round_trips() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("config").join("node.toml");

    let mut config = NodeConfig::default();
    config.data_dir = dir.path().join("data");
    config.avalanche.confidence_threshold = 24;
    config.avalanche.rng_seed = Some(11);
    config.save(&path)?;

    let loaded = NodeConfig::load(&path)?;
    assert_eq!(loaded, config);
    Ok(())
}

#[test]
fn unknown_keys_fail_strict_load_only() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("node.toml");
    let mut encoded = toml::to_string_pretty(&NodeConfig::default())?;
    encoded.push_str("\nrpc_listen = \"127.0.0.1:7070\"\n");
    fs::write(&path, encoded)?;

    match NodeConfig::load(&path) {
        Err(ChainError::Config(message)) => assert!(message.contains("rpc_listen")),
        other => panic!("expected config error, got {other:?}"),
    }
    let relaxed = NodeConfig::load_with(&path, ConfigValidation::Relaxed)?;
    assert_eq!(relaxed, NodeConfig::default());
    Ok(())
}

#[test]
fn invalid_engine_values_are_rejected_on_load() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("node.toml");
    let mut config = NodeConfig::default();
    config.avalanche.min_connected_stake_ratio = 1.5;
    config.save(&path)?;

    assert!(matches!(NodeConfig::load(&path), Err(ChainError::Config(_))));
    Ok(())
}

#[test]
fn session_key_is_created_once() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("keys").join("session.toml");
    let first = load_or_generate_keypair(&path)?;
    let second = load_keypair(&path)?;
    assert_eq!(first.verifying_key(), second.verifying_key());
    Ok(())
}
