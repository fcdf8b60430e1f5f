use std::fs;
use std::path::Path;

use ed25519_dalek::{SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};

use crate::errors::{ChainError, ChainResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredKeypair {
    pub public_key: String,
    pub secret_key: String,
}

pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut OsRng)
}

pub fn load_or_generate_keypair(path: &Path) -> ChainResult<SigningKey> {
    if path.exists() {
        load_keypair(path)
    } else {
        let keypair = generate_keypair();
        save_keypair(path, &keypair)?;
        Ok(keypair)
    }
}

pub fn save_keypair(path: &Path, keypair: &SigningKey) -> ChainResult<()> {
    let stored = StoredKeypair {
        public_key: hex::encode(keypair.verifying_key().to_bytes()),
        secret_key: hex::encode(keypair.to_bytes()),
    };
    let encoded = toml::to_string_pretty(&stored)
        .map_err(|err| ChainError::Config(format!("failed to encode keypair: {err}")))?;
    fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new(".")))?;
    fs::write(path, encoded)?;
    Ok(())
}

/// Loads a keypair and checks that the stored public half matches the secret.
pub fn load_keypair(path: &Path) -> ChainResult<SigningKey> {
    let raw = fs::read_to_string(path)?;
    let stored: StoredKeypair = toml::from_str(&raw)
        .map_err(|err| ChainError::Config(format!("failed to decode keypair: {err}")))?;
    let secret_bytes = hex::decode(&stored.secret_key)
        .map_err(|err| ChainError::Crypto(format!("invalid secret key encoding: {err}")))?;
    let secret: [u8; SECRET_KEY_LENGTH] = secret_bytes.try_into().map_err(|bytes: Vec<u8>| {
        ChainError::Crypto(format!("secret key must be 32 bytes, got {}", bytes.len()))
    })?;
    let keypair = SigningKey::from_bytes(&secret);
    let public = public_key_from_hex(&stored.public_key)?;
    if public != keypair.verifying_key() {
        return Err(ChainError::Crypto(
            "stored public key does not match secret key".into(),
        ));
    }
    Ok(keypair)
}

pub fn public_key_from_hex(data: &str) -> ChainResult<VerifyingKey> {
    let bytes = hex::decode(data)
        .map_err(|err| ChainError::Crypto(format!("invalid public key encoding: {err}")))?;
    let bytes: [u8; 32] = bytes.try_into().map_err(|bytes: Vec<u8>| {
        ChainError::Crypto(format!("public key must be 32 bytes, got {}", bytes.len()))
    })?;
    VerifyingKey::from_bytes(&bytes)
        .map_err(|err| ChainError::Crypto(format!("invalid public key bytes: {err}")))
}
