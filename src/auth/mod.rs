pub mod biometric;
pub mod policy;

use crate::utils;
use anyhow::{Context, Result};

pub use policy::{LockPolicy, PolicyConfig, SecuritySettings};

/// Verify if a PIN matches the stored hash and hex-encoded salt
pub fn verify_pin(input: &str, salt_hex: &str, stored_hash: &str) -> Result<bool> {
    let salt = hex::decode(salt_hex).context("Stored PIN salt is not valid hex")?;
    Ok(utils::verify_pin(input, &salt, stored_hash))
}

/// Hash a new PIN for storage, returning `(salt_hex, hash)`
pub fn hash_pin(pin: &str) -> Result<(String, String)> {
    let salt = utils::generate_salt()?;
    let hash = utils::hash_pin(pin, &salt);
    Ok((hex::encode(salt), hash))
}
