use anyhow::Result;
use ring::digest;

use crate::constants::PIN_SALT_LENGTH_BYTES;

/// SHA-256 of `salt || pin`
fn pin_digest(pin: &str, salt: &[u8]) -> digest::Digest {
    let mut ctx = digest::Context::new(&digest::SHA256);
    ctx.update(salt);
    ctx.update(pin.as_bytes());
    ctx.finish()
}

/// Hash a PIN with its salt using SHA-256, hex-encoded
pub fn hash_pin(pin: &str, salt: &[u8]) -> String {
    hex::encode(pin_digest(pin, salt).as_ref())
}

/// Verify a PIN against a stored hex hash
///
/// Compares the raw digest bytes in constant time. A stored hash that is
/// not valid hex never matches.
pub fn verify_pin(pin: &str, salt: &[u8], hash: &str) -> bool {
    let stored = match hex::decode(hash) {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    constant_time_eq(pin_digest(pin, salt).as_ref(), &stored)
}

/// Byte comparison without an early exit on the first differing byte
///
/// Returns early only on a length mismatch; lengths here (digest size,
/// codec key size) are fixed and public.
#[must_use]
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Generate a fresh random salt for a new PIN
pub fn generate_salt() -> Result<Vec<u8>> {
    let mut salt = vec![0u8; PIN_SALT_LENGTH_BYTES];
    getrandom::getrandom(&mut salt)
        .map_err(|e| anyhow::anyhow!("Failed to generate PIN salt: {:?}", e))?;
    Ok(salt)
}
