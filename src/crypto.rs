//! Journal text obfuscation with a PIN-derived key
//!
//! This is a weak, reversible transform: each UTF-8 byte is XORed with a
//! short repeating key and the result is base64-encoded. It keeps journal
//! text from being readable in the raw store file and nothing more. There
//! is no nonce and no authentication, so identical plaintexts produce
//! identical ciphertexts and tampering goes undetected.

use crate::constants::{KEY_FOLD_ROUNDS, KEY_LANES, KEY_SALT};
use crate::error::{Result, SecurityError};
use crate::store::{KeyValueStore, ENCRYPTION_KEY_KEY};
use crate::utils;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The live codec key, wiped from memory when dropped
#[derive(Zeroize, ZeroizeOnDrop)]
struct EncryptionKey(String);

impl EncryptionKey {
    fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    fn matches(&self, other: &str) -> bool {
        utils::constant_time_eq(self.0.as_bytes(), other.as_bytes())
    }
}

/// Derive the codec key for `pin`
///
/// Folds the character codes of `pin || KEY_SALT` into a 32-bit
/// accumulator (`h = h * 31 + code`) for `KEY_FOLD_ROUNDS` passes, once
/// per lane with a distinct starting value, and hex-encodes the lanes.
fn derive_key(pin: &str) -> EncryptionKey {
    let codes: Vec<u32> = pin.chars().chain(KEY_SALT.chars()).map(u32::from).collect();

    let mut key = String::with_capacity(KEY_LANES as usize * 8);
    for lane in 0..KEY_LANES {
        let mut h: u32 = lane.wrapping_add(1).wrapping_mul(0x9E37_79B9);
        for _ in 0..KEY_FOLD_ROUNDS {
            for &code in &codes {
                h = h.wrapping_mul(31).wrapping_add(code);
            }
        }
        key.push_str(&format!("{:08x}", h));
    }
    EncryptionKey(key)
}

/// XOR `data` with `key` repeated cyclically; its own inverse
fn xor_with_key(data: &[u8], key: &[u8]) -> Vec<u8> {
    data.iter()
        .zip(key.iter().cycle())
        .map(|(byte, k)| byte ^ k)
        .collect()
}

pub struct ObfuscationCodec {
    store: Arc<dyn KeyValueStore>,
    key: Mutex<Option<EncryptionKey>>,
}

impl ObfuscationCodec {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            key: Mutex::new(None),
        }
    }

    /// Load the persisted key, or derive and persist one from `pin`
    ///
    /// Returns whether a usable key is now held. An existing persisted key
    /// always wins over `pin`.
    pub fn initialize(&self, pin: Option<&str>) -> Result<bool> {
        if let Some(stored) = self.load_persisted()? {
            *self.key.lock() = Some(EncryptionKey(stored));
            debug!("Encryption key loaded from store");
            return Ok(true);
        }

        match pin {
            Some(pin) => {
                self.rekey(pin)?;
                Ok(true)
            }
            None => {
                debug!("No stored encryption key and no PIN to derive one");
                Ok(self.is_initialized())
            }
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.key.lock().is_some()
    }

    /// Obfuscate `plaintext`
    ///
    /// # Returns
    ///
    /// Base64 of the XORed UTF-8 bytes. Deterministic for a given key.
    ///
    /// # Errors
    ///
    /// `NotInitialized` if no key is held.
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let guard = self.key.lock();
        let key = guard.as_ref().ok_or(SecurityError::NotInitialized)?;
        Ok(BASE64.encode(xor_with_key(plaintext.as_bytes(), key.as_bytes())))
    }

    /// Reverse [`encrypt`](Self::encrypt)
    ///
    /// # Errors
    ///
    /// - `NotInitialized` if no key is held
    /// - `Malformed` if `ciphertext` is not base64 or the result is not
    ///   UTF-8 (wrong key or corrupted data)
    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        let guard = self.key.lock();
        let key = guard.as_ref().ok_or(SecurityError::NotInitialized)?;

        let data = BASE64
            .decode(ciphertext)
            .map_err(|e| SecurityError::Malformed(format!("invalid base64: {}", e)))?;
        String::from_utf8(xor_with_key(&data, key.as_bytes()))
            .map_err(|_| SecurityError::Malformed("decoded text is not UTF-8".to_string()))
    }

    /// Re-key from `old_pin` to `new_pin`
    ///
    /// Returns false, changing nothing, if the key derived from `old_pin`
    /// is not the persisted one. With no persisted key at all the new key
    /// is simply adopted.
    pub fn change_key(&self, old_pin: &str, new_pin: &str) -> Result<bool> {
        if !self.matches_pin(old_pin)? {
            warn!("Encryption key change refused: old PIN does not match stored key");
            return Ok(false);
        }
        self.rekey(new_pin)?;
        info!("Encryption key changed");
        Ok(true)
    }

    /// Whether the persisted key was derived from `pin`; changes nothing
    ///
    /// True when no key is persisted, since any PIN may then claim it.
    pub fn matches_pin(&self, pin: &str) -> Result<bool> {
        Ok(self
            .load_persisted()?
            .map_or(true, |stored| derive_key(pin).matches(&stored)))
    }

    /// Derive the key for `pin` and persist it, replacing any stored key
    pub fn rekey(&self, pin: &str) -> Result<()> {
        let key = derive_key(pin);
        self.store.set(ENCRYPTION_KEY_KEY, &key.0)?;
        *self.key.lock() = Some(key);
        debug!("Encryption key derived and stored");
        Ok(())
    }

    /// Drop the live key and remove it from the store
    pub fn clear_key(&self) -> Result<()> {
        // Dropping the old value zeroizes it
        self.key.lock().take();
        self.store.remove(ENCRYPTION_KEY_KEY)?;
        info!("Encryption key cleared");
        Ok(())
    }

    fn load_persisted(&self) -> Result<Option<String>> {
        Ok(self
            .store
            .get(ENCRYPTION_KEY_KEY)?
            .filter(|key| !key.is_empty()))
    }
}
