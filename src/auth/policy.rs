//! Lock policy engine
//!
//! Owns the PIN credential, the failed-attempt counter with its lockout
//! window, the biometric flag and the last-activity timestamp. All of it
//! lives in the injected [`KeyValueStore`]; the engine itself only holds a
//! guard that serializes mutations.

use crate::auth;
use crate::clock::{self, Clock};
use crate::constants::{
    AUTO_LOCK_DEFAULT_SECONDS, LOCKOUT_DEFAULT_SECONDS, MAX_FAILED_ATTEMPTS, MIN_PIN_LENGTH,
};
use crate::error::{Result, SecurityError};
use crate::store::{
    KeyValueStore, ALL_SECURITY_KEYS, BIOMETRIC_ENABLED_KEY, FAILED_ATTEMPTS_KEY,
    LAST_ACTIVITY_KEY, LOCKED_UNTIL_KEY, PIN_ENABLED_KEY, PIN_HASH_KEY, PIN_SALT_KEY,
};
use anyhow::Context;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

/// Numeric policy for one installation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyConfig {
    pub min_pin_length: usize,
    pub max_failed_attempts: u32,
    pub lockout_duration: Duration,
    pub auto_lock_timeout: Duration,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_pin_length: MIN_PIN_LENGTH,
            max_failed_attempts: MAX_FAILED_ATTEMPTS,
            lockout_duration: Duration::from_secs(LOCKOUT_DEFAULT_SECONDS),
            auto_lock_timeout: Duration::from_secs(AUTO_LOCK_DEFAULT_SECONDS),
        }
    }
}

/// Settings the UI shows on its security screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SecuritySettings {
    pub pin_enabled: bool,
    pub biometric_enabled: bool,
    pub auto_lock_enabled: bool,
    pub auto_lock_timeout: Duration,
}

impl Default for SecuritySettings {
    fn default() -> Self {
        Self {
            pin_enabled: false,
            biometric_enabled: false,
            auto_lock_enabled: true,
            auto_lock_timeout: Duration::from_secs(AUTO_LOCK_DEFAULT_SECONDS),
        }
    }
}

/// Failed-attempt counter and lockout deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LockoutState {
    pub failed_attempts: u32,
    pub locked_until: Option<SystemTime>,
}

pub struct LockPolicy {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    config: PolicyConfig,
    /// Held for the whole of every read-modify-write on lock state
    guard: Mutex<()>,
}

impl LockPolicy {
    pub fn new(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, config: PolicyConfig) -> Self {
        Self {
            store,
            clock,
            config,
            guard: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Store a new PIN credential, replacing any previous one
    pub fn setup_pin(&self, pin: &str) -> Result<()> {
        let _guard = self.guard.lock();
        self.setup_pin_locked(pin)
    }

    /// Check a PIN, applying the failed-attempt policy
    ///
    /// # Errors
    ///
    /// - `LockedOut` while a lockout window is active (no attempt consumed)
    /// - `PinNotSet` if no credential exists (no attempt consumed)
    /// - `VerificationFailed` on a wrong PIN; `locked_for` is set when this
    ///   attempt reached the ceiling
    pub fn verify_pin(&self, pin: &str) -> Result<()> {
        let _guard = self.guard.lock();
        self.verify_pin_locked(pin)
    }

    /// Verify `old_pin`, then store `new_pin`
    ///
    /// `new_pin` is checked against the length policy first, so a weak new
    /// PIN never consumes an attempt.
    pub fn change_pin(&self, old_pin: &str, new_pin: &str) -> Result<()> {
        self.change_pin_with(old_pin, new_pin, || Ok(()))
    }

    /// [`change_pin`](Self::change_pin) with a check that runs after
    /// `old_pin` is verified and before `new_pin` is stored
    ///
    /// If `before_commit` fails the old credential stays in place.
    pub fn change_pin_with<F>(&self, old_pin: &str, new_pin: &str, before_commit: F) -> Result<()>
    where
        F: FnOnce() -> Result<()>,
    {
        let _guard = self.guard.lock();
        self.check_pin_strength(new_pin)?;
        self.verify_pin_locked(old_pin)?;
        before_commit()?;
        self.setup_pin_locked(new_pin)?;
        info!("PIN changed");
        Ok(())
    }

    /// Verify `pin`, then remove the credential and turn the PIN off
    pub fn disable_pin(&self, pin: &str) -> Result<()> {
        let _guard = self.guard.lock();
        self.verify_pin_locked(pin)?;
        self.store
            .remove_many(&[PIN_HASH_KEY, PIN_SALT_KEY, FAILED_ATTEMPTS_KEY, LOCKED_UNTIL_KEY])?;
        self.store.set(PIN_ENABLED_KEY, "false")?;
        info!("PIN disabled");
        Ok(())
    }

    /// Whether a lockout window is active; clears an expired one
    pub fn is_locked(&self) -> Result<bool> {
        let _guard = self.guard.lock();
        Ok(self.active_lockout()?.is_some())
    }

    pub fn remaining_lock_time(&self) -> Result<Duration> {
        let _guard = self.guard.lock();
        Ok(self.active_lockout()?.unwrap_or(Duration::ZERO))
    }

    pub fn lockout_state(&self) -> Result<LockoutState> {
        let _guard = self.guard.lock();
        Ok(LockoutState {
            failed_attempts: self.read_parsed(FAILED_ATTEMPTS_KEY)?.unwrap_or(0),
            locked_until: self.read_parsed(LOCKED_UNTIL_KEY)?.map(clock::from_millis),
        })
    }

    pub fn failed_attempts(&self) -> Result<u32> {
        Ok(self.lockout_state()?.failed_attempts)
    }

    pub fn is_pin_enabled(&self) -> Result<bool> {
        self.read_flag(PIN_ENABLED_KEY)
    }

    pub fn enable_biometric(&self) -> Result<()> {
        self.store.set(BIOMETRIC_ENABLED_KEY, "true")?;
        info!("Biometric unlock enabled");
        Ok(())
    }

    pub fn disable_biometric(&self) -> Result<()> {
        self.store.set(BIOMETRIC_ENABLED_KEY, "false")?;
        info!("Biometric unlock disabled");
        Ok(())
    }

    pub fn is_biometric_enabled(&self) -> Result<bool> {
        self.read_flag(BIOMETRIC_ENABLED_KEY)
    }

    /// Record now as the last moment the app was in active use
    pub fn update_last_activity(&self) -> Result<()> {
        let now = clock::to_millis(self.clock.now());
        self.store.set(LAST_ACTIVITY_KEY, &now.to_string())?;
        debug!("Last activity recorded at {}", now);
        Ok(())
    }

    /// Whether the app has been idle long enough to re-lock
    ///
    /// False when the PIN is off or no activity was ever recorded.
    pub fn should_auto_lock(&self) -> Result<bool> {
        if !self.is_pin_enabled()? {
            return Ok(false);
        }

        let last_activity = match self.read_parsed::<u64>(LAST_ACTIVITY_KEY)? {
            Some(millis) => clock::from_millis(millis),
            None => return Ok(false),
        };

        // A clock that moved backwards counts as no time elapsed
        let elapsed = self
            .clock
            .now()
            .duration_since(last_activity)
            .unwrap_or(Duration::ZERO);
        Ok(elapsed >= self.config.auto_lock_timeout)
    }

    pub fn security_settings(&self) -> Result<SecuritySettings> {
        Ok(SecuritySettings {
            pin_enabled: self.is_pin_enabled()?,
            biometric_enabled: self.is_biometric_enabled()?,
            auto_lock_enabled: true,
            auto_lock_timeout: self.config.auto_lock_timeout,
        })
    }

    /// Erase every key owned by the lock subsystem in one batch
    ///
    /// Atomicity is whatever the store's `remove_many` gives; see
    /// [`KeyValueStore::remove_many`].
    pub fn clear_security_data(&self) -> Result<()> {
        let _guard = self.guard.lock();
        self.store.remove_many(ALL_SECURITY_KEYS)?;
        info!("All security data cleared");
        Ok(())
    }

    fn check_pin_strength(&self, pin: &str) -> Result<()> {
        if pin.chars().count() < self.config.min_pin_length {
            return Err(SecurityError::WeakInput {
                min_len: self.config.min_pin_length,
            });
        }
        Ok(())
    }

    fn setup_pin_locked(&self, pin: &str) -> Result<()> {
        self.check_pin_strength(pin)?;

        let (salt, hash) = auth::hash_pin(pin)?;
        self.store.set(PIN_SALT_KEY, &salt)?;
        self.store.set(PIN_HASH_KEY, &hash)?;
        self.store.set(PIN_ENABLED_KEY, "true")?;
        self.reset_lockout()?;
        info!("PIN set up");
        Ok(())
    }

    fn verify_pin_locked(&self, pin: &str) -> Result<()> {
        if let Some(remaining) = self.active_lockout()? {
            warn!(
                "PIN attempt refused during lockout ({}s remaining)",
                remaining.as_secs()
            );
            return Err(SecurityError::LockedOut { remaining });
        }

        let salt = self.store.get(PIN_SALT_KEY)?;
        let hash = self.store.get(PIN_HASH_KEY)?;
        let (salt, hash) = match (salt, hash) {
            (Some(salt), Some(hash)) => (salt, hash),
            _ => return Err(SecurityError::PinNotSet),
        };

        if auth::verify_pin(pin, &salt, &hash)? {
            self.reset_lockout()?;
            debug!("PIN verified");
            return Ok(());
        }

        let max = self.config.max_failed_attempts;
        let failed = self
            .read_parsed::<u32>(FAILED_ATTEMPTS_KEY)?
            .unwrap_or(0)
            .saturating_add(1)
            .min(max);
        self.store.set(FAILED_ATTEMPTS_KEY, &failed.to_string())?;

        if failed >= max {
            let until = self.clock.now() + self.config.lockout_duration;
            self.store
                .set(LOCKED_UNTIL_KEY, &clock::to_millis(until).to_string())?;
            warn!(
                "Invalid PIN attempt {}/{} - locked out for {}s",
                failed,
                max,
                self.config.lockout_duration.as_secs()
            );
            return Err(SecurityError::VerificationFailed {
                remaining_attempts: 0,
                locked_for: Some(self.config.lockout_duration),
            });
        }

        warn!("Invalid PIN attempt {}/{}", failed, max);
        Err(SecurityError::VerificationFailed {
            remaining_attempts: max - failed,
            locked_for: None,
        })
    }

    /// Remaining lockout, or None once the window has passed (in which
    /// case the lockout state is reset)
    fn active_lockout(&self) -> Result<Option<Duration>> {
        let until = match self.read_parsed::<u64>(LOCKED_UNTIL_KEY)? {
            Some(millis) => clock::from_millis(millis),
            None => return Ok(None),
        };

        match until.duration_since(self.clock.now()) {
            Ok(remaining) if !remaining.is_zero() => Ok(Some(remaining)),
            _ => {
                info!("Lockout window elapsed - attempts reset");
                self.reset_lockout()?;
                Ok(None)
            }
        }
    }

    fn reset_lockout(&self) -> Result<()> {
        self.store
            .remove_many(&[FAILED_ATTEMPTS_KEY, LOCKED_UNTIL_KEY])?;
        Ok(())
    }

    fn read_flag(&self, key: &str) -> Result<bool> {
        Ok(self.store.get(key)?.as_deref() == Some("true"))
    }

    fn read_parsed<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.store.get(key)? {
            Some(raw) => {
                let value = raw
                    .trim()
                    .parse::<T>()
                    .with_context(|| format!("Stored value for '{}' is invalid: {:?}", key, raw))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}
