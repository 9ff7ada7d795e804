//! Session facade
//!
//! The one object the UI talks to. It pairs every PIN operation with the
//! matching codec key operation, turns component errors into a plain
//! success flag, and keeps the two transient flags the UI renders from:
//! `is_locked` and `is_authenticated`.

use crate::auth::biometric::BiometricPrompt;
use crate::auth::{LockPolicy, PolicyConfig, SecuritySettings};
use crate::clock::Clock;
use crate::crypto::ObfuscationCodec;
use crate::error::{Result, SecurityError};
use crate::notice::{Notice, NoticeSink};
use crate::store::KeyValueStore;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use std::sync::Arc;

/// Foreground lifecycle signal from the host platform
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Active,
    Background,
    Inactive,
}

struct SessionInner {
    is_locked: bool,
    is_authenticated: bool,
    loading: bool,
    settings: SecuritySettings,
}

pub struct Session {
    policy: LockPolicy,
    codec: ObfuscationCodec,
    notices: Arc<dyn NoticeSink>,
    inner: Mutex<SessionInner>,
}

impl Session {
    pub fn new(policy: LockPolicy, codec: ObfuscationCodec, notices: Arc<dyn NoticeSink>) -> Self {
        Self {
            policy,
            codec,
            notices,
            inner: Mutex::new(SessionInner {
                is_locked: false,
                is_authenticated: false,
                loading: true,
                settings: SecuritySettings::default(),
            }),
        }
    }

    /// Build the policy and codec over one shared store
    pub fn with_store(
        store: Arc<dyn KeyValueStore>,
        clock: Arc<dyn Clock>,
        config: PolicyConfig,
        notices: Arc<dyn NoticeSink>,
    ) -> Self {
        let policy = LockPolicy::new(store.clone(), clock, config);
        let codec = ObfuscationCodec::new(store);
        Self::new(policy, codec, notices)
    }

    /// Load persisted settings and decide the initial lock state
    ///
    /// With a PIN enabled the session starts locked only if the auto-lock
    /// window has passed; without one it is authenticated immediately.
    pub fn start(&self) -> bool {
        self.inner.lock().loading = true;

        let outcome = self.run("start session", || {
            let settings = self.policy.security_settings()?;
            let locked = settings.pin_enabled && self.policy.should_auto_lock()?;
            if !locked {
                self.codec.initialize(None)?;
            }
            Ok((settings, locked))
        });

        let mut inner = self.inner.lock();
        inner.loading = false;
        match outcome {
            Some((settings, locked)) => {
                inner.settings = settings;
                inner.is_locked = locked;
                inner.is_authenticated = !locked;
                info!(
                    "Session started (PIN {}, {})",
                    if settings.pin_enabled { "enabled" } else { "disabled" },
                    if locked { "locked" } else { "unlocked" }
                );
                true
            }
            None => false,
        }
    }

    /// Set the first PIN on an unlocked session
    ///
    /// Refused while locked or when a PIN already exists; replacing one
    /// goes through [`change_pin`](Self::change_pin) or
    /// [`disable_pin`](Self::disable_pin). Any codec key left in the store
    /// is replaced by one derived from `pin`.
    pub fn setup_pin(&self, pin: &str) -> bool {
        if !self.is_authenticated() {
            warn!("PIN setup refused: session is locked");
            return false;
        }
        let done = self.run("set up PIN", || {
            if self.policy.is_pin_enabled()? {
                return Err(SecurityError::PinAlreadySet);
            }
            self.policy.setup_pin(pin)?;
            self.codec.rekey(pin)
        });
        self.finish(done, true)
    }

    pub fn verify_pin(&self, pin: &str) -> bool {
        let done = self.run("verify PIN", || {
            self.policy.verify_pin(pin)?;
            Self::require_key(self.codec.initialize(Some(pin))?)
        });
        self.finish(done, true)
    }

    /// Replace the PIN and re-key the codec together
    ///
    /// The stored key is checked against `old_pin` only after the policy
    /// has verified it, so the check never bypasses attempt counting. On a
    /// mismatch the old PIN stays in place.
    pub fn change_pin(&self, old_pin: &str, new_pin: &str) -> bool {
        let done = self.run("change PIN", || {
            self.policy.change_pin_with(old_pin, new_pin, || {
                if self.codec.matches_pin(old_pin)? {
                    Ok(())
                } else {
                    Err(SecurityError::KeyMismatch)
                }
            })?;
            self.codec.rekey(new_pin)
        });
        self.finish(done, false)
    }

    pub fn disable_pin(&self, pin: &str) -> bool {
        let done = self.run("disable PIN", || {
            self.policy.disable_pin(pin)?;
            self.codec.clear_key()
        });
        self.finish(done, true)
    }

    pub fn enable_biometric(&self) -> bool {
        let done = self.run("enable biometric", || self.policy.enable_biometric());
        self.finish(done, false)
    }

    pub fn disable_biometric(&self) -> bool {
        let done = self.run("disable biometric", || self.policy.disable_biometric());
        self.finish(done, false)
    }

    /// Unlock through the device biometric prompt
    ///
    /// Only consults `prompt` when the biometric flag is on.
    pub fn authenticate_with_biometric(&self, prompt: &dyn BiometricPrompt) -> bool {
        match self.policy.is_biometric_enabled() {
            Ok(true) => {}
            Ok(false) => {
                debug!("Biometric unlock requested but not enabled");
                return false;
            }
            Err(e) => {
                error!("Failed to read biometric setting: {}", e);
                return false;
            }
        }

        match prompt.authenticate() {
            Ok(true) => {}
            Ok(false) => {
                info!("Biometric authentication declined");
                return false;
            }
            Err(e) => {
                warn!("Biometric prompt failed: {:#}", e);
                return false;
            }
        }

        let done = self.run("biometric unlock", || {
            Self::require_key(self.codec.initialize(None)?)
        });
        self.finish(done, true)
    }

    /// Lock the session immediately
    pub fn lock(&self) {
        let mut inner = self.inner.lock();
        inner.is_locked = true;
        inner.is_authenticated = false;
        info!("Session locked");
    }

    /// Unlock after the host completed its own challenge
    pub fn unlock(&self) -> bool {
        let done = self.run("unlock", || {
            self.codec.initialize(None)?;
            Ok(())
        });
        self.finish(done, true)
    }

    pub fn refresh_security_settings(&self) -> bool {
        match self.policy.security_settings() {
            Ok(settings) => {
                self.inner.lock().settings = settings;
                true
            }
            Err(e) => {
                error!("Failed to refresh security settings: {}", e);
                false
            }
        }
    }

    /// React to a foreground/background transition
    pub fn handle_app_state(&self, state: AppState) {
        match state {
            AppState::Active => match self.policy.should_auto_lock() {
                Ok(true) => {
                    info!("Auto-lock triggered after inactivity");
                    self.lock();
                }
                Ok(false) => {}
                Err(e) => error!("Auto-lock check failed: {}", e),
            },
            AppState::Background => {
                if let Err(e) = self.policy.update_last_activity() {
                    error!("Failed to record last activity: {}", e);
                }
            }
            AppState::Inactive => {}
        }
    }

    /// Erase all security state and return to a PIN-less, unlocked session
    pub fn clear_security_data(&self) -> bool {
        let done = self.run("clear security data", || {
            self.policy.clear_security_data()?;
            self.codec.clear_key()
        });
        self.finish(done, true)
    }

    /// Obfuscate journal text; requires an authenticated session
    pub fn encrypt_text(&self, plaintext: &str) -> Result<String> {
        if !self.is_authenticated() {
            return Err(SecurityError::SessionLocked);
        }
        self.codec.encrypt(plaintext)
    }

    pub fn decrypt_text(&self, ciphertext: &str) -> Result<String> {
        if !self.is_authenticated() {
            return Err(SecurityError::SessionLocked);
        }
        self.codec.decrypt(ciphertext)
    }

    pub fn is_locked(&self) -> bool {
        self.inner.lock().is_locked
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.lock().is_authenticated
    }

    pub fn loading(&self) -> bool {
        self.inner.lock().loading
    }

    pub fn security_settings(&self) -> SecuritySettings {
        self.inner.lock().settings
    }

    pub fn policy(&self) -> &LockPolicy {
        &self.policy
    }

    pub fn codec(&self) -> &ObfuscationCodec {
        &self.codec
    }

    fn require_key(initialized: bool) -> Result<()> {
        if initialized {
            Ok(())
        } else {
            Err(SecurityError::NotInitialized)
        }
    }

    /// Run one operation, converting its error into a notice or a log line
    fn run<T, F>(&self, operation: &str, f: F) -> Option<T>
    where
        F: FnOnce() -> Result<T>,
    {
        match f() {
            Ok(value) => Some(value),
            Err(e) => {
                self.report_failure(operation, &e);
                None
            }
        }
    }

    /// Apply the flag updates of a successful operation
    fn finish(&self, done: Option<()>, unlocks: bool) -> bool {
        if done.is_none() {
            return false;
        }
        if unlocks {
            let mut inner = self.inner.lock();
            inner.is_locked = false;
            inner.is_authenticated = true;
        }
        self.refresh_security_settings();
        true
    }

    fn report_failure(&self, operation: &str, err: &SecurityError) {
        match err {
            SecurityError::VerificationFailed {
                locked_for: Some(duration),
                ..
            } => self.notices.notify(&Notice::LockedOut {
                remaining: *duration,
            }),
            SecurityError::VerificationFailed {
                remaining_attempts,
                locked_for: None,
            } => self.notices.notify(&Notice::IncorrectPin {
                remaining_attempts: *remaining_attempts,
            }),
            SecurityError::LockedOut { remaining } => self.notices.notify(&Notice::LockedOut {
                remaining: *remaining,
            }),
            SecurityError::WeakInput { .. }
            | SecurityError::PinNotSet
            | SecurityError::PinAlreadySet => {
                warn!("Failed to {}: {}", operation, err)
            }
            _ => error!("Failed to {}: {}", operation, err),
        }
    }
}
