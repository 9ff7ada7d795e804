//! Error types for the lock subsystem.

use std::time::Duration;
use thiserror::Error;

/// Errors produced by the lock policy engine and the obfuscation codec.
#[derive(Debug, Error)]
pub enum SecurityError {
    /// PIN shorter than the minimum length; nothing was persisted.
    #[error("PIN must be at least {min_len} characters")]
    WeakInput { min_len: usize },

    /// Codec used before a key was loaded or derived.
    #[error("encryption key not initialized")]
    NotInitialized,

    /// Wrong PIN. `locked_for` is set when this attempt started a lockout.
    #[error("incorrect PIN ({remaining_attempts} attempts remaining)")]
    VerificationFailed {
        remaining_attempts: u32,
        locked_for: Option<Duration>,
    },

    /// Verification refused because a lockout window is active.
    #[error("too many failed attempts, locked for {}s", .remaining.as_secs())]
    LockedOut { remaining: Duration },

    /// No PIN credential exists.
    #[error("no PIN has been set")]
    PinNotSet,

    /// Setup requested over an existing credential; change or disable it instead.
    #[error("a PIN is already set")]
    PinAlreadySet,

    /// The persisted codec key was not derived from the given PIN.
    #[error("stored encryption key does not match the PIN")]
    KeyMismatch,

    /// Protected data requested while the session is locked.
    #[error("session is locked")]
    SessionLocked,

    /// Ciphertext that is not valid base64 or does not decode to UTF-8.
    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    /// The persisted key-value store rejected a read or write.
    #[error("store failure: {0:#}")]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, SecurityError>;
