//! Centralized constants for quitguard
//!
//! This module contains all policy values used throughout the crate. Each
//! constant includes documentation on its purpose, unit, and range.

// ============================================================================
// PIN POLICY
// ============================================================================

/// Minimum PIN length accepted by setup and change.
/// Unit: characters
/// Range: Fixed minimum, do not change without updating UI validation
pub const MIN_PIN_LENGTH: usize = 4;

/// Consecutive failed verifications that trigger a lockout.
/// Unit: attempts
/// Range: Fixed ceiling
pub const MAX_FAILED_ATTEMPTS: u32 = 5;

// ============================================================================
// LOCKOUT CONFIGURATION
// ============================================================================

/// Default lockout window after MAX_FAILED_ATTEMPTS failures.
/// Unit: seconds
pub const LOCKOUT_DEFAULT_SECONDS: u64 = 300;

/// Minimum lockout window a deployment may configure.
/// Unit: seconds
pub const LOCKOUT_MIN_SECONDS: u64 = 60;

/// Maximum lockout window a deployment may configure.
/// Unit: seconds
/// Range: Fixed maximum (1 hour)
pub const LOCKOUT_MAX_SECONDS: u64 = 3600;

// ============================================================================
// AUTO-LOCK CONFIGURATION
// ============================================================================

/// Default inactivity window before the app re-locks.
/// Unit: seconds
pub const AUTO_LOCK_DEFAULT_SECONDS: u64 = 300;

/// Minimum auto-lock window a deployment may configure.
/// Unit: seconds
pub const AUTO_LOCK_MIN_SECONDS: u64 = 60;

/// Maximum auto-lock window a deployment may configure.
/// Unit: seconds
/// Range: Fixed maximum (1 hour)
pub const AUTO_LOCK_MAX_SECONDS: u64 = 3600;

// ============================================================================
// OBFUSCATION CODEC
// ============================================================================

/// Fixed salt mixed into the codec key derivation.
/// Changing it makes every previously stored ciphertext unreadable.
pub const KEY_SALT: &str = "quitguard.journal.obfuscation.v1";

/// Folding rounds per key lane.
pub const KEY_FOLD_ROUNDS: u32 = 1000;

/// Number of 32-bit lanes in a derived key (4 lanes = 32 hex characters).
pub const KEY_LANES: u32 = 4;

// ============================================================================
// PIN DIGEST
// ============================================================================

/// Random salt length generated at PIN setup.
/// Unit: bytes
pub const PIN_SALT_LENGTH_BYTES: usize = 16;

// ============================================================================
// FILE PERMISSIONS
// ============================================================================

/// Store and config file permissions (user read/write only).
/// Unit: Unix permission bits (octal)
pub const FILE_PERMISSIONS: u32 = 0o600;

/// Permission mask to check for group/other access (security check).
/// Unit: Unix permission bits (octal)
pub const PERMISSION_MASK_GROUP_OTHER: u32 = 0o077;
