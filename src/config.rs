//! Environment overrides for quitguard
//!
//! Environment variables optionally override the config file (see the
//! config_file module):
//! - QUITGUARD_AUTO_LOCK: auto-lock timeout in seconds
//! - QUITGUARD_LOCKOUT: lockout window in seconds

use crate::constants::{
    AUTO_LOCK_MAX_SECONDS, AUTO_LOCK_MIN_SECONDS, LOCKOUT_MAX_SECONDS, LOCKOUT_MIN_SECONDS,
};
use log::{debug, info, warn};
use std::env;

pub const AUTO_LOCK_ENV: &str = "QUITGUARD_AUTO_LOCK";
pub const LOCKOUT_ENV: &str = "QUITGUARD_LOCKOUT";

/// Parse a seconds value from `var`, accepting only `min..=max`
fn parse_seconds(var: &str, min: u64, max: u64) -> Option<u64> {
    match env::var(var) {
        Ok(val) => match val.parse::<u64>() {
            Ok(seconds) if (min..=max).contains(&seconds) => {
                info!("{} set via environment variable: {} seconds", var, seconds);
                Some(seconds)
            }
            Ok(seconds) => {
                warn!(
                    "Invalid {}: {} (must be {}-{} seconds). Ignoring.",
                    var, seconds, min, max
                );
                None
            }
            Err(e) => {
                warn!("Failed to parse {}: {}. Ignoring.", var, e);
                None
            }
        },
        Err(_) => {
            debug!("{} not set.", var);
            None
        }
    }
}

/// Parse the QUITGUARD_AUTO_LOCK environment variable
///
/// Returns Some(seconds) if a valid timeout is configured (60-3600 seconds)
pub fn parse_auto_lock_timeout() -> Option<u64> {
    parse_seconds(AUTO_LOCK_ENV, AUTO_LOCK_MIN_SECONDS, AUTO_LOCK_MAX_SECONDS)
}

/// Parse the QUITGUARD_LOCKOUT environment variable
///
/// Returns Some(seconds) if a valid window is configured (60-3600 seconds)
pub fn parse_lockout_duration() -> Option<u64> {
    parse_seconds(LOCKOUT_ENV, LOCKOUT_MIN_SECONDS, LOCKOUT_MAX_SECONDS)
}
