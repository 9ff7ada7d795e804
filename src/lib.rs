// Library interface for quitguard
// PIN gate, lockout and journal obfuscation for the quit-smoking companion app

pub mod auth;
pub mod clock;
pub mod config;
pub mod config_file;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod file_store;
pub mod notice;
pub mod session;
pub mod store;
pub mod utils;

use anyhow::{Context, Result};
use auth::PolicyConfig;
use clock::SystemClock;
use config_file::Config;
use file_store::FileStore;
use log::info;
use notice::NoticeSink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub use error::SecurityError;
pub use session::{AppState, Session};

/// Resolve the policy (precedence: explicit override > env var > config file)
pub fn resolve_policy_config(cfg: &Config, auto_lock_override: Option<u64>) -> PolicyConfig {
    let mut policy = cfg.policy_config();

    if let Some(secs) = auto_lock_override.or_else(config::parse_auto_lock_timeout) {
        policy.auto_lock_timeout = Duration::from_secs(secs);
    }
    if let Some(secs) = config::parse_lockout_duration() {
        policy.lockout_duration = Duration::from_secs(secs);
    }

    info!(
        "Auto-lock after {}s of inactivity, lockout window {}s",
        policy.auto_lock_timeout.as_secs(),
        policy.lockout_duration.as_secs()
    );
    policy
}

/// Open a started session over the file store
pub fn open_session(
    store_path: PathBuf,
    policy: PolicyConfig,
    notices: Arc<dyn NoticeSink>,
) -> Result<Session> {
    let store = FileStore::open(&store_path)
        .with_context(|| format!("Failed to open security store: {}", store_path.display()))?;
    info!("Security store: {}", store.path().display());

    let session = Session::with_store(Arc::new(store), Arc::new(SystemClock), policy, notices);
    if !session.start() {
        anyhow::bail!("Failed to load security state from {}", store_path.display());
    }
    Ok(session)
}
