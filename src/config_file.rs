//! Configuration file management
//!
//! Deployment settings for the lock policy: where the security store lives
//! and the lockout / auto-lock windows. These are not user preferences; the
//! UI has no operation that changes them.

use crate::auth::PolicyConfig;
use crate::constants::{
    AUTO_LOCK_DEFAULT_SECONDS, AUTO_LOCK_MAX_SECONDS, AUTO_LOCK_MIN_SECONDS, FILE_PERMISSIONS,
    LOCKOUT_DEFAULT_SECONDS, LOCKOUT_MAX_SECONDS, LOCKOUT_MIN_SECONDS,
    PERMISSION_MASK_GROUP_OTHER,
};
use crate::file_store::FileStore;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// Application configuration stored in config.toml
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Config {
    /// Security store file (default: data dir, see `FileStore::default_path`)
    #[serde(default)]
    pub store_path: Option<PathBuf>,
    /// Auto-lock timeout in seconds (default: 300)
    #[serde(default = "default_auto_lock")]
    pub auto_lock_timeout_secs: u64,
    /// Lockout window in seconds after too many failed attempts (default: 300)
    #[serde(default = "default_lockout")]
    pub lockout_duration_secs: u64,
}

const fn default_auto_lock() -> u64 {
    AUTO_LOCK_DEFAULT_SECONDS
}

const fn default_lockout() -> u64 {
    LOCKOUT_DEFAULT_SECONDS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store_path: None,
            auto_lock_timeout_secs: default_auto_lock(),
            lockout_duration_secs: default_lockout(),
        }
    }
}

impl Config {
    /// Get the standard config file path
    ///
    /// - macOS: `~/Library/Application Support/quitguard/config.toml`
    /// - Linux: `~/.config/quitguard/config.toml`
    /// - Windows: `%APPDATA%\quitguard\config.toml`
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to determine config directory")?
            .join("quitguard");

        Ok(config_dir.join("config.toml"))
    }

    /// Load config from the standard location, or defaults if absent
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from_path(&path)
    }

    /// Load config from a specific path
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Failed to read file
    /// - TOML parsing fails
    /// - A timeout is outside its allowed range
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        #[cfg(unix)]
        {
            let metadata = fs::metadata(path).context("Failed to read config file metadata")?;
            let mode = metadata.permissions().mode();
            if mode & PERMISSION_MASK_GROUP_OTHER != 0 {
                log::warn!(
                    "Config file has permissive permissions: {:o}. Should be 600 (user read/write only).",
                    mode & 0o777
                );
            }
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&contents).context("Failed to parse config file")?;
        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;

        Ok(config)
    }

    /// Save config to a specific path with 600 permissions
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        #[cfg(unix)]
        {
            let mut permissions = fs::metadata(path)?.permissions();
            permissions.set_mode(FILE_PERMISSIONS);
            fs::set_permissions(path, permissions)
                .context("Failed to set config file permissions")?;
        }

        log::info!("Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Save to `path` unless a file is already there
    ///
    /// Returns whether the file was written. `overwrite` replaces an
    /// existing file.
    pub fn write_new(&self, path: &Path, overwrite: bool) -> Result<bool> {
        if path.exists() && !overwrite {
            log::info!("Config file already exists: {}", path.display());
            return Ok(false);
        }
        self.save_to_path(path)?;
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        if !(AUTO_LOCK_MIN_SECONDS..=AUTO_LOCK_MAX_SECONDS).contains(&self.auto_lock_timeout_secs) {
            anyhow::bail!(
                "auto_lock_timeout_secs must be {}-{} (got {})",
                AUTO_LOCK_MIN_SECONDS,
                AUTO_LOCK_MAX_SECONDS,
                self.auto_lock_timeout_secs
            );
        }
        if !(LOCKOUT_MIN_SECONDS..=LOCKOUT_MAX_SECONDS).contains(&self.lockout_duration_secs) {
            anyhow::bail!(
                "lockout_duration_secs must be {}-{} (got {})",
                LOCKOUT_MIN_SECONDS,
                LOCKOUT_MAX_SECONDS,
                self.lockout_duration_secs
            );
        }
        Ok(())
    }

    /// Resolved store location
    pub fn store_path(&self) -> Result<PathBuf> {
        match &self.store_path {
            Some(path) => Ok(path.clone()),
            None => FileStore::default_path(),
        }
    }

    pub fn policy_config(&self) -> PolicyConfig {
        PolicyConfig {
            lockout_duration: Duration::from_secs(self.lockout_duration_secs),
            auto_lock_timeout: Duration::from_secs(self.auto_lock_timeout_secs),
            ..PolicyConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_config_path() -> PathBuf {
        // Per-call unique directory so parallel tests never share a file
        use std::thread;
        use std::time::{SystemTime, UNIX_EPOCH};

        let mut base = std::env::temp_dir();
        base.push("quitguard_tests");
        base.push("config_file");

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tid = format!("{:?}", thread::current().id());
        base.push(format!("t_{nanos}_{tid}"));

        let _ = fs::create_dir_all(&base);

        base.join("config.toml")
    }

    #[test]
    fn test_missing_config_gives_defaults() {
        let path = temp_config_path();
        let config = Config::load_from_path(&path).expect("Missing file should load");
        assert_eq!(config, Config::default());
        assert_eq!(config.auto_lock_timeout_secs, 300);
        assert_eq!(config.lockout_duration_secs, 300);
    }

    #[test]
    fn test_config_save_load_roundtrip() {
        let path = temp_config_path();
        let original = Config {
            store_path: Some(PathBuf::from("/tmp/quitguard/security.toml")),
            auto_lock_timeout_secs: 120,
            lockout_duration_secs: 600,
        };

        original.save_to_path(&path).expect("Failed to save");
        let loaded = Config::load_from_path(&path).expect("Failed to load");
        assert_eq!(original, loaded);

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_write_new_keeps_existing_file() {
        let path = temp_config_path();
        let first = Config {
            auto_lock_timeout_secs: 120,
            ..Config::default()
        };
        assert!(first.write_new(&path, false).unwrap());

        let second = Config::default();
        assert!(!second.write_new(&path, false).unwrap());
        assert_eq!(Config::load_from_path(&path).unwrap(), first);

        assert!(second.write_new(&path, true).unwrap());
        assert_eq!(Config::load_from_path(&path).unwrap(), second);

        fs::remove_file(path).ok();
    }

    #[cfg(unix)]
    #[test]
    fn test_written_config_is_private() {
        let path = temp_config_path();
        Config::default().write_new(&path, false).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, FILE_PERMISSIONS);

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let path = temp_config_path();
        fs::write(&path, "auto_lock_timeout_secs = 90\n").unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.auto_lock_timeout_secs, 90);
        assert_eq!(config.lockout_duration_secs, LOCKOUT_DEFAULT_SECONDS);
        assert!(config.store_path.is_none());

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_out_of_range_timeout_rejected() {
        let path = temp_config_path();
        fs::write(&path, "auto_lock_timeout_secs = 5\n").unwrap();

        let result = Config::load_from_path(&path);
        assert!(result.is_err(), "Should reject 5 second auto-lock");
        if let Err(e) = result {
            let error_msg = format!("{:#}", e);
            assert!(
                error_msg.contains("auto_lock_timeout_secs must be"),
                "Error should name the field: {}",
                error_msg
            );
        }

        fs::remove_file(path).ok();
    }

    #[test]
    fn test_policy_config_mapping() {
        let config = Config {
            store_path: None,
            auto_lock_timeout_secs: 120,
            lockout_duration_secs: 900,
        };
        let policy = config.policy_config();
        assert_eq!(policy.auto_lock_timeout, Duration::from_secs(120));
        assert_eq!(policy.lockout_duration, Duration::from_secs(900));
        assert_eq!(policy.max_failed_attempts, 5);
        assert_eq!(policy.min_pin_length, 4);
    }
}
