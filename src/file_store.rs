//! File-backed key-value store
//!
//! Keeps the whole store as a flat TOML table. Every mutation rewrites the
//! file through a temporary sibling and a rename, so a batch removal either
//! lands completely or not at all.

use crate::constants::{FILE_PERMISSIONS, PERMISSION_MASK_GROUP_OTHER};
use crate::store::KeyValueStore;
use anyhow::{Context, Result};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Default store location
    ///
    /// - macOS: `~/Library/Application Support/quitguard/security.toml`
    /// - Linux: `~/.local/share/quitguard/security.toml`
    /// - Windows: `%APPDATA%\quitguard\security.toml`
    pub fn default_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir().context("Failed to determine data directory")?;
        Ok(data_dir.join("quitguard").join("security.toml"))
    }

    /// Open the store at `path`, starting empty if the file does not exist
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            Self::read_entries(&path)?
        } else {
            log::debug!("No store file at {}, starting empty", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_entries(path: &Path) -> Result<BTreeMap<String, String>> {
        #[cfg(unix)]
        {
            let metadata = fs::metadata(path).context("Failed to read store file metadata")?;
            let mode = metadata.permissions().mode();
            if mode & PERMISSION_MASK_GROUP_OTHER != 0 {
                log::warn!(
                    "Store file has permissive permissions: {:o}. Should be 600 (user read/write only).",
                    mode & 0o777
                );
            }
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read store file: {}", path.display()))?;
        toml::from_str(&contents)
            .with_context(|| format!("Failed to parse store file: {}", path.display()))
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context("Failed to create store directory")?;
        }

        let contents = toml::to_string_pretty(entries).context("Failed to serialize store")?;

        let tmp_path = self.path.with_extension("toml.tmp");
        fs::write(&tmp_path, contents)
            .with_context(|| format!("Failed to write store file: {}", tmp_path.display()))?;

        #[cfg(unix)]
        {
            let mut permissions = fs::metadata(&tmp_path)?.permissions();
            permissions.set_mode(FILE_PERMISSIONS);
            fs::set_permissions(&tmp_path, permissions)
                .context("Failed to set store file permissions")?;
        }

        fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to replace store file: {}", self.path.display()))?;
        Ok(())
    }

    /// Apply `change` to a copy of the entries and commit it only if the
    /// file write succeeds
    fn update<F>(&self, change: F) -> Result<()>
    where
        F: FnOnce(&mut BTreeMap<String, String>),
    {
        let mut entries = self.entries.lock();
        let mut next = entries.clone();
        change(&mut next);
        if next == *entries {
            return Ok(());
        }
        self.persist(&next)?;
        *entries = next;
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        self.update(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}
