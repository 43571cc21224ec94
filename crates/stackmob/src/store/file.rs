//! JSON-file credential store.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::debug;

use crate::Result;
use crate::error::StorageError;

use super::CredentialStore;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// A store backed by a single JSON object on disk.
///
/// Every write rewrites the whole file. On Unix the file is restricted to
/// the owner (0600) since it holds live tokens.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileStore {
    /// Open the store at `path`, loading existing entries if the file exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let entries = if path.exists() {
            let json = fs::read_to_string(&path).map_err(|e| io_error(&path, e))?;
            if json.trim().is_empty() {
                BTreeMap::new()
            } else {
                serde_json::from_str(&json).map_err(|e| StorageError::Serialization {
                    message: e.to_string(),
                })?
            }
        } else {
            BTreeMap::new()
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened credential file");

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| io_error(parent, e))?;
            }
        }

        let json = serde_json::to_string_pretty(entries).map_err(|e| StorageError::Serialization {
            message: e.to_string(),
        })?;
        fs::write(&self.path, json).map_err(|e| io_error(&self.path, e))?;

        #[cfg(unix)]
        {
            let mut perms = fs::metadata(&self.path)
                .map_err(|e| io_error(&self.path, e))?
                .permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.path, perms).map_err(|e| io_error(&self.path, e))?;
        }

        Ok(())
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StorageError::Io {
                path: self.path.display().to_string(),
                message: "store lock poisoned".to_string(),
            })?;
        f(&mut entries);
        self.flush(&entries)
    }
}

impl CredentialStore for FileStore {
    fn persist(&self, key: &str, value: &str) -> Result<()> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn retrieve(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.update(|entries| {
            entries.remove(key);
        })
    }
}

fn io_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Io {
        path: path.display().to_string(),
        message: err.to_string(),
    }
}
