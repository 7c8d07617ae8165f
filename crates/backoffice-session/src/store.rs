//! Durable key/value storage for tokens.
//!
//! The store is deliberately dumb: strings in, strings out, no validation
//! of token shape. What the keys *mean* is decided by [`SessionState`]
//! and the refresh machinery above it.
//!
//! Two implementations are provided:
//!
//! - [`MemoryTokenStore`]: lives and dies with the process. Tests, and
//!   embedders that persist elsewhere.
//! - [`FileTokenStore`]: a JSON object on disk that survives restarts,
//!   the native counterpart of browser local storage. Other processes
//!   pointed at the same file see the same tokens; nothing synchronizes
//!   them.
//!
//! [`SessionState`]: crate::SessionState

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::SessionError;

/// Persists session tokens across restarts.
///
/// Methods are synchronous: every implementation here is local, and
/// callers rely on `set` having taken effect by the time it returns.
pub trait TokenStore: Send + Sync + 'static {
    /// Returns the stored value, if any.
    fn get(&self, key: &str) -> Option<String>;

    /// Stores `value` under `key`, overwriting any previous value.
    fn set(&self, key: &str, value: &str) -> Result<(), SessionError>;

    /// Removes one entry. Removing a missing key is not an error.
    fn clear(&self, key: &str) -> Result<(), SessionError>;

    /// Removes every entry.
    fn clear_all(&self) -> Result<(), SessionError>;
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    // A panic while holding the lock can't leave a BTreeMap half-updated
    // in a way that matters here, so keep serving the data.
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryTokenStore
// ---------------------------------------------------------------------------

/// A [`TokenStore`] backed by a map in memory.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn clear(&self, key: &str) -> Result<(), SessionError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn clear_all(&self) -> Result<(), SessionError> {
        lock(&self.entries).clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileTokenStore
// ---------------------------------------------------------------------------

/// A [`TokenStore`] persisted as a JSON object in a single file.
///
/// Every mutation rewrites the whole file through a temporary sibling and
/// a rename, so a crash mid-write leaves either the old or the new
/// contents, never a torn file. Reads are served from an in-memory copy
/// loaded at [`open`](Self::open).
#[derive(Debug)]
pub struct FileTokenStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileTokenStore {
    /// Opens (or lazily creates) the token file at `path`.
    ///
    /// A missing file is an empty store; the file is created on the first
    /// write.
    ///
    /// # Errors
    /// - [`SessionError::Io`] if the file exists but can't be read
    /// - [`SessionError::Corrupt`] if it isn't a JSON object of strings
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        let entries = match std::fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => {
                BTreeMap::new()
            }
            Ok(bytes) => {
                serde_json::from_slice(&bytes).map_err(SessionError::Corrupt)?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                BTreeMap::new()
            }
            Err(e) => return Err(SessionError::Io(e)),
        };

        tracing::debug!(
            path = %path.display(),
            entries = entries.len(),
            "token file opened"
        );

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// The file backing this store.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Applies `mutate` to a copy, writes the copy to disk, and only then
    /// installs it. The lock is held throughout, so concurrent writers
    /// can't interleave file contents, and a failed write leaves memory
    /// matching disk.
    fn update(
        &self,
        mutate: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), SessionError> {
        let mut entries = lock(&self.entries);
        let mut next = entries.clone();
        mutate(&mut next);
        write_atomically(&self.path, &next)?;
        *entries = next;
        Ok(())
    }
}

/// Sibling path used for the write-then-rename. Appends to the full file
/// name so `tokens.tmp` doesn't stage onto itself.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(OsString::from).unwrap_or_default();
    name.push(".staging");
    path.with_file_name(name)
}

/// Creates (or truncates) the staging file, owner-only from the start.
fn create_private(path: &Path) -> std::io::Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path)
}

fn write_atomically(
    path: &Path,
    entries: &BTreeMap<String, String>,
) -> Result<(), SessionError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let bytes = serde_json::to_vec_pretty(entries)
        .map_err(|e| SessionError::Io(std::io::Error::other(e)))?;

    let tmp = staging_path(path);
    let mut file = create_private(&tmp)?;
    file.write_all(&bytes)?;
    file.sync_all()?;
    drop(file);

    std::fs::rename(&tmp, path)?;
    Ok(())
}

impl TokenStore for FileTokenStore {
    fn get(&self, key: &str) -> Option<String> {
        lock(&self.entries).get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), SessionError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn clear(&self, key: &str) -> Result<(), SessionError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn clear_all(&self) -> Result<(), SessionError> {
        self.update(BTreeMap::clear)
    }
}
