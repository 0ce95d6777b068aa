//! Remembers the last scroll offset per document.
//!
//! Offsets are keyed by a stable hash of the document's local path so the
//! stored format survives reimplementation: `scroll_` followed by the first
//! eight bytes of the SHA-256 of the UTF-8 path, as lowercase hex.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Persistent integer key-value collaborator.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<i64>;
    fn set(&mut self, key: &str, value: i64);
}

/// Deterministic checkpoint key for a document path.
pub fn document_key(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.as_os_str().to_string_lossy().as_bytes());
    let digest = hasher.finalize();
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest[..8]);
    format!("scroll_{:016x}", u64::from_be_bytes(prefix))
}

/// Scroll position persistence on top of any [`KeyValueStore`].
pub struct ScrollCheckpointStore<S> {
    store: S,
}

impl<S: KeyValueStore> ScrollCheckpointStore<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Overwrite the checkpoint for `document_key`.
    pub fn save(&mut self, document_key: &str, offset_pixels: u32) {
        debug!(key = document_key, offset_pixels, "Saving scroll checkpoint");
        self.store.set(document_key, i64::from(offset_pixels));
    }

    /// Last saved offset, or 0 when nothing (valid) was stored.
    pub fn load(&self, document_key: &str) -> u32 {
        match self.store.get(document_key) {
            Some(value) => u32::try_from(value).unwrap_or_else(|_| {
                warn!(key = document_key, value, "Ignoring out-of-range scroll checkpoint");
                0
            }),
            None => 0,
        }
    }

    pub fn into_inner(self) -> S {
        self.store
    }
}

/// Process-local store; nothing survives a restart.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: HashMap<String, i64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<i64> {
        self.values.get(key).copied()
    }

    fn set(&mut self, key: &str, value: i64) {
        self.values.insert(key.to_string(), value);
    }
}

/// One small TOML file per key under a cache directory.
///
/// Writes are best-effort: failures are logged and dropped so a teardown save
/// can never block or crash the host.
#[derive(Debug, Clone)]
pub struct TomlFileStore {
    root: PathBuf,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StoredValue {
    value: i64,
}

impl TomlFileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!(root = %root.display(), "Using file-backed checkpoint store");
        Self { root }
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        let file_stem: String = key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(format!("{file_stem}.toml"))
    }
}

impl KeyValueStore for TomlFileStore {
    fn get(&self, key: &str) -> Option<i64> {
        let data = fs::read_to_string(self.entry_path(key)).ok()?;
        let stored: StoredValue = toml::from_str(&data).ok()?;
        Some(stored.value)
    }

    fn set(&mut self, key: &str, value: i64) {
        let path = self.entry_path(key);
        if let Err(err) = fs::create_dir_all(&self.root) {
            warn!(root = %self.root.display(), "Failed to create checkpoint dir: {err}");
            return;
        }
        let contents = match toml::to_string(&StoredValue { value }) {
            Ok(contents) => contents,
            Err(err) => {
                warn!(key, "Failed to serialize checkpoint: {err}");
                return;
            }
        };
        if let Err(err) = fs::write(&path, contents) {
            warn!(path = %path.display(), "Failed to write checkpoint: {err}");
        }
    }
}
