//! Encrypted key-value store with typed values and batched commits.
//!
//! All entries of a store live in one document that is serialized to TOML,
//! sealed with the store's master key and handed to a [`Storage`] backend.
//! Entries are cached in memory after the first read; a commit builds the
//! next state on a copy, persists it, and only then replaces the cache, so a
//! failed write leaves the store showing the last committed values.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::cipher::{DocumentCipher, MasterKey};
use crate::error::StoreError;
use crate::storage::Storage;

const DOCUMENT_VERSION: u32 = 1;

// Locations with a live store in this process. Two caches over one document
// would silently overwrite each other's commits.
static OPEN_STORES: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

fn open_stores() -> MutexGuard<'static, HashSet<String>> {
    OPEN_STORES.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Releases a store location when the store is dropped.
#[derive(Debug)]
struct OpenGuard(String);

impl OpenGuard {
    fn acquire(location: String) -> Result<Self, StoreError> {
        if !open_stores().insert(location.clone()) {
            return Err(StoreError::AlreadyOpen(location));
        }
        Ok(Self(location))
    }
}

impl Drop for OpenGuard {
    fn drop(&mut self) {
        open_stores().remove(&self.0);
    }
}

/// A stored value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Value {
    String(String),
    Bool(bool),
    Int(i32),
    Long(i64),
}

impl Value {
    pub fn kind(&self) -> &'static str {
        match self {
            Value::String(_) => String::KIND,
            Value::Bool(_) => bool::KIND,
            Value::Int(_) => i32::KIND,
            Value::Long(_) => i64::KIND,
        }
    }
}

/// Rust types that map onto one [`Value`] kind.
pub trait PrefValue: Sized + Clone + PartialEq {
    const KIND: &'static str;

    fn from_value(value: &Value) -> Option<Self>;

    fn into_value(self) -> Value;
}

macro_rules! pref_value {
    ($type:ty, $variant:ident, $kind:expr) => {
        impl PrefValue for $type {
            const KIND: &'static str = $kind;

            fn from_value(value: &Value) -> Option<Self> {
                match value {
                    Value::$variant(v) => Some(v.clone()),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$variant(self)
            }
        }
    };
}

pref_value!(String, String, "string");
pref_value!(bool, Bool, "bool");
pref_value!(i32, Int, "int");
pref_value!(i64, Long, "long");

#[derive(Debug, Default, Serialize, Deserialize)]
struct Document {
    version: u32,
    #[serde(default)]
    entries: BTreeMap<String, Value>,
}

#[derive(Debug, Clone)]
enum Change {
    Put(String, Value),
    Remove(String),
    Clear,
}

/// Encrypted, typed key-value store.
///
/// Only one store may be open per backend location at a time; see
/// [`StoreError::AlreadyOpen`].
#[derive(Debug)]
pub struct EncryptedStore {
    storage: Arc<dyn Storage>,
    document_key: String,
    cipher: DocumentCipher,
    entries: Mutex<Option<BTreeMap<String, Value>>>,
    _guard: OpenGuard,
    #[cfg(not(target_arch = "wasm32"))]
    _temp_dir: Option<tempfile::TempDir>,
}

impl EncryptedStore {
    /// Opens the store `name` on `storage`, creating its master key on first use.
    pub fn open_with(storage: Arc<dyn Storage>, name: &str) -> Result<Self, StoreError> {
        let guard = OpenGuard::acquire(storage.get_path(&Self::document_key_for(name)))?;
        let key = MasterKey::load_or_create(storage.as_ref(), &format!("{}.key", name))?;
        Ok(Self::build(storage, name, &key, guard))
    }

    /// Opens the store `name` on `storage` with a key managed by the host.
    pub fn open_with_key(
        storage: Arc<dyn Storage>,
        name: &str,
        key: &MasterKey,
    ) -> Result<Self, StoreError> {
        let guard = OpenGuard::acquire(storage.get_path(&Self::document_key_for(name)))?;
        Ok(Self::build(storage, name, key, guard))
    }

    /// Opens the store `name` in the platform data directory for `namespace`
    /// (e.g. `"com.example.App"`).
    #[cfg(not(target_arch = "wasm32"))]
    pub fn open(namespace: &str, name: &str) -> Result<Self, StoreError> {
        let project = directories::ProjectDirs::from(namespace, "", "")
            .ok_or_else(|| StoreError::NoDataDirectory(namespace.to_string()))?;
        Self::open_in(project.data_dir(), name)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn open(namespace: &str, name: &str) -> Result<Self, StoreError> {
        Self::open_with(Arc::from(crate::storage::create_storage(namespace)), name)
    }

    /// Opens the store `name` inside `directory`.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn open_in(directory: impl AsRef<std::path::Path>, name: &str) -> Result<Self, StoreError> {
        let storage = crate::storage::native::FileStorage::new(directory.as_ref());
        tracing::debug!(directory = %directory.as_ref().display(), name, "opening encrypted store");
        Self::open_with(Arc::new(storage), name)
    }

    /// Opens an empty store in a fresh temporary directory that is removed on drop.
    #[cfg(not(target_arch = "wasm32"))]
    pub fn open_testing() -> Result<Self, StoreError> {
        let dir = tempfile::tempdir()?;
        let mut store = Self::open_in(dir.path(), "testing")?;
        store._temp_dir = Some(dir);
        Ok(store)
    }

    #[cfg(target_arch = "wasm32")]
    pub fn open_testing() -> Result<Self, StoreError> {
        Self::open_with(Arc::new(crate::storage::MemoryStorage::new()), "testing")
    }

    fn build(storage: Arc<dyn Storage>, name: &str, key: &MasterKey, guard: OpenGuard) -> Self {
        Self {
            document_key: Self::document_key_for(name),
            cipher: DocumentCipher::new(key, name),
            storage,
            entries: Mutex::new(None),
            _guard: guard,
            #[cfg(not(target_arch = "wasm32"))]
            _temp_dir: None,
        }
    }

    fn document_key_for(name: &str) -> String {
        format!("{}.toml.enc", name)
    }

    /// Where the sealed document lives, for display purposes.
    pub fn path(&self) -> String {
        self.storage.get_path(&self.document_key)
    }

    /// Reads `key`, or returns `default` when absent.
    pub fn get<T: PrefValue>(&self, key: &str, default: T) -> Result<T, StoreError> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(default),
            Some(value) => T::from_value(value).ok_or_else(|| StoreError::TypeMismatch {
                key: key.to_string(),
                expected: T::KIND,
                found: value.kind(),
            }),
        })?
    }

    pub fn get_string(&self, key: &str, default: &str) -> Result<String, StoreError> {
        self.get(key, default.to_string())
    }

    pub fn get_bool(&self, key: &str, default: bool) -> Result<bool, StoreError> {
        self.get(key, default)
    }

    pub fn get_int(&self, key: &str, default: i32) -> Result<i32, StoreError> {
        self.get(key, default)
    }

    pub fn get_long(&self, key: &str, default: i64) -> Result<i64, StoreError> {
        self.get(key, default)
    }

    pub fn contains(&self, key: &str) -> Result<bool, StoreError> {
        self.with_entries(|entries| entries.contains_key(key))
    }

    /// Starts a batch of changes. Nothing is written until the editor is
    /// committed, applied, or dropped with pending changes.
    pub fn edit(&self) -> Editor<'_> {
        Editor {
            store: self,
            pending: Vec::new(),
        }
    }

    /// Forgets the cached entries; the next read goes back to storage.
    pub fn reload(&self) {
        *self.lock() = None;
    }

    fn lock(&self) -> MutexGuard<'_, Option<BTreeMap<String, Value>>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn with_entries<R>(
        &self,
        f: impl FnOnce(&BTreeMap<String, Value>) -> R,
    ) -> Result<R, StoreError> {
        let mut cached = self.lock();
        if cached.is_none() {
            *cached = Some(self.read_document()?);
        }
        Ok(f(cached.get_or_insert_with(BTreeMap::new)))
    }

    fn read_document(&self) -> Result<BTreeMap<String, Value>, StoreError> {
        let Some(sealed) = self.storage.read(&self.document_key)? else {
            return Ok(BTreeMap::new());
        };

        let plaintext = self.cipher.open(&sealed)?;
        let document: Document = toml::from_str(&plaintext)
            .map_err(|e| StoreError::Corrupt(self.path(), e.to_string()))?;
        tracing::debug!(path = %self.path(), entries = document.entries.len(), "loaded encrypted store");
        Ok(document.entries)
    }

    fn commit_changes(&self, changes: Vec<Change>) -> Result<(), StoreError> {
        let mut cached = self.lock();
        if cached.is_none() {
            *cached = Some(self.read_document()?);
        }
        let current = cached.get_or_insert_with(BTreeMap::new);

        let mut next = current.clone();
        for change in changes {
            match change {
                Change::Put(key, value) => {
                    next.insert(key, value);
                }
                Change::Remove(key) => {
                    next.remove(&key);
                }
                Change::Clear => next.clear(),
            }
        }
        if next == *current {
            return Ok(());
        }

        let document = Document {
            version: DOCUMENT_VERSION,
            entries: next,
        };
        let plaintext =
            toml::to_string(&document).map_err(|e| StoreError::Serialize(e.to_string()))?;
        let sealed = self.cipher.seal(&plaintext)?;
        self.storage.write(&self.document_key, &sealed)?;

        tracing::debug!(path = %self.path(), entries = document.entries.len(), "committed encrypted store");
        *current = document.entries;
        Ok(())
    }
}

/// Batch of pending changes against an [`EncryptedStore`].
#[derive(Debug)]
pub struct Editor<'a> {
    store: &'a EncryptedStore,
    pending: Vec<Change>,
}

impl<'a> Editor<'a> {
    pub fn put<T: PrefValue>(&mut self, key: &str, value: T) -> &mut Self {
        self.pending.push(Change::Put(key.to_string(), value.into_value()));
        self
    }

    pub fn put_string(&mut self, key: &str, value: impl Into<String>) -> &mut Self {
        self.put(key, value.into())
    }

    pub fn put_bool(&mut self, key: &str, value: bool) -> &mut Self {
        self.put(key, value)
    }

    pub fn put_int(&mut self, key: &str, value: i32) -> &mut Self {
        self.put(key, value)
    }

    pub fn put_long(&mut self, key: &str, value: i64) -> &mut Self {
        self.put(key, value)
    }

    pub fn remove(&mut self, key: &str) -> &mut Self {
        self.pending.push(Change::Remove(key.to_string()));
        self
    }

    pub fn clear(&mut self) -> &mut Self {
        self.pending.push(Change::Clear);
        self
    }

    /// Writes all pending changes as one document and waits for the result.
    pub fn commit(mut self) -> Result<(), StoreError> {
        let changes = std::mem::take(&mut self.pending);
        self.store.commit_changes(changes)
    }

    /// Writes all pending changes without reporting the outcome to the caller.
    pub fn apply(self) {
        let path = self.store.path();
        if let Err(e) = self.commit() {
            tracing::warn!(%path, error = %e, "background commit failed");
        }
    }
}

impl<'a> Drop for Editor<'a> {
    fn drop(&mut self) {
        if self.pending.is_empty() {
            return;
        }
        let changes = std::mem::take(&mut self.pending);
        if let Err(e) = self.store.commit_changes(changes) {
            tracing::warn!(path = %self.store.path(), error = %e, "commit of dropped editor failed");
        }
    }
}
