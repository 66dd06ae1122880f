use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

/// Byte-level backend underneath the encrypted store.
///
/// Backends only ever see sealed, base64-encoded documents and key material;
/// encryption happens before `write` and after `read`.
pub trait Storage: Send + Sync + Debug {
    /// Read data from storage
    fn read(&self, key: &str) -> Result<Option<String>, std::io::Error>;

    /// Write data to storage
    fn write(&self, key: &str, data: &str) -> Result<(), std::io::Error>;

    /// Get the full path/key for display purposes
    fn get_path(&self, key: &str) -> String;
}

#[cfg(not(target_arch = "wasm32"))]
pub mod native {
    use super::Storage;
    use std::io::Write;
    use std::path::PathBuf;

    /// One file per key below `base_dir`, replaced atomically on every write.
    #[derive(Debug)]
    pub struct FileStorage {
        base_dir: PathBuf,
    }

    impl FileStorage {
        pub fn new(directory: impl Into<PathBuf>) -> Self {
            Self {
                base_dir: directory.into(),
            }
        }
    }

    impl Storage for FileStorage {
        fn read(&self, key: &str) -> Result<Option<String>, std::io::Error> {
            let path = self.base_dir.join(key);

            match std::fs::read_to_string(&path) {
                Ok(contents) => Ok(Some(contents)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        }

        fn write(&self, key: &str, data: &str) -> Result<(), std::io::Error> {
            let path = self.base_dir.join(key);
            let parent_dir = path.parent().unwrap_or(&self.base_dir);
            std::fs::create_dir_all(parent_dir)?;

            // A crash mid-write leaves the previous document intact.
            let mut tmp_file = tempfile::NamedTempFile::new_in(parent_dir)?;
            tmp_file.write_all(data.as_bytes())?;
            tmp_file.as_file().sync_all()?;
            tmp_file.persist(&path).map_err(|e| e.error)?;

            tracing::trace!(path = %path.display(), bytes = data.len(), "wrote storage file");
            Ok(())
        }

        fn get_path(&self, key: &str) -> String {
            self.base_dir.join(key).display().to_string()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub mod wasm {
    use super::Storage;
    use web_sys::{window, Storage as WebStorage};

    #[derive(Debug)]
    pub struct LocalStorage {
        prefix: String,
    }

    impl LocalStorage {
        pub fn new(app_id: &str) -> Self {
            Self {
                prefix: format!("secure_prefs_{}_", app_id.replace(['/', '.'], "_")),
            }
        }

        fn get_storage() -> Result<WebStorage, std::io::Error> {
            window()
                .ok_or_else(|| std::io::Error::other("window not available"))?
                .local_storage()
                .map_err(|_| std::io::Error::other("localStorage not available"))?
                .ok_or_else(|| std::io::Error::other("localStorage is null"))
        }

        fn full_key(&self, key: &str) -> String {
            format!("{}{}", self.prefix, key)
        }
    }

    impl Storage for LocalStorage {
        fn read(&self, key: &str) -> Result<Option<String>, std::io::Error> {
            let storage = Self::get_storage()?;
            let full_key = self.full_key(key);

            storage
                .get_item(&full_key)
                .map_err(|_| std::io::Error::other("failed to read from localStorage"))
        }

        fn write(&self, key: &str, data: &str) -> Result<(), std::io::Error> {
            let storage = Self::get_storage()?;
            let full_key = self.full_key(key);

            storage
                .set_item(&full_key, data)
                .map_err(|_| std::io::Error::other("failed to write to localStorage"))
        }

        fn get_path(&self, key: &str) -> String {
            format!("localStorage::{}", self.full_key(key))
        }
    }
}

/// Volatile backend for hosts without a writable data directory and for tests.
///
/// `set_fail_writes(true)` makes every subsequent `write` return an error
/// while reads keep serving the last successfully written data.
#[derive(Debug)]
pub struct MemoryStorage {
    id: u64,
    items: Mutex<HashMap<String, String>>,
    fail_writes: AtomicBool,
}

static NEXT_MEMORY_ID: AtomicU64 = AtomicU64::new(1);

impl Default for MemoryStorage {
    fn default() -> Self {
        Self {
            id: NEXT_MEMORY_ID.fetch_add(1, Ordering::Relaxed),
            items: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
        }
    }
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A backend whose writes fail from the start.
    pub fn failing_writes() -> Self {
        let storage = Self::new();
        storage.set_fail_writes(true);
        storage
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::Release);
    }

    /// Overwrites the raw stored text of `key`, bypassing write-failure injection.
    pub fn tamper(&self, key: &str, data: &str) {
        self.lock().insert(key.to_string(), data.to_string());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // The map stays consistent even if a holder panicked.
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Storage for MemoryStorage {
    fn read(&self, key: &str) -> Result<Option<String>, std::io::Error> {
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, data: &str) -> Result<(), std::io::Error> {
        if self.fail_writes.load(Ordering::Acquire) {
            return Err(std::io::Error::other(format!(
                "write to {} rejected",
                self.get_path(key)
            )));
        }
        self.lock().insert(key.to_string(), data.to_string());
        Ok(())
    }

    fn get_path(&self, key: &str) -> String {
        format!("memory-{}::{}", self.id, key)
    }
}

/// Platform-specific storage factory
#[cfg(not(target_arch = "wasm32"))]
pub fn create_storage(directory: &str) -> Box<dyn Storage> {
    Box::new(native::FileStorage::new(directory))
}

#[cfg(target_arch = "wasm32")]
pub fn create_storage(app_id: &str) -> Box<dyn Storage> {
    Box::new(wasm::LocalStorage::new(app_id))
}
