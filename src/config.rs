use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::location::LocationRequest;
use crate::store::EncryptedStore;

pub const DEFAULT_STORE_NAME: &str = "encrypted_user_prefs";

/// Where the preferences live and how location updates are requested.
///
/// ```toml
/// name = "encrypted_user_prefs"
/// directory = "/data/app/prefs"
///
/// [location]
/// min_interval_ms = 5000
/// min_distance_m = 5.0
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub name: String,
    /// Overrides the platform data directory.
    pub directory: Option<PathBuf>,
    pub location: LocationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    pub min_interval_ms: u64,
    pub min_distance_m: f32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            name: DEFAULT_STORE_NAME.to_string(),
            directory: None,
            location: LocationConfig::default(),
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        let request = LocationRequest::default();
        Self {
            min_interval_ms: request.min_interval.as_millis() as u64,
            min_distance_m: request.min_distance_m,
        }
    }
}

impl LocationConfig {
    pub fn request(&self) -> LocationRequest {
        LocationRequest {
            min_interval: Duration::from_millis(self.min_interval_ms),
            min_distance_m: self.min_distance_m,
        }
    }
}

impl StoreConfig {
    pub fn from_toml_str(contents: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(contents)
    }

    /// Reads a config file; a missing file yields the defaults.
    pub fn load(path: impl AsRef<std::path::Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents).map_err(|source| StoreError::Config {
                path: path.display().to_string(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Opens the configured store. Without a `directory` the platform data
    /// directory for `namespace` is used.
    pub fn open_store(&self, namespace: &str) -> Result<Arc<EncryptedStore>, StoreError> {
        let store = match &self.directory {
            #[cfg(not(target_arch = "wasm32"))]
            Some(directory) => EncryptedStore::open_in(directory, &self.name)?,
            _ => EncryptedStore::open(namespace, &self.name)?,
        };
        Ok(Arc::new(store))
    }
}
