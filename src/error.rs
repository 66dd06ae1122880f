use thiserror::Error;

/// Failures of the encrypted key-value store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// The sealed document could not be authenticated with the master key.
    #[error("failed to decrypt '{0}'")]
    Decrypt(String),

    #[error("failed to encrypt '{0}'")]
    Encrypt(String),

    /// Decrypted fine but is not a valid entry document, or the base64 framing is broken.
    #[error("corrupt data in '{0}': {1}")]
    Corrupt(String, String),

    #[error("failed to serialize entries: {0}")]
    Serialize(String),

    #[error("value for '{key}' is {found}, expected {expected}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("a store is already open at '{0}'")]
    AlreadyOpen(String),

    #[error("invalid master key: {0}")]
    InvalidKey(String),

    #[error("no data directory available for namespace '{0}'")]
    NoDataDirectory(String),

    #[error("invalid config file '{path}': {source}")]
    Config {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// Failures surfaced to the preferences host, split by what the caller may want to do about them.
#[derive(Debug, Error)]
pub enum PreferenceError {
    /// Reading or decrypting stored preferences failed.
    #[error("Error loading preferences: {0}")]
    Load(#[source] StoreError),

    /// Writing or encrypting preferences failed; persisted state may be stale.
    #[error("Error saving preferences: {0}")]
    Save(#[source] StoreError),

    #[error("Location permission denied")]
    PermissionDenied,

    /// The platform refused to deliver location updates.
    #[error("Error getting location: {0}")]
    LocationUnavailable(String),
}

