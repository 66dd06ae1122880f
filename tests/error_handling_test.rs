use std::sync::Arc;

use secure_prefs::cipher::MasterKey;
use secure_prefs::storage::MemoryStorage;
use secure_prefs::{EncryptedStore, PreferenceError, PreferenceStore, StoreError};

#[test]
fn test_store_already_open_error() {
    let dir = tempfile::tempdir().unwrap();

    let _store = EncryptedStore::open_in(dir.path(), "prefs").expect("First open should succeed");

    match EncryptedStore::open_in(dir.path(), "prefs") {
        Err(StoreError::AlreadyOpen(location)) => {
            assert!(location.contains("prefs.toml.enc"));
        }
        other => panic!("Expected AlreadyOpen, got {:?}", other),
    }

    // A different store name in the same directory is a different location.
    assert!(EncryptedStore::open_in(dir.path(), "other").is_ok());
}

#[test]
fn test_store_can_be_reopened_after_drop() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = EncryptedStore::open_in(dir.path(), "prefs").unwrap();
        let mut editor = store.edit();
        editor.put_int("volume", 30);
        editor.commit().unwrap();
    }

    let store = EncryptedStore::open_in(dir.path(), "prefs").expect("Reopen should succeed");
    assert_eq!(store.get_int("volume", 50).unwrap(), 30);
}

#[test]
fn test_tampered_document_fails_to_decrypt() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = EncryptedStore::open_in(dir.path(), "prefs").unwrap();
        let mut editor = store.edit();
        editor.put_string("userName", "mallory-proof");
        editor.commit().unwrap();
    }

    let file = dir.path().join("prefs.toml.enc");
    let sealed = std::fs::read_to_string(&file).unwrap();
    // Flip one character in the middle of the ciphertext.
    let mut bytes = sealed.into_bytes();
    let middle = bytes.len() / 2;
    bytes[middle] = if bytes[middle] == b'A' { b'B' } else { b'A' };
    std::fs::write(&file, bytes).unwrap();

    let store = EncryptedStore::open_in(dir.path(), "prefs").unwrap();
    match store.get_string("userName", "") {
        Err(StoreError::Decrypt(name)) => assert_eq!(name, "prefs"),
        other => panic!("Expected Decrypt, got {:?}", other),
    }
}

#[test]
fn test_lost_key_fails_to_decrypt() {
    let backend = Arc::new(MemoryStorage::new());
    {
        let store = EncryptedStore::open_with(backend.clone(), "prefs").unwrap();
        let mut editor = store.edit();
        editor.put_bool("darkMode", true);
        editor.commit().unwrap();
    }

    backend.tamper("prefs.key", &MasterKey::generate().unwrap().to_base64());
    let store = EncryptedStore::open_with(backend, "prefs").unwrap();
    assert!(matches!(store.get_bool("darkMode", false), Err(StoreError::Decrypt(_))));
}

#[test]
fn test_garbage_key_file_is_rejected() {
    let backend = Arc::new(MemoryStorage::new());
    backend.tamper("prefs.key", "not a key");
    assert!(matches!(
        EncryptedStore::open_with(backend, "prefs"),
        Err(StoreError::InvalidKey(_))
    ));
}

#[test]
fn test_write_failure_maps_to_save_error() {
    let key = MasterKey::generate().unwrap();
    let store = EncryptedStore::open_with_key(Arc::new(MemoryStorage::failing_writes()), "prefs", &key)
        .unwrap();
    let adapter = PreferenceStore::new(Arc::new(store));

    match adapter.try_save(&Default::default()) {
        Err(PreferenceError::Save(StoreError::Storage(e))) => {
            assert!(e.to_string().contains("rejected"));
        }
        other => panic!("Expected Save(Storage), got {:?}", other),
    }
}

#[test]
fn test_error_display() {
    let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "test error");
    let display = StoreError::Storage(io_error).to_string();
    assert!(display.contains("storage error"));
    assert!(display.contains("test error"));

    let save = PreferenceError::Save(StoreError::Encrypt("prefs".to_string()));
    assert_eq!(save.to_string(), "Error saving preferences: failed to encrypt 'prefs'");

    let mismatch = StoreError::TypeMismatch {
        key: "volume".to_string(),
        expected: "int",
        found: "string",
    };
    assert_eq!(mismatch.to_string(), "value for 'volume' is string, expected int");

    assert_eq!(PreferenceError::PermissionDenied.to_string(), "Location permission denied");
}

#[test]
fn test_error_trait_implementation() {
    let error = PreferenceError::Load(StoreError::Decrypt("prefs".to_string()));
    let as_error: &dyn std::error::Error = &error;
    assert!(as_error.source().is_some());
}
