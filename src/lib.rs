//! # secure_prefs
//!
//! Encrypted on-device user preferences with foreground usage accounting.
//!
//! Created by Ever Accountable – an app that helps people quit compulsive porn use
//! and become the best version of themselves. More information is available at [everaccountable.com](https://everaccountable.com).
//!
//! The library is built from a few small pieces:
//!
//! - **[`store::EncryptedStore`]:** a typed key-value store whose whole document is sealed with
//!   AES-256-GCM and written through a [`storage::Storage`] backend (atomic temp-file writes on
//!   native targets, `localStorage` on wasm).
//! - **[`secure_prefs!`]:** declares a flat preference record, one `field: Type = default => "key"`
//!   line per stored value, and generates the glue that reads it from and writes it to a store.
//! - **[`adapter::PreferenceStore`]:** loads and saves [`preferences::UserPreferences`], stamping
//!   the last access time.
//! - **[`session::SessionTimer`]:** folds foreground time into a running usage total.
//! - **[`location::LocationSink`]:** persists the latest location fix as soon as it arrives.
//! - **[`controller::PreferencesController`]:** ties the above to a host's lifecycle events,
//!   form submissions and user notifications.
//!
//! **Note:** This library is NOT intended to store large quantities of data. All entries are
//! cached in memory, and the entire document is re-encrypted and rewritten on each commit.
//!
//! ## Example
//!
//! ```rust
//! use secure_prefs::secure_prefs;
//! use secure_prefs::store::EncryptedStore;
//!
//! secure_prefs! {
//!     /// Application preferences.
//!     pub struct AppPreferences {
//!         /// Whether notifications are enabled.
//!         pub notifications: bool = true => "notifications",
//!         /// The default username.
//!         pub username: String = "guest".to_string() => "username",
//!     }
//! }
//!
//! let store = EncryptedStore::open_testing().unwrap();
//! let mut prefs = AppPreferences::read_from(&store).unwrap();
//! assert!(prefs.notifications);
//!
//! prefs.notifications = false;
//! let mut editor = store.edit();
//! prefs.write_to(&mut editor);
//! editor.commit().unwrap();
//!
//! assert!(!AppPreferences::read_from(&store).unwrap().notifications);
//! ```

// Re-exported so the macro expands in crates that do not depend on paste themselves.
pub use paste;

pub mod adapter;
pub mod cipher;
pub mod clock;
pub mod config;
pub mod controller;
pub mod error;
pub mod location;
pub mod notify;
pub mod preferences;
pub mod session;
pub mod storage;
pub mod store;

pub use adapter::PreferenceStore;
pub use controller::{LifecycleState, PreferencesController, PreferencesForm};
pub use error::{PreferenceError, StoreError};
pub use preferences::UserPreferences;
pub use store::EncryptedStore;

/// Declares a flat preference record backed by an [`store::EncryptedStore`].
///
/// # Overview
/// Every field is written as `name: Type = default => "storageKey"`. Field types must implement
/// [`store::PrefValue`] (`String`, `bool`, `i32`, `i64`). The macro generates:
///
/// - the struct itself, deriving `Debug`, `Clone` and `PartialEq`, with public fields;
/// - `Default`, using the declared defaults;
/// - one `<FIELD>_KEY` constant per field (e.g. `DARK_MODE_KEY`) and a `KEYS` slice with all
///   storage keys;
/// - `read_from(&EncryptedStore)`, which reads every field, falling back to its default
///   when the key is absent;
/// - `write_to(&self, &mut Editor)`, which stages every field in an editor so that the whole
///   record is persisted by a single commit.
///
/// Renaming a field while keeping its storage key keeps existing data readable.
///
/// # Example
///
/// ```rust
/// use secure_prefs::secure_prefs;
///
/// secure_prefs! {
///     /// Example preferences for an application.
///     pub struct AppPreferences {
///         /// Whether dark mode is enabled.
///         pub dark_mode: bool = false => "darkMode",
///         /// Preferred language.
///         pub language: String = "en".to_string() => "language",
///     }
/// }
///
/// assert_eq!(AppPreferences::DARK_MODE_KEY, "darkMode");
/// assert_eq!(AppPreferences::KEYS, &["darkMode", "language"]);
/// ```
#[macro_export]
macro_rules! secure_prefs {
    (
        $(#[$outer:meta])*
        $vis:vis struct $name:ident {
            $(
                $(#[$inner:meta])*
                $field_vis:vis $field:ident: $type:ty = $default:expr => $saved_name:expr,
            )*
        }
    ) => {
        $crate::paste::paste! {
            $(#[$outer])*
            #[derive(Debug, Clone, PartialEq)]
            $vis struct $name {
                $(
                    $(#[$inner])*
                    $field_vis $field: $type,
                )*
            }

            impl Default for $name {
                fn default() -> Self {
                    $name {
                        $(
                            $field: $default,
                        )*
                    }
                }
            }

            #[allow(dead_code)]
            impl $name {
                $(
                    pub const [<$field:upper _KEY>]: &'static str = $saved_name;
                )*

                /// All storage keys, in declaration order.
                pub const KEYS: &'static [&'static str] = &[$($saved_name),*];

                /// Reads every field from `store`, using the declared default for absent keys.
                pub fn read_from(
                    store: &$crate::store::EncryptedStore,
                ) -> ::std::result::Result<Self, $crate::error::StoreError> {
                    let defaults = <Self as ::std::default::Default>::default();
                    ::std::result::Result::Ok($name {
                        $(
                            $field: store.get::<$type>($saved_name, defaults.$field)?,
                        )*
                    })
                }

                /// Stages every field in `editor`; nothing is written until the editor commits.
                pub fn write_to(&self, editor: &mut $crate::store::Editor<'_>) {
                    $(
                        editor.put::<$type>($saved_name, ::std::clone::Clone::clone(&self.$field));
                    )*
                }
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use crate::store::EncryptedStore;

    secure_prefs! {
        /// Record covering every supported value kind.
        struct TestRecord {
            pub flag: bool = true => "flag",
            pub text: String = String::new() => "text",
            pub small: i32 = 42 => "small",
            pub large: i64 = -1 => "large",
        }
    }

    secure_prefs! {
        /// Same storage keys as `TestRecord` after a field rename and a new field.
        struct TestRecordUpgraded {
            pub renamed_flag: bool = false => "flag",
            pub text: String = "fresh".to_string() => "text",
            pub added: bool = true => "added",
        }
    }

    #[test]
    fn defaults_are_used_for_missing_keys() {
        let store = EncryptedStore::open_testing().unwrap();
        let record = TestRecord::read_from(&store).unwrap();
        assert_eq!(record, TestRecord::default());
        assert!(record.flag);
        assert_eq!(record.small, 42);
        assert_eq!(record.large, -1);
    }

    #[test]
    fn write_then_read_returns_the_record() {
        let store = EncryptedStore::open_testing().unwrap();
        let record = TestRecord {
            flag: false,
            text: "hi".to_string(),
            small: 7,
            large: 1 << 40,
        };

        let mut editor = store.edit();
        record.write_to(&mut editor);
        editor.commit().unwrap();

        store.reload();
        assert_eq!(TestRecord::read_from(&store).unwrap(), record);
    }

    #[test]
    fn renamed_fields_keep_reading_their_key() {
        let store = EncryptedStore::open_testing().unwrap();
        let mut editor = store.edit();
        TestRecord {
            flag: false,
            text: "kept".to_string(),
            small: 1,
            large: 2,
        }
        .write_to(&mut editor);
        editor.commit().unwrap();

        let upgraded = TestRecordUpgraded::read_from(&store).unwrap();
        assert!(!upgraded.renamed_flag);
        assert_eq!(upgraded.text, "kept");
        assert!(upgraded.added);
    }

    #[test]
    fn key_constants_match_declaration() {
        assert_eq!(TestRecord::FLAG_KEY, "flag");
        assert_eq!(TestRecord::LARGE_KEY, "large");
        assert_eq!(TestRecord::KEYS, &["flag", "text", "small", "large"]);
    }
}
