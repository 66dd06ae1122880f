//! Loading and saving [`UserPreferences`] against an [`EncryptedStore`].
//!
//! The `try_*` operations return typed errors. `load` and `save` wrap them
//! for hosts that only want to tell the user: failures become a notification
//! and the caller keeps its previous value.

use std::sync::Arc;

use crate::clock::{format_access_time, Clock, SystemClock};
use crate::error::PreferenceError;
use crate::notify::Notifier;
use crate::preferences::UserPreferences;
use crate::store::EncryptedStore;

pub struct PreferenceStore {
    store: Arc<EncryptedStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for PreferenceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferenceStore")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl PreferenceStore {
    pub fn new(store: Arc<EncryptedStore>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<EncryptedStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<EncryptedStore> {
        &self.store
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Reads the stored preferences and records this access.
    ///
    /// When a previous access was recorded, the current time replaces it in the
    /// store and in the returned value. When none was (the very first run), the
    /// stored state is left alone so the default `"Never"` is shown once.
    pub fn try_load(&self) -> Result<UserPreferences, PreferenceError> {
        let mut prefs = UserPreferences::read_from(&self.store)
            .map_err(PreferenceError::Load)?
            .normalized();

        let seen_before = self
            .store
            .contains(UserPreferences::LAST_ACCESS_KEY)
            .map_err(PreferenceError::Load)?;

        if seen_before {
            let now = format_access_time(&self.clock.now());
            let mut editor = self.store.edit();
            editor.put_string(UserPreferences::LAST_ACCESS_KEY, now.as_str());
            editor.apply();
            prefs.last_access = now;
        } else {
            tracing::info!(path = %self.store.path(), "first run, no previous access recorded");
        }

        tracing::debug!(language = prefs.language_index, volume = prefs.volume_percent, "loaded preferences");
        Ok(prefs)
    }

    /// Like [`try_load`](Self::try_load), but reports failures to `notifier` and
    /// returns `prior` unchanged instead.
    pub fn load(&self, prior: &UserPreferences, notifier: &dyn Notifier) -> UserPreferences {
        match self.try_load() {
            Ok(prefs) => prefs,
            Err(e) => {
                tracing::error!(error = %e, "failed to load preferences");
                notifier.notify(&e.to_string());
                prior.clone()
            }
        }
    }

    /// Writes all seven fields in one commit, stamping `lastAccess` with the
    /// current time. Returns the value as it was persisted.
    ///
    /// Usage time is written as given; fold the running session into it first.
    pub fn try_save(&self, prefs: &UserPreferences) -> Result<UserPreferences, PreferenceError> {
        let mut saved = prefs.clone().normalized();
        saved.last_access = format_access_time(&self.clock.now());

        let mut editor = self.store.edit();
        saved.write_to(&mut editor);
        editor.commit().map_err(PreferenceError::Save)?;

        tracing::debug!(total_usage_ms = saved.total_usage_time_millis, "saved preferences");
        Ok(saved)
    }

    /// Like [`try_save`](Self::try_save), but reports failures to `notifier`.
    pub fn save(&self, prefs: &UserPreferences, notifier: &dyn Notifier) -> Option<UserPreferences> {
        match self.try_save(prefs) {
            Ok(saved) => Some(saved),
            Err(e) => {
                tracing::error!(error = %e, "failed to save preferences");
                notifier.notify(&e.to_string());
                None
            }
        }
    }
}
