//! Host-facing composition of the preferences screen.
//!
//! The controller owns the in-memory [`UserPreferences`] and reacts to the
//! host's lifecycle callbacks:
//!
//! - `activate` (cold start): load, start the session.
//! - `pause` (foreground to background): fold session time, save.
//! - `resume` (background to foreground): restart the session, load.
//!
//! Every failure is turned into a user notification here; nothing propagates
//! back into the host's event loop.

use std::sync::Arc;

use crate::adapter::PreferenceStore;
use crate::clock::{Clock, SystemClock};
use crate::error::PreferenceError;
use crate::location::{self, LocationFix, LocationProvider, LocationRequest, LocationSink};
use crate::notify::{Notifier, TracingNotifier, PREFERENCES_SAVED};
use crate::preferences::{normalize_language_index, volume_from_slider, UserPreferences};
use crate::session::{format_usage, SessionTimer};
use crate::store::EncryptedStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Foreground,
    Background,
}

/// The editable part of the screen, as the widgets hold it.
#[derive(Debug, Clone, PartialEq)]
pub struct PreferencesForm {
    pub name: String,
    pub dark_mode: bool,
    /// Selected entry of the language dropdown.
    pub language_index: i32,
    /// Raw slider position.
    pub volume: f32,
}

impl PreferencesForm {
    pub fn from_preferences(prefs: &UserPreferences) -> Self {
        Self {
            name: prefs.name.clone(),
            dark_mode: prefs.dark_mode,
            language_index: prefs.language_index,
            volume: prefs.volume_percent as f32,
        }
    }

    fn apply_to(&self, prefs: &mut UserPreferences) {
        prefs.name = self.name.clone();
        prefs.dark_mode = self.dark_mode;
        prefs.language_index = normalize_language_index(self.language_index);
        prefs.volume_percent = volume_from_slider(self.volume);
    }
}

pub struct PreferencesController {
    adapter: PreferenceStore,
    location: LocationSink,
    location_request: LocationRequest,
    notifier: Arc<dyn Notifier>,
    prefs: UserPreferences,
    timer: SessionTimer,
    state: LifecycleState,
}

impl std::fmt::Debug for PreferencesController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreferencesController")
            .field("state", &self.state)
            .field("prefs", &self.prefs)
            .field("timer", &self.timer)
            .finish_non_exhaustive()
    }
}

impl PreferencesController {
    /// A controller on the system clock that reports to the log.
    pub fn new(store: Arc<EncryptedStore>) -> Self {
        Self::with_parts(store, Arc::new(SystemClock), Arc::new(TracingNotifier))
    }

    pub fn with_parts(
        store: Arc<EncryptedStore>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let timer = SessionTimer::start(clock.now_millis());
        Self {
            location: LocationSink::new(store.clone()),
            adapter: PreferenceStore::with_clock(store, clock),
            location_request: LocationRequest::default(),
            notifier,
            prefs: UserPreferences::default(),
            timer,
            state: LifecycleState::Created,
        }
    }

    pub fn with_location_request(mut self, request: LocationRequest) -> Self {
        self.location_request = request;
        self
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn preferences(&self) -> &UserPreferences {
        &self.prefs
    }

    /// Current values for populating the form widgets.
    pub fn form(&self) -> PreferencesForm {
        PreferencesForm::from_preferences(&self.prefs)
    }

    pub fn last_access(&self) -> &str {
        &self.prefs.last_access
    }

    pub fn last_location(&self) -> &str {
        &self.prefs.last_location
    }

    /// Total usage as of the last flush, as `HH:MM:SS`.
    pub fn usage_display(&self) -> String {
        format_usage(self.prefs.total_usage_time_millis)
    }

    /// Total usage including the still-running session.
    pub fn live_usage_millis(&self) -> i64 {
        if self.state != LifecycleState::Foreground {
            return self.prefs.total_usage_time_millis;
        }
        let elapsed = self.timer.elapsed(self.now_millis());
        self.prefs.total_usage_time_millis.saturating_add(elapsed)
    }

    /// Cold start.
    pub fn activate(&mut self) {
        if self.state != LifecycleState::Created {
            tracing::debug!(state = ?self.state, "activate ignored");
            return;
        }
        self.reload();
        self.timer.restart(self.now_millis());
        self.state = LifecycleState::Foreground;
        tracing::info!("preferences screen activated");
    }

    pub fn pause(&mut self) {
        if self.state != LifecycleState::Foreground {
            tracing::debug!(state = ?self.state, "pause ignored");
            return;
        }
        self.persist();
        self.state = LifecycleState::Background;
    }

    pub fn resume(&mut self) {
        if self.state != LifecycleState::Background {
            tracing::debug!(state = ?self.state, "resume ignored");
            return;
        }
        self.timer.restart(self.now_millis());
        self.reload();
        self.state = LifecycleState::Foreground;
    }

    /// The save button: takes the form's values and persists everything.
    /// Returns whether the save succeeded.
    pub fn submit(&mut self, form: &PreferencesForm) -> bool {
        form.apply_to(&mut self.prefs);
        let saved = self.persist();
        if saved {
            self.notifier.notify(PREFERENCES_SAVED);
        }
        saved
    }

    /// Location callback from the provider.
    pub fn on_location_changed(&mut self, fix: LocationFix) {
        self.prefs.last_location = fix.to_string();
        if let Err(e) = self.location.on_location_changed(fix) {
            tracing::warn!(error = %e, "failed to store location");
            self.notifier
                .notify(&format!("Error saving location: {}", source_message(&e)));
        }
    }

    /// Asks `provider` for updates with the configured cadence. Returns
    /// whether updates were started.
    pub fn start_location_updates(&self, provider: &dyn LocationProvider) -> bool {
        match location::start_updates(provider, &self.location_request) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "location updates not started");
                self.notifier.notify(&e.to_string());
                false
            }
        }
    }

    fn now_millis(&self) -> i64 {
        self.adapter.clock().now_millis()
    }

    fn reload(&mut self) {
        let loaded = self.adapter.load(&self.prefs, self.notifier.as_ref());
        // A save that failed earlier can leave an older total in storage.
        let total = self
            .prefs
            .total_usage_time_millis
            .max(loaded.total_usage_time_millis);
        self.prefs = UserPreferences {
            total_usage_time_millis: total,
            ..loaded
        };
    }

    fn persist(&mut self) -> bool {
        if self.state == LifecycleState::Foreground {
            let now = self.now_millis();
            self.prefs.total_usage_time_millis =
                self.timer.flush(self.prefs.total_usage_time_millis, now);
        }

        match self.adapter.save(&self.prefs, self.notifier.as_ref()) {
            Some(saved) => {
                self.prefs = saved;
                true
            }
            None => false,
        }
    }
}

fn source_message(error: &PreferenceError) -> String {
    match error {
        PreferenceError::Save(source) | PreferenceError::Load(source) => source.to_string(),
        other => other.to_string(),
    }
}
