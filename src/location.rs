use std::sync::Arc;
use std::time::Duration;

use crate::error::PreferenceError;
use crate::preferences::UserPreferences;
use crate::store::EncryptedStore;

/// One reported position, in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationFix {
    pub latitude: f64,
    pub longitude: f64,
}

impl LocationFix {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

impl std::fmt::Display for LocationFix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // `{:?}` keeps the `.0` on whole degrees.
        write!(f, "Lat: {:?}, Long: {:?}", self.latitude, self.longitude)
    }
}

/// How often the provider should report fixes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationRequest {
    pub min_interval: Duration,
    pub min_distance_m: f32,
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_secs(5),
            min_distance_m: 5.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
}

/// Host-side positioning provider.
pub trait LocationProvider {
    fn permission(&self) -> Permission;

    /// Asks the platform to start delivering fixes. An `Err` carries the
    /// platform's reason for refusing.
    fn request_updates(&self, request: &LocationRequest) -> Result<(), String>;
}

/// Starts updates on `provider`, checking the runtime permission first.
pub fn start_updates(
    provider: &dyn LocationProvider,
    request: &LocationRequest,
) -> Result<(), PreferenceError> {
    if provider.permission() == Permission::Denied {
        return Err(PreferenceError::PermissionDenied);
    }
    provider
        .request_updates(request)
        .map_err(PreferenceError::LocationUnavailable)?;
    tracing::debug!(
        interval_ms = request.min_interval.as_millis() as u64,
        distance_m = request.min_distance_m,
        "location updates requested"
    );
    Ok(())
}

/// Persists each fix as it arrives, independently of the save cycle.
#[derive(Debug, Clone)]
pub struct LocationSink {
    store: Arc<EncryptedStore>,
}

impl LocationSink {
    pub fn new(store: Arc<EncryptedStore>) -> Self {
        Self { store }
    }

    /// Stores the formatted fix under `lastLocation` and returns the text.
    /// A failed write is returned, not retried; the next fix overwrites it.
    pub fn on_location_changed(&self, fix: LocationFix) -> Result<String, PreferenceError> {
        let text = fix.to_string();
        let mut editor = self.store.edit();
        editor.put_string(UserPreferences::LAST_LOCATION_KEY, text.as_str());
        editor.commit().map_err(PreferenceError::Save)?;
        tracing::trace!(location = %text, "stored location fix");
        Ok(text)
    }
}
