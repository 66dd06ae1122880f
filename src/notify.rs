use std::sync::Mutex;

pub const PREFERENCES_SAVED: &str = "Preferences saved securely";

/// Shows a short-lived message to the user (a toast, a status line, ...).
pub trait Notifier: Send + Sync {
    fn notify(&self, message: &str);
}

/// Default notifier: hosts without a UI get the messages in their logs.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, message: &str) {
        tracing::info!(target: "secure_prefs::notify", "{}", message);
    }
}

/// Keeps every message, for hosts that render a history and for tests.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn last(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, message: &str) {
        tracing::debug!(message, "recorded notification");
        self.lock().push(message.to_string());
    }
}

