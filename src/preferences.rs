use crate::secure_prefs;

/// Languages offered by the preferences form, indexed by `language_index`.
pub const LANGUAGES: [&str; 5] = ["Español", "English", "Français", "Deutsch", "Italiano"];

pub const DEFAULT_LANGUAGE_INDEX: i32 = 0;
pub const DEFAULT_VOLUME_PERCENT: i32 = 50;
pub const NEVER_ACCESSED: &str = "Never";
pub const UNKNOWN_LOCATION: &str = "Unknown";

secure_prefs! {
    /// The user's preferences plus the values recorded on their behalf.
    pub struct UserPreferences {
        /// Display name.
        pub name: String = String::new() => "userName",
        pub dark_mode: bool = false => "darkMode",
        /// Index into [`LANGUAGES`].
        pub language_index: i32 = DEFAULT_LANGUAGE_INDEX => "language",
        /// Notification volume, 0 to 100.
        pub volume_percent: i32 = DEFAULT_VOLUME_PERCENT => "volume",
        /// Formatted local time of the previous access, or `"Never"`.
        pub last_access: String = NEVER_ACCESSED.to_string() => "lastAccess",
        /// `"Lat: .., Long: .."` of the latest fix, or `"Unknown"`.
        pub last_location: String = UNKNOWN_LOCATION.to_string() => "lastLocation",
        /// Cumulative foreground time in milliseconds.
        pub total_usage_time_millis: i64 = 0 => "totalUsageTime",
    }
}

impl UserPreferences {
    /// Brings every field into its valid range: an unknown language falls back to
    /// the first one, volume is clamped to `[0, 100]` and usage time to `>= 0`.
    pub fn normalized(mut self) -> Self {
        self.language_index = normalize_language_index(self.language_index);
        self.volume_percent = self.volume_percent.clamp(0, 100);
        self.total_usage_time_millis = self.total_usage_time_millis.max(0);
        self
    }

    pub fn language(&self) -> &'static str {
        LANGUAGES[normalize_language_index(self.language_index) as usize]
    }

    pub fn usage_display(&self) -> String {
        crate::session::format_usage(self.total_usage_time_millis)
    }
}

pub fn normalize_language_index(index: i32) -> i32 {
    if (0..LANGUAGES.len() as i32).contains(&index) {
        index
    } else {
        DEFAULT_LANGUAGE_INDEX
    }
}

/// Converts a slider position to a stored volume. Out-of-range and NaN
/// positions are clamped; fractions are truncated.
pub fn volume_from_slider(position: f32) -> i32 {
    if position.is_nan() {
        return 0;
    }
    position.clamp(0.0, 100.0) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let prefs = UserPreferences::default();
        assert_eq!(prefs.name, "");
        assert!(!prefs.dark_mode);
        assert_eq!(prefs.language_index, 0);
        assert_eq!(prefs.volume_percent, 50);
        assert_eq!(prefs.last_access, "Never");
        assert_eq!(prefs.last_location, "Unknown");
        assert_eq!(prefs.total_usage_time_millis, 0);
    }

    #[test]
    fn storage_keys() {
        assert_eq!(
            UserPreferences::KEYS,
            &[
                "userName",
                "darkMode",
                "language",
                "volume",
                "lastAccess",
                "lastLocation",
                "totalUsageTime"
            ]
        );
    }

    #[test]
    fn out_of_range_language_falls_back_to_first() {
        for bad in [-1, 5, 99, i32::MIN, i32::MAX] {
            let prefs = UserPreferences {
                language_index: bad,
                ..Default::default()
            }
            .normalized();
            assert_eq!(prefs.language_index, 0);
            assert_eq!(prefs.language(), "Español");
        }

        let prefs = UserPreferences {
            language_index: 4,
            ..Default::default()
        };
        assert_eq!(prefs.normalized().language(), "Italiano");
    }

    #[test]
    fn volume_is_clamped() {
        let loud = UserPreferences {
            volume_percent: 250,
            ..Default::default()
        };
        assert_eq!(loud.normalized().volume_percent, 100);

        let quiet = UserPreferences {
            volume_percent: -3,
            ..Default::default()
        };
        assert_eq!(quiet.normalized().volume_percent, 0);
    }

    #[test]
    fn slider_positions_become_whole_percentages() {
        assert_eq!(volume_from_slider(42.9), 42);
        assert_eq!(volume_from_slider(100.0), 100);
        assert_eq!(volume_from_slider(180.5), 100);
        assert_eq!(volume_from_slider(-4.0), 0);
        assert_eq!(volume_from_slider(f32::NAN), 0);
    }
}
