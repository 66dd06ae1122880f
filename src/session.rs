//! Foreground usage accounting.
//!
//! A [`SessionTimer`] remembers when the current foreground session started.
//! Flushing folds the time since then into a running total and restarts the
//! session at the flush instant, so flushing twice never counts time twice.

/// Tracks the start of the current foreground session, in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimer {
    session_start: i64,
}

impl SessionTimer {
    pub fn start(now_millis: i64) -> Self {
        Self {
            session_start: now_millis,
        }
    }

    /// Begins a new session, discarding any unflushed time.
    pub fn restart(&mut self, now_millis: i64) {
        self.session_start = now_millis;
    }

    pub fn session_start(&self) -> i64 {
        self.session_start
    }

    /// Time spent in the current session so far. A clock that stepped
    /// backwards counts as zero.
    pub fn elapsed(&self, now_millis: i64) -> i64 {
        now_millis.saturating_sub(self.session_start).max(0)
    }

    /// Adds the current session's time to `total_millis` and restarts the session.
    pub fn flush(&mut self, total_millis: i64, now_millis: i64) -> i64 {
        let elapsed = self.elapsed(now_millis);
        self.session_start = now_millis;
        let total = total_millis.max(0).saturating_add(elapsed);
        tracing::trace!(elapsed, total, "flushed session time");
        total
    }
}

/// Renders a millisecond total as `HH:MM:SS`; hours are not wrapped.
pub fn format_usage(total_millis: i64) -> String {
    let total_seconds = total_millis.max(0) / 1000;
    let seconds = total_seconds % 60;
    let minutes = (total_seconds / 60) % 60;
    let hours = total_seconds / 3600;

    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_hours_minutes_seconds() {
        assert_eq!(format_usage(0), "00:00:00");
        assert_eq!(format_usage(999), "00:00:00");
        assert_eq!(format_usage(3_661_000), "01:01:01");
        assert_eq!(format_usage(59_000), "00:00:59");
        assert_eq!(format_usage(3_600_000 * 125 + 61_000), "125:01:01");
    }

    #[test]
    fn negative_totals_render_as_zero() {
        assert_eq!(format_usage(-5_000), "00:00:00");
    }

    #[test]
    fn flush_accumulates_and_restarts() {
        let mut timer = SessionTimer::start(1_000);
        let total = timer.flush(0, 4_000);
        assert_eq!(total, 3_000);
        assert_eq!(timer.session_start(), 4_000);

        // An immediate second flush adds nothing.
        assert_eq!(timer.flush(total, 4_000), 3_000);
    }

    #[test]
    fn sessions_sum_across_restarts() {
        let durations = [1_500, 60_000, 3_600_000, 7];
        let mut now = 10_000;
        let mut timer = SessionTimer::start(now);
        let mut total = 0;

        for d in durations {
            timer.restart(now);
            now += d;
            total = timer.flush(total, now);
            // time in background is not counted
            now += 123_456;
        }

        assert_eq!(total, durations.iter().sum::<i64>());
    }

    #[test]
    fn clock_going_backwards_never_lowers_the_total() {
        let mut timer = SessionTimer::start(50_000);
        assert_eq!(timer.flush(10_000, 20_000), 10_000);
    }

    #[test]
    fn total_saturates_instead_of_overflowing() {
        let mut timer = SessionTimer::start(0);
        assert_eq!(timer.flush(i64::MAX - 1, 10), i64::MAX);
    }
}
