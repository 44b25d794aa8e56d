//! Session timing utilities

use std::time::{Duration, Instant};

/// Wall-clock bound for one session
///
/// Started when the last worker has been accepted; the coordinator checks it
/// once per tick.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    start: Instant,
    limit: Duration,
}

impl SessionClock {
    /// Start a clock that expires after `limit`
    pub fn start(limit: Duration) -> Self {
        Self {
            start: Instant::now(),
            limit,
        }
    }

    #[inline]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time left before expiry, zero once expired
    #[inline]
    pub fn remaining(&self) -> Duration {
        self.limit.saturating_sub(self.elapsed())
    }

    #[inline]
    pub fn expired(&self) -> bool {
        self.elapsed() >= self.limit
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

/// Format a duration in human-readable form
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use choreboard::util::time::format_duration;
///
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(21)), "21.00s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let nanos = duration.as_nanos();

    if nanos < 1_000 {
        format!("{}ns", nanos)
    } else if nanos < 1_000_000 {
        format!("{:.2}us", nanos as f64 / 1_000.0)
    } else if nanos < 1_000_000_000 {
        format!("{:.2}ms", nanos as f64 / 1_000_000.0)
    } else {
        format!("{:.2}s", nanos as f64 / 1_000_000_000.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_session_clock_expiry() {
        let clock = SessionClock::start(Duration::from_millis(20));
        assert!(!clock.expired());
        assert!(clock.remaining() <= Duration::from_millis(20));

        thread::sleep(Duration::from_millis(30));
        assert!(clock.expired());
        assert_eq!(clock.remaining(), Duration::ZERO);
        assert!(clock.elapsed() >= clock.limit());
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_nanos(500)), "500ns");
        assert_eq!(format_duration(Duration::from_nanos(1500)), "1.50us");
        assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.50s");
        assert_eq!(format_duration(Duration::from_secs(21)), "21.00s");
    }
}
