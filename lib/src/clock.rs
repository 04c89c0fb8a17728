//! Time sources (C13): wall-clock for commit timestamps, monotonic for
//! session idle timeouts. Kept behind a trait so session-expiry logic can
//! be exercised in tests without sleeping for real.

use std::time::Duration;
use std::time::Instant;

use chrono::Local;

/// ISO-8601 local timestamp used to stamp new commits.
pub fn wall_clock_now() -> String {
    Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string()
}

/// A source of monotonic instants, used to drive idle-session eviction.
/// `SessionRegistry` is generic over this so the idle-eviction sweep can
/// be exercised in tests by advancing a `FakeClock` rather than sleeping
/// for real (see `server::session`'s tests).
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A manually-advanced clock for tests. `Instant` has no public
/// constructor other than `now`, so this anchors to a real instant at
/// creation and moves forward only by explicit `advance` calls.
#[cfg(test)]
pub struct FakeClock {
    now: std::sync::Mutex<Instant>,
}

#[cfg(test)]
impl FakeClock {
    pub fn new() -> Self {
        Self {
            now: std::sync::Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock().expect("fake clock mutex poisoned") += by;
    }
}

#[cfg(test)]
impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("fake clock mutex poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wall_clock_now_looks_like_iso8601() {
        let ts = wall_clock_now();
        assert!(ts.contains('T'));
        assert!(ts.len() >= "2026-07-26T00:00:00".len());
    }

    #[test]
    fn system_clock_advances() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn fake_clock_only_advances_when_told_to() {
        let clock = FakeClock::new();
        let a = clock.now();
        assert_eq!(clock.now(), a);
        clock.advance(Duration::from_secs(300));
        assert_eq!(clock.now(), a + Duration::from_secs(300));
    }
}
