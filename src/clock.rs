//! Clock capability, injected rather than read from a global singleton
//! (spec design note: "Global singletons for policy/clock").

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// A source of the current instant.
///
/// Everything in this crate that needs "now" takes a `&dyn Clock` rather
/// than calling [`SystemTime::now`] directly, so tests can pin time without
/// sleeping.
pub trait Clock: Send + Sync {
    /// The current instant, as a duration since the Unix epoch.
    fn now(&self) -> SystemTime;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// A clock that returns a fixed or manually-advanced instant, for tests.
#[derive(Debug)]
pub struct FixedClock {
    epoch_secs: AtomicU64,
}

impl FixedClock {
    /// Create a clock starting at the given number of seconds since the
    /// Unix epoch.
    pub fn at_epoch_secs(secs: u64) -> Self {
        Self { epoch_secs: AtomicU64::new(secs) }
    }

    /// Advance the clock by `secs` seconds.
    pub fn advance(&self, secs: u64) {
        self.epoch_secs.fetch_add(secs, Ordering::SeqCst);
    }

    /// Set the clock to an absolute number of seconds since the Unix epoch.
    pub fn set_epoch_secs(&self, secs: u64) {
        self.epoch_secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(self.epoch_secs.load(Ordering::SeqCst))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_advances() {
        let clock = FixedClock::at_epoch_secs(1000);
        assert_eq!(
            clock.now().duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1000
        );
        clock.advance(300);
        assert_eq!(
            clock.now().duration_since(UNIX_EPOCH).unwrap().as_secs(),
            1300
        );
    }
}
