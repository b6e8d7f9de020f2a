//! Time sources and timeouts for blocking operations.
//!
//! Only synchronous transfers and mutex locks ever wait, and they wait
//! against a [`Deadline`] computed from a caller-supplied [`Timeout`] and a
//! [`Clock`].

/// Monotonic millisecond time source.
pub trait Clock {
    /// Milliseconds since an arbitrary, fixed origin.
    fn now_ms(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn now_ms(&self) -> u64 {
        (**self).now_ms()
    }
}

/// How long a blocking operation may wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Do not wait at all.
    Immediate,
    /// Wait at most this many milliseconds.
    Millis(u32),
    /// Wait until the operation can complete.
    Forever,
}

impl Timeout {
    pub const fn from_millis(ms: u32) -> Self {
        if ms == 0 {
            Timeout::Immediate
        } else {
            Timeout::Millis(ms)
        }
    }
}

/// Absolute point in time after which a wait gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deadline {
    expires_at: Option<u64>,
}

impl Deadline {
    /// Start the countdown for `timeout` now.
    pub fn start<C: Clock + ?Sized>(clock: &C, timeout: Timeout) -> Self {
        let expires_at = match timeout {
            Timeout::Immediate => Some(clock.now_ms()),
            Timeout::Millis(ms) => Some(clock.now_ms().saturating_add(ms as u64)),
            Timeout::Forever => None,
        };
        Self { expires_at }
    }

    /// Whether the deadline has passed.
    pub fn expired<C: Clock + ?Sized>(&self, clock: &C) -> bool {
        match self.expires_at {
            Some(at) => clock.now_ms() >= at,
            None => false,
        }
    }
}

/// Deterministic clock for host simulation.
///
/// Every read advances time by `step` milliseconds, so polling loops run a
/// bounded number of iterations without sleeping.
#[cfg(target_has_atomic = "64")]
pub struct SimClock {
    now: core::sync::atomic::AtomicU64,
    step: u64,
}

#[cfg(target_has_atomic = "64")]
impl SimClock {
    pub const fn new(step: u64) -> Self {
        Self {
            now: core::sync::atomic::AtomicU64::new(0),
            step,
        }
    }

    /// Move time forward without a read.
    pub fn advance(&self, ms: u64) {
        self.now
            .fetch_add(ms, core::sync::atomic::Ordering::Relaxed);
    }
}

#[cfg(target_has_atomic = "64")]
impl Clock for SimClock {
    fn now_ms(&self) -> u64 {
        self.now
            .fetch_add(self.step, core::sync::atomic::Ordering::Relaxed)
    }
}

/// Wall clock for hosted builds.
#[cfg(feature = "std")]
pub struct StdClock {
    origin: std::time::Instant,
}

#[cfg(feature = "std")]
impl StdClock {
    pub fn new() -> Self {
        Self {
            origin: std::time::Instant::now(),
        }
    }
}

#[cfg(feature = "std")]
impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "std")]
impl Clock for StdClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immediate_deadline_is_already_expired() {
        let clock = SimClock::new(0);
        let deadline = Deadline::start(&clock, Timeout::Immediate);
        assert!(deadline.expired(&clock));
    }

    #[test]
    fn millis_deadline_expires_after_interval() {
        let clock = SimClock::new(0);
        let deadline = Deadline::start(&clock, Timeout::Millis(10));
        assert!(!deadline.expired(&clock));
        clock.advance(9);
        assert!(!deadline.expired(&clock));
        clock.advance(1);
        assert!(deadline.expired(&clock));
    }

    #[test]
    fn forever_never_expires() {
        let clock = SimClock::new(0);
        let deadline = Deadline::start(&clock, Timeout::Forever);
        clock.advance(u32::MAX as u64);
        assert!(!deadline.expired(&clock));
    }

    #[test]
    fn zero_millis_is_immediate() {
        assert_eq!(Timeout::from_millis(0), Timeout::Immediate);
        assert_eq!(Timeout::from_millis(5), Timeout::Millis(5));
    }
}
