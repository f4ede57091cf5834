//! Time sources used when stamping telemetry records.

use std::fmt::Debug;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// A source of wall-clock epoch timestamps and monotonic readings.
///
/// Providers hold a single `Clock` instance; all records created from that
/// provider read time through it, which lets tests substitute a manually
/// advanced clock.
pub trait Clock: Debug + Send + Sync {
    /// Current wall-clock time in nanoseconds since the unix epoch.
    fn now(&self) -> u64;

    /// A monotonic reading in nanoseconds, unrelated to the epoch.
    ///
    /// Only differences between two readings are meaningful.
    fn nanotime(&self) -> u64;
}

/// Converts a [`SystemTime`] to nanoseconds since the unix epoch.
///
/// Times before the epoch saturate to zero.
pub fn to_unix_nanos(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}

/// A [`Clock`] backed by the operating system.
#[derive(Debug, Clone)]
pub struct SystemClock {
    // Monotonic readings are deltas against a fixed origin so they fit u64.
    origin: Instant,
}

impl SystemClock {
    /// Creates a new system clock.
    pub fn new() -> Self {
        SystemClock {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> u64 {
        to_unix_nanos(SystemTime::now())
    }

    fn nanotime(&self) -> u64 {
        self.origin.elapsed().as_nanos() as u64
    }
}

/// A clock that anchors a monotonic reading to a wall-clock epoch.
///
/// The wall clock is read exactly once, at construction; each span carries
/// one of these. Subsequent [`now`] calls combine that anchor with the
/// elapsed monotonic time, so all timestamps taken over the lifetime of one
/// operation are consistent with each other even if the wall clock is
/// adjusted in between.
///
/// [`now`]: AnchoredClock::now
#[derive(Debug)]
pub struct AnchoredClock {
    clock: std::sync::Arc<dyn Clock>,
    epoch_nanos: u64,
    nano_time: u64,
}

impl AnchoredClock {
    /// Anchors `clock`'s current wall-clock time to its monotonic reading.
    pub fn new(clock: std::sync::Arc<dyn Clock>) -> Self {
        AnchoredClock {
            epoch_nanos: clock.now(),
            nano_time: clock.nanotime(),
            clock,
        }
    }

    /// Epoch nanoseconds derived from the anchor plus elapsed monotonic time.
    pub fn now(&self) -> u64 {
        let delta = self.clock.nanotime() as i64 - self.nano_time as i64;
        self.epoch_nanos.wrapping_add_signed(delta)
    }

    /// The wall-clock time captured when this clock was anchored.
    pub fn start_time(&self) -> u64 {
        self.epoch_nanos
    }
}

/// A manually advanced [`Clock`] for tests.
#[derive(Debug)]
pub struct TestClock {
    now: std::sync::atomic::AtomicU64,
}

impl TestClock {
    /// Creates a test clock starting at an arbitrary fixed epoch time.
    pub fn new() -> Self {
        Self::with_time(1_234_000_005_678)
    }

    /// Creates a test clock starting at `epoch_nanos`.
    pub fn with_time(epoch_nanos: u64) -> Self {
        TestClock {
            now: std::sync::atomic::AtomicU64::new(epoch_nanos),
        }
    }

    /// Advances the clock, negative values move it backwards.
    pub fn advance(&self, nanos: i64) {
        let current = self.now.load(std::sync::atomic::Ordering::Relaxed);
        self.now.store(
            current.wrapping_add_signed(nanos),
            std::sync::atomic::Ordering::Relaxed,
        );
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> u64 {
        self.now.load(std::sync::atomic::Ordering::Relaxed)
    }

    fn nanotime(&self) -> u64 {
        // The test clock is already monotonic enough for anchoring purposes.
        self.now()
    }
}
