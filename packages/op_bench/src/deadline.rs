use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tracing::{trace, warn};

/// Timestamp value meaning "timing has not been stopped".
const NOT_STOPPED: u64 = u64::MAX;

/// The low bits of the clock state hold the phase, the rest the timing epoch.
const PHASE_BITS: u32 = 2;
const PHASE_MASK: u64 = 0b11;

/// The phase of the benchmark clock.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum Phase {
    /// Timing has never been started.
    Idle,

    /// The timed portion of the run is in progress.
    Timing,

    /// Timing is suspended. The deadline cannot expire in this phase.
    Suspended,

    /// The deadline passed or timing was stopped explicitly. Terminal.
    Expired,
}

impl Phase {
    const fn to_bits(self) -> u64 {
        match self {
            Self::Idle => 0,
            Self::Timing => 1,
            Self::Suspended => 2,
            Self::Expired => 3,
        }
    }

    const fn from_bits(value: u64) -> Self {
        match value & PHASE_MASK {
            0 => Self::Idle,
            1 => Self::Timing,
            2 => Self::Suspended,
            _ => Self::Expired,
        }
    }
}

/// The phase together with the number of times timing has been started, packed into one word.
///
/// A poller that observed one timing window can only expire that window: once timing is
/// suspended and started again, the epoch differs and the stale observation no longer matches.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
struct ClockState(u64);

impl ClockState {
    const IDLE: Self = Self(Phase::Idle.to_bits());

    const fn phase(self) -> Phase {
        Phase::from_bits(self.0)
    }

    const fn epoch(self) -> u64 {
        self.0.wrapping_shr(PHASE_BITS)
    }

    const fn with_phase(self, phase: Phase) -> Self {
        Self((self.0 & !PHASE_MASK) | phase.to_bits())
    }

    /// Timing again, in a new epoch.
    const fn restarted(self) -> Self {
        Self(self.epoch().wrapping_add(1).wrapping_shl(PHASE_BITS) | Phase::Timing.to_bits())
    }
}

/// Tracks the start and stop of the timed portion of a run and decides when a run-time limit
/// has been reached.
///
/// The clock moves through `Idle → Timing → Expired`, with `Timing ⇄ Suspended` available to
/// exclude a setup phase. Expiry is detected cooperatively: [`is_expired()`][Self::is_expired]
/// compares the monotonic clock against the deadline, and the first caller to observe that the
/// deadline has passed records the stop timestamp. No caller is ever interrupted.
///
/// While suspended the deadline never expires. Resuming with
/// [`start_timing()`][Self::start_timing] restarts the clock, so the full run time is available
/// again.
///
/// # Examples
///
/// ```
/// use std::thread;
/// use std::time::Duration;
///
/// use op_bench::{Deadline, Phase};
///
/// let deadline = Deadline::new(Some(Duration::from_millis(20)));
/// assert_eq!(deadline.phase(), Phase::Idle);
///
/// deadline.start_timing();
/// assert!(!deadline.is_expired());
///
/// thread::sleep(Duration::from_millis(30));
/// assert!(deadline.is_expired());
/// assert!(deadline.elapsed().unwrap() >= Duration::from_millis(20));
/// ```
#[derive(Debug)]
pub struct Deadline {
    // `None` when the run is limited by operation count instead of time.
    limit: Option<Duration>,

    // All timestamps are nanoseconds since this instant.
    origin: Instant,

    state: AtomicU64,
    start: AtomicU64,
    stop: AtomicU64,
}

impl Deadline {
    /// Creates an idle clock that expires `limit` after timing starts, or never if `limit` is
    /// `None`.
    #[must_use]
    pub fn new(limit: Option<Duration>) -> Self {
        Self {
            limit,
            origin: Instant::now(),
            state: AtomicU64::new(ClockState::IDLE.0),
            start: AtomicU64::new(0),
            stop: AtomicU64::new(NOT_STOPPED),
        }
    }

    /// The run-time limit, if any.
    #[must_use]
    pub fn limit(&self) -> Option<Duration> {
        self.limit
    }

    /// The current phase.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.state().phase()
    }

    fn state(&self) -> ClockState {
        ClockState(self.state.load(Ordering::Acquire))
    }

    /// Records the current time as the start of the timed portion and arms the deadline.
    ///
    /// Also resumes from suspension. Has no effect once the clock has expired.
    pub fn start_timing(&self) {
        if self.phase() == Phase::Expired {
            warn!("timing cannot be restarted after it has finished");
            return;
        }

        // The start timestamp must be visible before anyone sees the Timing phase.
        self.start.store(self.now(), Ordering::Release);
        self.stop.store(NOT_STOPPED, Ordering::Release);

        let result = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let state = ClockState(state);
                (state.phase() != Phase::Expired).then_some(state.restarted().0)
            });

        match result {
            Ok(previous) => {
                let epoch = ClockState(previous).restarted().epoch();
                trace!(limit = ?self.limit, epoch, "timing started");
            }
            Err(_) => warn!("timing cannot be restarted after it has finished"),
        }
    }

    /// Suspends timing, so the deadline cannot expire until timing is started again.
    pub fn suspend_timing(&self) {
        let result = self
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |state| {
                let state = ClockState(state);
                (state.phase() != Phase::Expired).then_some(state.with_phase(Phase::Suspended).0)
            });

        if result.is_ok() {
            trace!("timing suspended");
        }
    }

    /// Records the current time as the end of the timed portion and finishes the clock.
    ///
    /// This is how runs limited by operation count end their timed portion.
    pub fn stop_timing(&self) {
        self.stop.store(self.now(), Ordering::Release);

        // Expired has every phase bit set and keeps the epoch.
        self.state.fetch_or(Phase::Expired.to_bits(), Ordering::AcqRel);

        trace!("timing stopped");
    }

    /// Stops timing unless a stop timestamp has already been recorded.
    pub(crate) fn ensure_stopped(&self) {
        if self.stop.load(Ordering::Acquire) == NOT_STOPPED {
            self.stop_timing();
        }
    }

    /// Returns whether the clock has expired, detecting the passing of the deadline.
    ///
    /// Never true while idle or suspended, unless [`stop_timing()`][Self::stop_timing] was called.
    pub fn is_expired(&self) -> bool {
        let observed = self.state();

        match observed.phase() {
            Phase::Expired => true,
            Phase::Idle | Phase::Suspended => false,
            Phase::Timing => {
                let start = self.start.load(Ordering::Acquire);
                self.expire_if_due(observed, start, self.now())
            }
        }
    }

    /// Expires the timing window `observed`, which started at `start`, if `now` is past the
    /// deadline.
    fn expire_if_due(&self, observed: ClockState, start: u64, now: u64) -> bool {
        let Some(limit) = self.limit else {
            return false;
        };

        if Duration::from_nanos(now.saturating_sub(start)) < limit {
            return false;
        }

        // Only the first thread to flip the phase records the stop time. If timing was suspended
        // or restarted in the meantime, the flip fails and the expiry is ignored.
        match self.state.compare_exchange(
            observed.0,
            observed.with_phase(Phase::Expired).0,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => {
                self.stop.store(now, Ordering::Release);
                trace!(?limit, "deadline expired");
                true
            }
            Err(current) => ClockState(current).phase() == Phase::Expired,
        }
    }

    /// The duration of the timed portion, once it has been stopped.
    #[must_use]
    pub fn elapsed(&self) -> Option<Duration> {
        let stop = self.stop.load(Ordering::Acquire);

        if stop == NOT_STOPPED {
            return None;
        }

        let start = self.start.load(Ordering::Acquire);
        Some(Duration::from_nanos(stop.saturating_sub(start)))
    }

    fn now(&self) -> u64 {
        // Saturating just below the sentinel. A run would need to last centuries to get there.
        u64::try_from(self.origin.elapsed().as_nanos())
            .unwrap_or(NOT_STOPPED)
            .min(NOT_STOPPED.saturating_sub(1))
    }
}
