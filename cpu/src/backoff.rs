// backoff strategies for spin-wait loops
// determines how a cursor waits for upstream progress
// each strategy trades off between latency and cpu usage
//
// | strategy      | latency  | cpu      | use case                        |
// |---------------|----------|----------|---------------------------------|
// | BusySpin      | lowest   | highest  | isolated cores, tests           |
// | Yielding      | moderate | low      | shared cores                    |
// | PhasedBackoff | variable | adaptive | default, tolerates long stalls  |

use core::hint;
use std::time::Duration;

/// strategy for waiting inside a poll loop.
///
/// the caller owns the loop (it must re-check positions and signals between
/// steps), the strategy owns how each failed iteration is spent. `reset`
/// restarts the escalation once progress is observed.
pub trait Backoff: Default + Send + 'static {
    /// spend one failed iteration.
    fn snooze(&mut self);

    /// restart the escalation after progress.
    fn reset(&mut self);
}

/// busy-spin - lowest latency, highest cpu usage.
///
/// issues only the cpu spin-loop hint. use on isolated cores or in tests
/// where deterministic timing matters.
#[derive(Debug, Clone, Copy, Default)]
pub struct BusySpin;

impl Backoff for BusySpin {
    #[inline]
    fn snooze(&mut self) {
        hint::spin_loop();
    }

    #[inline]
    fn reset(&mut self) {}
}

/// spin then yield - moderate latency, lower cpu usage.
///
/// spins for `spin_tries` iterations, then yields the thread on every
/// further iteration.
#[derive(Debug, Clone, Copy)]
pub struct Yielding {
    spin_tries: u32,
    step: u32,
}

impl Yielding {
    /// create a yielding backoff that spins `spin_tries` times before
    /// yielding to the os.
    #[inline]
    pub const fn new(spin_tries: u32) -> Self {
        Self {
            spin_tries,
            step: 0,
        }
    }
}

impl Default for Yielding {
    // default to 100 spin iterations before yielding
    fn default() -> Self {
        Self::new(100)
    }
}

impl Backoff for Yielding {
    #[inline]
    fn snooze(&mut self) {
        if self.step < self.spin_tries {
            self.step += 1;
            hint::spin_loop();
        } else {
            std::thread::yield_now();
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.step = 0;
    }
}

/// three-phase escalation: spin, then yield, then timed sleep.
///
/// - phase 1: `spin_tries` busy-spin iterations for short waits
/// - phase 2: `yield_tries` thread yields for medium waits
/// - phase 3: unbounded `sleep` naps under sustained stalls
///
/// phase 3 trades worst-case wakeup latency (one sleep granule) for near-zero
/// cpu while an upstream producer is stalled. this is the default strategy.
#[derive(Debug, Clone, Copy)]
pub struct PhasedBackoff {
    spin_tries: u32,
    yield_tries: u32,
    sleep: Duration,
    step: u32,
}

impl PhasedBackoff {
    /// create a phased backoff with explicit phase bounds.
    #[inline]
    pub const fn new(spin_tries: u32, yield_tries: u32, sleep: Duration) -> Self {
        Self {
            spin_tries,
            yield_tries,
            sleep,
            step: 0,
        }
    }
}

impl Default for PhasedBackoff {
    // default to 1000 spins, 1000 yields, then 10ms naps
    fn default() -> Self {
        Self::new(1000, 1000, Duration::from_millis(10))
    }
}

impl Backoff for PhasedBackoff {
    fn snooze(&mut self) {
        if self.step < self.spin_tries {
            self.step += 1;
            hint::spin_loop();
        } else if self.step < self.spin_tries + self.yield_tries {
            self.step += 1;
            std::thread::yield_now();
        } else {
            std::thread::sleep(self.sleep);
        }
    }

    #[inline]
    fn reset(&mut self) {
        self.step = 0;
    }
}
