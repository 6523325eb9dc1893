// atomic sequence counter for pipeline coordination
//
// tracks a position in a ring using a monotonically increasing sequence number
// plus a tri-state signal (normal / eof / error) that the owner raises to tell
// followers the stream ended or a stage failed
//
// sequence numbers:
// - initial: -1 (nothing published)
// - first position: 0
// - monotonically increasing while the signal is Normal
//
// memory ordering:
// - acquire(): acquire - ensures visibility of writes before this position
// - store(): release - ensures our writes are visible before this position
// - relaxed(): no ordering - for polling where eventual consistency is ok
// - signal reads/writes: the signal is raised once by the owning thread and
//   observed by followers, so a release store / acquire load pair suffices

use core::sync::atomic::{AtomicI64, AtomicI8, Ordering};
use crossbeam_utils::CachePadded;

pub const INITIAL_SEQUENCE_VALUE: i64 = -1;

/// signal state carried alongside a sequence position.
///
/// raised once by the owning cursor, observed by every follower polling the
/// sequence. there is no transition out of `Eof` or `Error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum Signal {
    /// stream is live, position keeps advancing.
    Normal = 0,
    /// owner finished publishing; followers drain and terminate.
    Eof = 1,
    /// owner captured a fault; followers rethrow it.
    Error = -1,
}

impl Signal {
    #[inline]
    fn from_raw(raw: i8) -> Self {
        match raw {
            1 => Signal::Eof,
            -1 => Signal::Error,
            _ => Signal::Normal,
        }
    }
}

#[repr(C)]
struct Inner {
    value: AtomicI64,
    signal: AtomicI8,
}

/// padded atomic position counter with a tri-state signal.
///
/// cache-padded so adjacent sequences owned by different threads never share
/// a cache line (false sharing would turn every publish into coherence
/// traffic on unrelated cursors).
#[repr(C)]
pub struct Sequence {
    inner: CachePadded<Inner>,
}

impl Sequence {
    /// create a sequence at the given initial position.
    #[inline]
    pub const fn new(value: i64) -> Self {
        Self {
            inner: CachePadded::new(Inner {
                value: AtomicI64::new(value),
                signal: AtomicI8::new(Signal::Normal as i8),
            }),
        }
    }

    /// get the current position with acquire ordering.
    ///
    /// ensures all writes made by the owner before publishing this position
    /// are visible to the caller.
    #[inline(always)]
    pub fn acquire(&self) -> i64 {
        self.inner.value.load(Ordering::Acquire)
    }

    /// publish a position with release ordering.
    ///
    /// write the slot data first, then store the position - followers that
    /// acquire this position see the data.
    #[inline(always)]
    pub fn store(&self, value: i64) {
        self.inner.value.store(value, Ordering::Release);
    }

    /// get the current position with relaxed ordering.
    ///
    /// for polling loops that re-check with `acquire` before touching data.
    #[inline(always)]
    pub fn relaxed(&self) -> i64 {
        self.inner.value.load(Ordering::Relaxed)
    }

    /// atomically add `delta` and return the incremented value.
    ///
    /// acqrel ordering; used by the shared-writer claim counter to reserve
    /// disjoint ranges.
    #[inline(always)]
    pub fn fetch_add(&self, delta: i64) -> i64 {
        self.inner.value.fetch_add(delta, Ordering::AcqRel) + delta
    }

    /// raise the end-of-stream signal.
    ///
    /// owning thread only; visible to followers no later than the next
    /// position they acquire.
    #[inline]
    pub fn set_eof(&self) {
        self.inner.signal.store(Signal::Eof as i8, Ordering::Release);
    }

    /// raise the error signal.
    ///
    /// owning thread only; the fault payload lives on the owning cursor and
    /// must be stored before this call.
    #[inline]
    pub fn set_alert(&self) {
        self.inner.signal.store(Signal::Error as i8, Ordering::Release);
    }

    /// read the current signal state.
    #[inline(always)]
    pub fn signal(&self) -> Signal {
        Signal::from_raw(self.inner.signal.load(Ordering::Acquire))
    }

    /// true if the end-of-stream signal was raised.
    #[inline]
    pub fn eof(&self) -> bool {
        self.signal() == Signal::Eof
    }

    /// true if any terminal signal (eof or error) was raised.
    #[inline]
    pub fn alerted(&self) -> bool {
        self.signal() != Signal::Normal
    }
}

impl Default for Sequence {
    fn default() -> Self {
        Self::new(INITIAL_SEQUENCE_VALUE)
    }
}

impl core::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sequence")
            .field("value", &self.relaxed())
            .field("signal", &self.signal())
            .finish()
    }
}
