//! consumer-role cursor.

use super::EventCursor;
use crate::barrier::Barrier;
use crate::error::WaitError;
use std::sync::Arc;
use weir_cpu::{Backoff, PhasedBackoff};

/// a consumer cursor: waits on its barrier with no offset.
///
/// single-owner handle - one thread drives it; the thread-local safe range
/// `[begin, end)` needs no synchronization. followers observe progress only
/// through the published [`EventCursor`].
///
/// # type parameters
///
/// * `B` - backoff strategy used while waiting on upstream progress
///
/// # example
///
/// ```
/// use weir_pipeline::{ReadCursor, WriteCursor};
///
/// let mut writer = WriteCursor::new("producer", 16);
/// let mut reader = ReadCursor::new("consumer");
/// reader.follows(writer.cursor());
///
/// writer.publish(0);
/// let end = reader.wait_for(0).unwrap();
/// assert_eq!(end, 1);
/// ```
pub struct ReadCursor<B: Backoff = PhasedBackoff> {
    cursor: Arc<EventCursor>,
    barrier: Barrier,
    backoff: B,
    /// first position of the validated range; local to the owning thread.
    begin: i64,
    /// one past the last validated position; local to the owning thread.
    end: i64,
}

impl ReadCursor<PhasedBackoff> {
    /// create a reader with the default phased backoff.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_strategy(name)
    }
}

impl<B: Backoff> ReadCursor<B> {
    /// create a reader with an explicit backoff strategy type, constructed
    /// via its `Default`.
    pub fn with_strategy(name: impl Into<String>) -> Self {
        Self {
            cursor: EventCursor::new(name),
            barrier: Barrier::new(),
            backoff: B::default(),
            begin: 0,
            end: 0,
        }
    }

    /// the published identity, for wiring downstream `follows` edges.
    #[inline]
    pub fn cursor(&self) -> &Arc<EventCursor> {
        &self.cursor
    }

    /// wait behind `upstream`: this reader only ever touches positions the
    /// upstream has published. wiring phase only, before threads start.
    pub fn follows(&mut self, upstream: &Arc<EventCursor>) {
        self.barrier.follows(Arc::clone(upstream));
    }

    /// first position of the current safe range.
    #[inline]
    pub fn begin(&self) -> i64 {
        self.begin
    }

    /// one past the last position of the current safe range.
    #[inline]
    pub fn end(&self) -> i64 {
        self.end
    }

    /// block until `pos` is safe to read; returns the new exclusive `end`.
    ///
    /// # errors
    ///
    /// - [`WaitError::Eof`]: every upstream ended short of `pos`; this
    ///   cursor marks itself EOF so the signal keeps propagating
    /// - [`WaitError::Failed`]: an upstream fault, captured onto this cursor
    ///   and re-raised here
    pub fn wait_for(&mut self, pos: i64) -> Result<i64, WaitError> {
        match self.barrier.wait_for(pos, &mut self.backoff) {
            Ok(min) => {
                // an unfollowed barrier reports i64::MAX
                self.end = min.saturating_add(1);
                Ok(self.end)
            }
            Err(WaitError::Eof) => {
                self.cursor.set_eof();
                Err(WaitError::Eof)
            }
            Err(WaitError::Failed(fault)) => {
                self.cursor.set_alert(Arc::clone(&fault));
                Err(WaitError::Failed(fault))
            }
        }
    }

    /// non-blocking peek: refresh `end` from the current upstream minimum.
    pub fn check_end(&mut self) -> i64 {
        self.end = self.barrier.get_min().saturating_add(1);
        self.end
    }

    /// record `pos` as consumed and make that progress visible to followers.
    ///
    /// must only be called with positions inside a range validated by
    /// [`wait_for`](Self::wait_for).
    pub fn publish(&mut self, pos: i64) {
        debug_assert!(pos >= self.begin && pos < self.end, "publish outside validated range");
        self.begin = pos + 1;
        self.cursor.sequence().store(pos);
    }

    /// raise end-of-stream on this cursor.
    pub fn set_eof(&self) {
        self.cursor.set_eof();
    }

    /// capture a fault on this cursor and raise the error signal.
    pub fn set_alert(&self, fault: crate::error::Fault) {
        self.cursor.set_alert(fault);
    }

    /// re-raise this cursor's captured fault, if any.
    pub fn check_alert(&self) -> Result<(), WaitError> {
        self.cursor.check_alert()
    }
}

impl<B: Backoff> core::fmt::Debug for ReadCursor<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ReadCursor")
            .field("cursor", &self.cursor)
            .field("begin", &self.begin)
            .field("end", &self.end)
            .finish()
    }
}
