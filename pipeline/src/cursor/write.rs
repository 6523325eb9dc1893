//! single-producer-role cursor.

use super::EventCursor;
use crate::barrier::Barrier;
use crate::error::WaitError;
use std::sync::Arc;
use weir_cpu::{Backoff, PhasedBackoff};

/// a single-producer cursor: waits on followers offset by the ring capacity.
///
/// the writer follows the *last* consumers of its ring; position `pos` is
/// writable only once the slowest of them has consumed `pos - capacity`, so
/// in-flight data is never overwritten before it is read. a fresh writer with
/// a fresh follower starts with the whole ring writable: `begin = 0`,
/// `end = capacity`.
///
/// not safe for concurrent producers - use
/// [`SharedWriteCursor`](super::SharedWriteCursor) for that.
///
/// # example
///
/// ```
/// use weir_pipeline::{ReadCursor, WriteCursor};
///
/// let mut writer = WriteCursor::new("producer", 16);
/// let mut reader = ReadCursor::new("consumer");
/// reader.follows(writer.cursor());
/// writer.follows(reader.cursor());
///
/// let pos = writer.wait_next().unwrap();
/// assert_eq!(pos, 0);
/// writer.publish(pos);
/// ```
pub struct WriteCursor<B: Backoff = PhasedBackoff> {
    cursor: Arc<EventCursor>,
    barrier: Barrier,
    backoff: B,
    /// ring capacity; the producer backpressure offset.
    capacity: i64,
    /// first unwritten position; local to the owning thread.
    begin: i64,
    /// one past the last writable position; local to the owning thread.
    end: i64,
}

impl WriteCursor<PhasedBackoff> {
    /// create a writer for a ring of `capacity` slots (power of 2) with the
    /// default phased backoff.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self::with_strategy(name, capacity)
    }
}

impl<B: Backoff> WriteCursor<B> {
    /// create a writer with an explicit backoff strategy type, constructed
    /// via its `Default`.
    ///
    /// # panics
    ///
    /// panics if `capacity` is not a power of 2 or is zero.
    pub fn with_strategy(name: impl Into<String>, capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two(),
            "ring capacity must be a power of 2, got {}",
            capacity
        );
        Self {
            cursor: EventCursor::new(name),
            barrier: Barrier::new(),
            backoff: B::default(),
            capacity: capacity as i64,
            begin: 0,
            end: capacity as i64,
        }
    }

    /// the published identity, for wiring downstream `follows` edges.
    #[inline]
    pub fn cursor(&self) -> &Arc<EventCursor> {
        &self.cursor
    }

    /// gate this writer on `follower`: typically the last consumer stage of
    /// the ring this writer fills. wiring phase only.
    pub fn follows(&mut self, follower: &Arc<EventCursor>) {
        self.barrier.follows(Arc::clone(follower));
    }

    /// first unwritten position.
    #[inline]
    pub fn begin(&self) -> i64 {
        self.begin
    }

    /// one past the last writable position.
    #[inline]
    pub fn end(&self) -> i64 {
        self.end
    }

    /// ring capacity this writer was constructed with.
    #[inline]
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// block until `pos` is writable; returns the new exclusive `end`.
    ///
    /// a position is writable once the slowest follower has consumed
    /// `pos - capacity`, i.e. the slot's previous-lap occupant.
    ///
    /// # errors
    ///
    /// terminal upstream signals propagate exactly as for
    /// [`ReadCursor::wait_for`](super::ReadCursor::wait_for): the signal is
    /// re-raised on this cursor and returned.
    pub fn wait_for(&mut self, pos: i64) -> Result<i64, WaitError> {
        match self.barrier.wait_for(pos - self.capacity, &mut self.backoff) {
            Ok(min) => {
                self.end = min.saturating_add(self.capacity + 1);
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

    /// single-producer convenience: block until `begin` itself is writable
    /// and return it.
    pub fn wait_next(&mut self) -> Result<i64, WaitError> {
        if self.begin >= self.end {
            self.wait_for(self.begin)?;
        }
        Ok(self.begin)
    }

    /// non-blocking peek: refresh `end` from the current follower minimum.
    pub fn check_end(&mut self) -> i64 {
        self.end = self.barrier.get_min().saturating_add(self.capacity + 1);
        self.end
    }

    /// publish `pos`, making the slot visible to followers.
    ///
    /// write the slot data first; the release store here is what makes it
    /// visible. must only be called with positions inside a validated range.
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

impl<B: Backoff> core::fmt::Debug for WriteCursor<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("WriteCursor")
            .field("cursor", &self.cursor)
            .field("begin", &self.begin)
            .field("end", &self.end)
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ReadCursor;
    use std::thread;
    use std::time::Duration;
    use weir_cpu::BusySpin;

    #[test]
    fn test_initial_window_is_whole_ring() {
        let writer = WriteCursor::new("w", 8);
        assert_eq!(writer.begin(), 0);
        assert_eq!(writer.end(), 8);
        assert_eq!(writer.cursor().sequence().acquire(), -1);
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn test_non_power_of_2_capacity() {
        let _ = WriteCursor::new("w", 100);
    }

    #[test]
    fn test_backpressure_window() {
        let mut writer: WriteCursor<BusySpin> = WriteCursor::with_strategy("w", 8);
        let reader = EventCursor::new("r");
        writer.follows(&reader);

        // fresh follower at -1: exactly one full lap is writable
        assert_eq!(writer.check_end(), 8);

        // follower consumed 0..=2: window slides by three
        reader.sequence().store(2);
        assert_eq!(writer.check_end(), 11);

        // never more than min(followers) + capacity may be writable
        assert!(writer.end() <= reader.sequence().acquire() + writer.capacity() + 1);
    }

    #[test]
    fn test_wait_for_blocks_on_slow_follower() {
        let mut writer: WriteCursor<BusySpin> = WriteCursor::with_strategy("w", 4);
        let reader = EventCursor::new("r");
        writer.follows(&reader);

        // fill the ring
        for pos in 0..4 {
            assert_eq!(writer.wait_next().unwrap(), pos);
            writer.publish(pos);
        }

        // position 4 laps slot 0; unblock by consuming from another thread
        let consumer = thread::spawn({
            let reader = Arc::clone(&reader);
            move || {
                thread::sleep(Duration::from_millis(10));
                reader.sequence().store(0);
            }
        });

        assert_eq!(writer.wait_next().unwrap(), 4);
        consumer.join().unwrap();
    }

    #[test]
    fn test_unfollowed_writer_is_unbounded() {
        let mut writer: WriteCursor<BusySpin> = WriteCursor::with_strategy("w", 4);
        for pos in 0..100 {
            assert_eq!(writer.wait_next().unwrap(), pos);
            writer.publish(pos);
        }
    }

    #[test]
    fn test_publish_is_monotonic_for_followers() {
        let mut writer: WriteCursor<BusySpin> = WriteCursor::with_strategy("w", 16);
        let mut reader: ReadCursor<BusySpin> = ReadCursor::with_strategy("r");
        reader.follows(writer.cursor());

        writer.publish(0);
        writer.publish(1);
        assert_eq!(reader.wait_for(1).unwrap(), 2);

        writer.publish(5);
        assert_eq!(reader.wait_for(5).unwrap(), 6);
    }

    #[test]
    fn test_follower_eof_stops_writer() {
        let mut writer: WriteCursor<BusySpin> = WriteCursor::with_strategy("w", 4);
        let reader = EventCursor::new("r");
        writer.follows(&reader);

        for pos in 0..4 {
            writer.wait_next().unwrap();
            writer.publish(pos);
        }

        // the consumer quit without consuming anything
        reader.set_eof();
        assert!(matches!(writer.wait_next(), Err(WaitError::Eof)));
        assert!(writer.cursor().eof());
    }
}
