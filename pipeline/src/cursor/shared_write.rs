//! multi-producer-role cursor.

use super::EventCursor;
use crate::barrier::Barrier;
use crate::error::WaitError;
use core::marker::PhantomData;
use std::sync::Arc;
use weir_cpu::{Backoff, PhasedBackoff, Sequence};

/// a writer shared by multiple concurrent producer threads.
///
/// adds a second sequence used purely as an atomic claim counter, never
/// exposed to followers. producers reserve disjoint ranges with
/// [`claim`](Self::claim), fill them without further coordination, then make
/// them visible with [`publish_after`](Self::publish_after), which serializes
/// publication in claim order so followers always observe contiguous
/// progress even when the writing itself finishes out of order.
///
/// all hot-path operations take `&self`; share the cursor across producer
/// threads behind an `Arc` after wiring.
///
/// # example
///
/// ```
/// use std::sync::Arc;
/// use weir_pipeline::SharedWriteCursor;
///
/// let writer = Arc::new(SharedWriteCursor::new("producers", 16));
///
/// let first = writer.claim(4).unwrap();
/// assert_eq!(first, 0);
/// // fill slots 0..4, then publish behind the (empty) predecessor range
/// writer.publish_after(first + 3, first - 1).unwrap();
/// assert_eq!(writer.cursor().sequence().acquire(), 3);
/// ```
pub struct SharedWriteCursor<B: Backoff = PhasedBackoff> {
    cursor: Arc<EventCursor>,
    barrier: Barrier,
    /// atomic claim counter: the highest position any producer has reserved.
    claim: Sequence,
    /// ring capacity; the producer backpressure offset.
    capacity: i64,
    _backoff: PhantomData<fn() -> B>,
}

impl SharedWriteCursor<PhasedBackoff> {
    /// create a shared writer for a ring of `capacity` slots (power of 2)
    /// with the default phased backoff.
    pub fn new(name: impl Into<String>, capacity: usize) -> Self {
        Self::with_strategy(name, capacity)
    }
}

impl<B: Backoff> SharedWriteCursor<B> {
    /// create a shared writer with an explicit backoff strategy type,
    /// constructed via its `Default`.
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
            claim: Sequence::default(),
            capacity: capacity as i64,
            _backoff: PhantomData,
        }
    }

    /// the published identity, for wiring downstream `follows` edges.
    #[inline]
    pub fn cursor(&self) -> &Arc<EventCursor> {
        &self.cursor
    }

    /// gate this writer on `follower`. wiring phase only, before the cursor
    /// is shared across producer threads.
    pub fn follows(&mut self, follower: &Arc<EventCursor>) {
        self.barrier.follows(Arc::clone(follower));
    }

    /// ring capacity this writer was constructed with.
    #[inline]
    pub fn capacity(&self) -> i64 {
        self.capacity
    }

    /// atomically reserve `num_slots` consecutive positions.
    ///
    /// returns the first position of the reserved range; the whole range
    /// `[first, first + num_slots)` belongs exclusively to the caller until
    /// published. blocks until the ring has space up to the reserved
    /// high-water mark.
    ///
    /// the wait uses the *post-increment* high-water position: a late claim
    /// may wait on space that earlier, still-unpublished claims also need.
    /// this matches standard multi-producer disruptor backpressure.
    ///
    /// # errors
    ///
    /// terminal follower signals propagate as for
    /// [`WriteCursor::wait_for`](super::WriteCursor::wait_for).
    pub fn claim(&self, num_slots: i64) -> Result<i64, WaitError> {
        debug_assert!(num_slots > 0, "claim of {} slots", num_slots);
        let high = self.claim.fetch_add(num_slots);

        let mut backoff = B::default();
        match self.barrier.wait_for(high - self.capacity, &mut backoff) {
            Ok(_) => Ok(high - num_slots + 1),
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

    /// publish `pos` once every earlier claim has published.
    ///
    /// blocks until this cursor's own sequence reaches `after_pos` (the last
    /// position of the predecessor range; -1 for the first range), then
    /// release-stores `pos`. this keeps visible publish order equal to claim
    /// order. requires `pos > after_pos`.
    ///
    /// # errors
    ///
    /// if a peer producer captured a fault while this call was waiting, the
    /// wait aborts and re-raises it ([`WaitError::Eof`] if the cursor was
    /// EOF'd underneath instead). a signal that races with the predecessor's
    /// publish does not abort: the position is re-read once and, if the
    /// predecessor made it, this range is still published.
    pub fn publish_after(&self, pos: i64, after_pos: i64) -> Result<(), WaitError> {
        debug_assert!(pos > after_pos, "publish_after({}, {})", pos, after_pos);

        let mut backoff = B::default();
        while self.cursor.sequence().acquire() < after_pos {
            if self.cursor.sequence().alerted() {
                // the predecessor may have published just before the signal;
                // re-read once so its range is not abandoned
                if self.cursor.sequence().acquire() >= after_pos {
                    break;
                }
                self.cursor.check_alert()?;
                return Err(WaitError::Eof);
            }
            backoff.snooze();
        }
        self.cursor.sequence().store(pos);
        Ok(())
    }

    /// non-blocking peek: one past the last position with ring space.
    pub fn check_end(&self) -> i64 {
        self.barrier.get_min().saturating_add(self.capacity + 1)
    }

    /// raise end-of-stream on this cursor.
    ///
    /// called by the orchestrator after every producer thread is done.
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

impl<B: Backoff> core::fmt::Debug for SharedWriteCursor<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedWriteCursor")
            .field("cursor", &self.cursor)
            .field("claimed", &self.claim.relaxed())
            .field("capacity", &self.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::ReadCursor;
    use crate::ringbuffer::RingBuffer;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;
    use weir_cpu::BusySpin;

    #[test]
    fn test_single_thread_claims_are_consecutive() {
        let writer: SharedWriteCursor<BusySpin> = SharedWriteCursor::with_strategy("w", 64);

        assert_eq!(writer.claim(4).unwrap(), 0);
        assert_eq!(writer.claim(1).unwrap(), 4);
        assert_eq!(writer.claim(8).unwrap(), 5);
    }

    #[test]
    fn test_publish_after_orders_ranges() {
        let writer: Arc<SharedWriteCursor<BusySpin>> =
            Arc::new(SharedWriteCursor::with_strategy("w", 64));

        let first = writer.claim(2).unwrap(); // 0..=1
        let second = writer.claim(3).unwrap(); // 2..=4
        assert_eq!((first, second), (0, 2));

        // the later range finishes first and must wait for the earlier one
        let late = thread::spawn({
            let writer = Arc::clone(&writer);
            move || {
                writer.publish_after(4, 1).unwrap();
            }
        });

        thread::sleep(Duration::from_millis(10));
        // nothing visible yet
        assert_eq!(writer.cursor().sequence().acquire(), -1);

        writer.publish_after(1, -1).unwrap();
        late.join().unwrap();
        assert_eq!(writer.cursor().sequence().acquire(), 4);
    }

    #[test]
    fn test_claim_blocks_without_ring_space() {
        let mut writer: SharedWriteCursor<BusySpin> = SharedWriteCursor::with_strategy("w", 4);
        let reader = EventCursor::new("r");
        writer.follows(&reader);
        let writer = Arc::new(writer);

        // one full lap fits
        let first = writer.claim(4).unwrap();
        writer.publish_after(3, first - 1).unwrap();

        // the next claim laps slot 0 and must wait for the consumer
        let consumer = thread::spawn({
            let reader = Arc::clone(&reader);
            move || {
                thread::sleep(Duration::from_millis(10));
                reader.sequence().store(0);
            }
        });

        assert_eq!(writer.claim(1).unwrap(), 4);
        consumer.join().unwrap();
    }

    #[test]
    fn test_follower_eof_stops_claims() {
        let mut writer: SharedWriteCursor<BusySpin> = SharedWriteCursor::with_strategy("w", 4);
        let reader = EventCursor::new("r");
        writer.follows(&reader);

        let first = writer.claim(4).unwrap();
        writer.publish_after(3, first - 1).unwrap();

        reader.set_eof();
        assert!(matches!(writer.claim(1), Err(WaitError::Eof)));
        assert!(writer.cursor().eof());
    }

    #[test]
    fn test_peer_fault_aborts_publish_after() {
        let writer: Arc<SharedWriteCursor<BusySpin>> =
            Arc::new(SharedWriteCursor::with_strategy("w", 64));

        let _ = writer.claim(1).unwrap(); // 0, never published
        let second = writer.claim(1).unwrap(); // 1

        let blocked = thread::spawn({
            let writer = Arc::clone(&writer);
            move || writer.publish_after(second, second - 1)
        });

        thread::sleep(Duration::from_millis(10));
        // the first producer dies instead of publishing
        writer.set_alert(Arc::new(std::io::Error::new(
            std::io::ErrorKind::Other,
            "producer crashed",
        )));

        match blocked.join().unwrap() {
            Err(WaitError::Failed(f)) => assert_eq!(f.to_string(), "producer crashed"),
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[test]
    fn test_signal_racing_predecessor_publish() {
        let writer: Arc<SharedWriteCursor<BusySpin>> =
            Arc::new(SharedWriteCursor::with_strategy("w", 64));

        let first = writer.claim(1).unwrap(); // 0
        let second = writer.claim(1).unwrap(); // 1

        let blocked = thread::spawn({
            let writer = Arc::clone(&writer);
            move || writer.publish_after(second, second - 1)
        });

        thread::sleep(Duration::from_millis(10));
        // the predecessor publishes and the stream ends right behind it;
        // whichever the waiter observes first, its range must go out
        writer.publish_after(first, first - 1).unwrap();
        writer.set_eof();

        blocked.join().unwrap().unwrap();
        assert_eq!(writer.cursor().sequence().acquire(), second);
    }

    #[test]
    fn test_concurrent_claims_tile_exactly() {
        const THREADS: usize = 4;
        const CLAIMS: usize = 200;
        const SLOTS: i64 = 3;

        // big enough that no claim waits on ring space
        let writer: Arc<SharedWriteCursor<BusySpin>> =
            Arc::new(SharedWriteCursor::with_strategy("w", 4096));
        let starts = Arc::new(Mutex::new(Vec::new()));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let writer = Arc::clone(&writer);
                let starts = Arc::clone(&starts);
                thread::spawn(move || {
                    for _ in 0..CLAIMS {
                        let first = writer.claim(SLOTS).unwrap();
                        starts.lock().unwrap().push(first);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let mut starts = Arc::try_unwrap(starts).unwrap().into_inner().unwrap();
        starts.sort_unstable();

        // ranges are pairwise disjoint and exactly tile [0, total)
        let total = (THREADS * CLAIMS) as i64 * SLOTS;
        assert_eq!(starts.len(), THREADS * CLAIMS);
        for (i, start) in starts.iter().enumerate() {
            assert_eq!(*start, i as i64 * SLOTS);
        }
        assert_eq!(starts.last().unwrap() + SLOTS, total);
    }

    // concurrent producers with a live consumer: claim-ordered publication
    // means the consumer sees every position exactly once, in order, with
    // the value its claimant wrote.
    #[test]
    fn test_ordered_visibility_under_contention() {
        const PRODUCERS: usize = 3;
        const PER_PRODUCER: i64 = 2000;
        const TOTAL: i64 = PRODUCERS as i64 * PER_PRODUCER;

        let ring = Arc::new(RingBuffer::<i64>::new(64));
        let mut writer: SharedWriteCursor<BusySpin> =
            SharedWriteCursor::with_strategy("producers", 64);
        let mut reader: ReadCursor<BusySpin> = ReadCursor::with_strategy("consumer");
        reader.follows(writer.cursor());
        writer.follows(reader.cursor());
        let writer = Arc::new(writer);

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|_| {
                let writer = Arc::clone(&writer);
                let ring = Arc::clone(&ring);
                thread::spawn(move || {
                    for _ in 0..PER_PRODUCER {
                        let pos = writer.claim(1).unwrap();
                        // safety: the claim made pos exclusively ours
                        unsafe { *ring.get_mut(pos) = pos }
                        writer.publish_after(pos, pos - 1).unwrap();
                    }
                })
            })
            .collect();

        let consumer = thread::spawn({
            let ring = Arc::clone(&ring);
            move || {
                let mut pos = 0i64;
                loop {
                    match reader.wait_for(pos) {
                        Ok(end) => {
                            while pos < end {
                                // safety: pos is published, and the writer is
                                // gated from lapping us
                                assert_eq!(unsafe { *ring.get(pos) }, pos);
                                reader.publish(pos);
                                pos += 1;
                            }
                        }
                        Err(WaitError::Eof) => break pos,
                        Err(e) => panic!("consumer failed: {e}"),
                    }
                }
            }
        });

        for p in producers {
            p.join().unwrap();
        }
        writer.set_eof();

        assert_eq!(consumer.join().unwrap(), TOTAL);
    }
}
