//! fixed-capacity indexed storage for pipeline payloads.
//!
//! the ring buffer holds the data the cursors coordinate over. it is a plain
//! power-of-2 circular array with masked indexing and carries no
//! synchronization of its own: which positions are safe to touch is decided
//! entirely by the cursor protocol (a writer only touches positions its
//! `wait_for`/`claim` validated, a reader only positions at or below every
//! upstream published sequence).
//!
//! # safety
//!
//! the accessors are unsafe. callers must ensure that two cursors whose
//! progress is not ordered by a barrier never access overlapping live
//! positions.
//!
//! # example
//!
//! ```
//! use weir_pipeline::RingBuffer;
//!
//! let ring: RingBuffer<u64> = RingBuffer::new(8);
//! assert_eq!(ring.capacity(), 8);
//!
//! unsafe {
//!     *ring.get_mut(3) = 42;
//!     assert_eq!(*ring.get(3), 42);
//!     // position 11 maps to the same slot one lap later
//!     assert_eq!(ring.index(11), ring.index(3));
//! }
//! ```

use core::cell::UnsafeCell;

/// fixed-capacity circular slot array with power-of-2 capacity.
///
/// every slot is initialized at construction ([`new`](Self::new) uses
/// `T::default`, [`with_factory`](Self::with_factory) a caller-supplied
/// initializer), so slots are overwritten in place and never moved out.
pub struct RingBuffer<T> {
    /// initialized slots; UnsafeCell for in-place writes through `&self`.
    slots: Box<[UnsafeCell<T>]>,
    /// bitmask for modulo: `position & mask == position % capacity`.
    mask: usize,
}

impl<T> RingBuffer<T> {
    /// create a ring with default-initialized slots.
    ///
    /// # panics
    ///
    /// panics if `capacity` is not a power of 2 or is zero.
    pub fn new(capacity: usize) -> Self
    where
        T: Default,
    {
        Self::with_factory(capacity, T::default)
    }

    /// create a ring with slots initialized by `factory`.
    ///
    /// # panics
    ///
    /// panics if `capacity` is not a power of 2 or is zero.
    pub fn with_factory<F>(capacity: usize, factory: F) -> Self
    where
        F: Fn() -> T,
    {
        assert!(
            capacity.is_power_of_two(),
            "ring capacity must be a power of 2, got {}",
            capacity
        );

        let slots: Box<[UnsafeCell<T>]> =
            (0..capacity).map(|_| UnsafeCell::new(factory())).collect();

        Self {
            slots,
            mask: capacity - 1,
        }
    }

    /// number of slots (always a power of 2).
    #[inline]
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// map a position to its slot index via the bitmask.
    #[inline(always)]
    pub fn index(&self, position: i64) -> usize {
        (position as usize) & self.mask
    }

    /// read the slot at `position`.
    ///
    /// # safety
    ///
    /// no cursor may be writing this position concurrently; per the protocol
    /// that means the position was published by the writing cursor and the
    /// writer is gated from lapping it.
    #[inline(always)]
    pub unsafe fn get(&self, position: i64) -> &T {
        let idx = self.index(position);
        // safety: idx < capacity by the mask
        unsafe { &*self.slots.get_unchecked(idx).get() }
    }

    /// mutably access the slot at `position`.
    ///
    /// # safety
    ///
    /// the caller must hold the position exclusively: a validated write range
    /// or a claimed range no other cursor can touch.
    #[inline(always)]
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn get_mut(&self, position: i64) -> &mut T {
        let idx = self.index(position);
        // safety: idx < capacity by the mask
        unsafe { &mut *self.slots.get_unchecked(idx).get() }
    }
}

// safety: slot access is gated by the cursor protocol; the buffer itself is
// just storage, transferable and shareable whenever T moves between threads
unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> core::fmt::Debug for RingBuffer<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new() {
        let ring: RingBuffer<u64> = RingBuffer::new(1024);
        assert_eq!(ring.capacity(), 1024);
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn test_new_non_power_of_2() {
        let _: RingBuffer<u64> = RingBuffer::new(100);
    }

    #[test]
    #[should_panic(expected = "power of 2")]
    fn test_new_zero() {
        let _: RingBuffer<u64> = RingBuffer::new(0);
    }

    #[test]
    fn test_index_wraps_every_lap() {
        let ring: RingBuffer<u64> = RingBuffer::new(8);

        for p in 0..64i64 {
            assert_eq!(ring.index(p), ring.index(p + 8));
            assert_eq!(ring.index(p), (p as usize) % 8);
        }
    }

    #[test]
    fn test_write_and_read() {
        let ring: RingBuffer<u64> = RingBuffer::new(8);

        unsafe {
            *ring.get_mut(0) = 100;
            *ring.get_mut(7) = 700;

            assert_eq!(*ring.get(0), 100);
            assert_eq!(*ring.get(7), 700);
        }
    }

    #[test]
    fn test_lap_overwrites_slot() {
        let ring: RingBuffer<u64> = RingBuffer::new(4);

        unsafe {
            *ring.get_mut(1) = 10;
            // one lap later, same slot
            *ring.get_mut(5) = 50;
            assert_eq!(*ring.get(1), 50);
        }
    }

    #[test]
    fn test_with_factory() {
        let ring = RingBuffer::with_factory(8, || String::with_capacity(64));

        unsafe {
            assert!(ring.get(0).capacity() >= 64);
            ring.get_mut(0).push_str("hello");
            assert_eq!(ring.get(0), "hello");
        }
    }

    #[test]
    fn test_large_positions() {
        let ring: RingBuffer<u64> = RingBuffer::new(8);
        let p: i64 = 1_000_000_000;

        unsafe {
            *ring.get_mut(p) = 42;
            assert_eq!(*ring.get(p), 42);
        }
        assert_eq!(ring.index(p), (p as usize) & 7);
    }

    #[test]
    fn test_debug() {
        let ring: RingBuffer<u64> = RingBuffer::new(8);
        let debug = format!("{:?}", ring);
        assert!(debug.contains("RingBuffer"));
        assert!(debug.contains("capacity: 8"));
    }
}
