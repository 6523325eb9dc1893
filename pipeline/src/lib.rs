//! lock-minimal producer/consumer coordination over a shared ring, inspired
//! by the lmax disruptor.
//!
//! one or more writers and one or more readers make progress over the same
//! fixed-capacity ring of slots with strict ordering guarantees and minimal
//! blocking. any participant can signal end-of-stream or failure and have
//! the signal propagate through everything depending on it.
//!
//! # features
//!
//! - pre-allocated ring storage (no allocation in the hot path)
//! - sequence-based coordination (no locks, no kernel wait primitives)
//! - min-over-dependencies barriers for arbitrary DAG pipelines
//! - progressive spin/yield/sleep backoff, swappable per cursor
//! - cache-line padding to prevent false sharing
//! - EOF and fault propagation through the dependency graph
//!
//! # roles
//!
//! - [`WriteCursor`]: single producer, gated one ring lap behind its
//!   slowest follower
//! - [`ReadCursor`]: consumer, gated by what its upstreams published
//! - [`SharedWriteCursor`]: multiple producers over one ring, with atomic
//!   range claims and claim-ordered publication
//!
//! # example
//!
//! ```
//! use std::sync::Arc;
//! use std::thread;
//! use weir_pipeline::{ReadCursor, RingBuffer, WaitError, WriteCursor};
//!
//! let ring = Arc::new(RingBuffer::<u64>::new(1024));
//! let mut producer = WriteCursor::new("producer", ring.capacity());
//! let mut consumer = ReadCursor::new("consumer");
//! consumer.follows(producer.cursor());
//! producer.follows(consumer.cursor());
//!
//! let producer_thread = thread::spawn({
//!     let ring = Arc::clone(&ring);
//!     move || {
//!         for i in 0..10_000u64 {
//!             let pos = producer.wait_next().unwrap();
//!             unsafe { *ring.get_mut(pos) = i }
//!             producer.publish(pos);
//!         }
//!         producer.set_eof();
//!     }
//! });
//!
//! let mut sum = 0u64;
//! let mut pos = 0i64;
//! loop {
//!     match consumer.wait_for(pos) {
//!         Ok(end) => {
//!             while pos < end {
//!                 sum += unsafe { *ring.get(pos) };
//!                 consumer.publish(pos);
//!                 pos += 1;
//!             }
//!         }
//!         Err(WaitError::Eof) => break,
//!         Err(e) => panic!("{e}"),
//!     }
//! }
//!
//! producer_thread.join().unwrap();
//! assert_eq!(sum, (0..10_000u64).sum());
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod barrier;
pub mod cursor;
pub mod error;
pub mod ringbuffer;

pub use barrier::Barrier;
pub use cursor::{EventCursor, ReadCursor, SharedWriteCursor, WriteCursor};
pub use error::{Fault, WaitError};
pub use ringbuffer::RingBuffer;

pub use weir_cpu::{Backoff, BusySpin, PhasedBackoff, Sequence, Signal, Yielding};
