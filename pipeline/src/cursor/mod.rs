//! position-tracking cursors: the participants of a pipeline.
//!
//! every pipeline stage owns one cursor. the cursor publishes the stage's
//! progress through a [`Sequence`](weir_cpu::Sequence) that downstream
//! barriers observe, and tracks the stage's currently-safe range locally.
//!
//! the former inheritance hierarchy (event cursor base with reader/writer/
//! shared-writer subclasses) is flattened into:
//!
//! - [`EventCursor`]: the shared published identity - name, sequence, and
//!   fault capture slot - handed around as `Arc<EventCursor>` and wired into
//!   barriers via `follows`
//! - [`ReadCursor`]: consumer role, waits with no offset
//! - [`WriteCursor`]: single-producer role, waits offset by the ring
//!   capacity so a writer never laps its slowest follower
//! - [`SharedWriteCursor`]: multi-producer role, adds an atomic claim
//!   counter and claim-ordered publication
//!
//! # lifecycle
//!
//! construct all cursors, wire every `follows` edge, then start threads.
//! a stage loops between "has range" and "needs more range" until it
//! observes EOF on everything it follows (finished) or a fault (failed);
//! both are terminal.
//!
//! # example
//!
//! ```
//! use weir_pipeline::{ReadCursor, RingBuffer, WaitError, WriteCursor};
//!
//! let ring: RingBuffer<u64> = RingBuffer::new(16);
//! let mut writer = WriteCursor::new("producer", ring.capacity());
//! let mut reader = ReadCursor::new("consumer");
//! reader.follows(writer.cursor());
//!
//! for i in 0..4 {
//!     let pos = writer.wait_next().unwrap();
//!     unsafe { *ring.get_mut(pos) = i }
//!     writer.publish(pos);
//! }
//! writer.set_eof();
//!
//! let mut pos = 0;
//! loop {
//!     match reader.wait_for(pos) {
//!         Ok(end) => {
//!             while pos < end {
//!                 assert_eq!(unsafe { *ring.get(pos) }, pos as u64);
//!                 reader.publish(pos);
//!                 pos += 1;
//!             }
//!         }
//!         Err(WaitError::Eof) => break,
//!         Err(e) => panic!("{e}"),
//!     }
//! }
//! assert_eq!(pos, 4);
//! ```

mod read;
mod shared_write;
mod write;

pub use read::ReadCursor;
pub use shared_write::SharedWriteCursor;
pub use write::WriteCursor;

use crate::error::{Fault, WaitError};
use std::sync::{Arc, OnceLock};
use weir_cpu::{Sequence, INITIAL_SEQUENCE_VALUE};

/// the published identity of a pipeline stage.
///
/// everything a follower can observe lives here: the stage name (diagnostics
/// only), the published sequence with its signal, and the captured fault, if
/// any. the owning role struct keeps the thread-local state (safe range,
/// barrier, backoff) to itself.
pub struct EventCursor {
    name: String,
    sequence: Sequence,
    fault: OnceLock<Fault>,
}

impl EventCursor {
    /// create a cursor at the initial position (-1, nothing published).
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            sequence: Sequence::new(INITIAL_SEQUENCE_VALUE),
            fault: OnceLock::new(),
        })
    }

    /// stage name, for diagnostics.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// the published sequence.
    #[inline]
    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    /// raise end-of-stream.
    ///
    /// followers that have drained every published position terminate
    /// cleanly once they observe this.
    pub fn set_eof(&self) {
        log::debug!("cursor '{}' eof at {}", self.name, self.sequence.relaxed());
        self.sequence.set_eof();
    }

    /// capture a fault and raise the error signal.
    ///
    /// the first fault wins; followers re-raise it via
    /// [`check_alert`](Self::check_alert) when they observe the signal.
    pub fn set_alert(&self, fault: Fault) {
        log::warn!("cursor '{}' captured fault: {}", self.name, fault);
        // first capture wins; a later set_alert keeps the original payload
        let _ = self.fault.set(fault);
        self.sequence.set_alert();
    }

    /// re-raise the captured fault, if any.
    ///
    /// called by dependents after observing the error signal; a no-op when
    /// no fault was captured (plain EOF).
    pub fn check_alert(&self) -> Result<(), WaitError> {
        match self.fault.get() {
            Some(fault) => Err(WaitError::Failed(Arc::clone(fault))),
            None => Ok(()),
        }
    }

    /// true once end-of-stream was raised on this cursor.
    #[inline]
    pub fn eof(&self) -> bool {
        self.sequence.eof()
    }

    /// true once any terminal signal was raised on this cursor.
    #[inline]
    pub fn alerted(&self) -> bool {
        self.sequence.alerted()
    }
}

impl core::fmt::Debug for EventCursor {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventCursor")
            .field("name", &self.name)
            .field("sequence", &self.sequence)
            .field("faulted", &self.fault.get().is_some())
            .finish()
    }
}
