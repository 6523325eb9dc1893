//! dependency barrier: how far may a cursor safely advance.
//!
//! a barrier belongs to exactly one cursor and observes the published
//! sequences of every upstream cursor it `follows`. the safe position is the
//! minimum across all of them; the barrier blocks (with progressive backoff)
//! until that minimum reaches a requested position, or an upstream raises a
//! terminal signal.
//!
//! the `follows` wiring across all cursors forms a directed acyclic graph;
//! cycles would deadlock and are a caller responsibility to avoid.
//!
//! # signal handling
//!
//! each poll iteration checks the followed cursor's signal:
//!
//! - ERROR: the captured fault is re-raised as [`WaitError::Failed`]
//! - EOF: the position is re-read once - if the final published position
//!   satisfies the request the wait completes normally (published data is
//!   never lost to a racing eof), otherwise [`WaitError::Eof`] is returned
//!
//! # blocking
//!
//! `wait_for` may block indefinitely if an upstream stalls without ever
//! publishing or signaling. this is intentional backpressure, not a bug.

use crate::cursor::EventCursor;
use crate::error::WaitError;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use weir_cpu::{Backoff, Signal, INITIAL_SEQUENCE_VALUE};

/// tracks upstream cursors and computes the minimum safe position.
///
/// the cached minimum (`last_min`) is monotonic while upstreams are live and
/// lets repeat waits skip the scan entirely. it is atomic only so the barrier
/// can be driven through `&self` when a shared writer is polled from several
/// producer threads; relaxed ordering suffices for a cache that is
/// re-validated by acquire loads on every miss.
#[derive(Debug)]
pub struct Barrier {
    follows: Vec<Arc<EventCursor>>,
    last_min: AtomicI64,
}

impl Barrier {
    /// create a barrier with no dependencies.
    pub fn new() -> Self {
        Self {
            follows: Vec::new(),
            last_min: AtomicI64::new(INITIAL_SEQUENCE_VALUE),
        }
    }

    /// add an upstream dependency.
    ///
    /// wiring happens once, before any pipeline thread starts.
    pub fn follows(&mut self, upstream: Arc<EventCursor>) {
        self.follows.push(upstream);
    }

    /// number of upstream dependencies.
    #[inline]
    pub fn followed(&self) -> usize {
        self.follows.len()
    }

    /// non-blocking minimum over all followed sequences.
    ///
    /// an empty barrier reports `i64::MAX`: nothing constrains progress.
    pub fn get_min(&self) -> i64 {
        let mut min = i64::MAX;
        for cursor in &self.follows {
            let seq = cursor.sequence().acquire();
            if seq < min {
                min = seq;
            }
        }
        self.last_min.store(min, Ordering::Relaxed);
        min
    }

    /// block until every followed sequence reaches `pos`.
    ///
    /// returns the minimum observed position (>= `pos`) across all followed
    /// cursors, which is the last position the owning cursor may touch.
    ///
    /// # errors
    ///
    /// - [`WaitError::Failed`] if an upstream captured a fault
    /// - [`WaitError::Eof`] if an upstream ended the stream short of `pos`
    pub fn wait_for<B: Backoff>(&self, pos: i64, backoff: &mut B) -> Result<i64, WaitError> {
        // fast path: a previous scan already proved pos is safe
        let cached = self.last_min.load(Ordering::Relaxed);
        if cached > pos {
            return Ok(cached);
        }

        let mut min = i64::MAX;
        for cursor in &self.follows {
            backoff.reset();
            let observed = loop {
                let seq = cursor.sequence().acquire();
                if seq >= pos {
                    break seq;
                }
                match cursor.sequence().signal() {
                    Signal::Normal => backoff.snooze(),
                    Signal::Error | Signal::Eof => {
                        // rethrows the captured fault, if any
                        cursor.check_alert()?;

                        // eof: the position store may have raced the signal,
                        // re-read once before giving up
                        let last = cursor.sequence().acquire();
                        if last >= pos {
                            break last;
                        }
                        log::debug!(
                            "barrier: upstream '{}' hit eof at {} (wanted {})",
                            cursor.name(),
                            last,
                            pos
                        );
                        return Err(WaitError::Eof);
                    }
                }
            };
            if observed < min {
                min = observed;
            }
        }

        self.last_min.store(min, Ordering::Relaxed);
        Ok(min)
    }
}

impl Default for Barrier {
    fn default() -> Self {
        Self::new()
    }
}
