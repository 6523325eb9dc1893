//! error types for cursor wait operations.
//!
//! the pipeline distinguishes exactly two terminal outcomes a blocking wait
//! can surface, mirroring the two signals a cursor can raise:
//!
//! - [`WaitError::Eof`]: the upstream stream ended normally and everything
//!   published before the end has already been handed out
//! - [`WaitError::Failed`]: an upstream stage captured a fault; the payload
//!   travels down the dependency graph and is re-raised at every dependent
//!
//! caller misuse (non-power-of-two capacities, publishing outside a validated
//! range, cyclic `follows` wiring) is a programming error and handled by
//! assertions, not by these types.

use std::sync::Arc;
use thiserror::Error;

/// opaque fault payload captured by the first cursor that observes a failure.
///
/// reference-counted so the same fault can be re-raised by every downstream
/// cursor that reaches it.
pub type Fault = Arc<dyn std::error::Error + Send + Sync + 'static>;

/// terminal outcome of a blocking wait.
#[derive(Debug, Clone, Error)]
pub enum WaitError {
    /// upstream ended the stream and all published data was delivered.
    #[error("end of stream")]
    Eof,

    /// an upstream stage failed; carries the originating fault.
    #[error("upstream stage failed")]
    Failed(#[source] Fault),
}

impl WaitError {
    /// wrap an arbitrary error as a propagated fault.
    pub fn failed<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        WaitError::Failed(Arc::new(err))
    }

    /// true for the normal end-of-stream outcome.
    #[inline]
    pub fn is_eof(&self) -> bool {
        matches!(self, WaitError::Eof)
    }
}
