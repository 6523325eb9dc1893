// weir-cpu

mod backoff;
mod sequence;

pub use {
    backoff::{Backoff, BusySpin, PhasedBackoff, Yielding},
    sequence::{Sequence, Signal, INITIAL_SEQUENCE_VALUE},
};
