//! Sampler error types.

use counterscope_core::{CounterDataError, GpuTimestamp};
use thiserror::Error;

/// Errors produced by the ring buffer, the combiners and the marker trace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplerError {
    #[error("{0} used before initialization")]
    NotInitialized(&'static str),
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),
    #[error("failed to allocate counter data storage: {0}")]
    AllocationFailed(String),
    #[error("ring buffer overflow: {unread} unread ranges exceed capacity {capacity}")]
    Overflow { unread: u64, capacity: usize },
    #[error("cannot consume {requested} ranges, only {unread} unread")]
    NotEnoughUnread { requested: usize, unread: usize },
    #[error("trigger counts are inconsistent: {0}")]
    InconsistentTriggers(String),
    #[error("all {capacity} tracked sample slots are in use")]
    TrackedSamplesFull { capacity: usize },
    #[error("sample starting at {start} precedes previous sample starting at {previous}")]
    NonMonotonicSample {
        start: GpuTimestamp,
        previous: GpuTimestamp,
    },
    #[error("frame end {end} precedes previous frame end {previous}")]
    NonMonotonicFrame {
        end: GpuTimestamp,
        previous: GpuTimestamp,
    },
    #[error(transparent)]
    CounterData(#[from] CounterDataError),
}

pub type SamplerResult<T> = Result<T, SamplerError>;
