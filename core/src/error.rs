//! Counter data error types.

use thiserror::Error;

use crate::counter_data::LayoutVersion;

/// Errors raised while building, decoding or indexing counter data images.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CounterDataError {
    #[error("unsupported counter data layout {found}, expected {expected}")]
    UnsupportedLayout {
        found: LayoutVersion,
        expected: LayoutVersion,
    },
    #[error("counter data image has a bad magic number: {0:#010x}")]
    BadMagic(u32),
    #[error("counter data image truncated: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },
    #[error("invalid counter name: {0}")]
    InvalidName(String),
    #[error("counter `{0}` appears more than once in the prefix")]
    DuplicateCounter(String),
    #[error("counter data prefix has no counters")]
    EmptyPrefix,
    #[error("range index {index} out of bounds for an image with {num_ranges} ranges")]
    RangeOutOfBounds { index: usize, num_ranges: usize },
    #[error("counter data schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("invalid time range: end {end} precedes start {start}")]
    InvalidTimeRange { start: u64, end: u64 },
}

pub type CounterDataResult<T> = Result<T, CounterDataError>;
