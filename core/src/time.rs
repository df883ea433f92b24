//! GPU timestamp windows.
//!
//! Every sample and every query is described by a closed-open window
//! `[start, end)` measured in GPU clock ticks. [`overlap_factor`] turns a
//! sample window and a query window into the weight with which the sample
//! contributes to the query.

use std::fmt;

use crate::error::{CounterDataError, CounterDataResult};

/// A GPU timestamp in device clock ticks (monotonic, not wall time).
pub type GpuTimestamp = u64;

/// Closed-open GPU time window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeRange {
    /// Inclusive start timestamp.
    pub start: GpuTimestamp,
    /// Exclusive end timestamp.
    pub end: GpuTimestamp,
}

impl TimeRange {
    /// Create a window, rejecting `end < start`.
    pub fn new(start: GpuTimestamp, end: GpuTimestamp) -> CounterDataResult<Self> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Duration of the window in ticks, 0 for a reversed window.
    pub fn duration(&self) -> u64 {
        self.end.saturating_sub(self.start)
    }

    /// Check that `end` does not precede `start`.
    pub fn validate(&self) -> CounterDataResult<()> {
        if self.end < self.start {
            return Err(CounterDataError::InvalidTimeRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Check whether the window covers no time at all.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Intersection of two windows, empty (anchored at the later start) when disjoint.
    pub fn intersect(&self, other: &TimeRange) -> TimeRange {
        let start = self.start.max(other.start);
        let end = start.max(self.end.min(other.end));
        TimeRange { start, end }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Fraction of `sample` that falls inside `query`.
///
/// Returns a value in `[0, 1]`. Windows that merely touch at a boundary
/// (`sample.end == query.start` or `sample.start == query.end`) do not
/// overlap, and an empty sample window always yields 0.
///
/// Because the factor is relative to the sample, a query that fully covers
/// two consecutive samples gives each of them a weight of 1.0.
pub fn overlap_factor(sample: TimeRange, query: TimeRange) -> f64 {
    let duration = sample.duration();
    if duration == 0 {
        return 0.0;
    }
    let overlap = sample.intersect(&query).duration();
    (overlap as f64 / duration as f64).clamp(0.0, 1.0)
}
