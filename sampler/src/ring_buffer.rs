//! Ring buffer bookkeeping for sampled counter ranges.
//!
//! A hardware sampler writes decoded ranges into a fixed number of slots of a
//! counter data image, stamping each one with a monotonically increasing
//! trigger count. [`RingBufferCounterData`] tracks two cursors over those
//! slots:
//!
//! - **put**: the newest range the producer has fully completed, advanced by
//!   [`update_put`](RingBufferCounterData::update_put)
//! - **get**: the oldest range the consumer has not yet committed, advanced
//!   by [`update_get`](RingBufferCounterData::update_get)
//!
//! Nothing moves while ranges are being read, so iteration can be restarted
//! until the consumer commits.
//!
//! # Example
//!
//! ```ignore
//! let mut ring = RingBufferCounterData::new(10, true, |capacity| MySource::new(capacity))?;
//!
//! // Each sampling pass
//! ring.update_put()?;
//! let mut consumed = 0;
//! for range in ring.unread_ranges() {
//!     combiner.add_sample(range.image, range.range_index.get())?;
//!     consumed += 1;
//! }
//! ring.update_get(consumed)?;
//! ```

use std::fmt;
use std::ops::ControlFlow;

use counterscope_core::CounterDataImage;
use counterscope_core::profiling::{profile_function, profile_plot};

use crate::error::{SamplerError, SamplerResult};
use crate::ring::{RingIndex, SequenceNumber, circular_increment, distance};

/// Producer state reported by a [`CounterDataSource`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LatestRangeInfo {
    /// Newest slot the producer has written to, complete or not.
    pub last_populated_range: Option<RingIndex>,
    /// Newest slot holding a fully completed range.
    pub last_completed_range: Option<RingIndex>,
    /// Trigger count of the first range ever completed, stored in slot 0.
    ///
    /// Seeds the read cursor on the first publish, so a producer that laps
    /// the ring before then still shows up as an overflow.
    pub first_completed_trigger: Option<SequenceNumber>,
}

/// Backing store that owns the ring's counter data image.
pub trait CounterDataSource {
    /// Trigger count stamped on the given slot.
    fn trigger_count(&self, range: RingIndex) -> SamplerResult<SequenceNumber>;

    /// Current producer progress.
    fn latest_info(&self) -> SamplerResult<LatestRangeInfo>;

    /// Image whose ranges are the ring slots.
    fn counter_data(&self) -> &CounterDataImage;
}

/// One unread range, as seen by the consumer.
#[derive(Debug, Clone, Copy)]
pub struct CounterRange<'a> {
    pub image: &'a CounterDataImage,
    pub range_index: RingIndex,
    pub trigger_count: SequenceNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    range_index: RingIndex,
    trigger_count: SequenceNumber,
}

/// Fixed-capacity ring of counter ranges with put/get cursors.
///
/// # Thread Safety
///
/// Not synchronized. Producer-side updates must be serialized with
/// consumption by the caller.
pub struct RingBufferCounterData<S> {
    source: S,
    capacity: usize,
    validate: bool,
    /// Newest published range.
    put: Option<Cursor>,
    /// Oldest range not yet committed by `update_get`.
    next: Option<Cursor>,
}

impl<S: CounterDataSource> RingBufferCounterData<S> {
    /// Create a ring of `capacity` ranges.
    ///
    /// `allocate` builds the backing store for `capacity` ranges. With
    /// `validate` set, every [`update_put`](Self::update_put) cross-checks
    /// trigger counts against slot positions and logs mismatches.
    pub fn new<F, E>(capacity: usize, validate: bool, allocate: F) -> SamplerResult<Self>
    where
        F: FnOnce(usize) -> Result<S, E>,
        E: fmt::Display,
    {
        if capacity == 0 || u32::try_from(capacity).is_err() {
            return Err(SamplerError::InvalidParameter(format!(
                "ring capacity must be in 1..=u32::MAX, got {capacity}"
            )));
        }

        let source =
            allocate(capacity).map_err(|err| SamplerError::AllocationFailed(err.to_string()))?;
        let num_ranges = source.counter_data().num_ranges();
        if num_ranges != capacity {
            return Err(SamplerError::InvalidParameter(format!(
                "backing image holds {num_ranges} ranges, ring capacity is {capacity}"
            )));
        }

        log::debug!(
            "Initialized counter data ring: {} ranges, validate={}",
            capacity,
            validate
        );

        Ok(Self {
            source,
            capacity,
            validate,
            put: None,
            next: None,
        })
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    /// Image holding all ring slots.
    pub fn counter_data(&self) -> &CounterDataImage {
        self.source.counter_data()
    }

    /// Trigger count of a slot, as reported by the backing store.
    pub fn trigger_count(&self, range: RingIndex) -> SamplerResult<SequenceNumber> {
        self.source.trigger_count(range)
    }

    /// Slot of the newest published range.
    pub fn put_range_index(&self) -> Option<RingIndex> {
        self.put.map(|c| c.range_index)
    }

    /// Slot the next [`unread_ranges`](Self::unread_ranges) pass starts at.
    pub fn get_range_index(&self) -> Option<RingIndex> {
        self.next.map(|c| c.range_index)
    }

    /// `(index + n) mod capacity`.
    pub fn circular_increment(&self, index: RingIndex, n: usize) -> RingIndex {
        circular_increment(index, n, self.capacity)
    }

    /// `(b - a) mod capacity`.
    pub fn distance(&self, a: RingIndex, b: RingIndex) -> usize {
        distance(a, b, self.capacity)
    }

    /// Number of published ranges not yet committed with `update_get`.
    pub fn num_unread_ranges(&self) -> usize {
        match (self.put, self.next) {
            (Some(put), Some(next)) => Self::unread_between(put, next) as usize,
            _ => 0,
        }
    }

    fn unread_between(put: Cursor, next: Cursor) -> u64 {
        (put.trigger_count.0 + 1).saturating_sub(next.trigger_count.0)
    }

    /// Publish every range the producer has completed since the last call.
    ///
    /// Returns the number of newly published ranges. Fails with
    /// [`SamplerError::Overflow`] when the unread count would exceed the
    /// capacity; in that case no cursor moves and the consumer must drain
    /// before retrying.
    pub fn update_put(&mut self) -> SamplerResult<usize> {
        profile_function!();

        let info = self.source.latest_info()?;
        let Some(last) = info.last_completed_range else {
            return Ok(0);
        };
        if last.get() >= self.capacity {
            return Err(SamplerError::InconsistentTriggers(format!(
                "completed range {last} outside a ring of {}",
                self.capacity
            )));
        }

        let put = Cursor {
            range_index: last,
            trigger_count: self.source.trigger_count(last)?,
        };
        let next = match self.next {
            Some(next) => next,
            None => Cursor {
                range_index: RingIndex::ZERO,
                trigger_count: info.first_completed_trigger.ok_or_else(|| {
                    SamplerError::InconsistentTriggers(format!(
                        "range {last} completed but no first trigger was reported"
                    ))
                })?,
            },
        };

        if let Some(previous) = self.put
            && put.trigger_count < previous.trigger_count
        {
            return Err(SamplerError::InconsistentTriggers(format!(
                "completed trigger went from {} back to {}",
                previous.trigger_count, put.trigger_count
            )));
        }

        let unread = put
            .trigger_count
            .0
            .checked_add(1)
            .and_then(|end| end.checked_sub(next.trigger_count.0))
            .ok_or_else(|| {
                SamplerError::InconsistentTriggers(format!(
                    "completed trigger {} precedes next unread trigger {}",
                    put.trigger_count, next.trigger_count
                ))
            })?;

        if unread > self.capacity as u64 {
            log::warn!(
                "Counter data ring overflow: {} unread ranges, capacity {}",
                unread,
                self.capacity
            );
            return Err(SamplerError::Overflow {
                unread,
                capacity: self.capacity,
            });
        }

        if self.validate {
            self.validate_cursors(put, next, unread, &info);
        }

        let published = unread as usize - self.num_unread_ranges();
        self.put = Some(put);
        self.next = Some(next);

        profile_plot!("unread_ranges", unread);
        log::trace!(
            "Published {} ranges, put at {} (trigger {})",
            published,
            put.range_index,
            put.trigger_count
        );
        Ok(published)
    }

    fn validate_cursors(&self, put: Cursor, next: Cursor, unread: u64, info: &LatestRangeInfo) {
        if unread > 0 {
            let slots = self.distance(next.range_index, put.range_index) + 1;
            if unread as usize != slots {
                log::error!(
                    "Ring cursor mismatch: {} unread triggers but {} slots from {} to {}",
                    unread,
                    slots,
                    next.range_index,
                    put.range_index
                );
            }
        }

        if let Some(populated) = info.last_populated_range {
            match self.source.trigger_count(populated) {
                Ok(trigger) if trigger < put.trigger_count => log::error!(
                    "Populated range {} has trigger {} older than completed trigger {}",
                    populated,
                    trigger,
                    put.trigger_count
                ),
                Ok(_) => {}
                Err(err) => log::error!("Failed to read trigger of range {populated}: {err}"),
            }
        }
    }

    /// Lazily iterate the unread ranges in trigger order.
    ///
    /// The iterator does not commit anything; call
    /// [`update_get`](Self::update_get) with the number actually consumed.
    pub fn unread_ranges(&self) -> UnreadRanges<'_> {
        let (start, remaining) = match self.next {
            Some(next) => (next, self.num_unread_ranges()),
            None => (
                Cursor {
                    range_index: RingIndex::ZERO,
                    trigger_count: SequenceNumber::default(),
                },
                0,
            ),
        };
        UnreadRanges {
            image: self.source.counter_data(),
            capacity: self.capacity,
            cursor: start,
            remaining,
        }
    }

    /// Visit unread ranges in trigger order.
    ///
    /// Returns how many ranges the visitor accepted with
    /// [`ControlFlow::Continue`]. A [`ControlFlow::Break`] stops the walk
    /// without counting that range; an error aborts immediately. The get
    /// cursor never moves here.
    pub fn consume_data<F, E>(&self, mut visitor: F) -> Result<usize, E>
    where
        F: FnMut(CounterRange<'_>) -> Result<ControlFlow<()>, E>,
    {
        profile_function!();

        let mut visited = 0;
        for range in self.unread_ranges() {
            match visitor(range)? {
                ControlFlow::Continue(()) => visited += 1,
                ControlFlow::Break(()) => break,
            }
        }
        Ok(visited)
    }

    /// Commit `count` consumed ranges, advancing the get cursor.
    pub fn update_get(&mut self, count: usize) -> SamplerResult<()> {
        let unread = self.num_unread_ranges();
        if count > unread {
            return Err(SamplerError::NotEnoughUnread {
                requested: count,
                unread,
            });
        }
        if count == 0 {
            return Ok(());
        }

        if let Some(next) = self.next.as_mut() {
            next.range_index = circular_increment(next.range_index, count, self.capacity);
            next.trigger_count = SequenceNumber(next.trigger_count.0 + count as u64);
        }
        Ok(())
    }
}

impl<S> fmt::Debug for RingBufferCounterData<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RingBufferCounterData")
            .field("capacity", &self.capacity)
            .field("validate", &self.validate)
            .field("put", &self.put)
            .field("next", &self.next)
            .finish()
    }
}

/// Iterator over unread ranges, see [`RingBufferCounterData::unread_ranges`].
#[derive(Debug, Clone)]
pub struct UnreadRanges<'a> {
    image: &'a CounterDataImage,
    capacity: usize,
    cursor: Cursor,
    remaining: usize,
}

impl<'a> Iterator for UnreadRanges<'a> {
    type Item = CounterRange<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let item = CounterRange {
            image: self.image,
            range_index: self.cursor.range_index,
            trigger_count: self.cursor.trigger_count,
        };
        self.remaining -= 1;
        self.cursor.range_index = circular_increment(self.cursor.range_index, 1, self.capacity);
        self.cursor.trigger_count = SequenceNumber(self.cursor.trigger_count.0 + 1);
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for UnreadRanges<'_> {}

#[cfg(test)]
mod tests {
    use super::*;
    use counterscope_core::{CounterDataPrefix, CounterDataSchema};

    struct FixedSource {
        image: CounterDataImage,
        triggers: Vec<u64>,
        completed: Option<RingIndex>,
        first: Option<u64>,
    }

    impl CounterDataSource for FixedSource {
        fn trigger_count(&self, range: RingIndex) -> SamplerResult<SequenceNumber> {
            Ok(SequenceNumber(self.triggers[range.get()]))
        }

        fn latest_info(&self) -> SamplerResult<LatestRangeInfo> {
            Ok(LatestRangeInfo {
                last_populated_range: self.completed,
                last_completed_range: self.completed,
                first_completed_trigger: self.first.map(SequenceNumber),
            })
        }

        fn counter_data(&self) -> &CounterDataImage {
            &self.image
        }
    }

    fn ring(capacity: usize) -> RingBufferCounterData<FixedSource> {
        RingBufferCounterData::new(capacity, true, |n| {
            let schema = CounterDataSchema::new(CounterDataPrefix::new().with_counter("c"))?;
            Ok::<_, SamplerError>(FixedSource {
                image: CounterDataImage::new(schema, n),
                triggers: vec![0; n],
                completed: None,
                first: None,
            })
        })
        .unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = RingBufferCounterData::<FixedSource>::new(0, false, |_| {
            Err::<FixedSource, _>("unreachable")
        });
        assert!(matches!(result, Err(SamplerError::InvalidParameter(_))));
    }

    #[test]
    fn test_allocation_failure() {
        let result =
            RingBufferCounterData::<FixedSource>::new(4, false, |_| Err::<FixedSource, _>("oom"));
        assert_eq!(
            result.unwrap_err(),
            SamplerError::AllocationFailed("oom".to_string())
        );
    }

    #[test]
    fn test_empty_after_construction() {
        let mut ring = ring(4);
        assert_eq!(ring.num_unread_ranges(), 0);
        assert_eq!(ring.unread_ranges().count(), 0);
        assert_eq!(ring.update_put().unwrap(), 0);
        assert!(matches!(
            ring.update_get(1),
            Err(SamplerError::NotEnoughUnread { .. })
        ));
    }

    #[test]
    fn test_publish_and_commit() {
        let mut ring = ring(4);
        ring.source_mut().triggers = vec![1, 2, 3, 0];
        ring.source_mut().completed = RingIndex::new(2, 4);
        ring.source_mut().first = Some(1);
        assert_eq!(ring.update_put().unwrap(), 3);

        let triggers: Vec<u64> = ring.unread_ranges().map(|r| r.trigger_count.0).collect();
        assert_eq!(triggers, vec![1, 2, 3]);

        ring.update_get(3).unwrap();
        assert_eq!(ring.num_unread_ranges(), 0);
        assert_eq!(ring.get_range_index(), RingIndex::new(3, 4));
    }

    #[test]
    fn test_trigger_going_backwards() {
        let mut ring = ring(4);
        ring.source_mut().triggers = vec![5, 6, 0, 0];
        ring.source_mut().completed = RingIndex::new(1, 4);
        ring.source_mut().first = Some(5);
        ring.update_put().unwrap();
        ring.source_mut().triggers[1] = 4;
        assert!(matches!(
            ring.update_put(),
            Err(SamplerError::InconsistentTriggers(_))
        ));
        assert_eq!(ring.num_unread_ranges(), 2);
    }

    #[test]
    fn test_missing_first_trigger() {
        let mut ring = ring(4);
        ring.source_mut().triggers = vec![1, 0, 0, 0];
        ring.source_mut().completed = RingIndex::new(0, 4);
        assert!(matches!(
            ring.update_put(),
            Err(SamplerError::InconsistentTriggers(_))
        ));
        assert_eq!(ring.put_range_index(), None);
    }
}
