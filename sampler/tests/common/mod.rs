//! Shared fixtures for the sampler integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use counterscope_core::{CounterDataImage, CounterDataPrefix, CounterDataSchema, TimeRange};
use counterscope_sampler::{
    CounterDataSource, LatestRangeInfo, RingIndex, SamplerResult, SequenceNumber,
    circular_increment,
};

pub const CYCLES: &str = "gr__cycles_elapsed";
pub const INSTRUCTIONS: &str = "sm__inst_executed";

/// Relative tolerance used for combined values.
pub const TOLERANCE: f64 = 0.01;

pub fn prefix() -> CounterDataPrefix {
    CounterDataPrefix::new()
        .with_counter(CYCLES)
        .with_counter(INSTRUCTIONS)
}

pub fn schema() -> Arc<CounterDataSchema> {
    CounterDataSchema::new(prefix()).unwrap()
}

/// Value of the cycles counter in sample `index`.
pub fn sample_value(index: usize) -> f64 {
    1000.0 * (index as f64 + 1.0)
}

/// `count` back-to-back samples of `duration` ticks starting at `start`.
///
/// Sample `i` stores `sample_value(i)` cycles and twice that many instructions.
pub fn contiguous_samples(count: usize, start: u64, duration: u64) -> CounterDataImage {
    let mut image = CounterDataImage::new(schema(), count);
    for i in 0..count {
        let begin = start + i as u64 * duration;
        let time = TimeRange::new(begin, begin + duration).unwrap();
        let value = sample_value(i);
        image.set_range(i, time, &[value, 2.0 * value]).unwrap();
    }
    image
}

pub fn assert_approx(actual: f64, expected: f64) {
    let tolerance = (expected.abs() * TOLERANCE).max(1e-9);
    assert!(
        (actual - expected).abs() <= tolerance,
        "expected {expected} (+/- {tolerance}), got {actual}"
    );
}

/// Ring backing store driven by hand, mimicking a hardware sampler.
///
/// Triggers start at 8. Each [`populate_triggers`](Self::populate_triggers)
/// call writes `num_partial` new ranges, of which the first `num_full`
/// become complete.
pub struct TestSource {
    image: CounterDataImage,
    pub triggers: Vec<u64>,
    last_populated: Option<RingIndex>,
    last_completed: Option<RingIndex>,
    first_completed: Option<u64>,
}

impl TestSource {
    pub const FIRST_TRIGGER: u64 = 8;

    pub fn new(capacity: usize) -> Self {
        Self {
            image: CounterDataImage::new(schema(), capacity),
            triggers: vec![0; capacity],
            last_populated: None,
            last_completed: None,
            first_completed: None,
        }
    }

    fn capacity(&self) -> usize {
        self.triggers.len()
    }

    pub fn populate_triggers(&mut self, num_full: usize, num_partial: usize) {
        let capacity = self.capacity();
        let (mut slot, mut trigger) = match self.last_populated {
            Some(last) => (
                circular_increment(last, 1, capacity),
                self.triggers[last.get()] + 1,
            ),
            None => (RingIndex::ZERO, Self::FIRST_TRIGGER),
        };
        for _ in 0..num_partial {
            self.triggers[slot.get()] = trigger;
            let begin = trigger * 100;
            let time = TimeRange::new(begin, begin + 100).unwrap();
            self.image
                .set_range(slot.get(), time, &[trigger as f64, 0.0])
                .unwrap();
            self.last_populated = Some(slot);
            slot = circular_increment(slot, 1, capacity);
            trigger += 1;
        }

        if num_full > 0 {
            self.first_completed.get_or_insert(Self::FIRST_TRIGGER);
            self.last_completed = Some(match self.last_completed {
                Some(last) => circular_increment(last, num_full, capacity),
                None => circular_increment(RingIndex::ZERO, num_full - 1, capacity),
            });
        }
    }
}

impl CounterDataSource for TestSource {
    fn trigger_count(&self, range: RingIndex) -> SamplerResult<SequenceNumber> {
        Ok(SequenceNumber(self.triggers[range.get()]))
    }

    fn latest_info(&self) -> SamplerResult<LatestRangeInfo> {
        Ok(LatestRangeInfo {
            last_populated_range: self.last_populated,
            last_completed_range: self.last_completed,
            first_completed_trigger: self.first_completed.map(SequenceNumber),
        })
    }

    fn counter_data(&self) -> &CounterDataImage {
        &self.image
    }
}
