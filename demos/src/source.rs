//! Simulated periodic sampler feeding a counter data ring.

use std::fmt;

use counterscope_core::{
    CounterDataImage, CounterDataPrefix, CounterDataSchema, GpuTimestamp, TimeRange,
};
use counterscope_sampler::{
    CounterDataSource, LatestRangeInfo, RingIndex, SamplerError, SamplerResult, SequenceNumber,
    circular_increment,
};

/// Synthetic workload parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticSourceConfig {
    /// Ticks covered by each sample.
    pub sampling_interval: GpuTimestamp,
    /// Timestamp at which the first sample starts.
    pub start_timestamp: GpuTimestamp,
    /// Trigger count stamped on the first sample.
    pub first_trigger: u64,
}

impl Default for SyntheticSourceConfig {
    fn default() -> Self {
        Self {
            sampling_interval: 1_000,
            start_timestamp: 0,
            first_trigger: 1,
        }
    }
}

impl SyntheticSourceConfig {
    pub fn with_sampling_interval(mut self, sampling_interval: GpuTimestamp) -> Self {
        self.sampling_interval = sampling_interval;
        self
    }

    pub fn with_start_timestamp(mut self, start_timestamp: GpuTimestamp) -> Self {
        self.start_timestamp = start_timestamp;
        self
    }

    pub fn with_first_trigger(mut self, first_trigger: u64) -> Self {
        self.first_trigger = first_trigger;
        self
    }
}

/// Backing store that writes back-to-back samples into ring slots.
///
/// Counter `c` advances at `c + 1` events per tick, so a sample of `d` ticks
/// stores `(c + 1) * d`.
pub struct SyntheticCounterSource {
    config: SyntheticSourceConfig,
    image: CounterDataImage,
    triggers: Vec<u64>,
    values: Vec<f64>,
    clock: GpuTimestamp,
    next_slot: RingIndex,
    next_trigger: u64,
    last_completed: Option<RingIndex>,
    produced: usize,
}

impl SyntheticCounterSource {
    /// Allocate a source with `capacity` slots for the counters in `prefix`.
    pub fn new(
        prefix: CounterDataPrefix,
        capacity: usize,
        config: SyntheticSourceConfig,
    ) -> SamplerResult<Self> {
        if config.sampling_interval == 0 {
            return Err(SamplerError::InvalidParameter(
                "sampling interval must be non-zero".to_string(),
            ));
        }
        let schema = CounterDataSchema::new(prefix)?;
        let num_counters = schema.num_counters();
        Ok(Self {
            image: CounterDataImage::new(schema, capacity),
            triggers: vec![0; capacity],
            values: vec![0.0; num_counters],
            clock: config.start_timestamp,
            next_slot: RingIndex::ZERO,
            next_trigger: config.first_trigger,
            last_completed: None,
            produced: 0,
            config,
        })
    }

    pub fn config(&self) -> &SyntheticSourceConfig {
        &self.config
    }

    /// End of the newest completed sample.
    pub fn clock(&self) -> GpuTimestamp {
        self.clock
    }

    /// Total samples written since creation.
    pub fn samples_produced(&self) -> usize {
        self.produced
    }

    /// Complete every sample that ends at or before `until`.
    ///
    /// Returns how many samples were written. Slots are overwritten without
    /// regard for the consumer; the ring reports that as an overflow.
    pub fn produce_until(&mut self, until: GpuTimestamp) -> SamplerResult<usize> {
        let interval = self.config.sampling_interval;
        let capacity = self.triggers.len();
        let mut written = 0;

        while self.clock.saturating_add(interval) <= until {
            let slot = self.next_slot;
            let time = TimeRange::new(self.clock, self.clock + interval)?;
            for (counter, value) in self.values.iter_mut().enumerate() {
                *value = (counter as f64 + 1.0) * interval as f64;
            }
            self.image.set_range(slot.get(), time, &self.values)?;
            self.triggers[slot.get()] = self.next_trigger;

            self.last_completed = Some(slot);
            self.next_slot = circular_increment(slot, 1, capacity);
            self.next_trigger += 1;
            self.clock += interval;
            written += 1;
        }

        self.produced += written;
        if written > 0 {
            log::trace!("Produced {} samples, clock at {}", written, self.clock);
        }
        Ok(written)
    }
}

impl CounterDataSource for SyntheticCounterSource {
    fn trigger_count(&self, range: RingIndex) -> SamplerResult<SequenceNumber> {
        self.triggers
            .get(range.get())
            .map(|&trigger| SequenceNumber(trigger))
            .ok_or_else(|| {
                SamplerError::InvalidParameter(format!(
                    "range {range} outside a ring of {}",
                    self.triggers.len()
                ))
            })
    }

    fn latest_info(&self) -> SamplerResult<LatestRangeInfo> {
        Ok(LatestRangeInfo {
            last_populated_range: self.last_completed,
            last_completed_range: self.last_completed,
            first_completed_trigger: self
                .last_completed
                .map(|_| SequenceNumber(self.config.first_trigger)),
        })
    }

    fn counter_data(&self) -> &CounterDataImage {
        &self.image
    }
}

impl fmt::Debug for SyntheticCounterSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyntheticCounterSource")
            .field("config", &self.config)
            .field("capacity", &self.triggers.len())
            .field("clock", &self.clock)
            .field("next_trigger", &self.next_trigger)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(capacity: usize) -> SyntheticCounterSource {
        let prefix = CounterDataPrefix::new()
            .with_counter("gpu__cycles")
            .with_counter("sm__warps");
        SyntheticCounterSource::new(prefix, capacity, SyntheticSourceConfig::default()).unwrap()
    }

    #[test]
    fn test_produce_until_writes_whole_samples() {
        let mut source = source(4);
        assert_eq!(source.produce_until(999).unwrap(), 0);
        assert_eq!(source.latest_info().unwrap().last_completed_range, None);

        assert_eq!(source.produce_until(2_500).unwrap(), 2);
        assert_eq!(source.clock(), 2_000);
        let image = source.counter_data();
        assert_eq!(image.sample_time(1), Some(TimeRange { start: 1_000, end: 2_000 }));
        assert_eq!(image.counter_value(1, 0), Some(1_000.0));
        assert_eq!(image.counter_value(1, 1), Some(2_000.0));
    }

    #[test]
    fn test_slots_wrap_with_increasing_triggers() {
        let mut source = source(3);
        source.produce_until(5_000).unwrap();
        let info = source.latest_info().unwrap();
        assert_eq!(info.last_completed_range, RingIndex::new(1, 3));
        let triggers: Vec<u64> = (0..3)
            .map(|i| source.trigger_count(RingIndex::wrapping(i, 3)).unwrap().0)
            .collect();
        assert_eq!(triggers, vec![4, 5, 3]);
        assert_eq!(source.samples_produced(), 5);
    }

    #[test]
    fn test_zero_interval_is_rejected() {
        let result = SyntheticCounterSource::new(
            CounterDataPrefix::new().with_counter("gpu__cycles"),
            2,
            SyntheticSourceConfig::default().with_sampling_interval(0),
        );
        assert!(matches!(result, Err(SamplerError::InvalidParameter(_))));
    }
}
