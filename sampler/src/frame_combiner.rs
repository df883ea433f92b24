//! Per-frame combining of periodic samples.
//!
//! [`FrameLevelSampleCombiner`] keeps a bounded queue of recent samples and
//! slices the GPU timeline into contiguous frames: each
//! [`get_combined_samples`](FrameLevelSampleCombiner::get_combined_samples)
//! call covers `[previous frame end, frame end)`, starting at timestamp 0.
//! Samples that end at or before a frame boundary are retired once that
//! frame has been combined.

use counterscope_core::profiling::{profile_function, profile_plot};
use counterscope_core::{
    CounterDataImage, CounterDataPrefix, CounterDataSchema, GpuTimestamp, TimeRange,
    overlap_factor,
};

use crate::error::{SamplerError, SamplerResult};

/// Result of combining one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo<'a> {
    pub begin_timestamp: GpuTimestamp,
    pub end_timestamp: GpuTimestamp,
    /// Samples with a non-zero overlap with the frame.
    pub num_samples_in_frame: usize,
    pub combined: &'a CounterDataImage,
    pub combined_range_index: usize,
}

impl FrameInfo<'_> {
    /// Combined value of one counter for this frame.
    pub fn counter_value(&self, counter: usize) -> Option<f64> {
        self.combined.counter_value(self.combined_range_index, counter)
    }
}

struct Buffers {
    tracked: CounterDataImage,
    combined: CounterDataImage,
}

/// Combines queued samples into one row per frame.
///
/// # Example
///
/// ```ignore
/// let mut combiner = FrameLevelSampleCombiner::new();
/// combiner.initialize(&prefix, &template, 64)?;
///
/// combiner.add_sample(&image, range_index)?;
/// if combiner.is_data_complete(frame_end) {
///     let frame = combiner.get_combined_samples(frame_end)?;
///     report(frame.begin_timestamp, frame.end_timestamp, frame.counter_value(0));
/// }
/// ```
#[derive(Default)]
pub struct FrameLevelSampleCombiner {
    buffers: Option<Buffers>,
    head: usize,
    len: usize,
    previous_frame_end: GpuTimestamp,
    newest_sample: Option<TimeRange>,
}

impl FrameLevelSampleCombiner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set up the schema and a tracking queue of `max_tracked_samples` slots.
    pub fn initialize(
        &mut self,
        prefix: &CounterDataPrefix,
        template: &CounterDataImage,
        max_tracked_samples: usize,
    ) -> SamplerResult<()> {
        if max_tracked_samples == 0 {
            return Err(SamplerError::InvalidParameter(
                "frame combiner must track at least one sample".to_string(),
            ));
        }
        let schema = CounterDataSchema::new(prefix.clone())?;
        schema.ensure_compatible(template.schema())?;

        log::debug!(
            "Frame combiner initialized: {} counters, {} tracked samples",
            schema.num_counters(),
            max_tracked_samples
        );

        *self = Self {
            buffers: Some(Buffers {
                tracked: CounterDataImage::new(schema.clone(), max_tracked_samples),
                combined: CounterDataImage::new(schema, 1),
            }),
            ..Self::default()
        };
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.buffers.is_some()
    }

    /// Number of samples currently queued.
    pub fn num_tracked_samples(&self) -> usize {
        self.len
    }

    /// End of the most recently combined frame, 0 before the first frame.
    pub fn previous_frame_end(&self) -> GpuTimestamp {
        self.previous_frame_end
    }

    /// Queue a copy of one sample row.
    ///
    /// Samples must be added in non-decreasing start order.
    pub fn add_sample(&mut self, image: &CounterDataImage, range_index: usize) -> SamplerResult<()> {
        let buffers = self
            .buffers
            .as_mut()
            .ok_or(SamplerError::NotInitialized("FrameLevelSampleCombiner"))?;
        buffers.tracked.schema().ensure_compatible(image.schema())?;
        let time = image.range(range_index)?.time_range();
        time.validate()?;

        if let Some(newest) = self.newest_sample
            && time.start < newest.start
        {
            return Err(SamplerError::NonMonotonicSample {
                start: time.start,
                previous: newest.start,
            });
        }

        let capacity = buffers.tracked.num_ranges();
        if self.len == capacity {
            log::warn!("Frame combiner dropped sample {time}: {capacity} samples already tracked");
            return Err(SamplerError::TrackedSamplesFull { capacity });
        }

        let slot = (self.head + self.len) % capacity;
        buffers.tracked.copy_range(slot, image, range_index)?;
        self.len += 1;
        self.newest_sample = Some(time);
        Ok(())
    }

    /// Whether samples up to `frame_end` have been added.
    ///
    /// Retired samples still count; false until the first sample arrives.
    pub fn is_data_complete(&self, frame_end: GpuTimestamp) -> bool {
        self.newest_sample.is_some_and(|newest| newest.end >= frame_end)
    }

    /// Combine every queued sample over `[previous frame end, frame_end)`.
    ///
    /// A frame without samples succeeds with a zeroed row.
    pub fn get_combined_samples(&mut self, frame_end: GpuTimestamp) -> SamplerResult<FrameInfo<'_>> {
        profile_function!();

        let Buffers { tracked, combined } = self
            .buffers
            .as_mut()
            .ok_or(SamplerError::NotInitialized("FrameLevelSampleCombiner"))?;
        if frame_end < self.previous_frame_end {
            return Err(SamplerError::NonMonotonicFrame {
                end: frame_end,
                previous: self.previous_frame_end,
            });
        }

        let frame = TimeRange {
            start: self.previous_frame_end,
            end: frame_end,
        };
        let capacity = tracked.num_ranges();

        combined.clear_range(0)?;
        let mut num_samples_in_frame = 0;
        for i in 0..self.len {
            let slot = (self.head + i) % capacity;
            let weight = overlap_factor(tracked.range(slot)?.time_range(), frame);
            if weight > 0.0 {
                combined.accumulate_range(0, tracked, slot, weight)?;
                num_samples_in_frame += 1;
            }
        }
        combined.set_range_time(0, frame)?;

        let mut retired = 0;
        while self.len > 0 && tracked.range(self.head)?.end <= frame_end {
            self.head = (self.head + 1) % capacity;
            self.len -= 1;
            retired += 1;
        }
        self.previous_frame_end = frame_end;

        profile_plot!("frame_samples", num_samples_in_frame);
        log::trace!(
            "Frame {frame}: {num_samples_in_frame} samples, retired {retired}, {} still tracked",
            self.len
        );

        Ok(FrameInfo {
            begin_timestamp: frame.start,
            end_timestamp: frame.end,
            num_samples_in_frame,
            combined,
            combined_range_index: 0,
        })
    }

    /// Forget all samples and the schema.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
