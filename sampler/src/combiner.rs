//! Merging of timestamped samples into arbitrary query windows.
//!
//! Each sample contributes its counter values scaled by the fraction of its
//! own window that lies inside the query ([`overlap_factor`]). Samples that
//! only touch the query at a boundary contribute nothing.
//!
//! # Example
//!
//! ```ignore
//! let mut combiner = SampleCombiner::<2>::new();
//! combiner.initialize(&prefix, &template)?;
//!
//! let samples = [Sample::from_range(&image, 0)?, Sample::from_range(&image, 1)?];
//! combiner.merge_samples(&samples, query, |combined, range_index| {
//!     evaluator.evaluate(combined, range_index).is_ok()
//! })?;
//! ```

use counterscope_core::profiling::profile_function;
use counterscope_core::{
    CounterDataImage, CounterDataPrefix, CounterDataResult, CounterDataSchema, TimeRange,
    overlap_factor,
};

use crate::error::{SamplerError, SamplerResult};

/// One sample to merge: a window and the image row holding its values.
#[derive(Debug, Clone, Copy)]
pub struct Sample<'a> {
    pub time: TimeRange,
    pub image: &'a CounterDataImage,
    pub range_index: usize,
}

impl<'a> Sample<'a> {
    /// Build a sample whose window is read from the image row itself.
    pub fn from_range(image: &'a CounterDataImage, range_index: usize) -> CounterDataResult<Self> {
        let time = image.range(range_index)?.time_range();
        Ok(Self {
            time,
            image,
            range_index,
        })
    }
}

/// Combines samples into a scratch image of `K` rows.
///
/// Rows are handed out round-robin, so the last `K` combined results remain
/// readable from [`scratch`](Self::scratch) after their callbacks return.
#[derive(Debug, Default)]
pub struct SampleCombiner<const K: usize> {
    scratch: Option<CounterDataImage>,
    next_row: usize,
}

impl<const K: usize> SampleCombiner<K> {
    pub fn new() -> Self {
        Self {
            scratch: None,
            next_row: 0,
        }
    }

    /// Derive the output schema from `prefix` and check `template` against it.
    pub fn initialize(
        &mut self,
        prefix: &CounterDataPrefix,
        template: &CounterDataImage,
    ) -> SamplerResult<()> {
        if K == 0 {
            return Err(SamplerError::InvalidParameter(
                "sample combiner needs at least one scratch row".to_string(),
            ));
        }
        let schema = CounterDataSchema::new(prefix.clone())?;
        schema.ensure_compatible(template.schema())?;

        log::debug!(
            "Sample combiner initialized: {} counters, {} scratch rows",
            schema.num_counters(),
            K
        );
        self.scratch = Some(CounterDataImage::new(schema, K));
        self.next_row = 0;
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.scratch.is_some()
    }

    /// Scratch image holding the most recent combined rows.
    pub fn scratch(&self) -> Option<&CounterDataImage> {
        self.scratch.as_ref()
    }

    /// Merge every sample overlapping `query` into one combined row.
    ///
    /// When no sample overlaps, returns `Ok(true)` without calling `consume`.
    /// Otherwise `consume` is called exactly once with the scratch image and
    /// the row index, and its result is returned. The combined row's window
    /// is the query window and its weight is the sum of the overlap factors.
    pub fn merge_samples<F>(
        &mut self,
        samples: &[Sample<'_>],
        query: TimeRange,
        consume: F,
    ) -> SamplerResult<bool>
    where
        F: FnOnce(&CounterDataImage, usize) -> bool,
    {
        profile_function!();

        let scratch = self
            .scratch
            .as_mut()
            .ok_or(SamplerError::NotInitialized("SampleCombiner"))?;

        let overlapping: Vec<(&Sample<'_>, f64)> = samples
            .iter()
            .map(|sample| (sample, overlap_factor(sample.time, query)))
            .filter(|(_, weight)| *weight > 0.0)
            .collect();
        if overlapping.is_empty() {
            return Ok(true);
        }
        for (sample, _) in &overlapping {
            scratch.schema().ensure_compatible(sample.image.schema())?;
        }

        let row = self.next_row;
        self.next_row = if row + 1 == K { 0 } else { row + 1 };

        scratch.clear_range(row)?;
        for (sample, weight) in &overlapping {
            scratch.accumulate_range(row, sample.image, sample.range_index, *weight)?;
        }
        scratch.set_range_time(row, query)?;

        log::trace!(
            "Merged {} of {} samples into {} (row {})",
            overlapping.len(),
            samples.len(),
            query,
            row
        );
        Ok(consume(&*scratch, row))
    }

    /// Drop the scratch image; `initialize` may be called again.
    pub fn reset(&mut self) {
        self.scratch = None;
        self.next_row = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> CounterDataImage {
        let schema = CounterDataSchema::new(prefix()).unwrap();
        let mut image = CounterDataImage::new(schema, 2);
        image
            .set_range(0, TimeRange::new(0, 100).unwrap(), &[10.0])
            .unwrap();
        image
            .set_range(1, TimeRange::new(100, 200).unwrap(), &[20.0])
            .unwrap();
        image
    }

    fn prefix() -> CounterDataPrefix {
        CounterDataPrefix::new().with_counter("cycles")
    }

    #[test]
    fn test_merge_before_initialize() {
        let image = image();
        let samples = [Sample::from_range(&image, 0).unwrap()];
        let mut combiner = SampleCombiner::<1>::new();
        let result = combiner.merge_samples(&samples, TimeRange::new(0, 50).unwrap(), |_, _| true);
        assert_eq!(
            result,
            Err(SamplerError::NotInitialized("SampleCombiner"))
        );
    }

    #[test]
    fn test_zero_rows_rejected() {
        let image = image();
        let mut combiner = SampleCombiner::<0>::new();
        assert!(matches!(
            combiner.initialize(&prefix(), &image),
            Err(SamplerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_template_mismatch() {
        let image = image();
        let mut combiner = SampleCombiner::<1>::new();
        let other = CounterDataPrefix::new().with_counter("bytes");
        assert!(matches!(
            combiner.initialize(&other, &image),
            Err(SamplerError::CounterData(_))
        ));
        assert!(!combiner.is_initialized());
    }

    #[test]
    fn test_rows_round_robin() {
        let image = image();
        let samples = [
            Sample::from_range(&image, 0).unwrap(),
            Sample::from_range(&image, 1).unwrap(),
        ];
        let mut combiner = SampleCombiner::<2>::new();
        combiner.initialize(&prefix(), &image).unwrap();

        let mut rows = Vec::new();
        for _ in 0..3 {
            combiner
                .merge_samples(&samples, TimeRange::new(50, 150).unwrap(), |combined, row| {
                    assert_eq!(combined.counter_value(row, 0), Some(15.0));
                    assert_eq!(combined.range_weight(row), Some(1.0));
                    rows.push(row);
                    true
                })
                .unwrap();
        }
        assert_eq!(rows, vec![0, 1, 0]);
    }

    #[test]
    fn test_combined_row_carries_query_window() {
        let image = image();
        let samples = [Sample::from_range(&image, 0).unwrap()];
        let mut combiner = SampleCombiner::<1>::new();
        combiner.initialize(&prefix(), &image).unwrap();
        let query = TimeRange::new(25, 75).unwrap();
        combiner
            .merge_samples(&samples, query, |combined, row| {
                combined.sample_time(row) == Some(query)
            })
            .map(|ok| assert!(ok))
            .unwrap();
    }
}
