//! Counter data image storage.

use std::fmt;
use std::sync::Arc;

use bytemuck::{Pod, Zeroable};

use crate::error::{CounterDataError, CounterDataResult};
use crate::time::TimeRange;

use super::schema::{CounterDataSchema, LayoutVersion};

/// Per-range header stored ahead of the counter values.
///
/// `weight` is 1.0 for a raw sample. In a combined range it holds the sum
/// of the overlap weights that were accumulated into it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct RangeRecord {
    pub start: u64,
    pub end: u64,
    pub weight: f64,
}

impl RangeRecord {
    /// GPU window covered by this range.
    pub fn time_range(&self) -> TimeRange {
        TimeRange {
            start: self.start,
            end: self.end,
        }
    }
}

/// Summary of an image, mostly useful for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterDataInfo {
    pub layout_version: LayoutVersion,
    pub num_ranges: usize,
    pub num_counters: usize,
    pub size_in_bytes: usize,
}

impl fmt::Display for CounterDataInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "layout {}: {} ranges x {} counters ({} bytes)",
            self.layout_version, self.num_ranges, self.num_counters, self.size_in_bytes
        )
    }
}

/// Fixed-capacity table of ranges, each holding one time window and one
/// value per counter of the schema.
///
/// # Example
///
/// ```
/// use counterscope_core::{CounterDataImage, CounterDataPrefix, CounterDataSchema, TimeRange};
///
/// let schema = CounterDataSchema::new(CounterDataPrefix::new().with_counter("cycles")).unwrap();
/// let mut image = CounterDataImage::new(schema, 4);
/// image.set_range(0, TimeRange::new(0, 100).unwrap(), &[42.0]).unwrap();
/// assert_eq!(image.counter_value(0, 0), Some(42.0));
/// ```
#[derive(Clone)]
pub struct CounterDataImage {
    schema: Arc<CounterDataSchema>,
    ranges: Vec<RangeRecord>,
    values: Vec<f64>,
}

impl CounterDataImage {
    /// Create a zeroed image with `num_ranges` ranges.
    pub fn new(schema: Arc<CounterDataSchema>, num_ranges: usize) -> Self {
        let values = vec![0.0; num_ranges * schema.num_counters()];
        Self {
            schema,
            ranges: vec![RangeRecord::zeroed(); num_ranges],
            values,
        }
    }

    /// Create a zeroed image with the same schema and range count.
    pub fn new_like(template: &CounterDataImage) -> Self {
        Self::new(template.schema.clone(), template.num_ranges())
    }

    pub(crate) fn from_parts(
        schema: Arc<CounterDataSchema>,
        ranges: Vec<RangeRecord>,
        values: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(values.len(), ranges.len() * schema.num_counters());
        Self {
            schema,
            ranges,
            values,
        }
    }

    pub fn schema(&self) -> &Arc<CounterDataSchema> {
        &self.schema
    }

    pub fn num_ranges(&self) -> usize {
        self.ranges.len()
    }

    pub fn num_counters(&self) -> usize {
        self.schema.num_counters()
    }

    /// Position of a counter within each range, if present.
    pub fn counter_index(&self, name: &str) -> Option<usize> {
        self.schema.counter_index(name)
    }

    pub fn info(&self) -> CounterDataInfo {
        CounterDataInfo {
            layout_version: self.schema.version(),
            num_ranges: self.num_ranges(),
            num_counters: self.num_counters(),
            size_in_bytes: self.num_ranges() * self.schema.range_stride(),
        }
    }

    pub(crate) fn records(&self) -> &[RangeRecord] {
        &self.ranges
    }

    pub(crate) fn values(&self) -> &[f64] {
        &self.values
    }

    /// Header of the given range.
    pub fn range(&self, index: usize) -> CounterDataResult<&RangeRecord> {
        self.check_range(index)?;
        Ok(&self.ranges[index])
    }

    /// GPU window of the given range, `None` when out of bounds.
    pub fn sample_time(&self, index: usize) -> Option<TimeRange> {
        self.ranges.get(index).map(RangeRecord::time_range)
    }

    /// Accumulated weight of the given range, `None` when out of bounds.
    pub fn range_weight(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|r| r.weight)
    }

    /// All counter values of the given range.
    pub fn counter_values(&self, index: usize) -> CounterDataResult<&[f64]> {
        self.check_range(index)?;
        let n = self.num_counters();
        Ok(&self.values[index * n..(index + 1) * n])
    }

    /// Single counter value by position.
    pub fn counter_value(&self, index: usize, counter: usize) -> Option<f64> {
        let values = self.counter_values(index).ok()?;
        values.get(counter).copied()
    }

    /// Single counter value by name.
    pub fn counter_value_by_name(&self, index: usize, name: &str) -> Option<f64> {
        let counter = self.schema.counter_index(name)?;
        self.counter_value(index, counter)
    }

    /// Overwrite a range with a raw sample of weight 1.0.
    pub fn set_range(
        &mut self,
        index: usize,
        time: TimeRange,
        values: &[f64],
    ) -> CounterDataResult<()> {
        self.check_range(index)?;
        time.validate()?;
        let n = self.num_counters();
        if values.len() != n {
            return Err(CounterDataError::SchemaMismatch(format!(
                "expected {} counter values, got {}",
                n,
                values.len()
            )));
        }
        self.ranges[index] = RangeRecord {
            start: time.start,
            end: time.end,
            weight: 1.0,
        };
        self.values[index * n..(index + 1) * n].copy_from_slice(values);
        Ok(())
    }

    /// Change the window of a range without touching its values or weight.
    pub fn set_range_time(&mut self, index: usize, time: TimeRange) -> CounterDataResult<()> {
        self.check_range(index)?;
        time.validate()?;
        let record = &mut self.ranges[index];
        record.start = time.start;
        record.end = time.end;
        Ok(())
    }

    /// Zero a range's window, weight and values.
    pub fn clear_range(&mut self, index: usize) -> CounterDataResult<()> {
        self.check_range(index)?;
        let n = self.num_counters();
        self.ranges[index] = RangeRecord::zeroed();
        self.values[index * n..(index + 1) * n].fill(0.0);
        Ok(())
    }

    /// Copy a range verbatim from another image with a compatible schema.
    pub fn copy_range(
        &mut self,
        index: usize,
        src: &CounterDataImage,
        src_index: usize,
    ) -> CounterDataResult<()> {
        self.check_range(index)?;
        src.check_range(src_index)?;
        self.schema.ensure_compatible(&src.schema)?;
        let n = self.num_counters();
        self.ranges[index] = src.ranges[src_index];
        self.values[index * n..(index + 1) * n]
            .copy_from_slice(&src.values[src_index * n..(src_index + 1) * n]);
        Ok(())
    }

    /// Add `weight` times the source range into the given range.
    ///
    /// Values and the stored weight grow; the window of the destination is
    /// left unchanged.
    pub fn accumulate_range(
        &mut self,
        index: usize,
        src: &CounterDataImage,
        src_index: usize,
        weight: f64,
    ) -> CounterDataResult<()> {
        self.check_range(index)?;
        src.check_range(src_index)?;
        self.schema.ensure_compatible(&src.schema)?;
        let n = self.num_counters();
        self.ranges[index].weight += weight * src.ranges[src_index].weight;
        let dst = &mut self.values[index * n..(index + 1) * n];
        let src_values = &src.values[src_index * n..(src_index + 1) * n];
        for (d, s) in dst.iter_mut().zip(src_values) {
            *d += weight * s;
        }
        Ok(())
    }

    fn check_range(&self, index: usize) -> CounterDataResult<()> {
        if index >= self.ranges.len() {
            return Err(CounterDataError::RangeOutOfBounds {
                index,
                num_ranges: self.ranges.len(),
            });
        }
        Ok(())
    }
}

impl fmt::Debug for CounterDataImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CounterDataImage")
            .field("version", &self.schema.version())
            .field("counters", &self.schema.prefix().counters())
            .field("num_ranges", &self.num_ranges())
            .finish()
    }
}
