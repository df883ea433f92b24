//! Counter data prefix and schema.
//!
//! A [`CounterDataPrefix`] lists which counters a range holds and in which
//! order. A [`CounterDataSchema`] is derived from a prefix exactly once and
//! shared via [`Arc`] by every image built from it, so compatibility checks
//! between images reduce to comparing schemas.

use std::fmt;
use std::sync::Arc;

use crate::error::{CounterDataError, CounterDataResult};

use super::image::RangeRecord;

/// Explicit counter data layout tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LayoutVersion(pub u32);

impl LayoutVersion {
    /// The only layout this crate produces and accepts.
    pub const CURRENT: Self = Self(1);
}

impl fmt::Display for LayoutVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Ordered list of counter names stored in every range of an image.
///
/// # Example
///
/// ```
/// use counterscope_core::CounterDataPrefix;
///
/// let prefix = CounterDataPrefix::new()
///     .with_counter("gr__cycles_elapsed")
///     .with_counter("smsp__warps_launched");
/// assert_eq!(prefix.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct CounterDataPrefix {
    counters: Vec<String>,
}

impl CounterDataPrefix {
    /// Create an empty prefix.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a prefix from a list of names, validating it.
    pub fn from_names<I, S>(names: I) -> CounterDataResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let prefix = Self {
            counters: names.into_iter().map(Into::into).collect(),
        };
        prefix.validate()?;
        Ok(prefix)
    }

    /// Append a counter name.
    pub fn with_counter(mut self, name: impl Into<String>) -> Self {
        self.counters.push(name.into());
        self
    }

    /// Counter names in storage order.
    pub fn counters(&self) -> &[String] {
        &self.counters
    }

    /// Number of counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    /// Check if the prefix lists no counters.
    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Check that the prefix is non-empty, names are printable and unique.
    pub fn validate(&self) -> CounterDataResult<()> {
        if self.counters.is_empty() {
            return Err(CounterDataError::EmptyPrefix);
        }
        for (index, name) in self.counters.iter().enumerate() {
            if name.is_empty() || name.chars().any(char::is_control) {
                return Err(CounterDataError::InvalidName(name.clone()));
            }
            if self.counters[..index].contains(name) {
                return Err(CounterDataError::DuplicateCounter(name.clone()));
            }
        }
        Ok(())
    }
}

/// Layout shared by all images built from one prefix.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CounterDataSchema {
    version: LayoutVersion,
    prefix: CounterDataPrefix,
}

impl CounterDataSchema {
    /// Derive a schema for the current layout from a prefix.
    pub fn new(prefix: CounterDataPrefix) -> CounterDataResult<Arc<Self>> {
        Self::with_version(prefix, LayoutVersion::CURRENT)
    }

    /// Derive a schema with an explicit layout version.
    ///
    /// Only [`LayoutVersion::CURRENT`] is accepted.
    pub fn with_version(
        prefix: CounterDataPrefix,
        version: LayoutVersion,
    ) -> CounterDataResult<Arc<Self>> {
        if version != LayoutVersion::CURRENT {
            return Err(CounterDataError::UnsupportedLayout {
                found: version,
                expected: LayoutVersion::CURRENT,
            });
        }
        prefix.validate()?;
        Ok(Arc::new(Self { version, prefix }))
    }

    /// Layout version tag.
    pub fn version(&self) -> LayoutVersion {
        self.version
    }

    /// The prefix this schema was derived from.
    pub fn prefix(&self) -> &CounterDataPrefix {
        &self.prefix
    }

    /// Number of counter values per range.
    pub fn num_counters(&self) -> usize {
        self.prefix.len()
    }

    /// Position of a counter within a range, if present.
    pub fn counter_index(&self, name: &str) -> Option<usize> {
        self.prefix.counters().iter().position(|c| c == name)
    }

    /// Bytes needed to store one range (record plus values).
    pub fn range_stride(&self) -> usize {
        std::mem::size_of::<RangeRecord>() + self.num_counters() * std::mem::size_of::<f64>()
    }

    /// Check whether images of both schemas can be combined.
    pub fn is_compatible(&self, other: &CounterDataSchema) -> bool {
        self.version == other.version && self.prefix == other.prefix
    }

    /// Like [`is_compatible`](Self::is_compatible) but reports what differs.
    pub fn ensure_compatible(&self, other: &CounterDataSchema) -> CounterDataResult<()> {
        if self.version != other.version {
            return Err(CounterDataError::SchemaMismatch(format!(
                "layout {} vs {}",
                self.version, other.version
            )));
        }
        if self.prefix != other.prefix {
            return Err(CounterDataError::SchemaMismatch(format!(
                "counters {:?} vs {:?}",
                self.prefix.counters(),
                other.prefix.counters()
            )));
        }
        Ok(())
    }
}
