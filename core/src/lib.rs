//! # counterscope core
//!
//! Data model shared by the counterscope sampler crates.
//!
//! ## Overview
//!
//! This crate provides:
//! - [`CounterDataImage`] - Typed counter data image with an explicit layout version
//! - [`CounterDataPrefix`] / [`CounterDataSchema`] - Description of the counters held per range
//! - [`TimeRange`] and [`overlap_factor`] - GPU timestamp windows and their overlap weighting
//! - [`profiling`] - Optional Tracy instrumentation macros

pub mod counter_data;
pub mod error;
pub mod profiling;
pub mod time;

pub use counter_data::{
    CounterDataImage, CounterDataInfo, CounterDataPrefix, CounterDataSchema, LayoutVersion,
    RangeRecord,
};
pub use error::{CounterDataError, CounterDataResult};
pub use time::{GpuTimestamp, TimeRange, overlap_factor};

/// Core library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
