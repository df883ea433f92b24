//! # counterscope sampler
//!
//! Bookkeeping and aggregation for periodic GPU hardware-counter sampling.
//!
//! ## Overview
//!
//! - [`RingBufferCounterData`] - Put/get cursors over a ring of sampled ranges
//! - [`SampleCombiner`] - Merges samples into arbitrary query windows
//! - [`FrameLevelSampleCombiner`] - Produces one combined row per frame boundary
//! - [`CpuMarkerTrace`] - Ring of frames holding named CPU markers
//!
//! All types are single-threaded; callers add synchronization when sharing
//! them between a producer and a consumer.

pub mod combiner;
pub mod error;
pub mod frame_combiner;
pub mod marker_trace;
pub mod ring;
pub mod ring_buffer;

pub use combiner::{Sample, SampleCombiner};
pub use error::{SamplerError, SamplerResult};
pub use frame_combiner::{FrameInfo, FrameLevelSampleCombiner};
pub use marker_trace::{CpuMarkerTrace, CpuMarkerTraceConfig, FrameMarkers, FrameUserDataParams};
pub use ring::{RingIndex, SequenceNumber, circular_increment, distance};
pub use ring_buffer::{
    CounterDataSource, CounterRange, LatestRangeInfo, RingBufferCounterData, UnreadRanges,
};

/// Sampler library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
