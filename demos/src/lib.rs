//! # counterscope demos
//!
//! Synthetic sampling sessions that drive the sampler crate end to end.
//!
//! ## Available Demos
//!
//! - `frame_sampler_demo` - Per-frame counter totals from a simulated GPU sampler

pub mod recorder;
pub mod session;
pub mod source;

pub use recorder::MarkerRecorder;
pub use session::{DEFAULT_COUNTERS, DemoConfig, DemoSummary, FrameReport, FrameStats, run_demo};
pub use source::{SyntheticCounterSource, SyntheticSourceConfig};

/// Demos library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
