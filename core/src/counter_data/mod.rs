//! Typed counter data images.
//!
//! An image holds a fixed number of ranges. Each range records the GPU
//! window it was sampled over and one `f64` value per counter named in the
//! image's [`CounterDataPrefix`].

mod codec;
mod image;
mod schema;

pub use codec::IMAGE_MAGIC;
pub use image::{CounterDataImage, CounterDataInfo, RangeRecord};
pub use schema::{CounterDataPrefix, CounterDataSchema, LayoutVersion};
