//! Fixed-capacity trace of named CPU markers, grouped by frame.
//!
//! The producer pushes markers into the open frame and closes it with
//! [`on_frame_end`](CpuMarkerTrace::on_frame_end). Closed frames are read
//! oldest first and stay allocated until
//! [`release_oldest_frame`](CpuMarkerTrace::release_oldest_frame) is called.
//!
//! All storage is reserved up front. Markers past the per-frame cap, or
//! whose names do not fit the per-frame name budget, are dropped and
//! counted rather than stored.
//!
//! # Example
//!
//! ```ignore
//! let mut trace = CpuMarkerTrace::<u64>::new(CpuMarkerTraceConfig::default())?;
//!
//! trace.push_marker("shadow_pass");
//! trace.push_marker("lighting");
//! trace.update_current_frame_user_data(|params| *params.user_data = frame_number);
//! trace.on_frame_end();
//!
//! while let Some(frame) = trace.oldest_frame_markers() {
//!     for name in frame.iter() {
//!         println!("{name}");
//!     }
//!     trace.release_oldest_frame();
//! }
//! ```

use std::fmt;
use std::mem::size_of;

use crate::error::{SamplerError, SamplerResult};

/// Capacity settings for [`CpuMarkerTrace`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuMarkerTraceConfig {
    /// Number of frame slots in the ring.
    pub frame_count: usize,
    /// Maximum markers stored per frame.
    pub markers_per_frame: usize,
    /// Maximum total bytes of marker names stored per frame.
    pub name_bytes_per_frame: usize,
}

impl Default for CpuMarkerTraceConfig {
    fn default() -> Self {
        Self {
            frame_count: 8,
            markers_per_frame: 256,
            name_bytes_per_frame: 8 * 1024,
        }
    }
}

impl CpuMarkerTraceConfig {
    pub fn with_frame_count(mut self, frame_count: usize) -> Self {
        self.frame_count = frame_count;
        self
    }

    pub fn with_markers_per_frame(mut self, markers_per_frame: usize) -> Self {
        self.markers_per_frame = markers_per_frame;
        self
    }

    pub fn with_name_bytes_per_frame(mut self, name_bytes_per_frame: usize) -> Self {
        self.name_bytes_per_frame = name_bytes_per_frame;
        self
    }

    /// Bytes reserved for markers and names, excluding user data.
    pub fn memory_usage(&self) -> usize {
        self.frame_count
            * (self.markers_per_frame * size_of::<MarkerSpan>() + self.name_bytes_per_frame)
    }

    fn validate(&self) -> SamplerResult<()> {
        if self.frame_count == 0 || self.markers_per_frame == 0 || self.name_bytes_per_frame == 0 {
            return Err(SamplerError::InvalidParameter(format!(
                "marker trace capacities must be non-zero: {self:?}"
            )));
        }
        if u32::try_from(self.name_bytes_per_frame).is_err() {
            return Err(SamplerError::InvalidParameter(format!(
                "name budget of {} bytes per frame is too large",
                self.name_bytes_per_frame
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct MarkerSpan {
    offset: u32,
    len: u32,
}

struct FrameSlot<U> {
    names: String,
    markers: Vec<MarkerSpan>,
    dropped_markers: usize,
    dropped_name_bytes: usize,
    user_data: U,
}

impl<U: Default> FrameSlot<U> {
    fn with_capacity(config: &CpuMarkerTraceConfig) -> Self {
        Self {
            names: String::with_capacity(config.name_bytes_per_frame),
            markers: Vec::with_capacity(config.markers_per_frame),
            dropped_markers: 0,
            dropped_name_bytes: 0,
            user_data: U::default(),
        }
    }

    fn clear(&mut self) {
        self.names.clear();
        self.markers.clear();
        self.dropped_markers = 0;
        self.dropped_name_bytes = 0;
        self.user_data = U::default();
    }
}

/// Arguments passed to [`CpuMarkerTrace::update_current_frame_user_data`].
pub struct FrameUserDataParams<'a, U> {
    pub valid_marker_count: usize,
    pub dropped_marker_count: usize,
    pub dropped_name_bytes: usize,
    pub user_data: &'a mut U,
}

/// Read-only view of the oldest closed frame.
pub struct FrameMarkers<'a, U> {
    names: &'a str,
    markers: &'a [MarkerSpan],
    pub dropped_marker_count: usize,
    pub dropped_name_bytes: usize,
    pub user_data: &'a U,
}

impl<'a, U> FrameMarkers<'a, U> {
    pub fn valid_marker_count(&self) -> usize {
        self.markers.len()
    }

    /// Name of the `index`-th marker in push order.
    pub fn name(&self, index: usize) -> Option<&'a str> {
        let span = self.markers.get(index)?;
        let start = span.offset as usize;
        self.names.get(start..start + span.len as usize)
    }

    /// Marker names in push order.
    pub fn iter(&self) -> impl Iterator<Item = &'a str> + '_ {
        (0..self.markers.len()).filter_map(|index| self.name(index))
    }
}

impl<U: fmt::Debug> fmt::Debug for FrameMarkers<'_, U> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameMarkers")
            .field("markers", &self.iter().collect::<Vec<_>>())
            .field("dropped_marker_count", &self.dropped_marker_count)
            .field("dropped_name_bytes", &self.dropped_name_bytes)
            .field("user_data", self.user_data)
            .finish()
    }
}

/// Ring of frames holding named CPU markers and one user-data value each.
pub struct CpuMarkerTrace<U = ()> {
    config: CpuMarkerTraceConfig,
    frames: Vec<FrameSlot<U>>,
    read: usize,
    unread: usize,
    frame_open: bool,
}

impl<U: Default> CpuMarkerTrace<U> {
    /// Reserve all frame storage and open the first frame.
    pub fn new(config: CpuMarkerTraceConfig) -> SamplerResult<Self> {
        config.validate()?;
        let frames = (0..config.frame_count)
            .map(|_| FrameSlot::with_capacity(&config))
            .collect();

        log::debug!(
            "CPU marker trace: {} frames x {} markers, {} name bytes per frame ({} bytes)",
            config.frame_count,
            config.markers_per_frame,
            config.name_bytes_per_frame,
            config.memory_usage()
        );

        Ok(Self {
            config,
            frames,
            read: 0,
            unread: 0,
            frame_open: true,
        })
    }

    pub fn config(&self) -> &CpuMarkerTraceConfig {
        &self.config
    }

    /// Bytes reserved for markers, names and user data.
    pub fn memory_usage(&self) -> usize {
        self.config.memory_usage() + self.config.frame_count * size_of::<U>()
    }

    /// Whether a frame is currently accepting markers.
    pub fn is_frame_open(&self) -> bool {
        self.frame_open
    }

    fn write_slot(&self) -> usize {
        (self.read + self.unread) % self.config.frame_count
    }

    /// Append a marker to the open frame.
    ///
    /// Returns false when no frame is open or the marker was dropped.
    pub fn push_marker(&mut self, name: &str) -> bool {
        if !self.frame_open {
            return false;
        }
        let markers_per_frame = self.config.markers_per_frame;
        let name_bytes_per_frame = self.config.name_bytes_per_frame;
        let slot = self.write_slot();
        let frame = &mut self.frames[slot];

        if frame.markers.len() >= markers_per_frame {
            frame.dropped_markers += 1;
            return false;
        }
        if frame.names.len() + name.len() > name_bytes_per_frame {
            frame.dropped_markers += 1;
            frame.dropped_name_bytes += name.len();
            return false;
        }

        frame.markers.push(MarkerSpan {
            offset: frame.names.len() as u32,
            len: name.len() as u32,
        });
        frame.names.push_str(name);
        true
    }

    /// Markers dropped so far in the open frame, 0 when none is open.
    pub fn current_frame_dropped_marker_count(&self) -> usize {
        if self.frame_open {
            self.frames[self.write_slot()].dropped_markers
        } else {
            0
        }
    }

    /// Run `update` against the open frame's user data.
    ///
    /// Returns false without calling `update` when no frame is open.
    pub fn update_current_frame_user_data<F>(&mut self, update: F) -> bool
    where
        F: FnOnce(FrameUserDataParams<'_, U>),
    {
        if !self.frame_open {
            return false;
        }
        let slot = self.write_slot();
        let frame = &mut self.frames[slot];
        update(FrameUserDataParams {
            valid_marker_count: frame.markers.len(),
            dropped_marker_count: frame.dropped_markers,
            dropped_name_bytes: frame.dropped_name_bytes,
            user_data: &mut frame.user_data,
        });
        true
    }

    /// Close the open frame, if any, and open the next one if a slot is free.
    ///
    /// Returns whether a frame is open afterwards. While every slot holds an
    /// unread frame nothing is closed or opened.
    pub fn on_frame_end(&mut self) -> bool {
        if self.frame_open {
            self.unread += 1;
            self.frame_open = false;
        }
        if self.unread < self.config.frame_count {
            let slot = self.write_slot();
            self.frames[slot].clear();
            self.frame_open = true;
        } else {
            log::trace!("CPU marker trace full: {} unread frames", self.unread);
        }
        self.frame_open
    }

    /// Number of closed frames not yet released.
    pub fn unread_frame_count(&self) -> usize {
        self.unread
    }

    /// Oldest closed frame, `None` when every closed frame has been released.
    pub fn oldest_frame_markers(&self) -> Option<FrameMarkers<'_, U>> {
        if self.unread == 0 {
            return None;
        }
        let frame = &self.frames[self.read];
        Some(FrameMarkers {
            names: &frame.names,
            markers: &frame.markers,
            dropped_marker_count: frame.dropped_markers,
            dropped_name_bytes: frame.dropped_name_bytes,
            user_data: &frame.user_data,
        })
    }

    /// Free the oldest closed frame's slot. Returns false if there is none.
    pub fn release_oldest_frame(&mut self) -> bool {
        if self.unread == 0 {
            return false;
        }
        self.read = (self.read + 1) % self.config.frame_count;
        self.unread -= 1;
        true
    }

    /// Drop every frame and reopen the first slot.
    pub fn reset(&mut self) {
        for frame in &mut self.frames {
            frame.clear();
        }
        self.read = 0;
        self.unread = 0;
        self.frame_open = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> CpuMarkerTraceConfig {
        CpuMarkerTraceConfig::default()
            .with_frame_count(4)
            .with_markers_per_frame(3)
            .with_name_bytes_per_frame(16)
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let result = CpuMarkerTrace::<()>::new(config().with_markers_per_frame(0));
        assert!(matches!(result, Err(SamplerError::InvalidParameter(_))));
    }

    #[test]
    fn test_memory_usage() {
        let config = config();
        assert_eq!(config.memory_usage(), 4 * (3 * 8 + 16));
        let trace = CpuMarkerTrace::<u64>::new(config).unwrap();
        assert_eq!(trace.memory_usage(), config.memory_usage() + 4 * 8);
    }

    #[test]
    fn test_single_frame() {
        let mut trace = CpuMarkerTrace::<u32>::new(config()).unwrap();
        assert!(trace.push_marker("a"));
        assert!(trace.push_marker("bc"));
        assert!(trace.on_frame_end());
        assert_eq!(trace.unread_frame_count(), 1);

        let frame = trace.oldest_frame_markers().unwrap();
        assert_eq!(frame.iter().collect::<Vec<_>>(), vec!["a", "bc"]);
        assert_eq!(frame.name(2), None);
        assert!(trace.release_oldest_frame());
        assert!(trace.oldest_frame_markers().is_none());
        assert!(!trace.release_oldest_frame());
    }

    #[test]
    fn test_user_data_reset_on_new_frame() {
        let mut trace = CpuMarkerTrace::<u32>::new(config()).unwrap();
        assert!(trace.update_current_frame_user_data(|params| *params.user_data = 7));
        trace.on_frame_end();
        trace.update_current_frame_user_data(|params| assert_eq!(*params.user_data, 0));
        assert_eq!(*trace.oldest_frame_markers().unwrap().user_data, 7);
    }

    #[test]
    fn test_reset() {
        let mut trace = CpuMarkerTrace::<()>::new(config()).unwrap();
        trace.push_marker("x");
        trace.on_frame_end();
        trace.reset();
        assert_eq!(trace.unread_frame_count(), 0);
        assert!(trace.is_frame_open());
        assert!(trace.push_marker("y"));
    }
}
