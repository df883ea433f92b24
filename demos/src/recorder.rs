//! CPU marker recording shared between worker threads.

use parking_lot::Mutex;

use counterscope_sampler::{
    CpuMarkerTrace, CpuMarkerTraceConfig, FrameMarkers, FrameUserDataParams, SamplerResult,
};

/// Thread-safe wrapper around a [`CpuMarkerTrace`].
///
/// Worker threads push markers through a shared reference while the frame
/// loop closes frames and drains finished ones. Every call holds the lock only
/// for the duration of the underlying trace operation.
pub struct MarkerRecorder<U = ()> {
    trace: Mutex<CpuMarkerTrace<U>>,
}

impl<U: Default> MarkerRecorder<U> {
    pub fn new(config: CpuMarkerTraceConfig) -> SamplerResult<Self> {
        Ok(Self {
            trace: Mutex::new(CpuMarkerTrace::new(config)?),
        })
    }

    pub fn push_marker(&self, name: &str) -> bool {
        self.trace.lock().push_marker(name)
    }

    pub fn update_current_frame_user_data<F>(&self, update: F) -> bool
    where
        F: FnOnce(FrameUserDataParams<'_, U>),
    {
        self.trace.lock().update_current_frame_user_data(update)
    }

    /// Close the open frame. Returns whether a new frame could be opened.
    pub fn end_frame(&self) -> bool {
        self.trace.lock().on_frame_end()
    }

    pub fn unread_frame_count(&self) -> usize {
        self.trace.lock().unread_frame_count()
    }

    /// Visit and release every closed frame, oldest first.
    pub fn drain<F>(&self, mut visit: F) -> usize
    where
        F: FnMut(FrameMarkers<'_, U>),
    {
        let mut trace = self.trace.lock();
        let mut drained = 0;
        while let Some(frame) = trace.oldest_frame_markers() {
            visit(frame);
            trace.release_oldest_frame();
            drained += 1;
        }
        drained
    }
}
