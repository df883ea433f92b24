//! Frame loop wiring a sampled counter ring, the frame-level combiner and the
//! CPU marker trace together.

use std::ops::ControlFlow;

use counterscope_core::profiling::{
    frame_mark, profile_frame_mark_named, profile_message, profile_scope,
};
use counterscope_core::{CounterDataPrefix, GpuTimestamp};
use counterscope_sampler::{
    CpuMarkerTraceConfig, FrameLevelSampleCombiner, RingBufferCounterData, SamplerError,
    SamplerResult,
};

use crate::recorder::MarkerRecorder;
use crate::source::{SyntheticCounterSource, SyntheticSourceConfig};

/// Counters sampled when none are configured.
pub const DEFAULT_COUNTERS: [&str; 3] = [
    "gpu__time_duration",
    "sm__cycles_active",
    "dram__bytes_read",
];

/// Parameters of a synthetic sampling session.
#[derive(Debug, Clone, PartialEq)]
pub struct DemoConfig {
    pub frames: u64,
    pub frame_interval: GpuTimestamp,
    pub sampling_interval: GpuTimestamp,
    pub ring_capacity: usize,
    pub max_tracked_samples: usize,
    pub worker_threads: usize,
    pub validate: bool,
    pub counters: Vec<String>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            frames: 60,
            frame_interval: 16_667,
            sampling_interval: 1_000,
            ring_capacity: 64,
            max_tracked_samples: 64,
            worker_threads: 2,
            validate: cfg!(debug_assertions),
            counters: DEFAULT_COUNTERS.iter().map(|name| name.to_string()).collect(),
        }
    }
}

impl DemoConfig {
    pub fn with_frames(mut self, frames: u64) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_frame_interval(mut self, frame_interval: GpuTimestamp) -> Self {
        self.frame_interval = frame_interval;
        self
    }

    pub fn with_sampling_interval(mut self, sampling_interval: GpuTimestamp) -> Self {
        self.sampling_interval = sampling_interval;
        self
    }

    pub fn with_ring_capacity(mut self, ring_capacity: usize) -> Self {
        self.ring_capacity = ring_capacity;
        self
    }

    pub fn with_max_tracked_samples(mut self, max_tracked_samples: usize) -> Self {
        self.max_tracked_samples = max_tracked_samples;
        self
    }

    pub fn with_worker_threads(mut self, worker_threads: usize) -> Self {
        self.worker_threads = worker_threads;
        self
    }

    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    pub fn with_counters<I, S>(mut self, counters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.counters = counters.into_iter().map(Into::into).collect();
        self
    }

    /// Samples completed per frame, plus the one the producer runs ahead by.
    fn samples_per_frame(&self) -> usize {
        (self.frame_interval.div_ceil(self.sampling_interval) + 1) as usize
    }

    /// Last timestamp the producer reaches, if it fits the clock.
    fn session_end(&self) -> Option<GpuTimestamp> {
        self.frames
            .checked_mul(self.frame_interval)?
            .checked_add(self.sampling_interval)
    }

    fn validate(&self) -> SamplerResult<()> {
        if self.frame_interval == 0 || self.sampling_interval == 0 {
            return Err(SamplerError::InvalidParameter(
                "frame and sampling intervals must be non-zero".to_string(),
            ));
        }
        if self.session_end().is_none() {
            return Err(SamplerError::InvalidParameter(format!(
                "{} frames of {} ticks overflow the GPU clock",
                self.frames, self.frame_interval
            )));
        }
        let needed = self.samples_per_frame();
        if self.ring_capacity < needed {
            return Err(SamplerError::InvalidParameter(format!(
                "ring capacity {} cannot hold the {} samples produced per frame",
                self.ring_capacity, needed
            )));
        }
        // One sample may straddle the previous boundary.
        if self.max_tracked_samples <= needed {
            return Err(SamplerError::InvalidParameter(format!(
                "{} tracked samples cannot cover a frame of {} samples",
                self.max_tracked_samples, needed
            )));
        }
        Ok(())
    }
}

/// GPU-side totals attached to each CPU frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameStats {
    pub gpu_begin: GpuTimestamp,
    pub gpu_end: GpuTimestamp,
    pub num_samples: usize,
}

/// Combined counters for one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub index: u64,
    pub begin_timestamp: GpuTimestamp,
    pub end_timestamp: GpuTimestamp,
    pub num_samples: usize,
    /// Whether every sample covering the frame had arrived when it was combined.
    pub complete: bool,
    pub values: Vec<f64>,
}

/// Outcome of [`run_demo`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DemoSummary {
    pub frames: Vec<FrameReport>,
    pub samples_produced: usize,
    pub markers_recorded: usize,
    pub markers_dropped: usize,
}

/// Run a synthetic session for `config.frames` frames.
pub fn run_demo(config: &DemoConfig) -> SamplerResult<DemoSummary> {
    config.validate()?;

    let prefix = CounterDataPrefix::from_names(config.counters.iter().cloned())?;
    let source_config =
        SyntheticSourceConfig::default().with_sampling_interval(config.sampling_interval);
    let mut ring = RingBufferCounterData::new(config.ring_capacity, config.validate, |capacity| {
        SyntheticCounterSource::new(prefix.clone(), capacity, source_config)
    })?;

    let mut combiner = FrameLevelSampleCombiner::new();
    combiner.initialize(&prefix, ring.counter_data(), config.max_tracked_samples)?;

    let recorder = MarkerRecorder::<FrameStats>::new(
        CpuMarkerTraceConfig::default().with_frame_count(4),
    )?;

    log::info!(
        "Sampling {} counters every {} ticks, {} frames of {} ticks",
        prefix.len(),
        config.sampling_interval,
        config.frames,
        config.frame_interval
    );

    let mut summary = DemoSummary::default();
    for index in 0..config.frames {
        profile_scope!("demo_frame");
        let frame_end = (index + 1) * config.frame_interval;

        record_cpu_work(&recorder, index, config.worker_threads);

        // The sampler runs one interval ahead of the CPU frame.
        ring.source_mut()
            .produce_until(frame_end + config.sampling_interval)?;
        ring.update_put()?;

        let consumed = ring.consume_data(|range| {
            if combiner.num_tracked_samples() == config.max_tracked_samples {
                return Ok::<_, SamplerError>(ControlFlow::Break(()));
            }
            combiner.add_sample(range.image, range.range_index.get())?;
            Ok(ControlFlow::Continue(()))
        })?;
        ring.update_get(consumed)?;

        let complete = combiner.is_data_complete(frame_end);
        if !complete {
            log::warn!("Frame {} combined before its samples arrived", index);
            profile_message!("incomplete frame");
        }
        let frame = combiner.get_combined_samples(frame_end)?;
        let report = FrameReport {
            index,
            begin_timestamp: frame.begin_timestamp,
            end_timestamp: frame.end_timestamp,
            num_samples: frame.num_samples_in_frame,
            complete,
            values: (0..prefix.len())
                .map(|counter| frame.counter_value(counter).unwrap_or(0.0))
                .collect(),
        };

        let stats = FrameStats {
            gpu_begin: report.begin_timestamp,
            gpu_end: report.end_timestamp,
            num_samples: report.num_samples,
        };
        recorder.update_current_frame_user_data(|params| *params.user_data = stats);
        recorder.end_frame();
        profile_frame_mark_named!("demo_frame");
        frame_mark!();

        recorder.drain(|markers| {
            summary.markers_recorded += markers.valid_marker_count();
            summary.markers_dropped += markers.dropped_marker_count;
            log::debug!(
                "CPU frame [{}, {}): {} markers, {} dropped",
                markers.user_data.gpu_begin,
                markers.user_data.gpu_end,
                markers.valid_marker_count(),
                markers.dropped_marker_count
            );
        });

        log::debug!(
            "Frame {} [{}, {}): {} samples, {:?}",
            report.index,
            report.begin_timestamp,
            report.end_timestamp,
            report.num_samples,
            report.values
        );
        summary.frames.push(report);
    }

    summary.samples_produced = ring.source().samples_produced();
    Ok(summary)
}

fn record_cpu_work(recorder: &MarkerRecorder<FrameStats>, frame: u64, workers: usize) {
    recorder.push_marker(&format!("frame_{frame}/begin"));
    std::thread::scope(|scope| {
        for worker in 0..workers {
            scope.spawn(move || {
                recorder.push_marker(&format!("frame_{frame}/worker_{worker}/draw"));
            });
        }
    });
    recorder.push_marker(&format!("frame_{frame}/present"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_rejects_small_ring() {
        let config = DemoConfig::default()
            .with_frame_interval(10_000)
            .with_sampling_interval(1_000)
            .with_ring_capacity(10);
        assert!(matches!(
            run_demo(&config),
            Err(SamplerError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_config_rejects_zero_interval() {
        let config = DemoConfig::default().with_sampling_interval(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_rejects_clock_overflow() {
        let config = DemoConfig::default().with_frames(u64::MAX / 16_667 + 1);
        assert!(matches!(
            config.validate(),
            Err(SamplerError::InvalidParameter(_))
        ));

        let config = DemoConfig::default()
            .with_frames(1)
            .with_frame_interval(u64::MAX)
            .with_sampling_interval(1)
            .with_ring_capacity(usize::MAX);
        assert!(config.validate().is_err());
        assert!(DemoConfig::default().validate().is_ok());
    }

    #[test]
    fn test_samples_per_frame() {
        let config = DemoConfig::default()
            .with_frame_interval(2_500)
            .with_sampling_interval(1_000);
        assert_eq!(config.samples_per_frame(), 4);
    }
}
