//! # Frame Sampler Demo
//!
//! Simulates a periodic GPU counter sampler and prints per-frame counter
//! totals combined at CPU frame boundaries.
//!
//! ```bash
//! # 120 frames at 60 Hz, sampling every 500 ticks
//! ./frame_sampler_demo --frames 120 --sampling-interval 500
//!
//! # Custom counters with ring cursor validation
//! ./frame_sampler_demo --counter sm__cycles_active --counter l1tex__t_bytes --validate
//! ```

use std::process::ExitCode;

use clap::Parser;

use counterscope_demos::{DemoConfig, run_demo};

/// Synthetic frame-level counter sampling.
#[derive(Parser, Debug)]
#[command(name = "frame_sampler_demo", version)]
struct Args {
    /// Number of frames to simulate.
    #[arg(long, default_value = "60")]
    frames: u64,

    /// GPU ticks per frame.
    #[arg(long, default_value = "16667")]
    frame_interval: u64,

    /// GPU ticks covered by each sample.
    #[arg(long, default_value = "1000")]
    sampling_interval: u64,

    /// Slots in the counter data ring.
    #[arg(long, default_value = "64")]
    ring_capacity: usize,

    /// Samples the frame combiner may hold at once.
    #[arg(long, default_value = "64")]
    max_tracked_samples: usize,

    /// Threads recording CPU markers each frame.
    #[arg(long, default_value = "2")]
    worker_threads: usize,

    /// Cross-check ring triggers on every update.
    #[arg(long)]
    validate: bool,

    /// Counter to sample; repeat for several. Defaults to a small GPU set.
    #[arg(long = "counter")]
    counters: Vec<String>,
}

impl From<Args> for DemoConfig {
    fn from(args: Args) -> Self {
        let config = DemoConfig::default()
            .with_frames(args.frames)
            .with_frame_interval(args.frame_interval)
            .with_sampling_interval(args.sampling_interval)
            .with_ring_capacity(args.ring_capacity)
            .with_max_tracked_samples(args.max_tracked_samples)
            .with_worker_threads(args.worker_threads)
            .with_validation(args.validate);
        if args.counters.is_empty() {
            config
        } else {
            config.with_counters(args.counters)
        }
    }
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Starting counterscope Frame Sampler Demo");
    log::info!("Core version: {}", counterscope_core::VERSION);
    log::info!("Sampler version: {}", counterscope_sampler::VERSION);

    let config = DemoConfig::from(Args::parse());
    let counters = config.counters.clone();
    let summary = match run_demo(&config) {
        Ok(summary) => summary,
        Err(err) => {
            log::error!("Sampling session failed: {err}");
            return ExitCode::FAILURE;
        }
    };

    for frame in &summary.frames {
        let totals: Vec<String> = counters
            .iter()
            .zip(&frame.values)
            .map(|(name, value)| format!("{name}={value:.0}"))
            .collect();
        log::info!(
            "Frame {:>4} [{}, {}) {:>2} samples{} {}",
            frame.index,
            frame.begin_timestamp,
            frame.end_timestamp,
            frame.num_samples,
            if frame.complete { "" } else { " (partial)" },
            totals.join(" ")
        );
    }

    log::info!(
        "{} samples produced, {} CPU markers recorded, {} dropped",
        summary.samples_produced,
        summary.markers_recorded,
        summary.markers_dropped
    );
    ExitCode::SUCCESS
}
