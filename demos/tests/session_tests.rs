//! End-to-end synthetic sessions.

use rstest::rstest;

use counterscope_demos::{DemoConfig, run_demo};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() <= expected.abs() * 1e-9 + 1e-9,
        "expected {expected}, got {actual}"
    );
}

#[rstest]
#[case::several_samples_per_frame(2_500, 1_000)]
#[case::aligned(1_000, 1_000)]
#[case::samples_longer_than_frames(700, 1_000)]
#[case::vsync_60hz(16_667, 1_000)]
fn test_frame_totals_match_frame_duration(#[case] frame_interval: u64, #[case] sampling_interval: u64) {
    let config = DemoConfig::default()
        .with_frames(12)
        .with_frame_interval(frame_interval)
        .with_sampling_interval(sampling_interval)
        .with_validation(true);
    let summary = run_demo(&config).unwrap();

    assert_eq!(summary.frames.len(), 12);
    let mut previous_end = 0;
    for frame in &summary.frames {
        assert!(frame.complete, "frame {} incomplete", frame.index);
        assert_eq!(frame.begin_timestamp, previous_end);
        assert_eq!(frame.end_timestamp, (frame.index + 1) * frame_interval);
        assert!(frame.num_samples > 0);

        // Counter `c` advances at `c + 1` per tick.
        let duration = (frame.end_timestamp - frame.begin_timestamp) as f64;
        for (counter, value) in frame.values.iter().enumerate() {
            assert_close(*value, (counter as f64 + 1.0) * duration);
        }
        previous_end = frame.end_timestamp;
    }
}

#[test]
fn test_markers_and_samples_are_counted() {
    let config = DemoConfig::default()
        .with_frames(10)
        .with_worker_threads(3)
        .with_counters(["gpu__cycles"]);
    let summary = run_demo(&config).unwrap();

    assert_eq!(summary.markers_recorded, 10 * (3 + 2));
    assert_eq!(summary.markers_dropped, 0);
    assert_eq!(summary.samples_produced, (10 * 16_667 + 1_000) / 1_000);
    assert!(summary.frames.iter().all(|frame| frame.values.len() == 1));
}

#[test]
fn test_small_ring_is_rejected() {
    let config = DemoConfig::default().with_ring_capacity(4);
    assert!(run_demo(&config).is_err());
}

#[test]
fn test_duplicate_counters_are_rejected() {
    let config = DemoConfig::default().with_counters(["gpu__cycles", "gpu__cycles"]);
    assert!(run_demo(&config).is_err());
}
