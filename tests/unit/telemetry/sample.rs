use super::*;

fn metadata() -> FrameMetadata {
    let mut m = FrameMetadata::new(LayerId::new("cam"), 9, 100.0);
    m.filter_timings = vec![
        FilterTiming {
            name: "denoise".into(),
            duration_ms: 1.5,
        },
        FilterTiming {
            name: "grade".into(),
            duration_ms: 0.5,
        },
    ];
    m.encode_start = 101.0;
    m.encode_end = 103.0;
    m.frame_bytes = 2048;
    m
}

#[test]
fn segments_add_up_to_the_total() {
    // producer = (103 - 100) + 2 = 5, transport = 5, consumer = 2 + 1 = 3
    let times = ConsumerTimes {
        receive_time: 10.0,
        decode_start: 10.0,
        decode_end: 12.0,
        render_start: 20.0,
        render_end: 21.0,
    };
    let transport = TransportEstimate::estimate(None, 10.0, TransportPolicy::default());
    let sample = TimingSample::from_parts(&metadata(), transport, times);
    assert_eq!(sample.producer_ms, 5.0);
    assert_eq!(sample.transport.ms, 5.0);
    assert_eq!(sample.consumer_ms, 3.0);
    assert_eq!(sample.total_ms(), 13.0);
    assert_eq!(sample.completed_at, 21.0);
    assert_eq!(sample.frame_bytes, 2048);
}

#[test]
fn plausible_cross_clock_readings_are_kept_but_flagged() {
    let est = TransportEstimate::estimate(Some(1000.0), 1012.5, TransportPolicy::default());
    assert_eq!(est.ms, 12.5);
    assert!(est.approximate);
}

#[test]
fn skewed_readings_fall_back_to_the_floor() {
    let policy = TransportPolicy {
        floor_ms: 4.0,
        ceiling_ms: 250.0,
    };
    // Peer clock ahead of ours: negative difference.
    assert_eq!(TransportEstimate::estimate(Some(5000.0), 10.0, policy).ms, 4.0);
    // Peer clock far behind: implausibly large difference.
    assert_eq!(TransportEstimate::estimate(Some(0.0), 90_000.0, policy).ms, 4.0);
    // Faster than the floor is not trusted either.
    assert_eq!(TransportEstimate::estimate(Some(10.0), 11.0, policy).ms, 4.0);
    assert!(TransportEstimate::estimate(Some(f64::NAN), 1.0, policy).approximate);
}

#[test]
fn injected_frames_have_exact_zero_transport() {
    let z = TransportEstimate::zero();
    assert_eq!(z.ms, 0.0);
    assert!(!z.approximate);
}
