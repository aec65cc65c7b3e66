use std::sync::atomic::AtomicUsize;

use image::{Rgba, RgbaImage};

use super::*;
use crate::foundation::clock::{ManualClock, MonotonicClock};
use crate::pipeline::filter::FnFilter;
use crate::pipeline::source::{PatternSource, SourceFrame};

fn canvas() -> Canvas {
    Canvas::new(64, 48).unwrap()
}

fn solid_source() -> Box<dyn FrameSource> {
    Box::new(|_t: f64| Ok(SourceFrame::Single(RgbaImage::from_pixel(128, 96, Rgba([40, 80, 120, 255])))))
}

fn producer_with(
    config: LayerConfig,
    source: Box<dyn FrameSource>,
    filters: FilterPipeline,
    clock: Arc<dyn Clock>,
) -> (LayerProducer, Arc<FrameBuffer>, Arc<SharedView>) {
    let buffer = Arc::new(FrameBuffer::new(config.id.clone(), config.buffer_capacity).unwrap());
    let view = Arc::new(SharedView::new(canvas()));
    let producer = LayerProducer::new(
        config,
        source,
        filters,
        Arc::clone(&buffer),
        Arc::clone(&view),
        clock,
    )
    .unwrap();
    (producer, buffer, view)
}

#[test]
fn tick_stamps_ordered_timestamps_and_filter_timings() {
    let clock = Arc::new(ManualClock::new(1000.0));
    let c = Arc::clone(&clock);
    let source: Box<dyn FrameSource> = Box::new(move |_t: f64| {
        c.advance(2.0);
        Ok(SourceFrame::Single(RgbaImage::from_pixel(32, 32, Rgba([1, 2, 3, 255]))))
    });
    let filters = FilterPipeline::new()
        .with(FnFilter::new("blur", Ok))
        .with(FnFilter::new("grade", Ok));
    let (mut producer, buffer, _view) =
        producer_with(LayerConfig::new("cam", "Camera"), source, filters, clock);

    let outcome = producer.tick();
    assert_eq!(
        outcome,
        TickOutcome::Produced {
            frame_id: 0,
            dropped_frame_id: None
        }
    );

    let frame = buffer.pop_front().unwrap();
    let m = frame.metadata();
    assert_eq!(m.acquire_time, 1000.0);
    assert_eq!(m.capture_time, 1002.0);
    assert!(m.capture_time <= m.encode_start && m.encode_start <= m.encode_end);
    let names: Vec<_> = m.filter_timings.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["blur", "grade"]);
    assert_eq!((m.frame_width, m.frame_height), (64, 48));
    assert_eq!(m.frame_bytes, frame.payload().len());
    assert_eq!((m.buffer_length, m.buffer_capacity), (1, 2));
    assert!(m.anchor().is_none());
    assert!(m.nav_thumbnail.is_none());
}

#[test]
fn frame_ids_increase_and_full_buffer_drops_oldest() {
    let clock = Arc::new(ManualClock::new(0.0));
    let (mut producer, buffer, _view) = producer_with(
        LayerConfig::new("cam", ""),
        solid_source(),
        FilterPipeline::new(),
        clock,
    );
    for _ in 0..5 {
        producer.tick();
    }
    assert_eq!(buffer.frame_ids(), vec![3, 4]);
    let stats = producer.stats();
    assert_eq!(stats.produced, 5);
    assert_eq!(stats.dropped, 3);
    assert_eq!(stats.failures, 0);
}

#[test]
fn failing_source_skips_the_frame_and_counts_the_failure() {
    let clock = Arc::new(ManualClock::new(0.0));
    let calls = Arc::new(AtomicUsize::new(0));
    let n = Arc::clone(&calls);
    let source: Box<dyn FrameSource> = Box::new(move |_t: f64| {
        if n.fetch_add(1, Ordering::SeqCst) == 0 {
            Err(StreamViewError::producer("camera unplugged"))
        } else {
            Ok(SourceFrame::Single(RgbaImage::from_pixel(8, 8, Rgba([0, 0, 0, 255]))))
        }
    });
    let (mut producer, buffer, _view) =
        producer_with(LayerConfig::new("cam", ""), source, FilterPipeline::new(), clock);

    assert_eq!(producer.tick(), TickOutcome::Failed);
    assert!(buffer.is_empty());
    assert!(producer.tick().is_produced());
    assert_eq!(buffer.frame_ids(), vec![0]);
    assert_eq!(producer.stats().failures, 1);
    assert_eq!(producer.stats().ticks, 2);
}

#[test]
fn failing_filter_is_a_skipped_frame() {
    let clock = Arc::new(ManualClock::new(0.0));
    let filters = FilterPipeline::new().with(FnFilter::new("broken", |_img| {
        Err(StreamViewError::producer("boom"))
    }));
    let (mut producer, buffer, _view) =
        producer_with(LayerConfig::new("cam", ""), solid_source(), filters, clock);
    assert_eq!(producer.tick(), TickOutcome::Failed);
    assert!(buffer.is_empty());
}

#[test]
fn overscan_and_zoomed_view_set_anchor_and_size() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut cfg = LayerConfig::new("cam", "");
    cfg.overscan = 4;
    let (mut producer, buffer, view) =
        producer_with(cfg, solid_source(), FilterPipeline::new(), clock);
    view.set_viewport(Viewport {
        zoom: 2.0,
        x: 0.5,
        y: 0.0,
    });
    producer.tick();
    let frame = buffer.pop_front().unwrap();
    let m = frame.metadata();
    assert_eq!((m.frame_width, m.frame_height), (72, 56));
    assert_eq!(m.overscan, 4);
    assert_eq!(m.anchor(), Some((0.75, 0.25)));
}

#[test]
fn position_updates_change_the_output_size() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut cfg = LayerConfig::new("pip", "");
    cfg.position = Some(LayerRect::new(0.0, 0.0, 20.0, 10.0));
    let (mut producer, buffer, _view) =
        producer_with(cfg, solid_source(), FilterPipeline::new(), clock);
    producer.tick();
    producer.set_position(Some(LayerRect::new(5.0, 5.0, 30.0, 12.0)));
    producer.tick();
    let sizes: Vec<_> = std::iter::from_fn(|| buffer.pop_front())
        .map(|f| (f.metadata().frame_width, f.metadata().frame_height))
        .collect();
    assert_eq!(sizes, vec![(20, 10), (30, 12)]);
}

#[test]
fn nav_thumbnail_is_attached_when_enabled() {
    let clock = Arc::new(ManualClock::new(0.0));
    let mut cfg = LayerConfig::new("bg", "");
    cfg.nav_thumbnail = true;
    let (mut producer, buffer, _view) =
        producer_with(cfg, solid_source(), FilterPipeline::new(), clock);
    producer.tick();
    let frame = buffer.pop_front().unwrap();
    let thumb = frame.metadata().nav_thumbnail.as_ref().unwrap();
    let img = image::load_from_memory(thumb).unwrap();
    assert_eq!(img.width(), 128);
}

#[test]
fn notifier_fires_once_per_pushed_frame() {
    let clock = Arc::new(ManualClock::new(0.0));
    let hits = Arc::new(AtomicUsize::new(0));
    let h = Arc::clone(&hits);
    let (producer, _buffer, _view) = producer_with(
        LayerConfig::new("cam", ""),
        solid_source(),
        FilterPipeline::new(),
        clock,
    );
    let mut producer = producer.with_notifier(Arc::new(move |id: &LayerId| {
        assert_eq!(id.as_str(), "cam");
        h.fetch_add(1, Ordering::SeqCst);
    }));
    producer.tick();
    producer.tick();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[test]
fn piggyback_layers_cannot_have_a_producer() {
    let mut cfg = LayerConfig::new("chat", "");
    cfg.piggyback = true;
    let buffer = Arc::new(FrameBuffer::new(cfg.id.clone(), 1).unwrap());
    let err = LayerProducer::new(
        cfg,
        solid_source(),
        FilterPipeline::new(),
        buffer,
        Arc::new(SharedView::new(canvas())),
        Arc::new(ManualClock::default()),
    )
    .unwrap_err();
    assert!(err.is_config());
}

#[test]
fn spawned_producer_ticks_until_cancelled() {
    let mut cfg = LayerConfig::new("cam", "");
    cfg.target_fps = 200.0;
    cfg.buffer_capacity = 4;
    let source = Box::new(PatternSource::new(32, 24).unwrap());
    let (producer, buffer, _view) = producer_with(
        cfg,
        source,
        FilterPipeline::new(),
        Arc::new(MonotonicClock::new()),
    );
    let handle = ProducerHandle::spawn(producer).unwrap();
    assert!(handle.is_running());
    std::thread::sleep(Duration::from_millis(60));
    let stats = handle.cancel();
    assert!(stats.produced >= 1);

    let ids = buffer.frame_ids();
    std::thread::sleep(Duration::from_millis(30));
    assert_eq!(buffer.frame_ids(), ids, "no frames after cancel");
}

#[test]
fn static_layer_produces_exactly_one_frame() {
    let mut cfg = LayerConfig::new("logo", "");
    cfg.is_static = true;
    cfg.target_fps = 500.0;
    let (producer, buffer, _view) = producer_with(
        cfg,
        solid_source(),
        FilterPipeline::new(),
        Arc::new(MonotonicClock::new()),
    );
    let handle = ProducerHandle::spawn(producer).unwrap();
    std::thread::sleep(Duration::from_millis(40));
    let stats = handle.cancel();
    assert_eq!(stats.produced, 1);
    assert_eq!(buffer.frame_ids(), vec![0]);
}
