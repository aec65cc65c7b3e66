use std::time::Instant;

use image::Rgba;

use super::*;
use crate::layer::config::{Encoding, EncodingFormat};
use crate::pipeline::encode::encode_image;
use crate::pipeline::frame::FrameMetadata;
use crate::pipeline::source::PatternSource;

fn view(width: u32, height: u32) -> StreamView {
    let mut cfg = ViewConfig::new(width, height);
    cfg.decode = DecodeMode::Inline;
    cfg.nav = NavWindow::new(40, 20);
    StreamView::new(&cfg).unwrap()
}

fn pattern(w: u32, h: u32) -> Option<Box<dyn FrameSource>> {
    Some(Box::new(PatternSource::new(w, h).unwrap()))
}

fn tick_until(sv: &mut StreamView, mut done: impl FnMut(&StreamView) -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        sv.tick();
        if done(sv) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

fn id(s: &str) -> LayerId {
    LayerId::new(s)
}

#[test]
fn produced_frames_reach_the_canvas() {
    let mut sv = view(32, 16);
    let mut cfg = LayerConfig::new("cam", "Camera");
    cfg.target_fps = 60.0;
    sv.add_layer(cfg, pattern(32, 16), FilterPipeline::new()).unwrap();
    sv.start();

    assert!(tick_until(&mut sv, |sv| {
        sv.compositor()
            .telemetry()
            .snapshot(&id("cam"))
            .is_some_and(|t| t.frames >= 2)
    }));
    assert!(sv.compositor().layer(&id("cam")).unwrap().has_content());
    assert!(sv.producer_stats(&id("cam")).unwrap().produced >= 2);
    assert_eq!(sv.frame().get_pixel(0, 0).0[3], 255);
    assert!(sv.time_since_update(&id("cam")).is_some());

    let report = sv.telemetry_report();
    assert_eq!(report.layers.len(), 1);
    assert!(report.layers[0].avg_transport_ms >= 5.0);
    sv.shutdown().unwrap();
}

#[test]
fn zoom_changes_are_published_to_producers() {
    let mut sv = view(16, 16);
    let event = sv.set_zoom(2.0, Some((0.5, 0.5))).unwrap();
    assert_eq!(event.zoom, 2.0);
    assert_eq!((event.x, event.y), (0.25, 0.25));
    assert_eq!((event.width, event.height), (0.5, 0.5));
    assert_eq!(sv.view.get().viewport, sv.viewport());

    assert!(sv.reset_zoom().is_some());
    assert!(sv.reset_zoom().is_none());
    assert_eq!(sv.view.get().viewport, Viewport::IDENTITY);
}

#[test]
fn wheel_and_drag_move_the_viewport() {
    let mut sv = view(100, 100);
    assert!(sv.drag(10.0, 0.0).is_none());
    let zoomed = sv.wheel(-1.0, (0.5, 0.5)).unwrap();
    assert!(zoomed.zoom > 1.0);
    let panned = sv.drag(-5.0, 0.0).unwrap();
    assert!(panned.x > zoomed.x);
}

#[test]
fn nav_click_only_works_while_zoomed() {
    let mut sv = view(16, 16);
    assert!(sv.nav_click(10.0, 10.0).is_none());
    assert!(sv.nav_overlay().is_none());

    sv.set_zoom(4.0, Some((0.5, 0.5)));
    let event = sv.nav_click(10.0, 5.0).unwrap();
    // Centered on (0.25, 0.25) with a 0.25-wide window.
    assert_eq!((event.x, event.y), (0.125, 0.125));
    let overlay = sv.nav_overlay().unwrap();
    assert_eq!(overlay.width, 10.0);
    assert!(sv.nav_image().unwrap().is_none());
}

#[test]
fn source_rules_depend_on_piggyback() {
    let mut sv = view(8, 8);
    assert!(
        sv.add_layer(LayerConfig::new("cam", ""), None, FilterPipeline::new())
            .unwrap_err()
            .is_config()
    );
    let mut chat = LayerConfig::new("chat", "");
    chat.piggyback = true;
    assert!(
        sv.add_layer(chat.clone(), pattern(8, 8), FilterPipeline::new())
            .unwrap_err()
            .is_config()
    );
    sv.add_layer(chat, None, FilterPipeline::new()).unwrap();
    assert!(sv.producer_stats(&id("chat")).is_none());

    let mut bad = LayerConfig::new("bad", "");
    bad.buffer_capacity = 0;
    assert!(sv.add_layer(bad, pattern(8, 8), FilterPipeline::new()).is_err());
    assert!(sv.compositor().layer(&id("bad")).is_none());
}

#[test]
fn injected_frames_show_without_producers() {
    let mut sv = view(4, 4);
    let mut chat = LayerConfig::new("chat", "");
    chat.piggyback = true;
    chat.buffer_capacity = 1;
    sv.add_layer(chat, None, FilterPipeline::new()).unwrap();
    sv.start();

    let img = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 255, 255]));
    let payload = encode_image(
        &img,
        Encoding {
            format: EncodingFormat::Png,
            quality: 80,
        },
    )
    .unwrap();
    sv.inject_frame(InjectFrame {
        layer_id: id("chat"),
        payload,
        metadata: FrameMetadata::new(id("chat"), 0, 0.0),
    })
    .unwrap();
    sv.tick();
    assert!(sv.compositor().layer(&id("chat")).unwrap().has_content());
    assert_eq!(sv.frame().get_pixel(2, 2).0, [0, 0, 255, 255]);
    assert_eq!(sv.compositor().stats().requests_sent, 0);
}

#[test]
fn removal_stops_the_producer_and_forgets_the_layer() {
    let mut sv = view(8, 8);
    sv.add_layer(LayerConfig::new("cam", ""), pattern(8, 8), FilterPipeline::new())
        .unwrap();
    sv.start();
    assert!(sv.remove_layer(&id("cam")));
    assert!(!sv.remove_layer(&id("cam")));
    assert!(sv.compositor().layer(&id("cam")).is_none());
    assert!(sv.producer_stats(&id("cam")).is_none());
    for _ in 0..5 {
        sv.tick();
    }
    assert!(sv.telemetry_report().layers.is_empty());
}

#[test]
fn position_updates_reach_both_sides() {
    let mut sv = view(16, 16);
    sv.add_layer(LayerConfig::new("pip", ""), pattern(8, 8), FilterPipeline::new())
        .unwrap();
    sv.update_layer_position(&id("pip"), Some(LayerRect::new(0.0, 0.0, 4.0, 4.0)))
        .unwrap();
    assert_eq!(
        sv.compositor().layer(&id("pip")).unwrap().config().position,
        Some(LayerRect::new(0.0, 0.0, 4.0, 4.0))
    );
    assert!(
        sv.update_layer_position(&id("ghost"), None)
            .unwrap_err()
            .is_config()
    );
}

#[test]
fn resize_updates_the_shared_canvas() {
    let mut sv = view(16, 16);
    sv.resize(32, 8).unwrap();
    assert_eq!(sv.canvas(), Canvas::new(32, 8).unwrap());
    assert_eq!(sv.view.get().canvas, sv.canvas());
    assert_eq!(sv.compositor().canvas(), sv.canvas());
    assert!(sv.resize(0, 8).is_err());
}
