use super::*;

#[test]
fn frame_interval_matches_target_rate() {
    assert!((frame_interval_ms(30.0) - 33.333_333).abs() < 1e-3);
    assert_eq!(frame_interval_ms(1.0), 1000.0);
    assert!(frame_interval_ms(0.0).is_infinite());
    assert!(frame_interval_ms(f64::NAN).is_infinite());
}

#[test]
fn canvas_rejects_zero_dimensions() {
    assert!(Canvas::new(0, 10).is_err());
    assert!(Canvas::new(10, 0).is_err());
    let c = Canvas::new(640, 360).unwrap();
    assert_eq!(c.rect(), Rect::new(0.0, 0.0, 640.0, 360.0));
}

#[test]
fn layer_id_serializes_as_plain_string() {
    let id = LayerId::new("camera");
    assert_eq!(serde_json::to_string(&id).unwrap(), "\"camera\"");
    assert_eq!(id.to_string(), "camera");
}
