use super::*;

#[test]
fn json_defaults_are_applied() {
    let cfg: LayerConfig = serde_json::from_str(r#"{ "id": "cam" }"#).unwrap();
    assert_eq!(cfg.depth, 1.0);
    assert_eq!(cfg.target_fps, 30.0);
    assert_eq!(cfg.buffer_capacity, 2);
    assert_eq!(cfg.overscan, 0);
    assert_eq!(cfg.encoding, Encoding::default());
    assert!(cfg.position.is_none());
    assert_eq!(cfg.display_name(), "cam");
    cfg.validate().unwrap();
}

#[test]
fn static_alias_and_png_encoding_parse() {
    let cfg: LayerConfig = serde_json::from_str(
        r#"{ "id": "bg", "name": "Background", "static": true,
             "encoding": { "format": "png" } }"#,
    )
    .unwrap();
    assert!(cfg.is_static);
    assert_eq!(cfg.encoding.format, EncodingFormat::Png);
    assert_eq!(cfg.encoding.quality, 80);
    assert_eq!(cfg.display_name(), "Background");
}

#[test]
fn invalid_configs_are_rejected() {
    let mut cfg = LayerConfig::new("a", "A");
    cfg.buffer_capacity = 0;
    assert!(cfg.validate().unwrap_err().is_config());

    let mut cfg = LayerConfig::new("a", "A");
    cfg.depth = -0.5;
    assert!(cfg.validate().is_err());

    let mut cfg = LayerConfig::new("a", "A");
    cfg.target_fps = 0.0;
    assert!(cfg.validate().is_err());

    let mut cfg = LayerConfig::new("a", "A");
    cfg.position = Some(LayerRect::new(0.0, 0.0, 0.0, 10.0));
    assert!(cfg.validate().is_err());

    let cfg = LayerConfig::new(" ", "blank");
    assert!(cfg.validate().is_err());

    let mut cfg = LayerConfig::new("a", "A");
    cfg.piggyback = true;
    cfg.is_static = true;
    assert!(cfg.validate().is_err());

    let mut cfg = LayerConfig::new("a", "A");
    cfg.overscan = MAX_OVERSCAN;
    cfg.validate().unwrap();
    cfg.overscan = MAX_OVERSCAN + 1;
    assert!(cfg.validate().unwrap_err().is_config());
}

#[test]
fn output_size_follows_view_only_for_full_canvas_layers() {
    let view = Canvas::new(640, 480).unwrap();
    let full = LayerConfig::new("full", "Full");
    assert_eq!(full.output_size(view), (640, 480));
    assert_eq!(full.draw_rect(view), Rect::new(0.0, 0.0, 640.0, 480.0));

    let mut pip = LayerConfig::new("pip", "PiP");
    pip.position = Some(LayerRect::new(10.0, 20.0, 160.0, 90.0));
    assert_eq!(pip.output_size(view), (160, 90));
    let bigger = Canvas::new(1920, 1080).unwrap();
    assert_eq!(pip.output_size(bigger), (160, 90));
    assert_eq!(pip.draw_rect(view), Rect::new(10.0, 20.0, 170.0, 110.0));
}
