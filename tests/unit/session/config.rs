use super::*;

const VIEW_JSON: &str = r#"{
  "width": 320,
  "height": 180,
  "max_zoom": 4.0,
  "nav": { "width": 96, "height": 54 },
  "telemetry": { "window": 45, "transport": { "floor_ms": 8.0 } },
  "decode": "inline",
  "layers": [
    { "id": "bg", "name": "Background", "z_index": 0, "depth": 0.5, "overscan": 16,
      "source": { "kind": "pattern", "speed": 30.0 } },
    { "id": "pip", "z_index": 2, "position": { "x": 200, "y": 10, "width": 100, "height": 60 },
      "encoding": { "format": "png" }, "source": { "kind": "image", "path": "logo.png" } },
    { "id": "chat", "z_index": 3, "piggyback": true, "buffer_capacity": 1 }
  ]
}"#;

#[test]
fn parses_layers_sources_and_defaults() {
    let cfg = ViewConfig::from_reader(VIEW_JSON.as_bytes()).unwrap();
    cfg.validate().unwrap();
    assert_eq!(cfg.canvas().unwrap(), Canvas::new(320, 180).unwrap());
    assert_eq!(cfg.render_fps, 30.0);
    assert_eq!(cfg.wheel_step, 1.1);
    assert_eq!(cfg.decode, DecodeMode::Inline);
    assert_eq!(cfg.telemetry.window, 45);
    assert_eq!(cfg.telemetry.transport.floor_ms, 8.0);
    assert_eq!(cfg.telemetry.transport.ceiling_ms, 1000.0);
    assert!(cfg.nav.enabled);
    assert_eq!(cfg.layers.len(), 3);

    let bg = &cfg.layers[0];
    assert_eq!(bg.config.depth, 0.5);
    assert_eq!(bg.config.overscan, 16);
    assert_eq!(
        bg.source,
        Some(SourceDef::Pattern {
            width: None,
            height: None,
            speed: Some(30.0),
            tint: None,
        })
    );
    assert_eq!(
        cfg.layers[1].source,
        Some(SourceDef::Image {
            path: PathBuf::from("logo.png")
        })
    );
    assert!(cfg.layers[2].config.piggyback);
    assert!(cfg.layers[2].source.is_none());
}

#[test]
fn pattern_source_defaults_to_the_given_size() {
    let def = SourceDef::Pattern {
        width: None,
        height: Some(8),
        speed: None,
        tint: None,
    };
    let mut src = def.build(Path::new("."), (12, 4)).unwrap();
    let img = src.acquire_frame(0.0).unwrap().select(None).unwrap();
    assert_eq!(img.dimensions(), (12, 8));
}

#[test]
fn missing_image_source_is_a_config_error() {
    let def = SourceDef::Image {
        path: PathBuf::from("does-not-exist.png"),
    };
    let err = def.build(Path::new("/nonexistent"), (1, 1)).err().unwrap();
    assert!(err.is_config());
}

#[test]
fn malformed_json_is_a_serde_error() {
    let err = ViewConfig::from_reader("{ nope".as_bytes()).unwrap_err();
    assert!(matches!(err, StreamViewError::Serde(_)));
    let err = ViewConfig::from_path("/nonexistent/view.json").unwrap_err();
    assert!(err.is_config());
}

#[test]
fn invalid_views_are_rejected() {
    let mut cfg = ViewConfig::new(0, 10);
    assert!(cfg.validate().unwrap_err().is_config());

    cfg = ViewConfig::new(10, 10);
    cfg.wheel_step = 1.0;
    assert!(cfg.validate().is_err());

    cfg = ViewConfig::new(10, 10);
    cfg.max_zoom = 0.5;
    assert!(cfg.validate().is_err());

    cfg = ViewConfig::new(10, 10);
    cfg.telemetry.window = 0;
    assert!(cfg.validate().is_err());

    cfg = ViewConfig::new(10, 10);
    cfg.telemetry.transport.floor_ms = 2000.0;
    assert!(cfg.validate().is_err());

    cfg = ViewConfig::new(10, 10);
    let entry = LayerEntry {
        config: LayerConfig::new("a", ""),
        source: None,
    };
    cfg.layers = vec![entry.clone(), entry];
    assert!(cfg.validate().unwrap_err().to_string().contains("duplicate"));

    cfg = ViewConfig::new(10, 10);
    let mut chat = LayerConfig::new("chat", "");
    chat.piggyback = true;
    cfg.layers = vec![LayerEntry {
        config: chat,
        source: Some(SourceDef::Image {
            path: PathBuf::from("x.png"),
        }),
    }];
    assert!(cfg.validate().is_err());
}
