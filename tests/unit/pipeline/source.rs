use super::*;

fn solid(v: u8) -> RgbaImage {
    RgbaImage::from_pixel(2, 2, Rgba([v, v, v, 255]))
}

#[test]
fn single_frames_ignore_the_output_key() {
    let img = SourceFrame::Single(solid(3)).select(Some("left")).unwrap();
    assert_eq!(img.get_pixel(0, 0).0[0], 3);
}

#[test]
fn multi_output_frames_select_by_key() {
    let mut outputs = BTreeMap::new();
    outputs.insert("rgb".to_string(), solid(10));
    outputs.insert("depth".to_string(), solid(20));

    let img = SourceFrame::Multi(outputs.clone())
        .select(Some("depth"))
        .unwrap();
    assert_eq!(img.get_pixel(1, 1).0[0], 20);

    assert!(
        SourceFrame::Multi(outputs.clone())
            .select(Some("missing"))
            .is_err()
    );
    assert!(SourceFrame::Multi(outputs).select(None).is_err());
}

#[test]
fn single_entry_multi_output_needs_no_key() {
    let mut outputs = BTreeMap::new();
    outputs.insert("only".to_string(), solid(7));
    let img = SourceFrame::Multi(outputs).select(None).unwrap();
    assert_eq!(img.get_pixel(0, 0).0[0], 7);
}

#[test]
fn pattern_source_scrolls_with_time() {
    let mut src = PatternSource::new(32, 32).unwrap().with_speed(1000.0);
    let a = src.acquire_frame(0.0).unwrap().select(None).unwrap();
    let b = src.acquire_frame(16.0).unwrap().select(None).unwrap();
    assert_eq!(a.dimensions(), (32, 32));
    assert_ne!(a.as_raw(), b.as_raw());
}

#[test]
fn closures_are_sources() {
    let mut src = |_t: Millis| -> StreamViewResult<SourceFrame> { Ok(SourceFrame::Single(solid(1))) };
    assert!(src.acquire_frame(0.0).is_ok());
}
