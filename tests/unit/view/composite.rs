use image::{Luma, Rgba};

use super::*;

#[test]
fn over_respects_premultiplied_alpha() {
    assert_eq!(over([10, 20, 30, 255], [0, 0, 0, 0]), [10, 20, 30, 255]);
    assert_eq!(over([10, 20, 30, 255], [1, 2, 3, 255]), [1, 2, 3, 255]);
    // Half-transparent red over opaque blue.
    assert_eq!(over([0, 0, 255, 255], [128, 0, 0, 128]), [128, 0, 127, 255]);
}

#[test]
fn mask_scales_every_channel() {
    assert_eq!(mask_pixel([200, 100, 50, 255], 0), [0, 0, 0, 0]);
    assert_eq!(mask_pixel([200, 100, 50, 255], 255), [200, 100, 50, 255]);
    assert_eq!(mask_pixel([200, 100, 50, 255], 128), [100, 50, 25, 128]);
}

#[test]
fn draw_is_clipped_to_the_layer_rect() {
    let mut canvas = RgbaImage::new(8, 8);
    let img = RgbaImage::from_pixel(6, 6, Rgba([255, 0, 0, 255]));
    let clip = ClipRect {
        x0: 2,
        y0: 2,
        x1: 5,
        y1: 5,
    };
    // Image starts left of and above the clip, as with overscan.
    draw_layer(&mut canvas, &img, (0, 0), clip, None);
    assert_eq!(canvas.get_pixel(1, 1).0[3], 0);
    assert_eq!(canvas.get_pixel(2, 2).0, [255, 0, 0, 255]);
    assert_eq!(canvas.get_pixel(4, 4).0, [255, 0, 0, 255]);
    assert_eq!(canvas.get_pixel(5, 5).0[3], 0);
}

#[test]
fn draw_handles_offscreen_origins() {
    let mut canvas = RgbaImage::new(4, 4);
    let img = RgbaImage::from_pixel(4, 4, Rgba([0, 255, 0, 255]));
    let clip = ClipRect {
        x0: -10,
        y0: -10,
        x1: 10,
        y1: 10,
    };
    draw_layer(&mut canvas, &img, (-2, 3), clip, None);
    assert_eq!(canvas.get_pixel(0, 3).0[1], 255);
    assert_eq!(canvas.get_pixel(2, 3).0[3], 0);
    assert_eq!(canvas.get_pixel(0, 2).0[3], 0);
}

#[test]
fn mask_is_stretched_over_the_clip() {
    let mut canvas = RgbaImage::new(4, 2);
    let img = RgbaImage::from_pixel(4, 2, Rgba([255, 255, 255, 255]));
    // Left half visible, right half hidden.
    let mask = GrayImage::from_fn(2, 1, |x, _| Luma([if x == 0 { 255 } else { 0 }]));
    let clip = ClipRect {
        x0: 0,
        y0: 0,
        x1: 4,
        y1: 2,
    };
    draw_layer(&mut canvas, &img, (0, 0), clip, Some(&mask));
    assert_eq!(canvas.get_pixel(1, 1).0[3], 255);
    assert_eq!(canvas.get_pixel(2, 1).0[3], 0);
}
