use image::{GrayImage, RgbaImage};

use crate::foundation::math::mul_div255_u8;

/// One premultiplied RGBA8 pixel.
pub type PremulRgba8 = [u8; 4];

/// Source-over for premultiplied pixels.
pub fn over(dst: PremulRgba8, src: PremulRgba8) -> PremulRgba8 {
    if src[3] == 0 {
        return dst;
    }
    if src[3] == 255 {
        return src;
    }
    let inv = 255u16 - u16::from(src[3]);
    let mut out = [0u8; 4];
    for i in 0..4 {
        out[i] = src[i].saturating_add(mul_div255_u8(u16::from(dst[i]), inv));
    }
    out
}

/// Scale a premultiplied pixel by a coverage value.
pub fn mask_pixel(px: PremulRgba8, coverage: u8) -> PremulRgba8 {
    match coverage {
        255 => px,
        0 => [0; 4],
        c => px.map(|v| mul_div255_u8(u16::from(v), u16::from(c))),
    }
}

/// Integer clip rectangle on the canvas, half-open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRect {
    /// Left, inclusive.
    pub x0: i64,
    /// Top, inclusive.
    pub y0: i64,
    /// Right, exclusive.
    pub x1: i64,
    /// Bottom, exclusive.
    pub y1: i64,
}

impl ClipRect {
    /// Intersection with a `width x height` canvas.
    pub fn within(self, width: u32, height: u32) -> Self {
        Self {
            x0: self.x0.max(0),
            y0: self.y0.max(0),
            x1: self.x1.min(i64::from(width)),
            y1: self.y1.min(i64::from(height)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x1 <= self.x0 || self.y1 <= self.y0
    }
}

/// Composite `img` over `canvas` with its top-left at `origin`, restricted to `clip`.
///
/// The optional mask is stretched over the clip rect and multiplies the layer's coverage, which
/// gives the same result as drawing the layer first and masking it afterwards.
pub fn draw_layer(
    canvas: &mut RgbaImage,
    img: &RgbaImage,
    origin: (i64, i64),
    clip: ClipRect,
    mask: Option<&GrayImage>,
) {
    let clip = clip.within(canvas.width(), canvas.height());
    if clip.is_empty() {
        return;
    }
    let (iw, ih) = (i64::from(img.width()), i64::from(img.height()));
    let x0 = clip.x0.max(origin.0);
    let y0 = clip.y0.max(origin.1);
    let x1 = clip.x1.min(origin.0 + iw);
    let y1 = clip.y1.min(origin.1 + ih);
    if x1 <= x0 || y1 <= y0 {
        return;
    }

    let clip_w = (clip.x1 - clip.x0) as u64;
    let clip_h = (clip.y1 - clip.y0) as u64;
    for y in y0..y1 {
        for x in x0..x1 {
            let src = img.get_pixel((x - origin.0) as u32, (y - origin.1) as u32).0;
            let src = match mask {
                Some(m) if m.width() > 0 && m.height() > 0 => {
                    let mx = ((x - clip.x0) as u64 * u64::from(m.width()) / clip_w) as u32;
                    let my = ((y - clip.y0) as u64 * u64::from(m.height()) / clip_h) as u32;
                    mask_pixel(src, m.get_pixel(mx, my).0[0])
                }
                _ => src,
            };
            let dst = canvas.get_pixel_mut(x as u32, y as u32);
            dst.0 = over(dst.0, src);
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/view/composite.rs"]
mod tests;
