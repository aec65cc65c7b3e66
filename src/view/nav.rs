//! Navigation window: a small uncropped thumbnail with the current viewport outlined.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};

use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::view::viewport::Viewport;

const OUTLINE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Viewport outline in nav-window pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct NavOverlay {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Nav width divided by zoom.
    pub width: f64,
    /// Nav height divided by zoom.
    pub height: f64,
}

/// Nav window geometry.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct NavWindow {
    /// Shown at all when zoomed in.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Width in pixels.
    #[serde(default = "default_width")]
    pub width: u32,
    /// Height in pixels.
    #[serde(default = "default_height")]
    pub height: u32,
}

fn default_enabled() -> bool {
    true
}

fn default_width() -> u32 {
    160
}

fn default_height() -> u32 {
    90
}

impl Default for NavWindow {
    fn default() -> Self {
        Self {
            enabled: default_enabled(),
            width: default_width(),
            height: default_height(),
        }
    }
}

impl NavWindow {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            enabled: true,
            width,
            height,
        }
    }

    pub fn validate(&self) -> StreamViewResult<()> {
        if self.enabled && (self.width == 0 || self.height == 0) {
            return Err(StreamViewError::config("nav window size must be non-zero"));
        }
        Ok(())
    }

    /// Shown only while zoomed in.
    pub fn is_visible(&self, viewport: &Viewport) -> bool {
        self.enabled && viewport.zoom > 1.0
    }

    /// `(x·W, y·H, W/zoom, H/zoom)`, or `None` while hidden.
    pub fn overlay_rect(&self, viewport: &Viewport) -> Option<NavOverlay> {
        if !self.is_visible(viewport) {
            return None;
        }
        let (w, h) = (f64::from(self.width), f64::from(self.height));
        Some(NavOverlay {
            x: viewport.x * w,
            y: viewport.y * h,
            width: w / viewport.zoom,
            height: h / viewport.zoom,
        })
    }

    /// Normalized source point under a click at nav pixel `(px, py)`.
    pub fn click_to_center(&self, px: f64, py: f64) -> (f64, f64) {
        let norm = |p: f64, extent: u32| {
            if extent == 0 || !p.is_finite() {
                0.5
            } else {
                (p / f64::from(extent)).clamp(0.0, 1.0)
            }
        };
        (norm(px, self.width), norm(py, self.height))
    }

    /// Decode `thumbnail`, fit it to the window and outline the viewport.
    pub fn render(&self, thumbnail: &[u8], viewport: &Viewport) -> StreamViewResult<RgbaImage> {
        let decoded = image::load_from_memory(thumbnail)
            .map_err(|e| StreamViewError::decode(format!("nav thumbnail: {e}")))?
            .to_rgba8();
        let mut out = imageops::resize(&decoded, self.width, self.height, FilterType::Triangle);
        if let Some(r) = self.overlay_rect(viewport) {
            stroke_rect(&mut out, r);
        }
        Ok(out)
    }
}

fn stroke_rect(img: &mut RgbaImage, r: NavOverlay) {
    let (w, h) = (i64::from(img.width()), i64::from(img.height()));
    if w == 0 || h == 0 {
        return;
    }
    let x0 = (r.x.round() as i64).clamp(0, w - 1);
    let y0 = (r.y.round() as i64).clamp(0, h - 1);
    let x1 = ((r.x + r.width).round() as i64 - 1).clamp(x0, w - 1);
    let y1 = ((r.y + r.height).round() as i64 - 1).clamp(y0, h - 1);
    for x in x0..=x1 {
        img.put_pixel(x as u32, y0 as u32, OUTLINE);
        img.put_pixel(x as u32, y1 as u32, OUTLINE);
    }
    for y in y0..=y1 {
        img.put_pixel(x0 as u32, y as u32, OUTLINE);
        img.put_pixel(x1 as u32, y as u32, OUTLINE);
    }
}

#[cfg(test)]
#[path = "../../tests/unit/view/nav.rs"]
mod tests;
