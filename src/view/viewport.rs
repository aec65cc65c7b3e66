//! Normalized zoom/pan state.
//!
//! Coordinates are fractions of the source image: `(0, 0)` is its top-left corner and `(1, 1)`
//! its bottom-right. A viewport at zoom `z` shows a square window of side `1/z` in those units.

use crate::foundation::core::Canvas;
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::transport::protocol::ViewportEvent;

/// Axis-aligned rectangle in normalized source coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewRect {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl ViewRect {
    /// The whole source image.
    pub const FULL: Self = Self {
        x: 0.0,
        y: 0.0,
        width: 1.0,
        height: 1.0,
    };

    pub fn center(&self) -> (f64, f64) {
        (self.x + self.width * 0.5, self.y + self.height * 0.5)
    }
}

/// Global zoom/pan state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Zoom factor, at least 1.
    pub zoom: f64,
    /// Left edge, normalized.
    pub x: f64,
    /// Top edge, normalized.
    pub y: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Viewport {
    /// Unzoomed, unpanned.
    pub const IDENTITY: Self = Self {
        zoom: 1.0,
        x: 0.0,
        y: 0.0,
    };

    pub fn size(&self) -> f64 {
        1.0 / self.zoom
    }

    /// Visible window as a rectangle.
    pub fn rect(&self) -> ViewRect {
        let s = self.size();
        ViewRect {
            x: self.x,
            y: self.y,
            width: s,
            height: s,
        }
    }

    pub fn center(&self) -> (f64, f64) {
        self.rect().center()
    }

    /// Event describing this viewport.
    pub fn event(&self) -> ViewportEvent {
        let s = self.size();
        ViewportEvent {
            x: self.x,
            y: self.y,
            width: s,
            height: s,
            zoom: self.zoom,
        }
    }
}

/// Clamp zoom into `[min_zoom, max_zoom]` and the origin into `[0, 1 - 1/zoom]`.
///
/// Non-finite inputs fall back to the identity values.
pub fn clamp_viewport(v: Viewport, min_zoom: f64, max_zoom: f64) -> Viewport {
    let zoom = if v.zoom.is_finite() { v.zoom } else { 1.0 };
    let zoom = zoom.clamp(min_zoom, max_zoom).max(1.0);
    let max_origin = (1.0 - 1.0 / zoom).max(0.0);
    let fix = |c: f64| {
        if c.is_finite() {
            c.clamp(0.0, max_origin)
        } else {
            0.0
        }
    };
    Viewport {
        zoom,
        x: fix(v.x),
        y: fix(v.y),
    }
}

/// Per-layer view derived from the global viewport and the layer's depth.
///
/// Zoom and center are interpolated linearly between the full image (`depth = 0`) and the
/// global viewport (`depth = 1`); depths above 1 extrapolate, so such layers zoom and pan faster
/// than the content. The result is clamped to the source bounds.
pub fn effective_view_rect(global: &Viewport, depth: f64) -> ViewRect {
    if depth <= 0.0 || !depth.is_finite() {
        return ViewRect::FULL;
    }
    if depth == 1.0 {
        return global.rect();
    }
    let zoom = (1.0 + depth * (global.zoom - 1.0)).max(1.0);
    let size = 1.0 / zoom;
    let (gcx, gcy) = global.center();
    let cx = 0.5 + depth * (gcx - 0.5);
    let cy = 0.5 + depth * (gcy - 0.5);
    let max_origin = (1.0 - size).max(0.0);
    ViewRect {
        x: (cx - size * 0.5).clamp(0.0, max_origin),
        y: (cy - size * 0.5).clamp(0.0, max_origin),
        width: size,
        height: size,
    }
}

/// Lower zoom bound. `reset_zoom` returns here, so it is fixed at the identity zoom.
pub const MIN_ZOOM: f64 = 1.0;

/// Zoom/pan state machine driven by explicit calls and pointer gestures.
///
/// Every mutating method returns the committed [`ViewportEvent`] when the viewport changed, and
/// `None` when the call was a no-op.
#[derive(Clone, Debug)]
pub struct ViewportController {
    viewport: Viewport,
    min_zoom: f64,
    max_zoom: f64,
    wheel_step: f64,
}

impl ViewportController {
    /// Controller zooming within `[MIN_ZOOM, max_zoom]`, `wheel_step` per wheel notch.
    pub fn new(max_zoom: f64, wheel_step: f64) -> StreamViewResult<Self> {
        if !max_zoom.is_finite() || max_zoom < MIN_ZOOM {
            return Err(StreamViewError::config("max_zoom must be finite and >= 1"));
        }
        if !wheel_step.is_finite() || wheel_step <= 1.0 {
            return Err(StreamViewError::config("wheel_step must be finite and > 1"));
        }
        Ok(Self {
            viewport: Viewport::IDENTITY,
            min_zoom: MIN_ZOOM,
            max_zoom,
            wheel_step,
        })
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn zoom_bounds(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    pub fn event(&self) -> ViewportEvent {
        self.viewport.event()
    }

    /// Effective view for a layer of the given depth.
    pub fn effective_viewport(&self, depth: f64) -> ViewRect {
        effective_view_rect(&self.viewport, depth)
    }

    fn commit(&mut self, next: Viewport) -> Option<ViewportEvent> {
        let next = clamp_viewport(next, self.min_zoom, self.max_zoom);
        if next == self.viewport {
            return None;
        }
        self.viewport = next;
        Some(next.event())
    }

    /// Re-apply the clamping invariants to the current state.
    pub fn clamp(&mut self) -> Option<ViewportEvent> {
        self.commit(self.viewport)
    }

    /// Set the zoom, centering the window on `center` (normalized source coordinates).
    ///
    /// Without a center the current window center is kept.
    pub fn set_zoom(&mut self, zoom: f64, center: Option<(f64, f64)>) -> Option<ViewportEvent> {
        let (cx, cy) = center.unwrap_or_else(|| self.viewport.center());
        let zoom = if zoom.is_finite() { zoom } else { self.viewport.zoom };
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom).max(1.0);
        let s = 1.0 / zoom;
        self.commit(Viewport {
            zoom,
            x: cx - s * 0.5,
            y: cy - s * 0.5,
        })
    }

    /// Zoom so the source point under `cursor` stays under it.
    ///
    /// `cursor` is the pointer position as a fraction of the display (0..1 per axis).
    pub fn zoom_at(&mut self, zoom: f64, cursor: (f64, f64)) -> Option<ViewportEvent> {
        let before = self.viewport;
        let zoom = if zoom.is_finite() { zoom } else { before.zoom };
        let zoom = zoom.clamp(self.min_zoom, self.max_zoom).max(1.0);
        let (fx, fy) = (cursor.0.clamp(0.0, 1.0), cursor.1.clamp(0.0, 1.0));
        let src_x = before.x + fx * before.size();
        let src_y = before.y + fy * before.size();
        let s = 1.0 / zoom;
        self.commit(Viewport {
            zoom,
            x: src_x - fx * s,
            y: src_y - fy * s,
        })
    }

    /// Wheel gesture: negative `delta_y` (scroll up) zooms in by one step.
    pub fn wheel(&mut self, delta_y: f64, cursor: (f64, f64)) -> Option<ViewportEvent> {
        if delta_y == 0.0 || !delta_y.is_finite() {
            return None;
        }
        let zoom = if delta_y < 0.0 {
            self.viewport.zoom * self.wheel_step
        } else {
            self.viewport.zoom / self.wheel_step
        };
        self.zoom_at(zoom, cursor)
    }

    /// Drag gesture in display pixels; content follows the pointer.
    pub fn drag(&mut self, dx_px: f64, dy_px: f64, display: Canvas) -> Option<ViewportEvent> {
        let v = self.viewport;
        let s = v.size();
        self.commit(Viewport {
            zoom: v.zoom,
            x: v.x - dx_px / f64::from(display.width) * s,
            y: v.y - dy_px / f64::from(display.height) * s,
        })
    }

    /// Keep the zoom and move the window center to `(cx, cy)`.
    pub fn center_on(&mut self, cx: f64, cy: f64) -> Option<ViewportEvent> {
        self.set_zoom(self.viewport.zoom, Some((cx, cy)))
    }

    /// Return to `(zoom=1, x=0, y=0)`.
    pub fn reset_zoom(&mut self) -> Option<ViewportEvent> {
        self.commit(Viewport::IDENTITY)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/view/viewport.rs"]
mod tests;
