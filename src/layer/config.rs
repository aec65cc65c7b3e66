use serde::{Deserialize, Serialize};

use crate::foundation::core::{Canvas, LayerId, Millis, Rect, frame_interval_ms};
use crate::foundation::error::{StreamViewError, StreamViewResult};

/// Pixel rectangle a positioned layer occupies on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerRect {
    /// Left edge in canvas pixels.
    pub x: f64,
    /// Top edge in canvas pixels.
    pub y: f64,
    /// Width in pixels, must be > 0.
    pub width: f64,
    /// Height in pixels, must be > 0.
    pub height: f64,
}

impl LayerRect {
    /// Construct a rectangle from origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Convert to a [`kurbo::Rect`].
    pub fn to_rect(self) -> Rect {
        Rect::new(self.x, self.y, self.x + self.width, self.y + self.height)
    }

    /// Validate finiteness and positive size.
    pub fn validate(&self) -> StreamViewResult<()> {
        let all_finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite());
        if !all_finite {
            return Err(StreamViewError::config("layer position must be finite"));
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err(StreamViewError::config(
                "layer position width and height must be > 0",
            ));
        }
        Ok(())
    }

    pub fn pixel_size(&self) -> (u32, u32) {
        (round_px(self.width), round_px(self.height))
    }
}

fn round_px(v: f64) -> u32 {
    v.round().clamp(1.0, f64::from(u32::MAX)) as u32
}

/// Payload encoding applied by the producer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EncodingFormat {
    /// Lossy, no alpha.
    #[default]
    Jpeg,
    /// Lossless, keeps alpha.
    Png,
}

/// Encoding format plus quality (JPEG only).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Encoding {
    /// Container format.
    #[serde(default)]
    pub format: EncodingFormat,
    /// Quality in `1..=100`; ignored by PNG.
    #[serde(default = "default_quality")]
    pub quality: u8,
}

impl Default for Encoding {
    fn default() -> Self {
        Self {
            format: EncodingFormat::Jpeg,
            quality: default_quality(),
        }
    }
}

fn default_quality() -> u8 {
    80
}

fn default_depth() -> f64 {
    1.0
}

fn default_target_fps() -> f64 {
    30.0
}

fn default_buffer_capacity() -> usize {
    2
}

/// Largest accepted `overscan`, in output pixels per side.
pub const MAX_OVERSCAN: u32 = 4096;

/// Declarative description of one layer in the view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerConfig {
    /// Unique id.
    pub id: LayerId,
    /// Human-readable label shown by metrics panels.
    #[serde(default)]
    pub name: String,
    /// Stacking order, higher draws on top. Only the ordering is significant.
    #[serde(default)]
    pub z_index: i32,
    /// Parallax response to zoom/pan: 0 fixed, 1 follows the viewport.
    #[serde(default = "default_depth")]
    pub depth: f64,
    /// Canvas rectangle, `None` fills the canvas.
    #[serde(default)]
    pub position: Option<LayerRect>,
    /// Extra capture margin in output pixels on each side.
    #[serde(default)]
    pub overscan: u32,
    /// Producer tick rate and compositor request rate.
    #[serde(default = "default_target_fps")]
    pub target_fps: f64,
    /// FrameBuffer capacity, at least 1.
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,
    /// Frames are injected by the caller instead of produced and requested.
    #[serde(default)]
    pub piggyback: bool,
    /// Produce and deliver a single frame, then never request again.
    #[serde(default, alias = "static")]
    pub is_static: bool,
    /// Output key to select from a multi-output source.
    #[serde(default)]
    pub stream_output: Option<String>,
    /// Payload encoding.
    #[serde(default)]
    pub encoding: Encoding,
    /// Attach a small uncropped thumbnail to each frame for the nav window.
    #[serde(default)]
    pub nav_thumbnail: bool,
}

impl LayerConfig {
    /// Config with defaults for everything but the id and name.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: LayerId::new(id),
            name: name.into(),
            z_index: 0,
            depth: default_depth(),
            position: None,
            overscan: 0,
            target_fps: default_target_fps(),
            buffer_capacity: default_buffer_capacity(),
            piggyback: false,
            is_static: false,
            stream_output: None,
            encoding: Encoding::default(),
            nav_thumbnail: false,
        }
    }

    /// Label for display; falls back to the id when no name was given.
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            self.id.as_str()
        } else {
            &self.name
        }
    }

    pub fn frame_interval_ms(&self) -> Millis {
        frame_interval_ms(self.target_fps)
    }

    /// Destination rectangle on `canvas`, without overscan.
    pub fn draw_rect(&self, canvas: Canvas) -> Rect {
        match self.position {
            Some(p) => p.to_rect(),
            None => canvas.rect(),
        }
    }

    /// Output size before overscan: positioned layers use their own size, full-canvas layers
    /// follow the view.
    pub fn output_size(&self, view: Canvas) -> (u32, u32) {
        match self.position {
            Some(p) => p.pixel_size(),
            None => (view.width, view.height),
        }
    }

    /// Check every invariant a layer must satisfy when it is added.
    pub fn validate(&self) -> StreamViewResult<()> {
        if self.id.as_str().trim().is_empty() {
            return Err(StreamViewError::config("layer id must be non-empty"));
        }
        let id = &self.id;
        if !self.depth.is_finite() || self.depth < 0.0 {
            return Err(StreamViewError::config(format!(
                "layer '{id}': depth must be finite and >= 0"
            )));
        }
        if !self.target_fps.is_finite() || self.target_fps <= 0.0 {
            return Err(StreamViewError::config(format!(
                "layer '{id}': target_fps must be finite and > 0"
            )));
        }
        if self.overscan > MAX_OVERSCAN {
            return Err(StreamViewError::config(format!(
                "layer '{id}': overscan must be <= {MAX_OVERSCAN}"
            )));
        }
        if self.buffer_capacity == 0 {
            return Err(StreamViewError::config(format!(
                "layer '{id}': buffer_capacity must be >= 1"
            )));
        }
        if !(1..=100).contains(&self.encoding.quality) {
            return Err(StreamViewError::config(format!(
                "layer '{id}': encoding quality must be in 1..=100"
            )));
        }
        if let Some(p) = &self.position {
            p.validate()
                .map_err(|e| StreamViewError::config(format!("layer '{id}': {e}")))?;
        }
        if self.piggyback && self.is_static {
            return Err(StreamViewError::config(format!(
                "layer '{id}': piggyback layers cannot be static"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/layer/config.rs"]
mod tests;
