use crate::foundation::error::{StreamViewError, StreamViewResult};

pub use kurbo::{Point, Rect, Size, Vec2};

/// Milliseconds on some clock. Values from different clocks are not comparable.
pub type Millis = f64;

/// Unique layer identifier.
#[derive(
    Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(transparent)]
pub struct LayerId(pub String);

impl LayerId {
    /// Create an id from anything string-like.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Output canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a validated canvas with non-zero dimensions.
    pub fn new(width: u32, height: u32) -> StreamViewResult<Self> {
        if width == 0 || height == 0 {
            return Err(StreamViewError::config("canvas dimensions must be > 0"));
        }
        Ok(Self { width, height })
    }

    /// Full-canvas rectangle in pixel space.
    pub fn rect(self) -> Rect {
        Rect::new(0.0, 0.0, f64::from(self.width), f64::from(self.height))
    }
}

/// Interval between frames for a target rate, in milliseconds.
///
/// Non-positive or non-finite rates map to an infinite interval, i.e. "never due".
pub fn frame_interval_ms(target_fps: f64) -> Millis {
    if !target_fps.is_finite() || target_fps <= 0.0 {
        return f64::INFINITY;
    }
    1000.0 / target_fps
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
