use std::collections::BTreeMap;
use std::path::Path;

use image::{Rgba, RgbaImage};

use crate::foundation::core::Millis;
use crate::foundation::error::{StreamViewError, StreamViewResult};

/// One acquisition from a source: a single image or a keyed set of outputs.
#[derive(Clone, Debug)]
pub enum SourceFrame {
    /// Single-output source.
    Single(RgbaImage),
    /// Multi-output source; layers pick one via `stream_output`.
    Multi(BTreeMap<String, RgbaImage>),
}

impl SourceFrame {
    /// Resolve the image a layer should use.
    ///
    /// A `Single` frame ignores `output`. A `Multi` frame requires a key present in the map,
    /// except that a map with exactly one entry is used when no key is given.
    pub fn select(self, output: Option<&str>) -> StreamViewResult<RgbaImage> {
        match (self, output) {
            (Self::Single(img), _) => Ok(img),
            (Self::Multi(mut outputs), Some(key)) => outputs.remove(key).ok_or_else(|| {
                StreamViewError::producer(format!("source has no output named '{key}'"))
            }),
            (Self::Multi(outputs), None) if outputs.len() == 1 => outputs
                .into_values()
                .next()
                .ok_or_else(|| StreamViewError::producer("source returned no outputs")),
            (Self::Multi(_), None) => Err(StreamViewError::producer(
                "multi-output source requires stream_output",
            )),
        }
    }
}

/// Frame acquisition collaborator (camera, decoder, generator...).
pub trait FrameSource: Send {
    /// Acquire the frame for `timestamp_ms` on the producer clock.
    fn acquire_frame(&mut self, timestamp_ms: Millis) -> StreamViewResult<SourceFrame>;
}

impl<F> FrameSource for F
where
    F: FnMut(Millis) -> StreamViewResult<SourceFrame> + Send,
{
    fn acquire_frame(&mut self, timestamp_ms: Millis) -> StreamViewResult<SourceFrame> {
        self(timestamp_ms)
    }
}

/// Animated test pattern: diagonal color bands that scroll with time.
#[derive(Clone, Debug)]
pub struct PatternSource {
    width: u32,
    height: u32,
    /// Scroll speed in pixels per second.
    speed: f64,
    tint: [u8; 3],
}

impl PatternSource {
    /// Pattern of `width x height` pixels.
    pub fn new(width: u32, height: u32) -> StreamViewResult<Self> {
        if width == 0 || height == 0 {
            return Err(StreamViewError::config(
                "pattern source dimensions must be > 0",
            ));
        }
        Ok(Self {
            width,
            height,
            speed: 60.0,
            tint: [255, 255, 255],
        })
    }

    /// Override scroll speed (pixels per second).
    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    /// Multiply every band by an RGB tint.
    pub fn with_tint(mut self, tint: [u8; 3]) -> Self {
        self.tint = tint;
        self
    }
}

impl FrameSource for PatternSource {
    fn acquire_frame(&mut self, timestamp_ms: Millis) -> StreamViewResult<SourceFrame> {
        let shift = (timestamp_ms / 1000.0 * self.speed).rem_euclid(256.0) as u32;
        let tint = self.tint;
        let img = RgbaImage::from_fn(self.width, self.height, |x, y| {
            let band = ((x + y + shift) / 16) % 4;
            let base: [u8; 3] = match band {
                0 => [230, 60, 60],
                1 => [60, 200, 90],
                2 => [60, 110, 230],
                _ => [235, 220, 80],
            };
            let scale = |c: u8, t: u8| ((u16::from(c) * u16::from(t)) / 255) as u8;
            Rgba([
                scale(base[0], tint[0]),
                scale(base[1], tint[1]),
                scale(base[2], tint[2]),
                255,
            ])
        });
        Ok(SourceFrame::Single(img))
    }
}

/// Source that returns the same still image on every acquisition.
#[derive(Clone, Debug)]
pub struct StillImageSource {
    image: RgbaImage,
}

impl StillImageSource {
    /// Wrap an in-memory image.
    pub fn new(image: RgbaImage) -> Self {
        Self { image }
    }

    /// Load any format the `image` crate can decode.
    pub fn from_path(path: impl AsRef<Path>) -> StreamViewResult<Self> {
        let path = path.as_ref();
        let img = image::open(path).map_err(|e| {
            StreamViewError::config(format!("open still image '{}': {e}", path.display()))
        })?;
        Ok(Self::new(img.to_rgba8()))
    }
}

impl FrameSource for StillImageSource {
    fn acquire_frame(&mut self, _timestamp_ms: Millis) -> StreamViewResult<SourceFrame> {
        Ok(SourceFrame::Single(self.image.clone()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/source.rs"]
mod tests;
