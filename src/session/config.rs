use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::foundation::core::Canvas;
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::layer::config::LayerConfig;
use crate::pipeline::source::{FrameSource, PatternSource, StillImageSource};
use crate::telemetry::aggregator::DEFAULT_WINDOW;
use crate::telemetry::sample::TransportPolicy;
use crate::view::nav::NavWindow;

fn default_render_fps() -> f64 {
    30.0
}

fn default_max_zoom() -> f64 {
    8.0
}

fn default_wheel_step() -> f64 {
    1.1
}

fn default_window() -> usize {
    DEFAULT_WINDOW
}

/// Where compositor-side decoding runs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// On the render thread, completed by the next drain.
    Inline,
    /// On a dedicated decoder thread.
    #[default]
    Threaded,
}

/// Rolling statistics settings.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Samples kept per layer.
    #[serde(default = "default_window")]
    pub window: usize,
    /// Bounds for the cross-clock transport estimate.
    #[serde(default)]
    pub transport: TransportPolicy,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            window: default_window(),
            transport: TransportPolicy::default(),
        }
    }
}

/// Built-in frame sources a config file can name.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceDef {
    /// Scrolling color bands. Size defaults to the layer's output size.
    Pattern {
        #[serde(default)]
        width: Option<u32>,
        #[serde(default)]
        height: Option<u32>,
        #[serde(default)]
        speed: Option<f64>,
        #[serde(default)]
        tint: Option<[u8; 3]>,
    },
    /// A still image file, relative paths resolve against the config file's directory.
    Image { path: PathBuf },
}

impl SourceDef {
    /// Instantiate the source. `size` is used when a pattern leaves its dimensions out.
    pub fn build(&self, base_dir: &Path, size: (u32, u32)) -> StreamViewResult<Box<dyn FrameSource>> {
        match self {
            SourceDef::Pattern {
                width,
                height,
                speed,
                tint,
            } => {
                let mut src = PatternSource::new(width.unwrap_or(size.0), height.unwrap_or(size.1))?;
                if let Some(speed) = speed {
                    src = src.with_speed(*speed);
                }
                if let Some(tint) = tint {
                    src = src.with_tint(*tint);
                }
                Ok(Box::new(src))
            }
            SourceDef::Image { path } => {
                let path = if path.is_absolute() {
                    path.clone()
                } else {
                    base_dir.join(path)
                };
                Ok(Box::new(StillImageSource::from_path(path)?))
            }
        }
    }
}

/// One layer declaration: the layer config plus an optional source.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    #[serde(flatten)]
    pub config: LayerConfig,
    /// Absent for piggyback layers and for layers the embedding application feeds itself.
    #[serde(default)]
    pub source: Option<SourceDef>,
}

/// JSON description of a whole view: canvas, viewport limits, and the initial layers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewConfig {
    pub width: u32,
    pub height: u32,
    /// Compositor tick rate.
    #[serde(default = "default_render_fps")]
    pub render_fps: f64,
    #[serde(default = "default_max_zoom")]
    pub max_zoom: f64,
    /// Zoom factor per wheel notch.
    #[serde(default = "default_wheel_step")]
    pub wheel_step: f64,
    #[serde(default)]
    pub nav: NavWindow,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub decode: DecodeMode,
    #[serde(default)]
    pub layers: Vec<LayerEntry>,
}

impl ViewConfig {
    /// Empty view of `width x height` with defaults everywhere else.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            render_fps: default_render_fps(),
            max_zoom: default_max_zoom(),
            wheel_step: default_wheel_step(),
            nav: NavWindow::default(),
            telemetry: TelemetryConfig::default(),
            decode: DecodeMode::default(),
            layers: Vec::new(),
        }
    }

    /// Parse a view config from a JSON reader.
    pub fn from_reader<R: std::io::Read>(r: R) -> StreamViewResult<Self> {
        serde_json::from_reader(r)
            .map_err(|e| StreamViewError::serde(format!("parse view config JSON: {e}")))
    }

    /// Parse a view config from a JSON file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> StreamViewResult<Self> {
        let path = path.as_ref();
        let f = File::open(path).map_err(|e| {
            StreamViewError::config(format!("open view config '{}': {e}", path.display()))
        })?;
        Self::from_reader(BufReader::new(f))
    }

    pub fn canvas(&self) -> StreamViewResult<Canvas> {
        Canvas::new(self.width, self.height)
    }

    pub fn render_interval_ms(&self) -> f64 {
        crate::foundation::core::frame_interval_ms(self.render_fps)
    }

    pub fn validate(&self) -> StreamViewResult<()> {
        self.canvas()?;
        if !self.render_fps.is_finite() || self.render_fps <= 0.0 {
            return Err(StreamViewError::config("render_fps must be finite and > 0"));
        }
        if !self.max_zoom.is_finite() || self.max_zoom < 1.0 {
            return Err(StreamViewError::config("max_zoom must be finite and >= 1"));
        }
        if !self.wheel_step.is_finite() || self.wheel_step <= 1.0 {
            return Err(StreamViewError::config("wheel_step must be finite and > 1"));
        }
        self.nav.validate()?;
        if self.telemetry.window == 0 {
            return Err(StreamViewError::config("telemetry window must be >= 1"));
        }
        let t = self.telemetry.transport;
        let finite = t.floor_ms.is_finite() && t.ceiling_ms.is_finite();
        if !finite || t.floor_ms < 0.0 || t.ceiling_ms < t.floor_ms {
            return Err(StreamViewError::config(
                "transport floor must be >= 0 and not above the ceiling",
            ));
        }

        let mut seen = HashSet::new();
        for entry in &self.layers {
            let cfg = &entry.config;
            cfg.validate()?;
            if !seen.insert(cfg.id.clone()) {
                return Err(StreamViewError::config(format!("duplicate layer id '{}'", cfg.id)));
            }
            if cfg.piggyback && entry.source.is_some() {
                return Err(StreamViewError::config(format!(
                    "layer '{}': piggyback layers cannot declare a source",
                    cfg.id
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/config.rs"]
mod tests;
