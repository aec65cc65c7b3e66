//! View-level configuration and the in-process session that wires every component together.

pub mod config;
pub mod stream_view;

pub use config::{DecodeMode, LayerEntry, SourceDef, TelemetryConfig, ViewConfig};
pub use stream_view::StreamView;
