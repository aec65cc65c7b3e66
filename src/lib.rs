#![forbid(unsafe_code)]

pub mod foundation;
pub mod layer;
pub mod pipeline;
pub mod session;
pub mod telemetry;
pub mod transport;
pub mod view;

pub use foundation::clock::{Clock, ManualClock, MonotonicClock};
pub use foundation::core::{Canvas, LayerId, Millis, Rect, Vec2};
pub use foundation::error::{StreamViewError, StreamViewResult};
pub use layer::config::{Encoding, EncodingFormat, LayerConfig, LayerRect};
pub use pipeline::buffer::FrameBuffer;
pub use pipeline::filter::{Filter, FilterOutput, FilterPipeline, FnFilter};
pub use pipeline::frame::{EncodedFrame, FilterTiming, FrameMetadata};
pub use pipeline::producer::{LayerProducer, ProducerHandle, ProducerStats, SharedView};
pub use pipeline::source::{FrameSource, PatternSource, SourceFrame, StillImageSource};
pub use session::{StreamView, ViewConfig};
pub use telemetry::{TelemetryAggregator, TelemetryReport, TimingSample, TransportEstimate};
pub use transport::protocol::{FrameRequest, FrameUpdate, InjectFrame, ViewportEvent};
pub use view::compositor::Compositor;
pub use view::viewport::{Viewport, ViewportController};
