use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use image::{GrayImage, RgbaImage};

use crate::foundation::clock::{Clock, MonotonicClock};
use crate::foundation::core::{Canvas, LayerId, Millis};
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::layer::config::{LayerConfig, LayerRect};
use crate::pipeline::buffer::{BufferStats, FrameBuffer};
use crate::pipeline::filter::FilterPipeline;
use crate::pipeline::producer::{LayerProducer, ProducerHandle, ProducerStats, SharedView};
use crate::pipeline::source::FrameSource;
use crate::session::config::{DecodeMode, ViewConfig};
use crate::telemetry::aggregator::TelemetryReport;
use crate::transport::channel::LocalTransport;
use crate::transport::protocol::{InjectFrame, ViewportEvent};
use crate::transport::server::ServerStats;
use crate::view::compositor::{Compositor, CompositorOptions};
use crate::view::decode::{DecodeQueue, InlineDecoder, ThreadedDecoder};
use crate::view::nav::{NavOverlay, NavWindow};
use crate::view::viewport::{Viewport, ViewportController};

struct ProducerSlot {
    handle: ProducerHandle,
    buffer: Arc<FrameBuffer>,
}

/// A complete in-process view: producer threads, the local transport, and the compositor.
///
/// The control surface (`add_layer`, `set_zoom`, ...) is single-threaded and owned by the caller,
/// who also drives the render loop through [`StreamView::tick`].
pub struct StreamView {
    canvas: Canvas,
    render_interval_ms: Millis,
    controller: ViewportController,
    view: Arc<SharedView>,
    producer_clock: Arc<dyn Clock>,
    transport: LocalTransport,
    compositor: Compositor,
    producers: HashMap<LayerId, ProducerSlot>,
    nav: NavWindow,
}

impl std::fmt::Debug for StreamView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamView")
            .field("canvas", &self.canvas)
            .field("viewport", &self.controller.viewport())
            .field("layers", &self.compositor.layer_order())
            .finish()
    }
}

impl StreamView {
    /// Empty view using one monotonic clock on both sides.
    pub fn new(config: &ViewConfig) -> StreamViewResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        Self::with_clocks(config, Arc::clone(&clock), clock)
    }

    /// Empty view with separate producer and compositor clocks.
    ///
    /// The clocks need not share an epoch; telemetry only ever estimates the difference.
    pub fn with_clocks(
        config: &ViewConfig,
        producer_clock: Arc<dyn Clock>,
        compositor_clock: Arc<dyn Clock>,
    ) -> StreamViewResult<Self> {
        config.validate()?;
        let canvas = config.canvas()?;
        let controller = ViewportController::new(config.max_zoom, config.wheel_step)?;
        let decoder: Box<dyn DecodeQueue> = match config.decode {
            DecodeMode::Inline => Box::new(InlineDecoder::new(Arc::clone(&compositor_clock))),
            DecodeMode::Threaded => Box::new(ThreadedDecoder::spawn(Arc::clone(&compositor_clock))?),
        };
        let compositor = Compositor::new(
            canvas,
            compositor_clock,
            decoder,
            CompositorOptions {
                transport: config.telemetry.transport,
                telemetry_window: config.telemetry.window,
            },
        );
        let transport = LocalTransport::spawn(Arc::clone(&producer_clock))?;
        Ok(Self {
            canvas,
            render_interval_ms: config.render_interval_ms(),
            controller,
            view: Arc::new(SharedView::new(canvas)),
            producer_clock,
            transport,
            compositor,
            producers: HashMap::new(),
            nav: config.nav,
        })
    }

    /// Build a view and every layer the config declares.
    ///
    /// Relative image paths resolve against `base_dir`. Layers without a source must be
    /// piggyback layers.
    pub fn from_config(config: &ViewConfig, base_dir: &Path) -> StreamViewResult<Self> {
        let mut sv = Self::new(config)?;
        for entry in &config.layers {
            let source = match &entry.source {
                Some(def) => Some(def.build(base_dir, entry.config.output_size(sv.canvas))?),
                None => None,
            };
            sv.add_layer(entry.config.clone(), source, FilterPipeline::new())?;
        }
        Ok(sv)
    }

    /// Add a layer. Replaces any layer with the same id.
    ///
    /// Piggyback layers take no source; every other layer needs one and gets its own producer
    /// thread and frame buffer.
    #[tracing::instrument(skip(self, config, source, filters), fields(layer = %config.id))]
    pub fn add_layer(
        &mut self,
        config: LayerConfig,
        source: Option<Box<dyn FrameSource>>,
        filters: FilterPipeline,
    ) -> StreamViewResult<()> {
        config.validate()?;
        let id = config.id.clone();

        let producer = match (config.piggyback, source) {
            (true, Some(_)) => {
                return Err(StreamViewError::config(format!(
                    "layer '{id}': piggyback layers cannot have a source"
                )));
            }
            (false, None) => {
                return Err(StreamViewError::config(format!(
                    "layer '{id}': a source is required"
                )));
            }
            (true, None) => None,
            (false, Some(source)) => {
                let buffer = Arc::new(FrameBuffer::new(id.clone(), config.buffer_capacity)?);
                let producer = LayerProducer::new(
                    config.clone(),
                    source,
                    filters,
                    Arc::clone(&buffer),
                    Arc::clone(&self.view),
                    Arc::clone(&self.producer_clock),
                )?;
                Some((producer, buffer))
            }
        };

        self.remove_layer(&id);
        self.compositor.add_layer(config)?;

        if let Some((producer, buffer)) = producer {
            let server = self.transport.server();
            let started = server
                .register(Arc::clone(&buffer))
                .and_then(|()| ProducerHandle::spawn(producer.with_notifier(server.notifier())));
            match started {
                Ok(handle) => {
                    self.producers.insert(id.clone(), ProducerSlot { handle, buffer });
                }
                Err(err) => {
                    self.compositor.remove_layer(&id);
                    let _ = server.unregister(id.clone());
                    return Err(err);
                }
            }
        }
        tracing::info!(layer = %id, "layer added");
        Ok(())
    }

    /// Remove a layer: cancel its producer, flush its buffer, and forget its compositor state.
    ///
    /// Responses still in flight for the layer are ignored when they arrive.
    #[tracing::instrument(skip(self))]
    pub fn remove_layer(&mut self, layer_id: &LayerId) -> bool {
        let mut removed = false;
        if let Some(slot) = self.producers.remove(layer_id) {
            let stats = slot.handle.cancel();
            let flushed = slot.buffer.flush();
            if let Err(err) = self.transport.server().unregister(layer_id.clone()) {
                tracing::warn!(layer = %layer_id, error = %err, "unregister failed");
            }
            tracing::debug!(layer = %layer_id, ?stats, flushed, "producer stopped");
            removed = true;
        }
        removed |= self.compositor.remove_layer(layer_id);
        if removed {
            tracing::info!(layer = %layer_id, "layer removed");
        }
        removed
    }

    /// Move or resize a layer on both sides. `None` makes it fill the canvas.
    pub fn update_layer_position(
        &mut self,
        layer_id: &LayerId,
        position: Option<LayerRect>,
    ) -> StreamViewResult<()> {
        self.compositor.update_layer_position(layer_id, position)?;
        if let Some(slot) = self.producers.get(layer_id) {
            slot.handle.set_position(position);
        }
        Ok(())
    }

    /// Set or clear a layer's alpha mask.
    pub fn set_mask(&mut self, layer_id: &LayerId, mask: Option<GrayImage>) -> StreamViewResult<()> {
        self.compositor.set_mask(layer_id, mask)
    }

    fn publish(&self, event: Option<ViewportEvent>) -> Option<ViewportEvent> {
        if event.is_some() {
            self.view.set_viewport(self.controller.viewport());
        }
        event
    }

    /// Set the zoom, optionally centering on a normalized source point.
    pub fn set_zoom(&mut self, zoom: f64, center: Option<(f64, f64)>) -> Option<ViewportEvent> {
        let event = self.controller.set_zoom(zoom, center);
        self.publish(event)
    }

    /// Back to the full view.
    pub fn reset_zoom(&mut self) -> Option<ViewportEvent> {
        let event = self.controller.reset_zoom();
        self.publish(event)
    }

    /// Wheel gesture at `cursor` (fraction of the display).
    pub fn wheel(&mut self, delta_y: f64, cursor: (f64, f64)) -> Option<ViewportEvent> {
        let event = self.controller.wheel(delta_y, cursor);
        self.publish(event)
    }

    /// Drag gesture in display pixels.
    pub fn drag(&mut self, dx_px: f64, dy_px: f64) -> Option<ViewportEvent> {
        let event = self.controller.drag(dx_px, dy_px, self.canvas);
        self.publish(event)
    }

    /// Click or drag inside the nav window at nav pixel `(px, py)`. Ignored while it is hidden.
    pub fn nav_click(&mut self, px: f64, py: f64) -> Option<ViewportEvent> {
        if !self.nav.is_visible(&self.controller.viewport()) {
            return None;
        }
        let (cx, cy) = self.nav.click_to_center(px, py);
        let event = self.controller.center_on(cx, cy);
        self.publish(event)
    }

    /// Feed a frame into a piggyback layer.
    pub fn inject_frame(&mut self, frame: InjectFrame) -> StreamViewResult<()> {
        self.compositor.inject_frame(frame)
    }

    #[tracing::instrument(skip(self))]
    pub fn start(&mut self) {
        self.compositor.start();
    }

    #[tracing::instrument(skip(self))]
    pub fn stop(&mut self) {
        self.compositor.stop();
    }

    /// One render cycle against the current viewport.
    pub fn tick(&mut self) {
        let viewport = self.controller.viewport();
        self.compositor.tick(&viewport, &mut self.transport);
    }

    /// Change the output size for the compositor and every full-canvas producer.
    pub fn resize(&mut self, width: u32, height: u32) -> StreamViewResult<()> {
        let canvas = Canvas::new(width, height)?;
        self.canvas = canvas;
        self.view.set_canvas(canvas);
        self.compositor.resize(canvas);
        Ok(())
    }

    pub fn render_interval(&self) -> Duration {
        Duration::from_secs_f64(self.render_interval_ms / 1000.0)
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn viewport(&self) -> Viewport {
        self.controller.viewport()
    }

    pub fn viewport_event(&self) -> ViewportEvent {
        self.controller.event()
    }

    pub fn compositor(&self) -> &Compositor {
        &self.compositor
    }

    /// Current composited frame, straight alpha.
    pub fn frame(&self) -> RgbaImage {
        self.compositor.frame_straight()
    }

    pub fn telemetry_report(&self) -> TelemetryReport {
        self.compositor.telemetry().report()
    }

    pub fn producer_stats(&self, layer_id: &LayerId) -> Option<ProducerStats> {
        self.producers.get(layer_id).map(|s| s.handle.stats())
    }

    pub fn buffer_stats(&self, layer_id: &LayerId) -> Option<BufferStats> {
        self.producers.get(layer_id).map(|s| s.buffer.stats())
    }

    /// Time since a layer's displayed frame was decoded.
    pub fn time_since_update(&self, layer_id: &LayerId) -> Option<Millis> {
        self.compositor.time_since_update(layer_id)
    }

    pub fn nav_overlay(&self) -> Option<NavOverlay> {
        self.nav.overlay_rect(&self.controller.viewport())
    }

    /// Nav window image, once it is visible and a thumbnail has arrived.
    pub fn nav_image(&self) -> StreamViewResult<Option<RgbaImage>> {
        let viewport = self.controller.viewport();
        if !self.nav.is_visible(&viewport) {
            return Ok(None);
        }
        match self.compositor.nav_thumbnail() {
            Some(bytes) => self.nav.render(bytes, &viewport).map(Some),
            None => Ok(None),
        }
    }

    /// Stop every producer and the transport thread.
    pub fn shutdown(mut self) -> StreamViewResult<ServerStats> {
        self.compositor.stop();
        for (_, slot) in self.producers.drain() {
            slot.handle.cancel();
        }
        self.transport.shutdown()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/stream_view.rs"]
mod tests;
