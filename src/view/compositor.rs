//! Client-side real-time compositor.
//!
//! One [`Compositor::tick`] drains transport updates, applies finished decodes, draws every
//! layer bottom to top, hands freshly drawn frames to telemetry, and finally emits the
//! rate-limited frame requests for the next cycle.

use std::collections::HashMap;
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::{GrayImage, RgbaImage};

use crate::foundation::clock::Clock;
use crate::foundation::core::{Canvas, LayerId, Millis, Rect, Vec2};
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::foundation::math::{clamp_symmetric, unpremultiply_rgba8_in_place};
use crate::layer::config::{LayerConfig, LayerRect};
use crate::pipeline::frame::FrameMetadata;
use crate::telemetry::aggregator::{DEFAULT_WINDOW, TelemetryAggregator};
use crate::telemetry::sample::{ConsumerTimes, TimingSample, TransportEstimate, TransportPolicy};
use crate::transport::channel::FrameTransport;
use crate::transport::limiter::RequestLimiter;
use crate::transport::protocol::{FrameRequest, FrameUpdate, InjectFrame};
use crate::view::composite::{ClipRect, draw_layer};
use crate::view::decode::{DecodeDone, DecodeJob, DecodeQueue};
use crate::view::state::{CompositorLayerState, LayerPhase, PendingSample};
use crate::view::viewport::{ViewRect, Viewport, effective_view_rect};

/// Layer registry owned by the compositor.
pub type LayerMap = HashMap<LayerId, CompositorLayerState>;

/// Clamp a capture-to-display displacement (pixels) into the overscan margin.
pub fn overscan_offset(displacement_px: Vec2, overscan: u32) -> Vec2 {
    let o = f64::from(overscan);
    Vec2::new(
        clamp_symmetric(displacement_px.x, o),
        clamp_symmetric(displacement_px.y, o),
    )
}

/// Displacement, in draw pixels, between the capture anchor and the current view center.
pub fn anchor_displacement(anchor: (f64, f64), current: ViewRect, draw_w: f64, draw_h: f64) -> Vec2 {
    let (cx, cy) = current.center();
    let dx = if current.width > 0.0 {
        (cx - anchor.0) * draw_w / current.width
    } else {
        0.0
    };
    let dy = if current.height > 0.0 {
        (cy - anchor.1) * draw_h / current.height
    } else {
        0.0
    };
    Vec2::new(dx, dy)
}

/// Compositor counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct CompositorStats {
    /// Render passes.
    pub ticks: u64,
    /// `frame-request`s sent.
    pub requests_sent: u64,
    /// Requests suppressed by the rate limiter.
    pub requests_limited: u64,
    /// Updates accepted for decoding.
    pub updates_received: u64,
    /// Updates ignored: unknown layer, or received while stopped.
    pub stale_updates: u64,
    /// Frames injected on piggyback layers.
    pub frames_injected: u64,
    /// Payloads that failed to decode.
    pub decode_failures: u64,
    /// Decodes finished after their layer was removed or superseded.
    pub stale_decodes: u64,
    /// Frames recorded in telemetry.
    pub frames_displayed: u64,
}

/// Settings for a [`Compositor`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CompositorOptions {
    /// Transport estimate bounds.
    pub transport: TransportPolicy,
    /// Telemetry window length in samples.
    pub telemetry_window: usize,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            transport: TransportPolicy::default(),
            telemetry_window: DEFAULT_WINDOW,
        }
    }
}

/// Real-time compositor. Single-threaded; decoding may run elsewhere behind [`DecodeQueue`].
pub struct Compositor {
    canvas: Canvas,
    layers: LayerMap,
    // Insertion order, the tie-breaker for equal z_index.
    insertion: Vec<LayerId>,
    next_epoch: u64,
    limiter: RequestLimiter,
    decoder: Box<dyn DecodeQueue>,
    clock: Arc<dyn Clock>,
    telemetry: TelemetryAggregator,
    policy: TransportPolicy,
    running: bool,
    frame: RgbaImage,
    stats: CompositorStats,
}

impl std::fmt::Debug for Compositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Compositor")
            .field("canvas", &self.canvas)
            .field("layers", &self.insertion)
            .field("running", &self.running)
            .field("stats", &self.stats)
            .finish()
    }
}

impl Compositor {
    /// Compositor drawing into a `canvas`-sized frame, reading time from `clock`.
    pub fn new(
        canvas: Canvas,
        clock: Arc<dyn Clock>,
        decoder: Box<dyn DecodeQueue>,
        opts: CompositorOptions,
    ) -> Self {
        Self {
            canvas,
            layers: HashMap::new(),
            insertion: Vec::new(),
            next_epoch: 0,
            limiter: RequestLimiter::new(),
            decoder,
            clock,
            telemetry: TelemetryAggregator::new(opts.telemetry_window),
            policy: opts.transport,
            running: false,
            frame: RgbaImage::new(canvas.width, canvas.height),
            stats: CompositorStats::default(),
        }
    }

    /// Add a layer with fresh state. Replaces any layer with the same id.
    pub fn add_layer(&mut self, config: LayerConfig) -> StreamViewResult<()> {
        config.validate()?;
        let id = config.id.clone();
        if self.layers.contains_key(&id) {
            self.remove_layer(&id);
        }
        let epoch = self.next_epoch;
        self.next_epoch += 1;
        self.layers
            .insert(id.clone(), CompositorLayerState::new(config, epoch));
        self.insertion.push(id);
        Ok(())
    }

    /// Drop a layer and everything known about it. In-flight responses become no-ops.
    pub fn remove_layer(&mut self, layer_id: &LayerId) -> bool {
        if self.layers.remove(layer_id).is_none() {
            return false;
        }
        self.insertion.retain(|id| id != layer_id);
        self.limiter.forget(layer_id);
        self.telemetry.remove(layer_id);
        true
    }

    /// Move or resize a layer. `None` makes it fill the canvas.
    pub fn update_layer_position(
        &mut self,
        layer_id: &LayerId,
        position: Option<LayerRect>,
    ) -> StreamViewResult<()> {
        let state = self
            .layers
            .get_mut(layer_id)
            .ok_or_else(|| StreamViewError::config(format!("unknown layer '{layer_id}'")))?;
        if let Some(p) = &position {
            p.validate()?;
        }
        state.config.position = position;
        state.scaled = None;
        Ok(())
    }

    /// Set or clear a layer's alpha mask.
    pub fn set_mask(&mut self, layer_id: &LayerId, mask: Option<GrayImage>) -> StreamViewResult<()> {
        let state = self
            .layers
            .get_mut(layer_id)
            .ok_or_else(|| StreamViewError::config(format!("unknown layer '{layer_id}'")))?;
        state.mask = mask;
        Ok(())
    }

    /// Resize the output canvas.
    pub fn resize(&mut self, canvas: Canvas) {
        self.canvas = canvas;
        self.frame = RgbaImage::new(canvas.width, canvas.height);
        for state in self.layers.values_mut() {
            state.scaled = None;
        }
    }

    /// Accept updates and emit requests.
    pub fn start(&mut self) {
        self.running = true;
    }

    /// Ignore updates and stop requesting. Displayed content stays.
    ///
    /// Outstanding requests are forgotten and decodes still in flight are dropped when they
    /// finish, so a later [`Compositor::start`] resumes requesting from a settled state.
    pub fn stop(&mut self) {
        self.running = false;
        for state in self.layers.values_mut() {
            state.halt();
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Push a frame into a piggyback layer. It is decoded like a delivered frame, with zero
    /// transport time, and never triggers a request. Like any update, it is dropped while the
    /// compositor is stopped.
    pub fn inject_frame(&mut self, frame: InjectFrame) -> StreamViewResult<()> {
        let now = self.clock.now_ms();
        let state = self
            .layers
            .get_mut(&frame.layer_id)
            .ok_or_else(|| StreamViewError::config(format!("unknown layer '{}'", frame.layer_id)))?;
        if !state.config.piggyback {
            return Err(StreamViewError::config(format!(
                "layer '{}' is not a piggyback layer",
                frame.layer_id
            )));
        }
        let mut metadata = frame.metadata;
        metadata.frame_bytes = frame.payload.len();
        submit(
            self.decoder.as_mut(),
            state,
            &mut self.stats,
            frame.layer_id,
            frame.payload,
            metadata,
            TransportEstimate::zero(),
            now,
        );
        self.stats.frames_injected += 1;
        Ok(())
    }

    /// One render cycle against `viewport`.
    pub fn tick(&mut self, viewport: &Viewport, transport: &mut dyn FrameTransport) {
        self.stats.ticks += 1;
        let updates = transport.drain_updates();
        if self.running {
            for update in updates {
                self.accept_update(update);
            }
        } else if !updates.is_empty() {
            self.stats.stale_updates += updates.len() as u64;
            tracing::debug!(count = updates.len(), "updates received while stopped were ignored");
        }

        for done in self.decoder.drain_completed() {
            apply_decode(&mut self.layers, &mut self.stats, done, self.running);
        }

        let order = draw_order(&self.layers, &self.insertion);
        let render_start = self.clock.now_ms();
        let drawn = render_layers(
            &mut self.layers,
            &order,
            &mut self.frame,
            self.canvas,
            viewport,
        );
        let render_end = self.clock.now_ms();
        for id in drawn {
            self.record_displayed(&id, render_start, render_end);
        }

        if self.running {
            let now = self.clock.now_ms();
            emit_requests(
                &mut self.layers,
                &order,
                &mut self.limiter,
                &mut self.stats,
                transport,
                now,
            );
        }
    }

    fn accept_update(&mut self, update: FrameUpdate) {
        let now = self.clock.now_ms();
        let Some(state) = self.layers.get_mut(&update.layer_id) else {
            self.stats.stale_updates += 1;
            tracing::debug!(layer = %update.layer_id, "update for unknown layer ignored");
            return;
        };
        let transport = TransportEstimate::estimate(update.metadata.send_time, now, self.policy);
        self.stats.updates_received += 1;
        submit(
            self.decoder.as_mut(),
            state,
            &mut self.stats,
            update.layer_id,
            update.payload,
            update.metadata,
            transport,
            now,
        );
    }

    fn record_displayed(&mut self, layer_id: &LayerId, render_start: Millis, render_end: Millis) {
        let Some(pending) = self
            .layers
            .get_mut(layer_id)
            .and_then(|s| s.pending.take())
        else {
            return;
        };
        let times = ConsumerTimes {
            receive_time: pending.receive_time,
            decode_start: pending.decode_start,
            decode_end: pending.decode_end,
            render_start,
            render_end,
        };
        self.telemetry
            .record(TimingSample::from_parts(&pending.metadata, pending.transport, times));
        self.stats.frames_displayed += 1;
    }

    /// Layer state.
    pub fn layer(&self, layer_id: &LayerId) -> Option<&CompositorLayerState> {
        self.layers.get(layer_id)
    }

    pub fn layer_order(&self) -> Vec<LayerId> {
        draw_order(&self.layers, &self.insertion)
    }

    /// Time since a layer's displayed frame was decoded.
    pub fn time_since_update(&self, layer_id: &LayerId) -> Option<Millis> {
        let now = self.clock.now_ms();
        self.layers.get(layer_id)?.time_since_update(now)
    }

    /// Latest nav thumbnail of the bottom-most layer with `depth > 0`.
    pub fn nav_thumbnail(&self) -> Option<&[u8]> {
        draw_order(&self.layers, &self.insertion)
            .iter()
            .filter_map(|id| self.layers.get(id))
            .find(|s| s.config.depth > 0.0)
            .and_then(|s| s.nav_thumbnail())
    }

    /// Composited frame, premultiplied RGBA.
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Composited frame converted to straight alpha, ready for encoding.
    pub fn frame_straight(&self) -> RgbaImage {
        let mut out = self.frame.clone();
        unpremultiply_rgba8_in_place(&mut out);
        out
    }

    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    pub fn telemetry(&self) -> &TelemetryAggregator {
        &self.telemetry
    }

    pub fn stats(&self) -> CompositorStats {
        self.stats
    }
}

#[allow(clippy::too_many_arguments)]
fn submit(
    decoder: &mut dyn DecodeQueue,
    state: &mut CompositorLayerState,
    stats: &mut CompositorStats,
    layer_id: LayerId,
    payload: Vec<u8>,
    metadata: FrameMetadata,
    transport: TransportEstimate,
    receive_time: Millis,
) {
    let seq = state.begin_decode();
    let job = DecodeJob {
        layer_id,
        epoch: state.epoch,
        seq,
        payload,
        metadata,
        transport,
        receive_time,
    };
    if let Err(err) = decoder.submit(job) {
        stats.decode_failures += 1;
        tracing::warn!(error = %err, "decode submission failed");
        state.finish_decode();
    }
}

fn apply_decode(layers: &mut LayerMap, stats: &mut CompositorStats, done: DecodeDone, running: bool) {
    let Some(state) = layers
        .get_mut(&done.layer_id)
        .filter(|s| s.epoch == done.epoch)
    else {
        stats.stale_decodes += 1;
        tracing::debug!(layer = %done.layer_id, "decode finished for a removed layer, ignored");
        return;
    };

    if !running || done.seq < state.discard_below {
        state.finish_decode();
        stats.stale_decodes += 1;
        tracing::debug!(layer = %done.layer_id, "decode finished after stop, ignored");
        return;
    }

    let image = match done.result {
        Ok(_) if done.metadata.overscan != state.config.overscan => {
            state.finish_decode();
            stats.decode_failures += 1;
            tracing::warn!(
                layer = %done.layer_id,
                frame_id = done.metadata.frame_id,
                frame_overscan = done.metadata.overscan,
                layer_overscan = state.config.overscan,
                "frame overscan does not match the layer, keeping previous content"
            );
            return;
        }
        Ok(image) => image,
        Err(err) => {
            state.finish_decode();
            stats.decode_failures += 1;
            tracing::warn!(
                layer = %done.layer_id,
                frame_id = done.metadata.frame_id,
                error = %err,
                "frame decode failed, keeping previous content"
            );
            return;
        }
    };
    if state.applied_seq.is_some_and(|applied| done.seq < applied) {
        state.finish_decode();
        stats.stale_decodes += 1;
        return;
    }

    state.applied_seq = Some(done.seq);
    state.image = Some(image);
    state.scaled = None;
    state.anchor = done.metadata.anchor();
    state.frame_id = Some(done.metadata.frame_id);
    state.last_update = Some(done.decode_end);
    state.fps.record(done.decode_end);
    if let Some(thumb) = &done.metadata.nav_thumbnail {
        state.nav_thumbnail = Some(thumb.clone());
    }
    state.pending = Some(PendingSample {
        metadata: done.metadata,
        transport: done.transport,
        receive_time: done.receive_time,
        decode_start: done.decode_start,
        decode_end: done.decode_end,
    });
    state.finish_decode();
}

/// Ids sorted by `z_index`, ties broken by insertion order.
fn draw_order(layers: &LayerMap, insertion: &[LayerId]) -> Vec<LayerId> {
    let mut ordered: Vec<(i32, usize, &LayerId)> = insertion
        .iter()
        .enumerate()
        .filter_map(|(i, id)| layers.get(id).map(|s| (s.config.z_index, i, id)))
        .collect();
    ordered.sort_by_key(|(z, i, _)| (*z, *i));
    ordered.into_iter().map(|(_, _, id)| id.clone()).collect()
}

/// Draw every layer with content in `order`; returns the layers that drew a new frame.
fn render_layers(
    layers: &mut LayerMap,
    order: &[LayerId],
    frame: &mut RgbaImage,
    canvas: Canvas,
    viewport: &Viewport,
) -> Vec<LayerId> {
    for px in frame.pixels_mut() {
        px.0 = [0; 4];
    }

    let mut drawn = Vec::new();
    for id in order {
        let Some(state) = layers.get_mut(id) else {
            continue;
        };
        if draw_one(state, frame, canvas, viewport) && state.pending.is_some() {
            drawn.push(id.clone());
        }
    }
    drawn
}

fn draw_one(
    state: &mut CompositorLayerState,
    frame: &mut RgbaImage,
    canvas: Canvas,
    viewport: &Viewport,
) -> bool {
    let Some(image) = state.image.as_ref() else {
        return false;
    };
    let rect: Rect = state.config.draw_rect(canvas);
    let draw_w = rect.width().round().max(1.0);
    let draw_h = rect.height().round().max(1.0);
    let o = state.config.overscan;
    let padded = |side: f64| (side as u32).checked_add(o.checked_mul(2)?);
    let (Some(tw), Some(th)) = (padded(draw_w), padded(draw_h)) else {
        tracing::warn!(layer = %state.config.id, overscan = o, "draw size overflows, layer skipped");
        return false;
    };
    let target = (tw, th);

    let img = if image.dimensions() == target {
        image
    } else {
        let stale = state
            .scaled
            .as_ref()
            .is_none_or(|s| s.dimensions() != target);
        if stale {
            state.scaled = Some(imageops::resize(image, target.0, target.1, FilterType::Triangle));
        }
        match state.scaled.as_ref() {
            Some(s) => s,
            None => image,
        }
    };

    let offset = match state.anchor {
        Some(anchor) if o > 0 => {
            let current = effective_view_rect(viewport, state.config.depth);
            overscan_offset(anchor_displacement(anchor, current, draw_w, draw_h), o)
        }
        _ => Vec2::ZERO,
    };

    let origin = (
        (rect.x0 - f64::from(o) - offset.x).round() as i64,
        (rect.y0 - f64::from(o) - offset.y).round() as i64,
    );
    let clip = ClipRect {
        x0: rect.x0.round() as i64,
        y0: rect.y0.round() as i64,
        x1: rect.x0.round() as i64 + draw_w as i64,
        y1: rect.y0.round() as i64 + draw_h as i64,
    };
    draw_layer(frame, img, origin, clip, state.mask.as_ref());
    true
}

/// Send a request for every layer that is due, not loading, and allowed by the limiter.
fn emit_requests(
    layers: &mut LayerMap,
    order: &[LayerId],
    limiter: &mut RequestLimiter,
    stats: &mut CompositorStats,
    transport: &mut dyn FrameTransport,
    now: Millis,
) {
    for id in order {
        let Some(state) = layers.get_mut(id) else {
            continue;
        };
        if state.config.piggyback || state.is_loading() {
            continue;
        }
        if state.config.is_static && state.requested_once {
            continue;
        }
        let interval = state.config.frame_interval_ms();
        if state.last_update.is_some_and(|t| now - t < interval) {
            continue;
        }
        if !limiter.try_acquire(id, now, interval) {
            stats.requests_limited += 1;
            continue;
        }
        match transport.send_request(FrameRequest {
            layer_id: id.clone(),
        }) {
            Ok(()) => {
                state.phase = LayerPhase::Requesting;
                state.last_request_time = Some(now);
                state.requested_once = true;
                stats.requests_sent += 1;
                tracing::trace!(layer = %id, "frame requested");
            }
            Err(err) => {
                tracing::warn!(layer = %id, error = %err, "frame request failed");
            }
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/view/compositor.rs"]
mod tests;
