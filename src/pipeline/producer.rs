use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use crate::foundation::clock::Clock;
use crate::foundation::core::{Canvas, LayerId};
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::layer::config::{LayerConfig, LayerRect};
use crate::pipeline::buffer::FrameBuffer;
use crate::pipeline::encode::{capture_region, encode_image, nav_thumbnail};
use crate::pipeline::filter::FilterPipeline;
use crate::pipeline::frame::{EncodedFrame, FrameMetadata};
use crate::pipeline::source::FrameSource;
use crate::view::viewport::{Viewport, effective_view_rect};

/// Maximum width of the nav thumbnail attached to frames.
pub const NAV_THUMBNAIL_WIDTH: u32 = 160;

// Upper bound on how long a producer thread sleeps before re-checking cancellation.
const SLEEP_SLICE: Duration = Duration::from_millis(5);

/// Called after a frame lands in the buffer, so a parked request can be answered.
pub type FrameNotifier = Arc<dyn Fn(&LayerId) + Send + Sync>;

/// Viewport and canvas as last committed by the control surface.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewState {
    /// Global zoom/pan.
    pub viewport: Viewport,
    /// Output canvas.
    pub canvas: Canvas,
}

/// View state shared between the control surface (writer) and every producer (readers).
#[derive(Debug)]
pub struct SharedView {
    inner: Mutex<ViewState>,
}

impl SharedView {
    /// Identity viewport on `canvas`.
    pub fn new(canvas: Canvas) -> Self {
        Self {
            inner: Mutex::new(ViewState {
                viewport: Viewport::IDENTITY,
                canvas,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self) -> ViewState {
        *self.lock()
    }

    /// Publish a committed viewport.
    pub fn set_viewport(&self, viewport: Viewport) {
        self.lock().viewport = viewport;
    }

    /// Publish a canvas resize.
    pub fn set_canvas(&self, canvas: Canvas) {
        self.lock().canvas = canvas;
    }
}

/// Snapshot of a producer's counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
pub struct ProducerStats {
    /// Ticks attempted.
    pub ticks: u64,
    /// Frames pushed into the buffer.
    pub produced: u64,
    /// Ticks that failed and were skipped.
    pub failures: u64,
    /// Frames evicted from the buffer by newer ones.
    pub dropped: u64,
}

/// State a running producer shares with its owner.
#[derive(Debug, Default)]
struct ProducerShared {
    position: Mutex<Option<LayerRect>>,
    ticks: AtomicU64,
    produced: AtomicU64,
    failures: AtomicU64,
    dropped: AtomicU64,
}

impl ProducerShared {
    fn position(&self) -> Option<LayerRect> {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_position(&self, position: Option<LayerRect>) {
        *self.position.lock().unwrap_or_else(PoisonError::into_inner) = position;
    }

    fn snapshot(&self) -> ProducerStats {
        ProducerStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            produced: self.produced.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// What one tick did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was pushed.
    Produced {
        /// Id of the pushed frame.
        frame_id: u64,
        /// Frame evicted to make room, if any.
        dropped_frame_id: Option<u64>,
    },
    /// The tick failed; nothing was pushed.
    Failed,
}

impl TickOutcome {
    pub fn is_produced(&self) -> bool {
        matches!(self, Self::Produced { .. })
    }
}

/// Per-layer frame producer: acquire, filter, capture, encode, buffer.
pub struct LayerProducer {
    config: LayerConfig,
    source: Box<dyn FrameSource>,
    filters: FilterPipeline,
    buffer: Arc<FrameBuffer>,
    view: Arc<SharedView>,
    clock: Arc<dyn Clock>,
    notifier: Option<FrameNotifier>,
    shared: Arc<ProducerShared>,
    next_frame_id: u64,
}

impl std::fmt::Debug for LayerProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerProducer")
            .field("layer_id", &self.config.id)
            .field("filters", &self.filters)
            .field("next_frame_id", &self.next_frame_id)
            .finish()
    }
}

impl LayerProducer {
    /// Producer for `config`, pushing into `buffer`.
    ///
    /// Piggyback layers have no producer; passing one is a configuration error.
    pub fn new(
        config: LayerConfig,
        source: Box<dyn FrameSource>,
        filters: FilterPipeline,
        buffer: Arc<FrameBuffer>,
        view: Arc<SharedView>,
        clock: Arc<dyn Clock>,
    ) -> StreamViewResult<Self> {
        config.validate()?;
        if config.piggyback {
            return Err(StreamViewError::config(format!(
                "layer '{}': piggyback layers are fed by injection, not by a producer",
                config.id
            )));
        }
        if buffer.layer_id() != &config.id {
            return Err(StreamViewError::config(format!(
                "layer '{}': buffer belongs to layer '{}'",
                config.id,
                buffer.layer_id()
            )));
        }
        let shared = Arc::new(ProducerShared::default());
        shared.set_position(config.position);
        Ok(Self {
            config,
            source,
            filters,
            buffer,
            view,
            clock,
            notifier: None,
            shared,
            next_frame_id: 0,
        })
    }

    /// Call `notifier` after every successful push.
    pub fn with_notifier(mut self, notifier: FrameNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn layer_id(&self) -> &LayerId {
        &self.config.id
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// Move the layer; the next tick captures at the new size.
    pub fn set_position(&self, position: Option<LayerRect>) {
        self.shared.set_position(position);
    }

    pub fn stats(&self) -> ProducerStats {
        self.shared.snapshot()
    }

    /// Produce one frame. Failures are logged and counted, never propagated.
    pub fn tick(&mut self) -> TickOutcome {
        self.shared.ticks.fetch_add(1, Ordering::Relaxed);
        match self.produce() {
            Ok((frame_id, dropped_frame_id)) => {
                self.shared.produced.fetch_add(1, Ordering::Relaxed);
                if dropped_frame_id.is_some() {
                    self.shared.dropped.fetch_add(1, Ordering::Relaxed);
                }
                if let Some(notify) = &self.notifier {
                    notify(&self.config.id);
                }
                TickOutcome::Produced {
                    frame_id,
                    dropped_frame_id,
                }
            }
            Err(err) => {
                self.shared.failures.fetch_add(1, Ordering::Relaxed);
                tracing::warn!(layer = %self.config.id, error = %err, "producer tick failed, frame skipped");
                TickOutcome::Failed
            }
        }
    }

    // Returns the pushed frame id and the id of the frame it evicted.
    fn produce(&mut self) -> StreamViewResult<(u64, Option<u64>)> {
        self.config.position = self.shared.position();

        let acquire_time = self.clock.now_ms();
        let raw = self
            .source
            .acquire_frame(acquire_time)?
            .select(self.config.stream_output.as_deref())?;
        let (filtered, filter_timings) = self.filters.run(raw)?;

        let capture_time = self.clock.now_ms();
        let view = self.view.get();
        let thumbnail = if self.config.nav_thumbnail {
            Some(nav_thumbnail(&filtered, NAV_THUMBNAIL_WIDTH)?)
        } else {
            None
        };
        let (out_w, out_h) = self.config.output_size(view.canvas);
        let region = effective_view_rect(&view.viewport, self.config.depth);
        let capture = capture_region(&filtered, region, out_w, out_h, self.config.overscan)?;

        let encode_start = self.clock.now_ms();
        let payload = encode_image(&capture.image, self.config.encoding)?;
        let encode_end = self.clock.now_ms();

        let frame_id = self.next_frame_id;
        self.next_frame_id += 1;

        let mut metadata = FrameMetadata::new(self.config.id.clone(), frame_id, capture_time);
        metadata.acquire_time = acquire_time;
        metadata.filter_timings = filter_timings;
        metadata.encode_start = encode_start;
        metadata.encode_end = encode_end;
        metadata.frame_width = capture.image.width();
        metadata.frame_height = capture.image.height();
        metadata.overscan = self.config.overscan;
        metadata.anchor_x = capture.anchor.map(|a| a.0);
        metadata.anchor_y = capture.anchor.map(|a| a.1);
        metadata.nav_thumbnail = thumbnail;

        let pushed = self.buffer.push(EncodedFrame::new(payload, metadata));
        Ok((frame_id, pushed.dropped_frame_id))
    }
}

/// Owner of a producer thread ticking at the layer's `target_fps`.
///
/// Dropping the handle cancels the thread.
pub struct ProducerHandle {
    layer_id: LayerId,
    running: Arc<AtomicBool>,
    shared: Arc<ProducerShared>,
    worker: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for ProducerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProducerHandle")
            .field("layer_id", &self.layer_id)
            .field("running", &self.is_running())
            .finish()
    }
}

impl ProducerHandle {
    /// Start ticking `producer` on its own thread.
    ///
    /// Static layers stop after their first successful frame.
    pub fn spawn(mut producer: LayerProducer) -> StreamViewResult<Self> {
        let layer_id = producer.layer_id().clone();
        let running = Arc::new(AtomicBool::new(true));
        let shared = Arc::clone(&producer.shared);
        let interval = Duration::from_secs_f64(producer.config.frame_interval_ms() / 1000.0);
        let is_static = producer.config.is_static;

        let flag = Arc::clone(&running);
        let worker = std::thread::Builder::new()
            .name(format!("producer-{layer_id}"))
            .spawn(move || {
                tracing::debug!(layer = %producer.layer_id(), "producer started");
                while flag.load(Ordering::Acquire) {
                    let started = Instant::now();
                    if producer.tick().is_produced() && is_static {
                        break;
                    }
                    let deadline = started + interval;
                    loop {
                        let now = Instant::now();
                        if now >= deadline || !flag.load(Ordering::Acquire) {
                            break;
                        }
                        std::thread::sleep((deadline - now).min(SLEEP_SLICE));
                    }
                }
                tracing::debug!(layer = %producer.layer_id(), stats = ?producer.stats(), "producer stopped");
            })
            .map_err(|e| {
                StreamViewError::producer(format!("failed to spawn producer thread: {e}"))
            })?;

        Ok(Self {
            layer_id,
            running,
            shared,
            worker: Some(worker),
        })
    }

    pub fn layer_id(&self) -> &LayerId {
        &self.layer_id
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Move the layer; takes effect on the next tick.
    pub fn set_position(&self, position: Option<LayerRect>) {
        self.shared.set_position(position);
    }

    pub fn stats(&self) -> ProducerStats {
        self.shared.snapshot()
    }

    /// Stop the loop and wait for the in-flight tick. No frame is pushed after this returns.
    pub fn cancel(mut self) -> ProducerStats {
        self.stop();
        self.stats()
    }

    fn stop(&mut self) {
        self.running.store(false, Ordering::Release);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            tracing::warn!(layer = %self.layer_id, "producer thread panicked");
        }
    }
}

impl Drop for ProducerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/producer.rs"]
mod tests;
