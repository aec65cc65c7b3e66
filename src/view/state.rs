use image::{GrayImage, RgbaImage};

use crate::foundation::core::Millis;
use crate::foundation::ring::RateWindow;
use crate::layer::config::LayerConfig;
use crate::pipeline::frame::FrameMetadata;
use crate::telemetry::sample::TransportEstimate;

// Update timestamps kept for the FPS estimate.
const FPS_WINDOW: usize = 30;

/// Request/decode cycle of one compositor layer.
///
/// `Idle -> Requesting -> Decoding -> Ready -> Requesting ...`; only removal ends it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerPhase {
    /// Nothing requested or shown yet.
    #[default]
    Idle,
    /// A request is in flight.
    Requesting,
    /// An update arrived and is being decoded.
    Decoding,
    /// Latest decode finished.
    Ready,
}

/// Decoded frame kept for telemetry until its first draw.
#[derive(Clone, Debug)]
pub(crate) struct PendingSample {
    pub(crate) metadata: FrameMetadata,
    pub(crate) transport: TransportEstimate,
    pub(crate) receive_time: Millis,
    pub(crate) decode_start: Millis,
    pub(crate) decode_end: Millis,
}

/// Client-side state of one layer. Rebuilt when a layer is (re)added, dropped on removal.
#[derive(Debug)]
pub struct CompositorLayerState {
    pub(crate) config: LayerConfig,
    // Distinguishes this incarnation from an earlier layer with the same id.
    pub(crate) epoch: u64,
    pub(crate) phase: LayerPhase,
    /// Premultiplied RGBA of the latest decoded frame.
    pub(crate) image: Option<RgbaImage>,
    pub(crate) anchor: Option<(f64, f64)>,
    pub(crate) frame_id: Option<u64>,
    /// Image resampled to the current draw size, rebuilt when either changes.
    pub(crate) scaled: Option<RgbaImage>,
    pub(crate) mask: Option<GrayImage>,
    pub(crate) nav_thumbnail: Option<Vec<u8>>,
    pub(crate) last_request_time: Option<Millis>,
    pub(crate) last_update: Option<Millis>,
    pub(crate) requested_once: bool,
    pub(crate) decodes_in_flight: u32,
    // Sequence of the newest decode submitted / applied; older completions lose.
    pub(crate) next_seq: u64,
    pub(crate) applied_seq: Option<u64>,
    // Decodes below this sequence were submitted before the last stop and are dropped.
    pub(crate) discard_below: u64,
    pub(crate) pending: Option<PendingSample>,
    pub(crate) fps: RateWindow,
}

impl CompositorLayerState {
    pub(crate) fn new(config: LayerConfig, epoch: u64) -> Self {
        Self {
            config,
            epoch,
            phase: LayerPhase::Idle,
            image: None,
            anchor: None,
            frame_id: None,
            scaled: None,
            mask: None,
            nav_thumbnail: None,
            last_request_time: None,
            last_update: None,
            requested_once: false,
            decodes_in_flight: 0,
            next_seq: 0,
            applied_seq: None,
            discard_below: 0,
            pending: None,
            fps: RateWindow::new(FPS_WINDOW),
        }
    }

    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    pub fn phase(&self) -> LayerPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, LayerPhase::Requesting | LayerPhase::Decoding)
    }

    pub fn has_content(&self) -> bool {
        self.image.is_some()
    }

    /// Premultiplied RGBA of the displayed frame.
    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    /// Capture anchor of the displayed frame, when it carries overscan.
    pub fn anchor(&self) -> Option<(f64, f64)> {
        self.anchor
    }

    pub fn frame_id(&self) -> Option<u64> {
        self.frame_id
    }

    pub fn last_request_time(&self) -> Option<Millis> {
        self.last_request_time
    }

    pub fn last_update(&self) -> Option<Millis> {
        self.last_update
    }

    /// Time since the displayed frame finished decoding.
    pub fn time_since_update(&self, now: Millis) -> Option<Millis> {
        self.last_update.map(|t| (now - t).max(0.0))
    }

    pub fn fps(&self) -> f64 {
        self.fps.per_second()
    }

    pub fn nav_thumbnail(&self) -> Option<&[u8]> {
        self.nav_thumbnail.as_deref()
    }

    pub(crate) fn begin_decode(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.decodes_in_flight += 1;
        self.phase = LayerPhase::Decoding;
        seq
    }

    /// Forget the outstanding request and every decode submitted so far.
    pub(crate) fn halt(&mut self) {
        self.discard_below = self.next_seq;
        if self.phase == LayerPhase::Requesting {
            self.phase = self.settled_phase();
        }
    }

    fn settled_phase(&self) -> LayerPhase {
        if self.has_content() {
            LayerPhase::Ready
        } else {
            LayerPhase::Idle
        }
    }

    pub(crate) fn finish_decode(&mut self) {
        self.decodes_in_flight = self.decodes_in_flight.saturating_sub(1);
        if self.decodes_in_flight == 0 {
            self.phase = self.settled_phase();
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/view/state.rs"]
mod tests;
