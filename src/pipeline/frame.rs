use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::foundation::core::{LayerId, Millis};

/// Duration of one named filter step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterTiming {
    /// Filter name as declared by the pipeline.
    pub name: String,
    /// Reported duration in milliseconds.
    pub duration_ms: Millis,
}

/// Metadata stamped on every produced frame.
///
/// All `*_time` fields are on the producer's clock.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameMetadata {
    /// Layer this frame belongs to.
    pub layer_id: LayerId,
    /// Monotonically increasing per layer.
    pub frame_id: u64,
    /// When the source handed over the raw frame.
    pub acquire_time: Millis,
    /// When the filtered frame was captured into the layer's output region.
    pub capture_time: Millis,
    /// Filter steps in pipeline order.
    #[serde(default)]
    pub filter_timings: Vec<FilterTiming>,
    /// Encoder start.
    pub encode_start: Millis,
    /// Encoder end.
    pub encode_end: Millis,
    /// Stamped by the responder when the frame leaves the producer side.
    #[serde(default)]
    pub send_time: Option<Millis>,
    /// Encoded payload size.
    pub frame_bytes: usize,
    /// Encoded image width, overscan included.
    pub frame_width: u32,
    /// Encoded image height, overscan included.
    pub frame_height: u32,
    /// FrameBuffer occupancy right after this frame was pushed.
    #[serde(default)]
    pub buffer_length: usize,
    /// FrameBuffer capacity at push time.
    #[serde(default)]
    pub buffer_capacity: usize,
    /// Overscan margin baked into the payload, in pixels per side.
    #[serde(default)]
    pub overscan: u32,
    /// Capture-time center, normalized source x. Only set when `overscan > 0`.
    #[serde(default)]
    pub anchor_x: Option<f64>,
    /// Capture-time center, normalized source y. Only set when `overscan > 0`.
    #[serde(default)]
    pub anchor_y: Option<f64>,
    /// Encoded full-frame thumbnail for the nav window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nav_thumbnail: Option<Vec<u8>>,
}

impl FrameMetadata {
    /// Minimal metadata for callers that assemble frames themselves (piggyback injection).
    pub fn new(layer_id: LayerId, frame_id: u64, capture_time: Millis) -> Self {
        Self {
            layer_id,
            frame_id,
            acquire_time: capture_time,
            capture_time,
            filter_timings: Vec::new(),
            encode_start: capture_time,
            encode_end: capture_time,
            send_time: None,
            frame_bytes: 0,
            frame_width: 0,
            frame_height: 0,
            buffer_length: 0,
            buffer_capacity: 0,
            overscan: 0,
            anchor_x: None,
            anchor_y: None,
            nav_thumbnail: None,
        }
    }

    pub fn filter_total_ms(&self) -> Millis {
        self.filter_timings.iter().map(|t| t.duration_ms).sum()
    }

    /// Producer-side latency: capture through encode, plus the filter steps that ran before
    /// capture.
    pub fn producer_ms(&self) -> Millis {
        (self.encode_end - self.capture_time).max(0.0) + self.filter_total_ms()
    }

    /// Capture anchor when the frame carries overscan.
    pub fn anchor(&self) -> Option<(f64, f64)> {
        match (self.overscan, self.anchor_x, self.anchor_y) {
            (o, Some(x), Some(y)) if o > 0 => Some((x, y)),
            _ => None,
        }
    }
}

/// Encoded payload plus its metadata. Never mutated once handed to a consumer.
#[derive(Clone, Debug)]
pub struct EncodedFrame {
    payload: Arc<Vec<u8>>,
    metadata: FrameMetadata,
}

impl EncodedFrame {
    /// Wrap a payload, recording its size in the metadata.
    pub fn new(payload: Vec<u8>, mut metadata: FrameMetadata) -> Self {
        metadata.frame_bytes = payload.len();
        Self {
            payload: Arc::new(payload),
            metadata,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn shared_payload(&self) -> Arc<Vec<u8>> {
        Arc::clone(&self.payload)
    }

    pub fn metadata(&self) -> &FrameMetadata {
        &self.metadata
    }

    /// Copy of the metadata with `send_time` filled in. The frame itself is left untouched.
    pub fn metadata_sent_at(&self, send_time: Millis) -> FrameMetadata {
        let mut m = self.metadata.clone();
        m.send_time = Some(send_time);
        m
    }

    // Occupancy is only known under the buffer lock, which is where the frame is finalized.
    pub(crate) fn stamp_occupancy(&mut self, length: usize, capacity: usize) {
        self.metadata.buffer_length = length;
        self.metadata.buffer_capacity = capacity;
    }
}
