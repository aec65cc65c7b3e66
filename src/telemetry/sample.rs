use serde::{Deserialize, Serialize};

use crate::foundation::core::{LayerId, Millis};
use crate::pipeline::frame::{FilterTiming, FrameMetadata};

/// Default lower bound used when the cross-clock transport reading is unusable.
pub const DEFAULT_TRANSPORT_FLOOR_MS: Millis = 5.0;
/// Default upper bound beyond which a cross-clock reading is treated as skew.
pub const DEFAULT_TRANSPORT_CEILING_MS: Millis = 1000.0;

/// Bounds applied to the transport segment estimate.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportPolicy {
    /// Reported when the raw reading is negative, non-finite or below this value.
    #[serde(default = "default_floor")]
    pub floor_ms: Millis,
    /// Raw readings above this are treated as clock skew and replaced by the floor.
    #[serde(default = "default_ceiling")]
    pub ceiling_ms: Millis,
}

fn default_floor() -> Millis {
    DEFAULT_TRANSPORT_FLOOR_MS
}

fn default_ceiling() -> Millis {
    DEFAULT_TRANSPORT_CEILING_MS
}

impl Default for TransportPolicy {
    fn default() -> Self {
        Self {
            floor_ms: DEFAULT_TRANSPORT_FLOOR_MS,
            ceiling_ms: DEFAULT_TRANSPORT_CEILING_MS,
        }
    }
}

/// Transport segment of a sample.
///
/// `send_time` and `receive_time` come from different clocks, so any reading is an estimate.
/// Only injected (piggyback) frames have an exact transport of zero.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransportEstimate {
    /// Estimated duration.
    pub ms: Millis,
    /// `true` unless the value is known exactly.
    pub approximate: bool,
}

impl TransportEstimate {
    /// Exact zero, for frames that never crossed the transport.
    pub fn zero() -> Self {
        Self {
            ms: 0.0,
            approximate: false,
        }
    }

    /// Estimate from a send stamp (producer clock) and a receive stamp (compositor clock).
    ///
    /// The raw difference is kept when it lies within `[floor, ceiling]`; anything else,
    /// including a missing send stamp, reports the floor.
    pub fn estimate(send_time: Option<Millis>, receive_time: Millis, policy: TransportPolicy) -> Self {
        let ms = send_time
            .map(|sent| receive_time - sent)
            .filter(|raw| raw.is_finite() && *raw >= policy.floor_ms && *raw <= policy.ceiling_ms)
            .unwrap_or(policy.floor_ms);
        Self {
            ms,
            approximate: true,
        }
    }
}

/// Compositor-side timestamps for one frame, all on the compositor clock.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConsumerTimes {
    /// Update drained from the transport.
    pub receive_time: Millis,
    /// Decode started.
    pub decode_start: Millis,
    /// Decode finished.
    pub decode_end: Millis,
    /// Render pass that first drew the frame started.
    pub render_start: Millis,
    /// That render pass finished.
    pub render_end: Millis,
}

impl ConsumerTimes {
    pub fn consumer_ms(&self) -> Millis {
        (self.decode_end - self.decode_start).max(0.0) + (self.render_end - self.render_start).max(0.0)
    }
}

/// End-to-end timing of one displayed frame, split into segments.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimingSample {
    /// Layer.
    pub layer_id: LayerId,
    /// Frame id from the producer.
    pub frame_id: u64,
    /// `encode_end - capture_time` plus filter durations.
    pub producer_ms: Millis,
    /// Transport estimate.
    pub transport: TransportEstimate,
    /// `decode_end - decode_start` plus `render_end - render_start`.
    pub consumer_ms: Millis,
    /// Filter steps of this frame.
    pub filter_timings: Vec<FilterTiming>,
    /// Encoded size.
    pub frame_bytes: usize,
    /// Buffer occupancy at push time.
    pub buffer_length: usize,
    /// Buffer capacity at push time.
    pub buffer_capacity: usize,
    /// Render completion on the compositor clock.
    pub completed_at: Millis,
}

impl TimingSample {
    /// Assemble a sample from producer metadata and compositor timestamps.
    pub fn from_parts(metadata: &FrameMetadata, transport: TransportEstimate, times: ConsumerTimes) -> Self {
        Self {
            layer_id: metadata.layer_id.clone(),
            frame_id: metadata.frame_id,
            producer_ms: metadata.producer_ms(),
            transport,
            consumer_ms: times.consumer_ms(),
            filter_timings: metadata.filter_timings.clone(),
            frame_bytes: metadata.frame_bytes,
            buffer_length: metadata.buffer_length,
            buffer_capacity: metadata.buffer_capacity,
            completed_at: times.render_end,
        }
    }

    pub fn total_ms(&self) -> Millis {
        self.producer_ms + self.transport.ms + self.consumer_ms
    }
}

#[cfg(test)]
#[path = "../../tests/unit/telemetry/sample.rs"]
mod tests;
