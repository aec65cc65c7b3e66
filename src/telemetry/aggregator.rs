use std::collections::BTreeMap;

use serde::Serialize;

use crate::foundation::core::{LayerId, Millis};
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::foundation::ring::RingBuffer;
use crate::telemetry::sample::TimingSample;

/// Default rolling window length, in samples.
pub const DEFAULT_WINDOW: usize = 30;

/// Average duration of one named filter across the window.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FilterAverage {
    /// Filter name.
    pub name: String,
    /// Mean duration over the samples that ran it.
    pub avg_ms: Millis,
}

/// Rolling statistics of one layer.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LayerTelemetry {
    /// Layer.
    pub layer_id: LayerId,
    /// Samples currently in the window.
    pub samples: usize,
    /// Frames recorded since the layer was added.
    pub frames: u64,
    /// Mean producer segment.
    pub avg_producer_ms: Millis,
    /// Mean transport segment.
    pub avg_transport_ms: Millis,
    /// Whether any transport value in the window is an estimate.
    pub transport_approximate: bool,
    /// Mean consumer segment.
    pub avg_consumer_ms: Millis,
    /// Mean end-to-end latency.
    pub avg_total_ms: Millis,
    /// Per-filter means, in first-seen order.
    pub filters: Vec<FilterAverage>,
    /// Bytes in the window divided by the window span.
    pub bandwidth_bytes_per_sec: f64,
    /// Bytes recorded since the layer was added.
    pub total_bytes: u64,
    /// Buffer occupancy of the latest frame.
    pub buffer_length: usize,
    /// Buffer capacity of the latest frame.
    pub buffer_capacity: usize,
    /// Id of the latest frame.
    pub last_frame_id: u64,
}

/// Every layer's statistics, for an external metrics panel.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TelemetryReport {
    /// Window length in samples.
    pub window: usize,
    /// Per-layer statistics, ordered by layer id.
    pub layers: Vec<LayerTelemetry>,
}

impl TelemetryReport {
    /// Pretty JSON rendering.
    pub fn to_json_pretty(&self) -> StreamViewResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| StreamViewError::serde(format!("telemetry report: {e}")))
    }
}

#[derive(Debug)]
struct LayerWindow {
    samples: RingBuffer<TimingSample>,
    frames: u64,
    total_bytes: u64,
}

/// Rolling per-layer latency, bandwidth and buffer statistics.
///
/// Each layer keeps a fixed-capacity window, so memory is bounded by layers times window and
/// every computation is linear in the window.
#[derive(Debug)]
pub struct TelemetryAggregator {
    window: usize,
    layers: BTreeMap<LayerId, LayerWindow>,
}

impl Default for TelemetryAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl TelemetryAggregator {
    /// Aggregator keeping `window` samples per layer (at least 1).
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            layers: BTreeMap::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Record one completed frame.
    pub fn record(&mut self, sample: TimingSample) {
        let window = self.window;
        let entry = self
            .layers
            .entry(sample.layer_id.clone())
            .or_insert_with(|| LayerWindow {
                samples: RingBuffer::new(window),
                frames: 0,
                total_bytes: 0,
            });
        entry.frames += 1;
        entry.total_bytes += sample.frame_bytes as u64;
        entry.samples.push(sample);
    }

    /// Drop a layer's history.
    pub fn remove(&mut self, layer_id: &LayerId) {
        self.layers.remove(layer_id);
    }

    /// Statistics of one layer, `None` before its first sample.
    pub fn snapshot(&self, layer_id: &LayerId) -> Option<LayerTelemetry> {
        self.layers
            .get(layer_id)
            .and_then(|w| summarize(layer_id, w))
    }

    /// Statistics of every layer.
    pub fn report(&self) -> TelemetryReport {
        TelemetryReport {
            window: self.window,
            layers: self
                .layers
                .iter()
                .filter_map(|(id, w)| summarize(id, w))
                .collect(),
        }
    }
}

fn summarize(layer_id: &LayerId, w: &LayerWindow) -> Option<LayerTelemetry> {
    let last = w.samples.last()?;
    let n = w.samples.len() as f64;

    let mut producer = 0.0;
    let mut transport = 0.0;
    let mut consumer = 0.0;
    let mut approximate = false;
    let mut bytes = 0u64;
    let mut filters: Vec<(String, Millis, u32)> = Vec::new();
    for s in w.samples.iter() {
        producer += s.producer_ms;
        transport += s.transport.ms;
        consumer += s.consumer_ms;
        approximate |= s.transport.approximate;
        bytes += s.frame_bytes as u64;
        for t in &s.filter_timings {
            match filters.iter_mut().find(|(name, _, _)| *name == t.name) {
                Some(f) => {
                    f.1 += t.duration_ms;
                    f.2 += 1;
                }
                None => filters.push((t.name.clone(), t.duration_ms, 1)),
            }
        }
    }

    let span_ms = w
        .samples
        .first()
        .map_or(0.0, |first| last.completed_at - first.completed_at);
    let bandwidth_bytes_per_sec = if span_ms > 0.0 {
        bytes as f64 * 1000.0 / span_ms
    } else {
        0.0
    };

    let (avg_producer_ms, avg_transport_ms, avg_consumer_ms) =
        (producer / n, transport / n, consumer / n);
    Some(LayerTelemetry {
        layer_id: layer_id.clone(),
        samples: w.samples.len(),
        frames: w.frames,
        avg_producer_ms,
        avg_transport_ms,
        transport_approximate: approximate,
        avg_consumer_ms,
        avg_total_ms: avg_producer_ms + avg_transport_ms + avg_consumer_ms,
        filters: filters
            .into_iter()
            .map(|(name, sum, count)| FilterAverage {
                name,
                avg_ms: sum / f64::from(count),
            })
            .collect(),
        bandwidth_bytes_per_sec,
        total_bytes: w.total_bytes,
        buffer_length: last.buffer_length,
        buffer_capacity: last.buffer_capacity,
        last_frame_id: last.frame_id,
    })
}

#[cfg(test)]
#[path = "../../tests/unit/telemetry/aggregator.rs"]
mod tests;
