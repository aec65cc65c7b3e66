//! Per-frame timing samples and their rolling per-layer aggregation.

pub mod aggregator;
pub mod sample;

pub use aggregator::{FilterAverage, LayerTelemetry, TelemetryAggregator, TelemetryReport};
pub use sample::{ConsumerTimes, TimingSample, TransportEstimate, TransportPolicy};
