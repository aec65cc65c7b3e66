use std::collections::HashMap;
use std::sync::Arc;

use crate::foundation::clock::Clock;
use crate::foundation::core::LayerId;
use crate::pipeline::buffer::FrameBuffer;
use crate::transport::protocol::{FrameRequest, FrameUpdate};

/// Counters for the producer-side responder.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServerStats {
    /// Requests received.
    pub requests: u64,
    /// Updates sent.
    pub updates: u64,
    /// Requests parked because the buffer was empty.
    pub parked: u64,
    /// Requests for layers that are not registered.
    pub unknown_layer: u64,
}

struct ServedLayer {
    buffer: Arc<FrameBuffer>,
    // A request arrived while the buffer was empty.
    waiting: bool,
}

/// Producer-side responder: answers `frame-request`s out of each layer's FrameBuffer.
///
/// A request that finds the buffer empty is parked and answered as soon as the producer
/// reports a new frame through [`FrameServer::on_frame_ready`].
pub struct FrameServer {
    layers: HashMap<LayerId, ServedLayer>,
    clock: Arc<dyn Clock>,
    stats: ServerStats,
}

impl std::fmt::Debug for FrameServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameServer")
            .field("layers", &self.layers.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl FrameServer {
    /// Responder stamping `send_time` from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            layers: HashMap::new(),
            clock,
            stats: ServerStats::default(),
        }
    }

    /// Serve a layer from `buffer`, replacing any previous registration.
    pub fn register(&mut self, buffer: Arc<FrameBuffer>) {
        let id = buffer.layer_id().clone();
        self.layers.insert(
            id,
            ServedLayer {
                buffer,
                waiting: false,
            },
        );
    }

    /// Stop serving a layer. Returns `false` if it was not registered.
    pub fn unregister(&mut self, layer_id: &LayerId) -> bool {
        self.layers.remove(layer_id).is_some()
    }

    /// Whether a layer is registered.
    pub fn is_registered(&self, layer_id: &LayerId) -> bool {
        self.layers.contains_key(layer_id)
    }

    pub fn stats(&self) -> ServerStats {
        self.stats
    }

    /// Answer a request from the buffer, or park it until the next frame.
    pub fn handle_request(&mut self, request: &FrameRequest) -> Option<FrameUpdate> {
        self.stats.requests += 1;
        let Some(layer) = self.layers.get_mut(&request.layer_id) else {
            self.stats.unknown_layer += 1;
            tracing::debug!(layer = %request.layer_id, "request for unregistered layer ignored");
            return None;
        };
        match layer.buffer.pop_front() {
            Some(frame) => {
                layer.waiting = false;
                self.stats.updates += 1;
                Some(FrameUpdate::from_frame(&frame, self.clock.now_ms()))
            }
            None => {
                layer.waiting = true;
                self.stats.parked += 1;
                None
            }
        }
    }

    /// A producer pushed a frame; answer a parked request for that layer if there is one.
    pub fn on_frame_ready(&mut self, layer_id: &LayerId) -> Option<FrameUpdate> {
        let layer = self.layers.get_mut(layer_id)?;
        if !layer.waiting {
            return None;
        }
        let frame = layer.buffer.pop_front()?;
        layer.waiting = false;
        self.stats.updates += 1;
        Some(FrameUpdate::from_frame(&frame, self.clock.now_ms()))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/transport/server.rs"]
mod tests;
