//! Logical wire contract between producers and the compositor.
//!
//! Messages derive serde so any encoding can carry them; none is prescribed here.

use serde::{Deserialize, Serialize};

use crate::foundation::core::LayerId;
use crate::pipeline::frame::{EncodedFrame, FrameMetadata};

/// Compositor asks for the next frame of a layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameRequest {
    /// Target layer.
    pub layer_id: LayerId,
}

/// Producer answers a request with one encoded frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrameUpdate {
    /// Layer the frame belongs to.
    pub layer_id: LayerId,
    /// Encoded image bytes.
    pub payload: Vec<u8>,
    /// Metadata with `send_time` stamped.
    pub metadata: FrameMetadata,
}

impl FrameUpdate {
    /// Update for `frame`, stamped as sent at `send_time` on the producer clock.
    pub fn from_frame(frame: &EncodedFrame, send_time: f64) -> Self {
        let metadata = frame.metadata_sent_at(send_time);
        Self {
            layer_id: metadata.layer_id.clone(),
            payload: frame.payload().to_vec(),
            metadata,
        }
    }
}

/// Caller pushes a frame for a piggyback layer, bypassing request/response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InjectFrame {
    /// Target piggyback layer.
    pub layer_id: LayerId,
    /// Encoded image bytes.
    pub payload: Vec<u8>,
    /// Caller-assembled metadata.
    pub metadata: FrameMetadata,
}

/// Committed viewport, consumed by producers for server-side cropping.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ViewportEvent {
    /// Left edge, normalized.
    pub x: f64,
    /// Top edge, normalized.
    pub y: f64,
    /// `1 / zoom`.
    pub width: f64,
    /// `1 / zoom`.
    pub height: f64,
    /// Zoom factor.
    pub zoom: f64,
}

impl Default for ViewportEvent {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
            zoom: 1.0,
        }
    }
}

/// Messages flowing from compositor to producer side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    /// `frame-request`
    FrameRequest(FrameRequest),
    /// `inject-frame`
    InjectFrame(InjectFrame),
    /// `viewport`
    Viewport(ViewportEvent),
}

/// Messages flowing from producer side to compositor.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    /// `frame-update`
    FrameUpdate(FrameUpdate),
}
