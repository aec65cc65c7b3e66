use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::foundation::core::LayerId;
use crate::foundation::error::{StreamViewError, StreamViewResult};
use crate::pipeline::frame::EncodedFrame;

/// Lifetime counters for one buffer.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BufferStats {
    /// Frames accepted by `push`.
    pub pushed: u64,
    /// Frames handed to the responder.
    pub popped: u64,
    /// Frames evicted by drop-oldest backpressure.
    pub dropped: u64,
    /// Frames discarded by `flush`.
    pub flushed: u64,
}

/// Result of a single push.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PushOutcome {
    /// Id of the frame evicted to make room, if the buffer was full.
    pub dropped_frame_id: Option<u64>,
    /// Occupancy after the push.
    pub length: usize,
}

struct BufferInner {
    frames: VecDeque<EncodedFrame>,
    stats: BufferStats,
}

/// Bounded FIFO of encoded frames for one layer.
///
/// Backpressure policy: pushing into a full buffer evicts the *oldest* frame, so the producer
/// never blocks on a slow consumer. Evictions are counted in [`BufferStats::dropped`].
///
/// One producer thread pushes and one responder pops; the mutex only guards those two sides.
pub struct FrameBuffer {
    layer_id: LayerId,
    capacity: usize,
    inner: Mutex<BufferInner>,
}

impl std::fmt::Debug for FrameBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameBuffer")
            .field("layer_id", &self.layer_id)
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}

impl FrameBuffer {
    /// Create an empty buffer. `capacity` must be at least 1.
    pub fn new(layer_id: LayerId, capacity: usize) -> StreamViewResult<Self> {
        if capacity == 0 {
            return Err(StreamViewError::config(format!(
                "layer '{layer_id}': buffer capacity must be >= 1"
            )));
        }
        Ok(Self {
            layer_id,
            capacity,
            inner: Mutex::new(BufferInner {
                frames: VecDeque::with_capacity(capacity),
                stats: BufferStats::default(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BufferInner> {
        // A panicking holder cannot leave the deque half-updated, so poisoning is ignored.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn layer_id(&self) -> &LayerId {
        &self.layer_id
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.lock().frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append a frame, evicting the oldest one when full.
    ///
    /// The frame's `buffer_length`/`buffer_capacity` metadata is stamped with the occupancy
    /// after this push.
    pub fn push(&self, mut frame: EncodedFrame) -> PushOutcome {
        let mut inner = self.lock();
        let mut dropped_frame_id = None;
        if inner.frames.len() >= self.capacity
            && let Some(old) = inner.frames.pop_front()
        {
            inner.stats.dropped += 1;
            dropped_frame_id = Some(old.metadata().frame_id);
        }
        let length = inner.frames.len() + 1;
        frame.stamp_occupancy(length, self.capacity);
        inner.frames.push_back(frame);
        inner.stats.pushed += 1;
        if let Some(id) = dropped_frame_id {
            tracing::debug!(layer = %self.layer_id, dropped_frame_id = id, "buffer full, dropped oldest frame");
        }
        PushOutcome {
            dropped_frame_id,
            length,
        }
    }

    /// Take the oldest waiting frame.
    pub fn pop_front(&self) -> Option<EncodedFrame> {
        let mut inner = self.lock();
        let frame = inner.frames.pop_front();
        if frame.is_some() {
            inner.stats.popped += 1;
        }
        frame
    }

    /// Discard every waiting frame, returning how many were dropped.
    pub fn flush(&self) -> usize {
        let mut inner = self.lock();
        let n = inner.frames.len();
        inner.frames.clear();
        inner.stats.flushed += n as u64;
        n
    }

    /// Ids of waiting frames, oldest first.
    pub fn frame_ids(&self) -> Vec<u64> {
        self.lock()
            .frames
            .iter()
            .map(|f| f.metadata().frame_id)
            .collect()
    }

    pub fn stats(&self) -> BufferStats {
        self.lock().stats
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pipeline/buffer.rs"]
mod tests;
