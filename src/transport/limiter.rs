use std::collections::HashMap;

use crate::foundation::core::{LayerId, Millis};

/// Fraction of a layer's frame interval that must separate two requests.
pub const MIN_REQUEST_SPACING: f64 = 0.5;

/// Hard per-layer request rate limit, independent of how fast the producer answers.
///
/// A request for a layer is admitted only if at least `frame_interval * 0.5` has elapsed since
/// the previously admitted request for that layer.
#[derive(Debug, Default, Clone)]
pub struct RequestLimiter {
    last_admitted: HashMap<LayerId, Millis>,
    rejected: u64,
}

impl RequestLimiter {
    /// Empty limiter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit or reject a request at `now_ms`. Admission records `now_ms`.
    pub fn try_acquire(&mut self, layer_id: &LayerId, now_ms: Millis, frame_interval_ms: Millis) -> bool {
        let min_gap = frame_interval_ms * MIN_REQUEST_SPACING;
        if let Some(&last) = self.last_admitted.get(layer_id)
            && now_ms - last < min_gap
        {
            self.rejected += 1;
            return false;
        }
        self.last_admitted.insert(layer_id.clone(), now_ms);
        true
    }

    /// Time of the last admitted request.
    pub fn last_request(&self, layer_id: &LayerId) -> Option<Millis> {
        self.last_admitted.get(layer_id).copied()
    }

    /// Forget a removed layer.
    pub fn forget(&mut self, layer_id: &LayerId) {
        self.last_admitted.remove(layer_id);
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }
}
