/// Fixed-capacity ring buffer backed by a preallocated arena and a write index.
///
/// Pushing into a full ring overwrites the oldest slot. Memory never grows past `capacity`.
#[derive(Clone, Debug)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    // Index of the next write.
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// Create a ring with room for `capacity` items (clamped to at least 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            slots,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append an item, returning the evicted oldest item when the ring was full.
    pub fn push(&mut self, value: T) -> Option<T> {
        let cap = self.capacity();
        let evicted = self.slots[self.head].replace(value);
        self.head = (self.head + 1) % cap;
        if self.len < cap {
            self.len += 1;
        }
        evicted
    }

    /// Drop all items, keeping the arena.
    pub fn clear(&mut self) {
        for s in &mut self.slots {
            *s = None;
        }
        self.head = 0;
        self.len = 0;
    }

    fn start(&self) -> usize {
        let cap = self.capacity();
        (self.head + cap - self.len) % cap
    }

    /// Oldest retained item.
    pub fn first(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        self.slots[self.start()].as_ref()
    }

    /// Newest retained item.
    pub fn last(&self) -> Option<&T> {
        if self.len == 0 {
            return None;
        }
        let cap = self.capacity();
        self.slots[(self.head + cap - 1) % cap].as_ref()
    }

    /// Iterate from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let cap = self.capacity();
        let start = self.start();
        (0..self.len).filter_map(move |i| self.slots[(start + i) % cap].as_ref())
    }
}

/// Sliding window of event timestamps used for rate estimates (FPS).
#[derive(Clone, Debug)]
pub struct RateWindow {
    stamps: RingBuffer<f64>,
}

impl RateWindow {
    /// Window retaining the last `capacity` timestamps.
    pub fn new(capacity: usize) -> Self {
        Self {
            stamps: RingBuffer::new(capacity.max(2)),
        }
    }

    /// Record an event at `now_ms`.
    pub fn record(&mut self, now_ms: f64) {
        self.stamps.push(now_ms);
    }

    /// Events per second across the window; `0.0` with fewer than two events.
    pub fn per_second(&self) -> f64 {
        let (Some(first), Some(last)) = (self.stamps.first(), self.stamps.last()) else {
            return 0.0;
        };
        let span_ms = last - first;
        if self.stamps.len() < 2 || span_ms <= 0.0 {
            return 0.0;
        }
        (self.stamps.len() - 1) as f64 * 1000.0 / span_ms
    }

    pub fn len(&self) -> usize {
        self.stamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stamps.is_empty()
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/ring.rs"]
mod tests;
