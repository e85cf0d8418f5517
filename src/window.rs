use std::sync::atomic::{AtomicI32, Ordering};

/// Per-stream send window.
///
/// This can go negative: the peer may shrink the initial window via
/// SETTINGS after data has been queued, and the drain path only checks
/// the sign before producing a chunk.
#[derive(Debug)]
pub(crate) struct Window(AtomicI32);

impl Window {
    pub(crate) fn new(sz: i32) -> Window {
        Window(AtomicI32::new(sz))
    }

    pub(crate) fn size(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }

    /// Applies a delta and returns the new size. Positive deltas come
    /// from peer WINDOW_UPDATE frames, negative ones from sent payload.
    pub(crate) fn add(&self, delta: i32) -> i32 {
        let old = self.0.fetch_add(delta, Ordering::AcqRel);
        let new = old + delta;
        log::trace!("window update; delta={} old={} new={}", delta, old, new);
        new
    }
}
