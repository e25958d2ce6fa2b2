//! Deferred release of per-frame resources.
//!
//! A frame snapshot handed to the renderer may still be referenced by
//! commands the GPU has not executed. Resources retired for frame N are
//! therefore held until `depth` newer frames have been retired, at which
//! point the GPU can no longer be reading them.

use std::collections::VecDeque;

/// Holds retired resources for a bounded number of in-flight frames.
pub struct ReleasePool<R> {
    depth: usize,
    in_flight: VecDeque<(u64, Vec<R>)>,
}

impl<R> ReleasePool<R> {
    /// `depth` is the number of frames that may be in flight at once;
    /// resources survive at least that many `retire` calls.
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            in_flight: VecDeque::new(),
        }
    }

    /// Park `resources` as belonging to `frame_index`, dropping anything
    /// that has fallen out of the in-flight window.
    pub fn retire(&mut self, frame_index: u64, resources: Vec<R>) {
        self.in_flight.push_back((frame_index, resources));
        while self.in_flight.len() > self.depth {
            let (released, _) = match self.in_flight.pop_front() {
                Some(entry) => (entry.0, entry.1),
                None => break,
            };
            tracing::trace!(frame_index = released, "released frame resources");
        }
    }

    /// Drop everything still parked. Only safe once the device is idle,
    /// e.g. after the render loop has exited.
    pub fn drain(&mut self) {
        self.in_flight.clear();
    }

    pub fn pending_frames(&self) -> usize {
        self.in_flight.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn handle(strong: &Arc<()>) -> Arc<()> {
        Arc::clone(strong)
    }

    #[test]
    fn test_resources_survive_in_flight_window() {
        let frame = Arc::new(());
        let mut pool = ReleasePool::new(2);

        pool.retire(0, vec![handle(&frame)]);
        pool.retire(1, vec![handle(&frame)]);
        assert_eq!(Arc::strong_count(&frame), 3);

        // Frame 2 pushes frame 0 out of the window.
        pool.retire(2, vec![handle(&frame)]);
        assert_eq!(Arc::strong_count(&frame), 3);
        assert_eq!(pool.pending_frames(), 2);
    }

    #[test]
    fn test_drain_drops_everything() {
        let frame = Arc::new(());
        let mut pool = ReleasePool::new(3);
        pool.retire(0, vec![handle(&frame), handle(&frame)]);
        pool.retire(1, vec![handle(&frame)]);

        pool.drain();
        assert_eq!(Arc::strong_count(&frame), 1);
        assert_eq!(pool.pending_frames(), 0);
    }

    #[test]
    fn test_zero_depth_clamped_to_one() {
        let frame = Arc::new(());
        let mut pool = ReleasePool::new(0);
        pool.retire(0, vec![handle(&frame)]);
        // Depth 1: the most recent frame is always held.
        assert_eq!(Arc::strong_count(&frame), 2);
        pool.retire(1, vec![handle(&frame)]);
        assert_eq!(Arc::strong_count(&frame), 2);
    }

    #[test]
    fn test_empty_retire_still_advances_window() {
        let frame = Arc::new(());
        let mut pool = ReleasePool::new(1);
        pool.retire(0, vec![handle(&frame)]);
        pool.retire(1, Vec::new());
        assert_eq!(Arc::strong_count(&frame), 1);
    }
}
