//! Built-in synthetic capture source.
//
// Stands in for a real desktop capture backend: announces a handful of
// windows, then publishes procedurally drawn test-card frames at capture
// cadence. The producer and the pump run on their own threads so the render
// loop never sees the feed, only the store.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use frame_store::{
    capture_channel, pump_events, CaptureEvent, CapturedSurface, FrameStore, SurfaceConverter,
    WindowId,
};

const CAPTURE_HZ: f64 = 30.0;
const PUMP_INTERVAL: Duration = Duration::from_millis(2);

pub struct SyntheticFeed {
    stop: Arc<AtomicBool>,
    producer: Option<JoinHandle<()>>,
    pump: Option<JoinHandle<()>>,
}

impl SyntheticFeed {
    /// Start producing frames for `window_count` windows of the given extent
    /// and pumping them into `store`.
    pub fn start<C>(store: Arc<FrameStore<C>>, window_count: u32, width: u32, height: u32) -> Self
    where
        C: SurfaceConverter + Send + Sync + 'static,
        C::Frame: 'static,
    {
        let (tx, rx) = capture_channel();
        let stop = Arc::new(AtomicBool::new(false));

        let producer = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("capture-feed".into())
                .spawn(move || {
                    for id in 0..u64::from(window_count) {
                        let event = CaptureEvent::WindowAdded {
                            id,
                            title: format!("synthetic window {id}"),
                        };
                        if tx.send(event).is_err() {
                            return;
                        }
                    }

                    let period = Duration::from_secs_f64(1.0 / CAPTURE_HZ);
                    let started = Instant::now();
                    let mut tick = 0u64;
                    while !stop.load(Ordering::Relaxed) {
                        let timestamp = started.elapsed();
                        for id in 0..u64::from(window_count) {
                            let surface = test_card(id, tick, width, height, timestamp);
                            if tx.send(CaptureEvent::Frame { id, surface }).is_err() {
                                return;
                            }
                        }
                        tick += 1;
                        std::thread::sleep(period);
                    }
                })
                .expect("spawning capture feed thread")
        };

        let pump = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("feed-pump".into())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        pump_events(&store, &rx);
                        std::thread::sleep(PUMP_INTERVAL);
                    }
                    // Drain whatever the producer sent before it saw the flag.
                    pump_events(&store, &rx);
                })
                .expect("spawning feed pump thread")
        };

        Self {
            stop,
            producer: Some(producer),
            pump: Some(pump),
        }
    }

    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        for handle in [self.producer.take(), self.pump.take()].into_iter().flatten() {
            if handle.join().is_err() {
                tracing::error!("capture feed thread panicked");
            }
        }
    }
}

impl Drop for SyntheticFeed {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Draw one test-card frame: a per-window hue gradient with a sweeping bar
/// so motion is visible on the display.
fn test_card(id: WindowId, tick: u64, width: u32, height: u32, timestamp: Duration) -> CapturedSurface {
    let mut data = vec![0u8; (width * height * 4) as usize];
    let bar = ((tick * 4) % u64::from(width)) as u32;
    let base = ((id * 61) % 255) as u8;

    for y in 0..height {
        for x in 0..width {
            let offset = ((y * width + x) * 4) as usize;
            let in_bar = x.abs_diff(bar) < width / 32;
            data[offset] = if in_bar { 255 } else { base };
            data[offset + 1] = (x * 255 / width.max(1)) as u8;
            data[offset + 2] = (y * 255 / height.max(1)) as u8;
            data[offset + 3] = 255;
        }
    }

    CapturedSurface::new(width, height, data, timestamp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use frame_store::ConvertError;

    struct PassConverter;

    impl SurfaceConverter for PassConverter {
        type Frame = ();

        fn convert(&self, surface: &CapturedSurface) -> Result<(), ConvertError> {
            surface.validate()
        }
    }

    #[test]
    fn test_card_surfaces_are_valid() {
        let surface = test_card(3, 17, 64, 48, Duration::from_millis(10));
        assert!(surface.validate().is_ok());
        assert_eq!(surface.width, 64);
        assert_eq!(surface.height, 48);
    }

    #[test]
    fn test_feed_tracks_and_publishes() {
        let store = Arc::new(FrameStore::new(PassConverter));
        let feed = SyntheticFeed::start(Arc::clone(&store), 3, 16, 16);

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            let all_published =
                store.tracked_count() == 3 && (0..3).all(|id| store.snapshot(id).is_some());
            if all_published {
                break;
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(store.tracked_count(), 3);
        for id in 0..3 {
            assert!(store.snapshot(id).is_some(), "window {id} has no frame");
        }
        feed.shutdown();
    }
}
