//! Observable application status.
//
// A UI layer would subscribe to this; here a reporter thread logs the same
// snapshot periodically so a headless run stays inspectable.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use arrangement::{SharedMode, WindowArrangement};
use frame_store::{FrameStore, SurfaceConverter, WindowSummary};
use session::{SessionLifecycle, SessionState};

#[derive(Debug, Clone)]
pub struct StatusSnapshot {
    pub session: SessionState,
    pub mode: WindowArrangement,
    pub windows: Vec<WindowSummary>,
}

pub fn snapshot<C: SurfaceConverter>(
    store: &FrameStore<C>,
    mode: &SharedMode,
    lifecycle: &SessionLifecycle,
) -> StatusSnapshot {
    StatusSnapshot {
        session: lifecycle.state(),
        mode: mode.get(),
        windows: store.overview(),
    }
}

pub struct StatusReporter {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl StatusReporter {
    pub fn spawn<C>(
        store: Arc<FrameStore<C>>,
        mode: SharedMode,
        lifecycle: SessionLifecycle,
        interval: Duration,
    ) -> Self
    where
        C: SurfaceConverter + Send + Sync + 'static,
        C::Frame: 'static,
    {
        let stop = Arc::new(AtomicBool::new(false));
        let handle = {
            let stop = Arc::clone(&stop);
            std::thread::Builder::new()
                .name("status-reporter".into())
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let status = snapshot(&store, &mode, &lifecycle);
                        let with_frames =
                            status.windows.iter().filter(|w| w.has_frame).count();
                        tracing::info!(
                            session = status.session.as_str(),
                            mode = status.mode.as_str(),
                            windows = status.windows.len(),
                            with_frames,
                            "status"
                        );
                        std::thread::sleep(interval);
                    }
                })
                .expect("spawning status reporter thread")
        };
        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn shutdown(mut self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                tracing::error!("status reporter thread panicked");
            }
        }
    }
}

impl Drop for StatusReporter {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}
