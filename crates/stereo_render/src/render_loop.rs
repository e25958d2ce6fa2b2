//! Deadline-driven stereo render loop.
//!
//! One iteration per display frame: claim the next deadline, lay out the
//! tracked windows, snapshot their latest frames, composite both eyes, hand
//! the resolved frame back. `wait_frame` is the only blocking point;
//! everything else reads already-published state.

use anyhow::{Context, Result};
use glam::Mat4;
use std::sync::Arc;
use std::time::Instant;

use arrangement::{layout, SharedMode, WindowArrangement};
use frame_store::{FrameStore, SurfaceConverter, WindowId};
use session::SessionLifecycle;

use crate::display::{DisplaySession, SubmittedFrame};
use crate::release::ReleasePool;
use crate::renderer::Compositor;
use crate::timing::{RenderTiming, RenderTimingStats};

/// One window quad to composite this frame. The `Arc` keeps the frame's
/// texture alive until the release pool lets go of it.
pub struct WindowDraw<F> {
    pub window_id: WindowId,
    pub frame: Arc<F>,
    pub model: Mat4,
}

/// Gather draws for the current frame: tracked windows in tracking order,
/// placed by the active arrangement, skipping windows that have not yet
/// published a frame. Window set and placement stay fixed for the whole
/// frame even while the capture side keeps tracking and publishing.
pub fn select_draws<C: SurfaceConverter>(
    store: &FrameStore<C>,
    mode: WindowArrangement,
) -> Vec<WindowDraw<C::Frame>> {
    let ids = store.tracked_ids();
    layout(&ids, mode)
        .into_iter()
        .filter_map(|(window_id, transform)| {
            let snapshot = store.snapshot(window_id)?;
            Some(WindowDraw {
                window_id,
                frame: snapshot.frame,
                model: transform.matrix(),
            })
        })
        .collect()
}

/// Why the loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// The display session reported termination.
    DisplayEnded,
    /// The local session lifecycle left the open state.
    SessionClosed,
}

/// Summary of a completed loop run.
#[derive(Debug, Clone)]
pub struct LoopReport {
    pub exit: LoopExit,
    pub frames_rendered: u64,
    pub timing: Option<RenderTimingStats>,
}

/// Owns one open session's rendering: the display connection, the
/// compositor and the per-frame resource bookkeeping. Built when a session
/// opens, dropped when it closes.
pub struct StereoRenderLoop<S, R>
where
    R: Compositor,
    S: DisplaySession<EyeImage = R::EyeImage>,
{
    session: S,
    renderer: R,
    release: ReleasePool<Arc<R::Frame>>,
    timing: RenderTiming,
    last_frame_index: Option<u64>,
}

impl<S, R> StereoRenderLoop<S, R>
where
    R: Compositor,
    S: DisplaySession<EyeImage = R::EyeImage>,
{
    pub fn new(session: S, renderer: R) -> Self {
        let depth = renderer.frames_in_flight();
        let budget = session.frame_budget();
        Self {
            session,
            renderer,
            release: ReleasePool::new(depth),
            timing: RenderTiming::new(budget),
            last_frame_index: None,
        }
    }

    /// Drive the loop until the display ends the session or the local
    /// lifecycle closes it. Either way the loop exits cleanly; a remote
    /// termination is reported to the lifecycle before returning.
    pub fn run<C>(
        &mut self,
        store: &FrameStore<C>,
        mode: &SharedMode,
        lifecycle: &SessionLifecycle,
    ) -> Result<LoopReport>
    where
        C: SurfaceConverter<Frame = R::Frame>,
    {
        let mut frames_rendered = 0u64;

        let exit = loop {
            if !lifecycle.is_open() {
                tracing::info!(frames_rendered, "session closed, stopping render loop");
                break LoopExit::SessionClosed;
            }

            let request = match self.session.wait_frame() {
                Ok(request) => request,
                Err(_) => {
                    tracing::info!(frames_rendered, "display ended the session");
                    lifecycle.remote_terminated();
                    break LoopExit::DisplayEnded;
                }
            };
            let started = Instant::now();

            if let Some(last) = self.last_frame_index {
                debug_assert!(
                    request.frame_index > last,
                    "frame index went backwards: {} after {last}",
                    request.frame_index
                );
            }
            self.last_frame_index = Some(request.frame_index);

            let draws = select_draws(store, mode.get());
            self.renderer
                .render(&draws, &request.eyes)
                .context("compositing stereo frame")?;

            // The GPU may still read these textures; park them until enough
            // newer frames have retired.
            self.release.retire(
                request.frame_index,
                draws.into_iter().map(|draw| draw.frame).collect(),
            );

            let render_units = self.timing.record(started.elapsed());
            self.session.submit(
                SubmittedFrame {
                    frame_index: request.frame_index,
                    render_units,
                },
                [self.renderer.resolved_eye(0), self.renderer.resolved_eye(1)],
            );
            frames_rendered += 1;
        };

        self.release.drain();
        Ok(LoopReport {
            exit,
            frames_rendered,
            timing: self.timing.stats(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::display::{EyeView, FrameRequest, SessionEnded};
    use frame_store::{CapturedSurface, ConvertError};
    use std::sync::Mutex;
    use std::time::Duration;

    struct ExtentConverter;

    impl SurfaceConverter for ExtentConverter {
        type Frame = (u32, u32);

        fn convert(&self, surface: &CapturedSurface) -> Result<Self::Frame, ConvertError> {
            surface.validate()?;
            Ok((surface.width, surface.height))
        }
    }

    fn surface_at(ms: u64) -> CapturedSurface {
        CapturedSurface::new(2, 2, vec![0u8; 16], Duration::from_millis(ms))
    }

    /// Records draw counts per frame; eye images are plain labels.
    struct RecordingCompositor {
        draw_counts: Arc<Mutex<Vec<usize>>>,
        eyes: [&'static str; 2],
    }

    impl RecordingCompositor {
        fn new() -> (Self, Arc<Mutex<Vec<usize>>>) {
            let draw_counts = Arc::new(Mutex::new(Vec::new()));
            let compositor = Self {
                draw_counts: Arc::clone(&draw_counts),
                eyes: ["left", "right"],
            };
            (compositor, draw_counts)
        }
    }

    impl Compositor for RecordingCompositor {
        type Frame = (u32, u32);
        type EyeImage = &'static str;

        fn render(&mut self, draws: &[WindowDraw<(u32, u32)>], _eyes: &[EyeView; 2]) -> Result<()> {
            self.draw_counts.lock().unwrap().push(draws.len());
            Ok(())
        }

        fn resolved_eye(&self, eye: usize) -> &&'static str {
            &self.eyes[eye]
        }

        fn frames_in_flight(&self) -> usize {
            2
        }
    }

    /// Hands out a fixed number of frame deadlines, then terminates.
    struct ScriptedSession {
        frames_left: u64,
        next_index: u64,
        submitted: Arc<Mutex<Vec<(u64, &'static str, &'static str)>>>,
    }

    impl ScriptedSession {
        fn new(frames: u64) -> (Self, Arc<Mutex<Vec<(u64, &'static str, &'static str)>>>) {
            let submitted = Arc::new(Mutex::new(Vec::new()));
            let session = Self {
                frames_left: frames,
                next_index: 0,
                submitted: Arc::clone(&submitted),
            };
            (session, submitted)
        }
    }

    impl DisplaySession for ScriptedSession {
        type EyeImage = &'static str;

        fn wait_frame(&mut self) -> Result<FrameRequest, SessionEnded> {
            if self.frames_left == 0 {
                return Err(SessionEnded);
            }
            self.frames_left -= 1;
            let request = FrameRequest {
                frame_index: self.next_index,
                deadline: Instant::now(),
                eyes: [EyeView {
                    view: Mat4::IDENTITY,
                    proj: Mat4::IDENTITY,
                }; 2],
            };
            self.next_index += 1;
            Ok(request)
        }

        fn submit(&mut self, frame: SubmittedFrame, eyes: [&&'static str; 2]) {
            self.submitted
                .lock()
                .unwrap()
                .push((frame.frame_index, *eyes[0], *eyes[1]));
        }

        fn frame_budget(&self) -> Duration {
            Duration::from_millis(11)
        }
    }

    fn open_lifecycle() -> SessionLifecycle {
        let lifecycle = SessionLifecycle::new();
        let _ = lifecycle.request_connect();
        let _ = lifecycle.complete_connect(session::ConnectOutcome::Opened);
        lifecycle
    }

    #[test]
    fn test_select_draws_skips_windows_without_frames() {
        let store = FrameStore::new(ExtentConverter);
        store.track(1, "ready");
        store.track(2, "pending");
        store.publish(1, &surface_at(10));

        let draws = select_draws(&store, WindowArrangement::Grid);
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].window_id, 1);
    }

    #[test]
    fn test_select_draws_placement_matches_layout() {
        let store = FrameStore::new(ExtentConverter);
        store.track(5, "a");
        store.track(9, "b");
        store.publish(5, &surface_at(1));
        store.publish(9, &surface_at(1));

        let draws = select_draws(&store, WindowArrangement::Curved);
        let placements = layout(&[5, 9], WindowArrangement::Curved);

        assert_eq!(draws.len(), 2);
        for (draw, (id, transform)) in draws.iter().zip(&placements) {
            assert_eq!(draw.window_id, *id);
            assert_eq!(draw.model, transform.matrix());
        }
    }

    #[test]
    fn test_select_draws_empty_store() {
        let store = FrameStore::new(ExtentConverter);
        assert!(select_draws(&store, WindowArrangement::Stack).is_empty());
    }

    #[test]
    fn test_select_draws_holds_frame_alive() {
        let store = FrameStore::new(ExtentConverter);
        store.track(1, "one");
        store.publish(1, &surface_at(10));

        let draws = select_draws(&store, WindowArrangement::Grid);
        store.untrack(1);

        // The draw's Arc outlives the store entry.
        assert_eq!(*draws[0].frame, (2, 2));
    }

    #[test]
    fn test_loop_submits_resolved_eye_images_per_frame() {
        let store = FrameStore::new(ExtentConverter);
        store.track(1, "ready");
        store.track(2, "pending");
        store.publish(1, &surface_at(10));

        let (session, submitted) = ScriptedSession::new(3);
        let (compositor, draw_counts) = RecordingCompositor::new();
        let lifecycle = open_lifecycle();
        let mode = SharedMode::default();

        let mut render_loop = StereoRenderLoop::new(session, compositor);
        let report = render_loop.run(&store, &mode, &lifecycle).unwrap();

        assert_eq!(report.exit, LoopExit::DisplayEnded);
        assert_eq!(report.frames_rendered, 3);
        // Every frame composited the one published window and handed both
        // resolved eye images to the display, in frame order.
        assert_eq!(*draw_counts.lock().unwrap(), vec![1, 1, 1]);
        assert_eq!(
            *submitted.lock().unwrap(),
            vec![(0, "left", "right"), (1, "left", "right"), (2, "left", "right")]
        );
    }

    #[test]
    fn test_loop_reports_remote_termination_to_lifecycle() {
        let store = FrameStore::new(ExtentConverter);
        let (session, _) = ScriptedSession::new(1);
        let (compositor, _) = RecordingCompositor::new();
        let lifecycle = open_lifecycle();

        let mut render_loop = StereoRenderLoop::new(session, compositor);
        let report = render_loop
            .run(&store, &SharedMode::default(), &lifecycle)
            .unwrap();

        assert_eq!(report.exit, LoopExit::DisplayEnded);
        assert_eq!(lifecycle.state(), session::SessionState::Closed);
    }

    #[test]
    fn test_loop_exits_without_rendering_when_closed() {
        let store = FrameStore::new(ExtentConverter);
        let (session, submitted) = ScriptedSession::new(5);
        let (compositor, draw_counts) = RecordingCompositor::new();
        // Never opened.
        let lifecycle = SessionLifecycle::new();

        let mut render_loop = StereoRenderLoop::new(session, compositor);
        let report = render_loop
            .run(&store, &SharedMode::default(), &lifecycle)
            .unwrap();

        assert_eq!(report.exit, LoopExit::SessionClosed);
        assert_eq!(report.frames_rendered, 0);
        assert!(draw_counts.lock().unwrap().is_empty());
        assert!(submitted.lock().unwrap().is_empty());
    }
}
