//! Simulated display session.
//
// Drives the render loop at a fixed refresh rate with plausible stereo
// poses, standing in for a head-mounted display runtime. Terminates itself
// after a configured number of frames so demo runs end on the remote side,
// exercising the same teardown path a real display would.

use glam::{Mat4, Vec3};
use std::time::{Duration, Instant};

use session::{ConnectOutcome, SessionLifecycle, SessionState, TransitionError};
use stereo_render::{DisplaySession, EyeView, FrameRequest, SessionEnded, SubmittedFrame};

const IPD_METERS: f32 = 0.063;
const EYE_FOV_Y: f32 = 1.2;
const NEAR_PLANE: f32 = 0.05;
const FAR_PLANE: f32 = 100.0;

pub struct SimulatedDisplaySession {
    period: Duration,
    /// Frames before the session self-terminates; 0 means never.
    demo_frames: u64,
    aspect: f32,
    frame_index: u64,
    next_deadline: Instant,
}

impl SimulatedDisplaySession {
    pub fn new(refresh_hz: f64, demo_frames: u64, eye_width: u32, eye_height: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / refresh_hz.max(1.0));
        Self {
            period,
            demo_frames,
            aspect: eye_width as f32 / eye_height.max(1) as f32,
            frame_index: 0,
            next_deadline: Instant::now() + period,
        }
    }

    fn eye(&self, side: f32) -> EyeView {
        // Head at the origin looking down -Z, eyes offset laterally.
        let eye_pos = Vec3::new(side * IPD_METERS / 2.0, 0.0, 0.0);
        EyeView {
            view: Mat4::look_at_rh(eye_pos, eye_pos + Vec3::NEG_Z, Vec3::Y),
            proj: Mat4::perspective_rh(EYE_FOV_Y, self.aspect, NEAR_PLANE, FAR_PLANE),
        }
    }
}

impl DisplaySession for SimulatedDisplaySession {
    type EyeImage = wgpu::TextureView;

    fn wait_frame(&mut self) -> Result<FrameRequest, SessionEnded> {
        if self.demo_frames > 0 && self.frame_index >= self.demo_frames {
            return Err(SessionEnded);
        }

        let now = Instant::now();
        if let Some(remaining) = self.next_deadline.checked_duration_since(now) {
            std::thread::sleep(remaining);
        }
        let deadline = self.next_deadline + self.period;
        self.next_deadline = (self.next_deadline + self.period).max(Instant::now());

        let request = FrameRequest {
            frame_index: self.frame_index,
            deadline,
            eyes: [self.eye(-1.0), self.eye(1.0)],
        };
        self.frame_index += 1;
        Ok(request)
    }

    // A real display runtime would copy the resolved eye images into its
    // swapchain here; the simulated session only accounts for them.
    fn submit(&mut self, frame: SubmittedFrame, _eyes: [&wgpu::TextureView; 2]) {
        tracing::trace!(
            frame_index = frame.frame_index,
            render_units = frame.render_units,
            "frame submitted"
        );
    }

    fn frame_budget(&self) -> Duration {
        self.period
    }
}

/// Walk the lifecycle through a connect: request, "open the device", report
/// the outcome. With the simulated display the open step cannot be cancelled
/// and never fails.
pub fn connect(lifecycle: &SessionLifecycle) -> Result<SessionState, TransitionError> {
    if !lifecycle.request_connect().is_accepted() {
        tracing::warn!(state = lifecycle.state().as_str(), "connect request ignored");
    }
    lifecycle.complete_connect(ConnectOutcome::Opened)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(demo_frames: u64) -> SimulatedDisplaySession {
        SimulatedDisplaySession::new(1000.0, demo_frames, 16, 9)
    }

    #[test]
    fn test_frame_indices_strictly_increase() {
        let mut display = session(0);
        let mut last = None;
        for _ in 0..5 {
            let request = display.wait_frame().unwrap();
            if let Some(last) = last {
                assert!(request.frame_index > last);
            }
            last = Some(request.frame_index);
        }
    }

    #[test]
    fn test_session_ends_after_demo_frames() {
        let mut display = session(3);
        for _ in 0..3 {
            assert!(display.wait_frame().is_ok());
        }
        assert!(display.wait_frame().is_err());
    }

    #[test]
    fn test_eyes_are_laterally_separated() {
        let display = session(0);
        let left = display.eye(-1.0);
        let right = display.eye(1.0);
        assert_ne!(left.view, right.view);
        assert_eq!(left.proj, right.proj);
    }

    #[test]
    fn test_connect_opens_lifecycle() {
        let lifecycle = SessionLifecycle::new();
        let state = connect(&lifecycle).unwrap();
        assert_eq!(state, SessionState::Open);
        assert!(lifecycle.is_open());
    }
}
