//! Remote display session seam.
//!
//! The render loop is generic over this trait: the production implementation
//! wraps the head-mounted display's runtime, tests and local runs use a
//! simulated session. `wait_frame` is the single blocking point of a render
//! loop iteration; a hung display blocks it indefinitely and is not retried
//! locally.

use glam::Mat4;
use std::time::{Duration, Instant};

/// Per-eye view and projection for one frame, predicted by the display.
#[derive(Debug, Clone, Copy)]
pub struct EyeView {
    pub view: Mat4,
    pub proj: Mat4,
}

impl EyeView {
    pub fn view_proj(&self) -> Mat4 {
        self.proj * self.view
    }
}

/// A claimed frame deadline with its updated per-eye poses.
#[derive(Debug, Clone, Copy)]
pub struct FrameRequest {
    /// Strictly increasing; frames are submitted in this order and a claimed
    /// frame is never skipped.
    pub frame_index: u64,
    /// When the composited frame must be ready.
    pub deadline: Instant,
    pub eyes: [EyeView; 2],
}

/// Bookkeeping for a composited frame handed back for presentation.
#[derive(Debug, Clone, Copy)]
pub struct SubmittedFrame {
    pub frame_index: u64,
    /// Wall time from deadline acquisition to submission, in frame-budget
    /// units (1.0 = exactly one budget).
    pub render_units: f32,
}

/// The display session reported termination; the render loop exits.
#[derive(Debug, thiserror::Error)]
#[error("display session ended")]
pub struct SessionEnded;

/// The remote head-mounted display connection.
pub trait DisplaySession {
    /// Resolved per-eye image type the session presents. The production
    /// renderer hands over `wgpu::TextureView`s.
    type EyeImage;

    /// Block until the next frame deadline and return its poses, or report
    /// that the underlying session has terminated.
    fn wait_frame(&mut self) -> Result<FrameRequest, SessionEnded>;

    /// Hand the composited stereo frame over for presentation. `eyes` are
    /// the resolved left and right images, valid until the next frame is
    /// rendered.
    fn submit(&mut self, frame: SubmittedFrame, eyes: [&Self::EyeImage; 2]);

    /// The display's per-frame time budget (e.g. ~11.1ms at 90Hz).
    fn frame_budget(&self) -> Duration;
}
