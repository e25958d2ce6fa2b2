//! Stereo rendering pipeline
//!
//! Per-frame orchestration from the remote display's timing source to frame
//! submission:
//! - `gpu` — wgpu device acquisition and validation-scoped pipeline builds
//! - `quad` — per-window quad pass, tagging every draw with its draw-call id
//! - `resolve` — tile resolve pass disambiguating overlapping windows per
//!   multisample sub-sample
//! - `renderer` — per-eye render targets and frame encoding
//! - `release` — deferred GPU resource release keyed to frame completion
//! - `timing` — normalized render-duration diagnostics
//! - `render_loop` — the deadline-driven stereo render loop
//! - `display` — the remote display session seam

pub mod display;
pub mod gpu;
pub mod quad;
pub mod release;
pub mod render_loop;
pub mod renderer;
pub mod resolve;
pub mod timing;

pub use display::{DisplaySession, EyeView, FrameRequest, SessionEnded, SubmittedFrame};
pub use gpu::GpuContext;
pub use release::ReleasePool;
pub use render_loop::{select_draws, LoopExit, LoopReport, StereoRenderLoop, WindowDraw};
pub use renderer::{Compositor, FrameRenderer, RenderConfig};
pub use resolve::{majority_resolve, CLEAR_DRAW_ID};
pub use timing::{RenderTiming, RenderTimingStats};
