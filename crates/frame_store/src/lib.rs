//! Window Frame Store
//!
//! Owns the latest captured frame per tracked window and hands the renderer
//! read-only snapshots:
//! - One single-slot mailbox per window (newest wins, no queueing)
//! - Surface-to-texture conversion behind the `SurfaceConverter` seam
//! - Non-blocking publish/snapshot under producer/consumer concurrency
//! - Capture feed event types and channel plumbing

mod convert;
mod feed;
mod store;
mod surface;

pub use convert::{GpuFrame, WgpuSurfaceConverter};
pub use feed::{
    apply_event, capture_channel, pump_events, CaptureEvent, CaptureReceiver, CaptureSender,
};
pub use store::{FrameSnapshot, FrameStore, PublishOutcome, WindowSummary};
pub use surface::{CapturedSurface, ConvertError, SurfaceConverter};

/// Window ID type (u64, externally assigned by the capture source)
///
/// Kept as a plain u64 so the store stays decoupled from whichever
/// capture backend enumerates windows.
pub type WindowId = u64;
