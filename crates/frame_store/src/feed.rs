//! Capture feed events and channel plumbing.
//!
//! Capture sources push events at a rate the core does not control; a pump
//! drains them into the store. The channel is unbounded because the store
//! itself is the bound: each window keeps only its newest frame.

use crossbeam_channel::{Receiver, Sender};

use crate::store::FrameStore;
use crate::surface::{CapturedSurface, SurfaceConverter};
use crate::WindowId;

/// Inbound capture feed events.
#[derive(Debug)]
pub enum CaptureEvent {
    WindowAdded { id: WindowId, title: String },
    WindowRemoved { id: WindowId },
    Frame { id: WindowId, surface: CapturedSurface },
}

pub type CaptureSender = Sender<CaptureEvent>;
pub type CaptureReceiver = Receiver<CaptureEvent>;

pub fn capture_channel() -> (CaptureSender, CaptureReceiver) {
    crossbeam_channel::unbounded()
}

/// Drain all queued capture events into the store without blocking.
///
/// Returns the number of events applied. Call from the feed pump thread;
/// the render loop reads the store independently.
pub fn pump_events<C: SurfaceConverter>(store: &FrameStore<C>, rx: &CaptureReceiver) -> usize {
    let mut applied = 0;
    while let Ok(event) = rx.try_recv() {
        apply_event(store, event);
        applied += 1;
    }
    applied
}

/// Apply one capture event to the store.
pub fn apply_event<C: SurfaceConverter>(store: &FrameStore<C>, event: CaptureEvent) {
    match event {
        CaptureEvent::WindowAdded { id, title } => store.track(id, title),
        CaptureEvent::WindowRemoved { id } => store.untrack(id),
        CaptureEvent::Frame { id, surface } => {
            store.publish(id, &surface);
        }
    }
}
