//! Latest-frame store: one single-slot mailbox per tracked window.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::{Mutex, RwLock};

use crate::surface::{CapturedSurface, SurfaceConverter};
use crate::WindowId;

/// What happened to a published surface. Observable in logs; callers other
/// than tests ignore it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Converted and installed as the window's latest frame.
    Stored,
    /// The window is not tracked (or was untracked while the publish was in
    /// flight); the frame was dropped.
    DroppedUntracked,
    /// A strictly newer frame is already installed; the frame was dropped.
    /// An equal timestamp replaces, so a source re-delivering its latest
    /// frame still lands.
    DroppedStale,
    /// Conversion failed; the previous frame (if any) was kept.
    ConversionFailed,
}

/// A fully-published frame as seen by the renderer.
///
/// The `Arc` keeps the texture alive for the duration of the frame that
/// borrowed it; the store itself may replace the entry at any time.
#[derive(Debug)]
pub struct FrameSnapshot<F> {
    pub frame: Arc<F>,
    pub timestamp: Duration,
}

impl<F> Clone for FrameSnapshot<F> {
    fn clone(&self) -> Self {
        Self {
            frame: Arc::clone(&self.frame),
            timestamp: self.timestamp,
        }
    }
}

/// Read-only per-window summary for the UI layer.
#[derive(Debug, Clone)]
pub struct WindowSummary {
    pub id: WindowId,
    pub title: String,
    /// Timestamp of the latest published frame, if any has arrived.
    pub last_timestamp: Option<Duration>,
    pub has_frame: bool,
}

struct TrackedWindow<F> {
    title: String,
    latest: RwLock<Option<FrameSnapshot<F>>>,
}

/// Latest-frame store for all tracked windows.
///
/// Producers call `publish` concurrently across windows; the render loop
/// calls `snapshot` once per window per frame. Neither side ever blocks on
/// the other beyond a brief per-entry lock for the pointer swap.
pub struct FrameStore<C: SurfaceConverter> {
    converter: C,
    windows: DashMap<WindowId, TrackedWindow<C::Frame>>,
    /// Tracking order, used for stable layout and draw ordering.
    order: Mutex<Vec<WindowId>>,
}

impl<C: SurfaceConverter> FrameStore<C> {
    pub fn new(converter: C) -> Self {
        Self {
            converter,
            windows: DashMap::new(),
            order: Mutex::new(Vec::new()),
        }
    }

    /// Start tracking a window. A second `track` for the same id keeps the
    /// existing entry (and its latest frame) and only logs.
    pub fn track(&self, id: WindowId, title: impl Into<String>) {
        let title = title.into();
        match self.windows.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                tracing::warn!(window_id = id, "track: window already tracked");
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(TrackedWindow {
                    title: title.clone(),
                    latest: RwLock::new(None),
                });
                self.order.lock().push(id);
                tracing::debug!(window_id = id, title = %title, "tracking window");
            }
        }
    }

    /// Stop tracking a window and drop its latest frame.
    ///
    /// Once this returns, no later `snapshot` exposes the window. A racing
    /// `publish` either lands before the removal (and is discarded with the
    /// entry) or misses the lookup afterwards and is dropped: `publish`
    /// updates existing entries only, it never inserts.
    pub fn untrack(&self, id: WindowId) {
        if self.windows.remove(&id).is_some() {
            self.order.lock().retain(|tracked| *tracked != id);
            tracing::debug!(window_id = id, "untracked window");
        } else {
            tracing::debug!(window_id = id, "untrack: window not tracked");
        }
    }

    /// Install a captured surface as the window's latest frame.
    ///
    /// Called by the capture feed at a rate the store does not control.
    /// Conversion failure keeps the previous frame: stale-but-valid beats
    /// blank. Frames strictly older than the installed one are dropped so
    /// snapshot timestamps stay monotonic per window; an equal timestamp
    /// replaces.
    pub fn publish(&self, id: WindowId, surface: &CapturedSurface) -> PublishOutcome {
        let Some(entry) = self.windows.get(&id) else {
            tracing::trace!(window_id = id, "publish for untracked window dropped");
            return PublishOutcome::DroppedUntracked;
        };

        let frame = match self.converter.convert(surface) {
            Ok(frame) => Arc::new(frame),
            Err(err) => {
                tracing::warn!(
                    window_id = id,
                    error = %err,
                    "surface conversion failed, keeping previous frame"
                );
                return PublishOutcome::ConversionFailed;
            }
        };

        let mut slot = entry.latest.write();
        if let Some(installed) = slot.as_ref() {
            if surface.timestamp < installed.timestamp {
                tracing::debug!(
                    window_id = id,
                    "out-of-order frame dropped ({:?} < {:?})",
                    surface.timestamp,
                    installed.timestamp
                );
                return PublishOutcome::DroppedStale;
            }
        }
        *slot = Some(FrameSnapshot {
            frame,
            timestamp: surface.timestamp,
        });
        PublishOutcome::Stored
    }

    /// Latest fully-published frame for a window, or `None` if the window is
    /// untracked or no frame has arrived yet. Never blocks on a producer
    /// beyond the entry's pointer-swap lock.
    pub fn snapshot(&self, id: WindowId) -> Option<FrameSnapshot<C::Frame>> {
        self.windows.get(&id)?.latest.read().clone()
    }

    /// Tracked window ids in tracking order.
    pub fn tracked_ids(&self) -> Vec<WindowId> {
        self.order.lock().clone()
    }

    pub fn tracked_count(&self) -> usize {
        self.windows.len()
    }

    /// Per-window summaries in tracking order, for the UI's observable list.
    pub fn overview(&self) -> Vec<WindowSummary> {
        self.tracked_ids()
            .into_iter()
            .filter_map(|id| {
                let entry = self.windows.get(&id)?;
                let latest = entry.latest.read();
                Some(WindowSummary {
                    id,
                    title: entry.title.clone(),
                    last_timestamp: latest.as_ref().map(|snap| snap.timestamp),
                    has_frame: latest.is_some(),
                })
            })
            .collect()
    }
}
