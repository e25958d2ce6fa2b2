//! Arrangement Engine
//!
//! Pure mapping from (ordered window list, arrangement mode) to a rigid
//! transform per window. Deterministic: identical inputs yield bit-identical
//! transforms, so window placement is stable across frames. Recomputed every
//! time the tracked set changes; nothing here is persisted.

use frame_store::WindowId;
use glam::{Mat4, Quat, Vec3};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Distance from the viewer to the arrangement's reference plane, meters.
const VIEW_DISTANCE: f32 = 2.5;

/// Total angular extent the grid footprint may cover, radians (~60 deg).
const ANGULAR_EXTENT: f32 = 1.05;

/// Angular spacing between neighbours on the curved arc, radians.
const CURVED_STEP: f32 = 0.35;

/// Depth offset between consecutive stacked windows, meters.
const STACK_DEPTH_STEP: f32 = 0.12;

/// Yaw applied per stacked window behind the front one, radians.
const STACK_YAW_STEP: f32 = 0.04;

/// Fraction of a grid cell a window occupies; the rest is gap.
const GRID_FILL: f32 = 0.9;

/// Spatial arrangement mode, settable by the UI and applied on the next
/// frame. Held in memory only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowArrangement {
    #[default]
    Grid,
    Curved,
    Stack,
}

impl WindowArrangement {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Curved => "curved",
            Self::Stack => "stack",
        }
    }
}

/// Rigid transform for one window quad: translation, rotation, uniform scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowTransform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: f32,
}

impl WindowTransform {
    /// Centered directly in front of the viewer; the single-window placement
    /// for every mode.
    pub fn centered() -> Self {
        Self {
            translation: Vec3::new(0.0, 0.0, -VIEW_DISTANCE),
            rotation: Quat::IDENTITY,
            scale: 1.0,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            Vec3::splat(self.scale),
            self.rotation,
            self.translation,
        )
    }
}

/// Compute a transform per window for the given mode.
///
/// Windows keep their input order in the output. Zero windows yield an empty
/// mapping; a single window is always centered regardless of mode.
pub fn layout(ids: &[WindowId], mode: WindowArrangement) -> Vec<(WindowId, WindowTransform)> {
    if ids.is_empty() {
        return Vec::new();
    }
    if ids.len() == 1 {
        return vec![(ids[0], WindowTransform::centered())];
    }
    match mode {
        WindowArrangement::Grid => layout_grid(ids),
        WindowArrangement::Curved => layout_curved(ids),
        WindowArrangement::Stack => layout_stack(ids),
    }
}

/// Regular 2D lattice facing the viewer. Cell size shrinks with the count so
/// the whole footprint stays inside the fixed angular extent.
fn layout_grid(ids: &[WindowId]) -> Vec<(WindowId, WindowTransform)> {
    let count = ids.len();
    let cols = (count as f32).sqrt().ceil() as usize;
    let rows = count.div_ceil(cols);

    let footprint = 2.0 * VIEW_DISTANCE * (ANGULAR_EXTENT * 0.5).tan();
    let cell = footprint / cols.max(rows) as f32;

    ids.iter()
        .enumerate()
        .map(|(index, &id)| {
            let col = index % cols;
            let row = index / cols;
            let x = (col as f32 - (cols as f32 - 1.0) * 0.5) * cell;
            let y = ((rows as f32 - 1.0) * 0.5 - row as f32) * cell;
            let transform = WindowTransform {
                translation: Vec3::new(x, y, -VIEW_DISTANCE),
                rotation: Quat::IDENTITY,
                scale: cell * GRID_FILL,
            };
            (id, transform)
        })
        .collect()
}

/// Constant-radius arc around the viewer, evenly spaced by angle, each
/// window rotated to face inward.
fn layout_curved(ids: &[WindowId]) -> Vec<(WindowId, WindowTransform)> {
    let count = ids.len();
    ids.iter()
        .enumerate()
        .map(|(index, &id)| {
            let angle = (index as f32 - (count as f32 - 1.0) * 0.5) * CURVED_STEP;
            let transform = WindowTransform {
                translation: Vec3::new(
                    VIEW_DISTANCE * angle.sin(),
                    0.0,
                    -VIEW_DISTANCE * angle.cos(),
                ),
                rotation: Quat::from_rotation_y(-angle),
                scale: 1.0,
            };
            (id, transform)
        })
        .collect()
}

/// Fixed lateral position with increasing depth and a slight yaw per step;
/// the most recent (last) window sits nearest the viewer.
fn layout_stack(ids: &[WindowId]) -> Vec<(WindowId, WindowTransform)> {
    let count = ids.len();
    ids.iter()
        .enumerate()
        .map(|(index, &id)| {
            let behind = (count - 1 - index) as f32;
            let transform = WindowTransform {
                translation: Vec3::new(0.0, 0.0, -VIEW_DISTANCE - behind * STACK_DEPTH_STEP),
                rotation: Quat::from_rotation_y(behind * STACK_YAW_STEP),
                scale: 1.0,
            };
            (id, transform)
        })
        .collect()
}

/// Shared, UI-settable arrangement mode cell. The render loop reads it once
/// per frame, so a mode change takes effect on the next frame.
#[derive(Clone, Default)]
pub struct SharedMode {
    mode: Arc<Mutex<WindowArrangement>>,
}

impl SharedMode {
    pub fn new(mode: WindowArrangement) -> Self {
        Self {
            mode: Arc::new(Mutex::new(mode)),
        }
    }

    pub fn get(&self) -> WindowArrangement {
        *self.mode.lock()
    }

    pub fn set(&self, mode: WindowArrangement) {
        *self.mode.lock() = mode;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_yields_empty_mapping() {
        for mode in [
            WindowArrangement::Grid,
            WindowArrangement::Curved,
            WindowArrangement::Stack,
        ] {
            assert!(layout(&[], mode).is_empty());
        }
    }

    #[test]
    fn test_single_window_centered_in_every_mode() {
        for mode in [
            WindowArrangement::Grid,
            WindowArrangement::Curved,
            WindowArrangement::Stack,
        ] {
            let placed = layout(&[42], mode);
            assert_eq!(placed.len(), 1);
            assert_eq!(placed[0].0, 42);
            assert_eq!(placed[0].1, WindowTransform::centered());
        }
    }

    #[test]
    fn test_layout_is_deterministic() {
        let ids = [1, 2, 3, 4, 5];
        for mode in [
            WindowArrangement::Grid,
            WindowArrangement::Curved,
            WindowArrangement::Stack,
        ] {
            let a = layout(&ids, mode);
            let b = layout(&ids, mode);
            for ((id_a, tf_a), (id_b, tf_b)) in a.iter().zip(b.iter()) {
                assert_eq!(id_a, id_b);
                // Bit-identical, not approximately equal.
                assert_eq!(tf_a.translation.to_array(), tf_b.translation.to_array());
                assert_eq!(tf_a.rotation.to_array(), tf_b.rotation.to_array());
                assert_eq!(tf_a.scale, tf_b.scale);
            }
        }
    }

    #[test]
    fn test_grid_four_windows_symmetric_and_distinct() {
        let placed = layout(&[1, 2, 3, 4], WindowArrangement::Grid);
        assert_eq!(placed.len(), 4);

        // 2x2 lattice: all positions distinct, mirrored about the center axis.
        let positions: Vec<Vec3> = placed.iter().map(|(_, tf)| tf.translation).collect();
        for i in 0..4 {
            for j in (i + 1)..4 {
                assert_ne!(positions[i], positions[j]);
            }
        }
        assert_eq!(positions[0].x, -positions[1].x);
        assert_eq!(positions[2].x, -positions[3].x);
        assert_eq!(positions[0].y, -positions[2].y);

        // No overlap: lateral separation exceeds the window scale.
        let spacing = (positions[1].x - positions[0].x).abs();
        assert!(spacing > placed[0].1.scale);
    }

    #[test]
    fn test_stack_shares_lateral_position_varies_depth_and_rotation() {
        let placed = layout(&[1, 2, 3, 4], WindowArrangement::Stack);

        let mut depths: Vec<f32> = Vec::new();
        for (_, tf) in &placed {
            assert_eq!(tf.translation.x, 0.0);
            assert_eq!(tf.translation.y, 0.0);
            assert_eq!(tf.scale, 1.0);
            depths.push(tf.translation.z);
        }
        // Most recent (last) window nearest the viewer.
        for pair in depths.windows(2) {
            assert!(pair[0] < pair[1]);
        }
        assert_eq!(depths[3], -VIEW_DISTANCE);
        // Front window unrotated, deeper windows progressively yawed.
        assert_eq!(placed[3].1.rotation, Quat::IDENTITY);
        assert_ne!(placed[0].1.rotation, Quat::IDENTITY);
    }

    #[test]
    fn test_curved_constant_radius_even_spacing() {
        let placed = layout(&[1, 2, 3], WindowArrangement::Curved);
        for (_, tf) in &placed {
            let radius = tf.translation.length();
            assert!((radius - VIEW_DISTANCE).abs() < 1e-4);
        }
        // Middle window dead ahead, neighbours mirrored.
        assert_eq!(placed[1].1.translation.x, 0.0);
        assert!((placed[0].1.translation.x + placed[2].1.translation.x).abs() < 1e-5);
    }

    #[test]
    fn test_output_preserves_input_order() {
        let ids = [9, 4, 7];
        let placed = layout(&ids, WindowArrangement::Curved);
        let out: Vec<u64> = placed.iter().map(|(id, _)| *id).collect();
        assert_eq!(out, ids);
    }

    #[test]
    fn test_shared_mode_cell() {
        let cell = SharedMode::default();
        assert_eq!(cell.get(), WindowArrangement::Grid);
        cell.set(WindowArrangement::Stack);
        assert_eq!(cell.get(), WindowArrangement::Stack);
    }
}
