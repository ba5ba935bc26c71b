//! Streamline validation against the voxel grid of a reference volume.

use crate::affine::{self, Affine4};
use crate::error::Result;
use crate::reference::AnatomicalReference;
use crate::streamline::{Point, Streamline};
use nalgebra::{Vector3, Vector4};
use tracing::debug;

/// Streamlines with fewer points than this are discarded.
pub const MIN_POINTS: usize = 2;

/// Remove streamlines with fewer than [`MIN_POINTS`] points.
pub fn drop_short(streamlines: Vec<Streamline>) -> Vec<Streamline> {
    let before = streamlines.len();
    let kept: Vec<_> = streamlines
        .into_iter()
        .filter(|s| s.len() >= MIN_POINTS)
        .collect();
    if kept.len() < before {
        debug!(discarded = before - kept.len(), "dropped short streamlines");
    }
    kept
}

/// Translate streamlines given relative to the volume centre so that they
/// land in world coordinates: every point is moved by the world position
/// of voxel `shape / 2`.
pub fn recenter(streamlines: &mut [Streamline], reference: &AnatomicalReference) {
    let c = reference.center();
    let offset = Vector3::new(c.x as f32, c.y as f32, c.z as f32);
    for p in streamlines.iter_mut().flat_map(|s| s.iter_mut()) {
        *p += offset;
    }
}

/// Whether every point of the streamline falls inside the voxel grid, that
/// is, `0 <= index < shape` on every axis, where `index` is obtained with
/// the world-to-voxel affine.
pub fn is_within_bounds(streamline: &[Point], world_to_voxel: &Affine4, shape: [usize; 3]) -> bool {
    streamline.iter().all(|p| {
        let v = world_to_voxel
            * Vector4::new(f64::from(p.x), f64::from(p.y), f64::from(p.z), 1.0);
        (0..3).all(|i| v[i] >= 0.0 && v[i] < shape[i] as f64)
    })
}

/// Keep only the streamlines lying entirely within the reference volume.
/// A streamline with a single point outside is dropped as a whole.
pub fn filter_within_bounds(
    streamlines: Vec<Streamline>,
    reference: &AnatomicalReference,
) -> Result<Vec<Streamline>> {
    let world_to_voxel = affine::invert(reference.affine())?;
    let shape = reference.shape();
    Ok(streamlines
        .into_iter()
        .filter(|s| is_within_bounds(s, &world_to_voxel, shape))
        .collect())
}

/// Bring centre-relative RAS+mm streamlines to world coordinates and keep
/// those which are long enough and inside the reference volume.
pub fn validate_streamlines(
    streamlines: Vec<Streamline>,
    reference: &AnatomicalReference,
) -> Result<Vec<Streamline>> {
    let total = streamlines.len();
    let mut streamlines = drop_short(streamlines);
    recenter(&mut streamlines, reference);
    let kept = filter_within_bounds(streamlines, reference)?;
    if kept.len() < total {
        debug!(
            total,
            discarded = total - kept.len(),
            "discarded invalid streamlines"
        );
    }
    Ok(kept)
}
