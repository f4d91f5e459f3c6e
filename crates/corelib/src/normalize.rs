//! Uniform rescaling of a loaded model into a canonical size.
//!
//! The scale is `((lx + ly + lz) / 3) / target`: the average box extent
//! measured in units of the canonical target. It is a pure function of the
//! box, so re-running it on the same box with the same target yields the same
//! scale; different targets give different scales.

use crate::{Vec3, bounds::Aabb, transform::Transform};

/// Canonical target size used when none is configured.
pub const DEFAULT_CANONICAL_SIZE: f32 = 10.0;

/// Substitute scale for degenerate (zero-extent or empty) boxes.
pub const MIN_SCALE: f32 = 1e-4;

/// Scale for a box relative to `target`. Never zero, negative or NaN; any
/// positive finite ratio is returned as is, however small.
pub fn normalization_scale(bounds: &Aabb, target: f32) -> f32 {
    let scale = bounds.average_extent() / target;
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        MIN_SCALE
    }
}

/// Apply the normalization scale uniformly to a root transform; returns the scale used.
pub fn normalize(root: &mut Transform, bounds: &Aabb, target: f32) -> f32 {
    let scale = normalization_scale(bounds, target);
    root.scale = Vec3::splat(scale);
    scale
}
