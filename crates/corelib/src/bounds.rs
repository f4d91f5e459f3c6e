//! Axis-aligned bounding boxes in model space.

use crate::Vec3;

/// Axis-aligned box given by its min/max corners.
///
/// An empty box (no points yet) has `min = +inf` and `max = -inf`, so that
/// the first `include` collapses it onto that point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub const EMPTY: Self = Self {
        min: Vec3::splat(f32::INFINITY),
        max: Vec3::splat(f32::NEG_INFINITY),
    };

    #[inline]
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = Vec3>,
    {
        points.into_iter().fold(Self::EMPTY, |mut acc, p| {
            acc.include(p);
            acc
        })
    }

    #[inline]
    pub fn include(&mut self, p: Vec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb::new(self.min.min(other.min), self.max.max(other.max))
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Edge lengths `(lx, ly, lz)`; zero for an empty box.
    pub fn extents(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }

    /// `(lx + ly + lz) / 3`.
    pub fn average_extent(&self) -> f32 {
        let e = self.extents();
        (e.x + e.y + e.z) / 3.0
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Box scaled uniformly about the origin, as a uniform root scale would.
    pub fn scaled(&self, factor: f32) -> Aabb {
        if self.is_empty() {
            return *self;
        }
        let a = self.min * factor;
        let b = self.max * factor;
        Aabb::new(a.min(b), a.max(b))
    }
}

impl Default for Aabb {
    fn default() -> Self {
        Self::EMPTY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vec3;

    #[test]
    fn from_points_covers_all() {
        let b = Aabb::from_points([vec3(1.0, -2.0, 0.5), vec3(-1.0, 3.0, 0.0)]);
        assert_eq!(b.min, vec3(-1.0, -2.0, 0.0));
        assert_eq!(b.max, vec3(1.0, 3.0, 0.5));
        assert_eq!(b.extents(), vec3(2.0, 5.0, 0.5));
    }

    #[test]
    fn empty_box_has_zero_extent() {
        assert!(Aabb::EMPTY.is_empty());
        assert_eq!(Aabb::EMPTY.extents(), Vec3::ZERO);
        assert_eq!(Aabb::EMPTY.average_extent(), 0.0);
    }

    #[test]
    fn union_with_empty_is_identity() {
        let b = Aabb::new(vec3(0.0, 0.0, 0.0), vec3(1.0, 1.0, 1.0));
        assert_eq!(b.union(&Aabb::EMPTY), b);
    }

    #[test]
    fn negative_scale_keeps_min_below_max() {
        let b = Aabb::new(vec3(-1.0, 0.0, 2.0), vec3(1.0, 4.0, 3.0)).scaled(-2.0);
        assert!(!b.is_empty());
        assert_eq!(b.extents(), vec3(4.0, 8.0, 2.0));
    }
}
