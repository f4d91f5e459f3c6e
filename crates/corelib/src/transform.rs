use crate::{Mat4, Quat, Vec3};

/// Root transform of a scene object.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Transform {
    #[inline]
    pub const fn identity() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Translation plus uniform scale, no rotation.
    #[inline]
    pub fn from_translation_scale(translation: Vec3, scale: f32) -> Self {
        Self {
            translation,
            scale: Vec3::splat(scale),
            ..Self::identity()
        }
    }

    #[inline]
    pub fn set_uniform_scale(&mut self, scale: f32) {
        self.scale = Vec3::splat(scale);
    }

    /// T * R * S.
    #[inline]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
