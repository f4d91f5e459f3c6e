use crate::{CoreError, CoreResult, Mat4, Vec3, vec3};

/// Perspective parameters a camera is built from.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraDesc {
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
    /// Distance of the eye from the origin along +Z.
    pub eye_z: f32,
}

impl Default for CameraDesc {
    fn default() -> Self {
        Self {
            fov_y_deg: 45.0,
            z_near: 0.1,
            z_far: 20.0,
            eye_z: 2.5,
        }
    }
}

impl CameraDesc {
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.fov_y_deg > 0.0 && self.fov_y_deg < 180.0) {
            return Err(CoreError::InvalidCamera(format!(
                "fov_y_deg must be in (0, 180), got {}",
                self.fov_y_deg
            )));
        }
        if !(self.z_near > 0.0 && self.z_near < self.z_far) {
            return Err(CoreError::InvalidCamera(format!(
                "expected 0 < near < far, got near={} far={}",
                self.z_near, self.z_far
            )));
        }
        Ok(())
    }
}

/// Simple perspective camera (right-handed).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_rad: f32,
    pub z_near: f32,
    pub z_far: f32,
    pub aspect: f32,
}

impl Camera {
    #[allow(clippy::too_many_arguments)]
    pub fn new_perspective(
        eye: Vec3,
        target: Vec3,
        up: Vec3,
        fov_y_rad: f32,
        z_near: f32,
        z_far: f32,
        aspect: f32,
    ) -> Self {
        Self {
            eye,
            target,
            up,
            fov_y_rad,
            z_near,
            z_far,
            aspect,
        }
    }

    /// Camera looking at the origin from `(0, 0, eye_z)` with aspect taken from the viewport.
    pub fn from_desc(desc: &CameraDesc, viewport_width: u32, viewport_height: u32) -> Self {
        Self::new_perspective(
            vec3(0.0, 0.0, desc.eye_z),
            Vec3::ZERO,
            Vec3::Y,
            desc.fov_y_deg.to_radians(),
            desc.z_near,
            desc.z_far,
            aspect_of(viewport_width, viewport_height),
        )
    }

    #[inline]
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    ///*  NOTE: This returns OpenGL-style projection (z in [-1,1]).
    /// Renderer multiplies by OPENGL_TO_WGPU to match z in [0,1].
    #[inline]
    pub fn proj(&self) -> Mat4 {
        Mat4::perspective_rh_gl(
            self.fov_y_rad,
            self.aspect.max(1e-6),
            self.z_near,
            self.z_far,
        )
    }

    #[inline]
    pub fn proj_view(&self) -> Mat4 {
        self.proj() * self.view()
    }

    /// Recompute aspect for a new viewport. Must run before the next frame after a resize.
    #[inline]
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = aspect_of(width, height);
    }

    /// Transform a point from camera-local space (camera looks down -Z) to world space.
    pub fn local_to_world(&self, local: Vec3) -> Vec3 {
        self.view().inverse().transform_point3(local)
    }
}

fn aspect_of(width: u32, height: u32) -> f32 {
    width.max(1) as f32 / height.max(1) as f32
}
