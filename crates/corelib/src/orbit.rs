//! Orbit camera controls: rotate around a target, zoom within a distance range.

use crate::{CoreError, CoreResult, Vec3, camera::Camera};

/// Keeps the camera off the poles so `look_at` never degenerates.
const MAX_PITCH: f32 = std::f32::consts::FRAC_PI_2 - 0.01;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OrbitControls {
    pub target: Vec3,
    yaw: f32,
    pitch: f32,
    distance: f32,
    min_distance: f32,
    max_distance: f32,
    /// Radians per pixel of pointer drag.
    pub rotate_speed: f32,
    /// Fractional distance change per wheel line.
    pub zoom_speed: f32,
}

impl OrbitControls {
    /// Start from the camera's current eye/target.
    pub fn from_camera(camera: &Camera, min_distance: f32, max_distance: f32) -> CoreResult<Self> {
        if !(min_distance > 0.0 && min_distance <= max_distance) {
            return Err(CoreError::InvalidOrbitRange {
                min: min_distance,
                max: max_distance,
            });
        }
        let offset = camera.eye - camera.target;
        let raw = offset.length();
        let (yaw, pitch) = if raw > f32::EPSILON {
            (offset.x.atan2(offset.z), (offset.y / raw).clamp(-1.0, 1.0).asin())
        } else {
            (0.0, 0.0)
        };
        Ok(Self {
            target: camera.target,
            yaw,
            pitch: pitch.clamp(-MAX_PITCH, MAX_PITCH),
            distance: raw.clamp(min_distance, max_distance),
            min_distance,
            max_distance,
            rotate_speed: 0.005,
            zoom_speed: 0.1,
        })
    }

    #[inline]
    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Pointer drag by `(dx, dy)` pixels. Returns `true` if the view changed.
    pub fn rotate(&mut self, dx: f32, dy: f32) -> bool {
        let yaw = self.yaw - dx * self.rotate_speed;
        let pitch = (self.pitch + dy * self.rotate_speed).clamp(-MAX_PITCH, MAX_PITCH);
        let changed = yaw != self.yaw || pitch != self.pitch;
        self.yaw = yaw;
        self.pitch = pitch;
        changed
    }

    /// Wheel by `lines` (positive zooms in). Returns `true` if the distance changed.
    pub fn zoom(&mut self, lines: f32) -> bool {
        let factor = (1.0 - self.zoom_speed).powf(lines);
        let distance = (self.distance * factor).clamp(self.min_distance, self.max_distance);
        let changed = (distance - self.distance).abs() > f32::EPSILON;
        self.distance = distance;
        changed
    }

    pub fn eye(&self) -> Vec3 {
        let (sy, cy) = self.yaw.sin_cos();
        let (sp, cp) = self.pitch.sin_cos();
        self.target + Vec3::new(cp * sy, sp, cp * cy) * self.distance
    }

    pub fn apply(&self, camera: &mut Camera) {
        camera.eye = self.eye();
        camera.target = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::CameraDesc;

    fn controls() -> OrbitControls {
        let cam = Camera::from_desc(&CameraDesc::default(), 800, 600);
        OrbitControls::from_camera(&cam, 1.0, 8.0).unwrap()
    }

    #[test]
    fn starts_at_camera_eye() {
        let c = controls();
        assert!((c.distance() - 2.5).abs() < 1e-6);
        assert!((c.eye() - Vec3::new(0.0, 0.0, 2.5)).length() < 1e-5);
    }

    #[test]
    fn zoom_is_clamped_to_range() {
        let mut c = controls();
        for _ in 0..100 {
            c.zoom(1.0);
        }
        assert!((c.distance() - 1.0).abs() < 1e-6);
        assert!(!c.zoom(1.0));

        for _ in 0..100 {
            c.zoom(-1.0);
        }
        assert!((c.distance() - 8.0).abs() < 1e-6);
    }

    #[test]
    fn rotation_keeps_distance_and_avoids_poles() {
        let mut c = controls();
        assert!(c.rotate(120.0, 0.0));
        c.rotate(0.0, 10_000.0);
        let eye = c.eye();
        assert!((eye.length() - 2.5).abs() < 1e-4);
        assert!(eye.y < 2.5);
    }

    #[test]
    fn rejects_inverted_range() {
        let cam = Camera::from_desc(&CameraDesc::default(), 800, 600);
        assert_eq!(
            OrbitControls::from_camera(&cam, 8.0, 1.0),
            Err(CoreError::InvalidOrbitRange { min: 8.0, max: 1.0 })
        );
    }
}
