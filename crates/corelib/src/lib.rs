//! Core types: math re-exports, Transform, Camera, bounds, normalization, orbit controls.

pub use glam::{Mat4, Quat, Vec3, vec3};

pub mod bounds;
pub mod camera;
pub mod normalize;
pub mod orbit;
pub mod transform;

mod error;

pub use error::{CoreError, CoreResult};
