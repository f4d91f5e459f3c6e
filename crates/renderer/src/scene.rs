//! Scene container: camera, lights, static primitives and at most one model.
//!
//! Assembly order is fixed: camera, ambient light, point light (attached to
//! the camera), auxiliary primitives, and finally the normalized model once it
//! has loaded. Nothing is re-parented afterwards.

use asset::{LoadedModel, material::rgb_from_hex};
use corelib::{
    CoreError, CoreResult, Vec3,
    bounds::Aabb,
    camera::{Camera, CameraDesc},
    normalize::{DEFAULT_CANONICAL_SIZE, normalize},
    transform::Transform,
    vec3,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AmbientLight {
    /// sRGB color in `[0, 1]`.
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Point light parented to the camera: `offset` is in camera space, so the
/// light follows every camera move.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PointLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub offset: Vec3,
}

impl PointLight {
    pub fn world_position(&self, camera: &Camera) -> Vec3 {
        camera.local_to_world(self.offset)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PrimitiveShape {
    /// Unit cube centered on the origin.
    Cube,
}

/// Static solid-colored shape placed next to the model.
#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    pub name: String,
    pub shape: PrimitiveShape,
    pub color: [f32; 3],
    pub transform: Transform,
}

impl Primitive {
    /// Small slate-blue cube beside the model.
    pub fn marker_cube() -> Self {
        Self {
            name: "marker-cube".to_string(),
            shape: PrimitiveShape::Cube,
            color: rgb_from_hex(0x433f81),
            transform: Transform::from_translation_scale(vec3(0.3, 0.3, 0.0), 0.15),
        }
    }
}

/// The loaded model as placed in the scene.
#[derive(Clone, Debug, PartialEq)]
pub struct SceneModel {
    pub model: LoadedModel,
    pub transform: Transform,
    /// Model-space bounds measured before normalization.
    pub bounds: Aabb,
    pub scale: f32,
}

/// Observable record of assembly order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblyStep {
    Camera,
    AmbientLight,
    PointLight,
    Primitive,
    Model,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneDesc {
    pub camera: CameraDesc,
    pub canonical_size: f32,
    pub ambient: AmbientLight,
    pub point_light: PointLight,
    pub primitives: Vec<Primitive>,
}

impl Default for SceneDesc {
    fn default() -> Self {
        Self {
            camera: CameraDesc::default(),
            canonical_size: DEFAULT_CANONICAL_SIZE,
            ambient: AmbientLight {
                color: [1.0, 1.0, 1.0],
                intensity: 1.0,
            },
            point_light: PointLight {
                color: [1.0, 1.0, 1.0],
                intensity: 15.0,
                offset: Vec3::ZERO,
            },
            primitives: vec![Primitive::marker_cube()],
        }
    }
}

#[derive(Debug)]
pub struct SceneGraph {
    camera: Camera,
    ambient: AmbientLight,
    point_light: PointLight,
    primitives: Vec<Primitive>,
    model: Option<SceneModel>,
    canonical_size: f32,
    steps: Vec<AssemblyStep>,
}

impl SceneGraph {
    /// Build camera, lights and primitives, in that order, for a viewport.
    pub fn assemble(desc: &SceneDesc, viewport_width: u32, viewport_height: u32) -> CoreResult<Self> {
        desc.camera.validate()?;
        if !(desc.canonical_size.is_finite() && desc.canonical_size > 0.0) {
            return Err(CoreError::InvalidCanonicalSize(desc.canonical_size));
        }

        let mut steps = Vec::with_capacity(3 + desc.primitives.len());
        let camera = Camera::from_desc(&desc.camera, viewport_width, viewport_height);
        steps.push(AssemblyStep::Camera);
        let ambient = desc.ambient;
        steps.push(AssemblyStep::AmbientLight);
        let point_light = desc.point_light;
        steps.push(AssemblyStep::PointLight);
        let primitives = desc.primitives.clone();
        steps.extend(primitives.iter().map(|_| AssemblyStep::Primitive));

        log::info!(
            "Scene assembled: viewport {}x{}, {} primitive(s)",
            viewport_width,
            viewport_height,
            primitives.len()
        );

        Ok(Self {
            camera,
            ambient,
            point_light,
            primitives,
            model: None,
            canonical_size: desc.canonical_size,
            steps,
        })
    }

    /// Normalize and insert the model. Returns the applied scale, or `None`
    /// if a model is already present (it is kept and the new one dropped).
    pub fn insert_model(&mut self, model: LoadedModel) -> Option<f32> {
        if self.model.is_some() {
            log::warn!("Scene already holds a model; ignoring '{}'", model.mesh.name);
            return None;
        }
        let bounds = model.mesh.bounds();
        let mut transform = Transform::identity();
        let scale = normalize(&mut transform, &bounds, self.canonical_size);
        log::info!(
            "Inserted model '{}': extents {:?}, scale {:.5}",
            model.mesh.name,
            bounds.extents(),
            scale
        );
        self.model = Some(SceneModel {
            model,
            transform,
            bounds,
            scale,
        });
        self.steps.push(AssemblyStep::Model);
        Some(scale)
    }

    #[inline]
    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    #[inline]
    pub fn camera_mut(&mut self) -> &mut Camera {
        &mut self.camera
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.camera.set_viewport(width, height);
    }

    pub fn ambient(&self) -> &AmbientLight {
        &self.ambient
    }

    pub fn point_light(&self) -> &PointLight {
        &self.point_light
    }

    pub fn primitives(&self) -> &[Primitive] {
        &self.primitives
    }

    pub fn model(&self) -> Option<&SceneModel> {
        self.model.as_ref()
    }

    pub fn canonical_size(&self) -> f32 {
        self.canonical_size
    }

    pub fn steps(&self) -> &[AssemblyStep] {
        &self.steps
    }

    /// Drop everything the scene owns except the camera.
    pub fn clear(&mut self) {
        self.model = None;
        self.primitives.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use asset::{MaterialRef, obj::load_obj_from_str};

    fn model(src: &str) -> LoadedModel {
        let mesh = load_obj_from_str(src).unwrap();
        let materials = vec![MaterialRef::fallback(); mesh.nodes.len()];
        LoadedModel { mesh, materials }
    }

    #[test]
    fn assembles_in_fixed_order() {
        let mut scene = SceneGraph::assemble(&SceneDesc::default(), 800, 600).unwrap();
        scene.insert_model(model("v 0 0 0\nv 2 0 0\nv 0 4 6\nf 1 2 3\n"));
        assert_eq!(
            scene.steps(),
            &[
                AssemblyStep::Camera,
                AssemblyStep::AmbientLight,
                AssemblyStep::PointLight,
                AssemblyStep::Primitive,
                AssemblyStep::Model,
            ]
        );
        assert!((scene.camera().aspect - 800.0 / 600.0).abs() < 1e-6);
    }

    #[test]
    fn model_is_normalized_once() {
        let mut scene = SceneGraph::assemble(&SceneDesc::default(), 800, 600).unwrap();
        let scale = scene.insert_model(model("v 0 0 0\nv 3 0 0\nv 0 6 9\nf 1 2 3\n"));
        // (3 + 6 + 9) / 3 / 10
        assert!((scale.unwrap() - 0.6).abs() < 1e-6);
        let placed = scene.model().unwrap();
        assert_eq!(placed.transform.scale, Vec3::splat(placed.scale));

        assert!(scene.insert_model(model("v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n")).is_none());
        assert!((scene.model().unwrap().scale - 0.6).abs() < 1e-6);
    }

    #[test]
    fn point_light_follows_camera() {
        let mut scene = SceneGraph::assemble(&SceneDesc::default(), 800, 600).unwrap();
        let light = *scene.point_light();
        assert!((light.world_position(scene.camera()) - scene.camera().eye).length() < 1e-5);

        scene.camera_mut().eye = vec3(4.0, 1.0, -2.0);
        let moved = light.world_position(scene.camera());
        assert!((moved - vec3(4.0, 1.0, -2.0)).length() < 1e-4);
    }

    #[test]
    fn rejects_bad_canonical_size() {
        let desc = SceneDesc {
            canonical_size: 0.0,
            ..SceneDesc::default()
        };
        assert_eq!(
            SceneGraph::assemble(&desc, 800, 600).err(),
            Some(CoreError::InvalidCanonicalSize(0.0))
        );
    }
}
