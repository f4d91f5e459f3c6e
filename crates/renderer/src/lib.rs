//! Renderer: scene graph, composited pass chain, wgpu backend.
//! wgpu = 26.x, winit = 0.30.x

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod effects;
pub mod framegraph;
pub mod gpu;
pub mod scene;

pub use effects::EffectKind;
pub use framegraph::{Pass, PassChain, PassId, PassIo, PassKind, Target};
pub use gpu::{GpuOptions, GpuState};
pub use scene::{
    AmbientLight, AssemblyStep, PointLight, Primitive, PrimitiveShape, SceneDesc, SceneGraph,
    SceneModel,
};

/// Direct draw to the surface, or scene -> effects -> output through a [`PassChain`].
/// Chosen once when the renderer is created.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineMode {
    Direct,
    #[default]
    Composited,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Invalid pass chain: {0}")]
    InvalidChain(String),
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("GPU out of memory")]
    OutOfMemory,
    #[error("Renderer setup failed: {0}")]
    Setup(String),
}

/// Anything that can draw a [`SceneGraph`] into an output of known size.
pub trait FrameRenderer {
    /// New output size; takes effect for the next `render`.
    fn resize(&mut self, width: u32, height: u32);

    fn output_size(&self) -> (u32, u32);

    /// Make a freshly inserted model drawable.
    fn upload_model(&mut self, model: &asset::LoadedModel) -> Result<(), RenderError>;

    fn render(&mut self, scene: &SceneGraph) -> Result<(), RenderError>;
}
