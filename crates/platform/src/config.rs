//! Viewer configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is a valid config.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use asset::LoadStrategy;
use corelib::{camera::CameraDesc, normalize::DEFAULT_CANONICAL_SIZE};
use renderer::{EffectKind, PipelineMode, SceneDesc};
use serde::{Deserialize, Serialize};

use crate::scheduler::RenderMode;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub model: ModelConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
    pub render: RenderConfig,
    pub window: WindowConfig,
}

/// Which files make up the model. `materials` wins over `texture`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub mesh: PathBuf,
    pub texture: Option<PathBuf>,
    pub materials: Option<PathBuf>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            mesh: PathBuf::from("models/spot.obj"),
            texture: Some(PathBuf::from("models/texture_test.JPG")),
            materials: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Average extent the model is normalized against.
    pub canonical_size: f32,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            canonical_size: DEFAULT_CANONICAL_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_deg: f32,
    pub near: f32,
    pub far: f32,
    pub eye_z: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        let desc = CameraDesc::default();
        Self {
            fov_y_deg: desc.fov_y_deg,
            near: desc.z_near,
            far: desc.z_far,
            eye_z: desc.eye_z,
            min_distance: 1.0,
            max_distance: 8.0,
        }
    }
}

impl CameraConfig {
    pub fn desc(&self) -> CameraDesc {
        CameraDesc {
            fov_y_deg: self.fov_y_deg,
            z_near: self.near,
            z_far: self.far,
            eye_z: self.eye_z,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub mode: RenderMode,
    pub pipeline: PipelineMode,
    /// Effects between the scene and output passes, in order.
    pub effects: Vec<EffectKind>,
    pub glitch_interval: u32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            mode: RenderMode::Continuous,
            pipeline: PipelineMode::Composited,
            effects: vec![EffectKind::Glitch],
            glitch_interval: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

impl ViewerConfig {
    /// Read and validate a config file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config = Self::from_toml(&text).with_context(|| format!("In config {:?}", path))?;
        log::info!("Loaded config from {:?}", path);
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let size = self.scene.canonical_size;
        if !(size.is_finite() && size > 0.0) {
            bail!("scene.canonical_size must be positive, got {size}");
        }
        if self.camera.near >= self.camera.far {
            bail!(
                "camera.near ({}) must be less than camera.far ({})",
                self.camera.near,
                self.camera.far
            );
        }
        self.camera.desc().validate()?;
        if self.camera.min_distance > self.camera.max_distance {
            bail!(
                "camera.min_distance ({}) exceeds camera.max_distance ({})",
                self.camera.min_distance,
                self.camera.max_distance
            );
        }
        if self.window.width == 0 || self.window.height == 0 {
            bail!(
                "window size must be non-zero, got {}x{}",
                self.window.width,
                self.window.height
            );
        }
        Ok(())
    }

    pub fn load_strategy(&self) -> LoadStrategy {
        let mesh = self.model.mesh.clone();
        match &self.model.materials {
            Some(materials) => {
                if self.model.texture.is_some() {
                    log::warn!("Both texture and materials configured; using materials");
                }
                LoadStrategy::MaterialLibrary {
                    mesh,
                    materials: materials.clone(),
                }
            }
            None => LoadStrategy::SingleTexture {
                mesh,
                texture: self.model.texture.clone(),
            },
        }
    }

    /// Scene layout with the configured camera and normalization target.
    pub fn scene_desc(&self) -> SceneDesc {
        SceneDesc {
            camera: self.camera.desc(),
            canonical_size: self.scene.canonical_size,
            ..SceneDesc::default()
        }
    }
}
