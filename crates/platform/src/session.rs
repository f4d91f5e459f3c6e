//! One viewer session: scene, camera controls, scheduling and the renderer.

use anyhow::Result;
use asset::LoadedModel;
use corelib::orbit::OrbitControls;
use renderer::{FrameRenderer, RenderError, SceneGraph};

use crate::{
    config::ViewerConfig,
    scheduler::{RenderMode, RenderScheduler, Signal},
};

pub struct SessionBuilder {
    config: ViewerConfig,
    viewport: Option<(u32, u32)>,
}

impl SessionBuilder {
    /// Initial output size. Defaults to the configured window size.
    pub fn viewport(mut self, width: u32, height: u32) -> Self {
        self.viewport = Some((width.max(1), height.max(1)));
        self
    }

    /// Assemble the scene and bind it to `renderer`.
    pub fn build<R: FrameRenderer>(self, mut renderer: R) -> Result<ViewerSession<R>> {
        let config = self.config;
        config.validate()?;
        let (width, height) = self
            .viewport
            .unwrap_or((config.window.width, config.window.height));

        let scene = SceneGraph::assemble(&config.scene_desc(), width, height)?;
        let orbit = OrbitControls::from_camera(
            scene.camera(),
            config.camera.min_distance,
            config.camera.max_distance,
        )?;
        if renderer.output_size() != (width, height) {
            renderer.resize(width, height);
        }
        let scheduler = RenderScheduler::new(config.render.mode);
        log::info!(
            "Session ready: {:?} rendering, {:?} pipeline, viewport {}x{}",
            config.render.mode,
            config.render.pipeline,
            width,
            height
        );

        Ok(ViewerSession {
            config,
            scene,
            orbit,
            scheduler,
            renderer,
            renders: 0,
        })
    }
}

pub struct ViewerSession<R: FrameRenderer> {
    config: ViewerConfig,
    scene: SceneGraph,
    orbit: OrbitControls,
    scheduler: RenderScheduler,
    renderer: R,
    renders: u64,
}

impl<R: FrameRenderer> ViewerSession<R> {
    pub fn builder(config: ViewerConfig) -> SessionBuilder {
        SessionBuilder {
            config,
            viewport: None,
        }
    }

    /// Result of the asset load. `None` (failed load) still schedules a frame.
    pub fn on_model_loaded(&mut self, model: Option<LoadedModel>) {
        match model {
            Some(model) => {
                if self.scene.insert_model(model).is_some() {
                    if let Some(placed) = self.scene.model() {
                        if let Err(e) = self.renderer.upload_model(&placed.model) {
                            log::error!("Model upload failed: {e}");
                        }
                    }
                }
            }
            None => log::warn!("No model loaded; rendering scene without it"),
        }
        self.scheduler.signal(Signal::AssetReady);
    }

    /// New viewport size; camera and renderer are updated before the next render.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            log::debug!("Ignoring zero-sized viewport {}x{}", width, height);
            return;
        }
        self.scene.set_viewport(width, height);
        self.renderer.resize(width, height);
        self.scheduler.signal(Signal::Resize);
    }

    pub fn pointer_drag(&mut self, dx: f32, dy: f32) {
        if self.orbit.rotate(dx, dy) {
            self.orbit.apply(self.scene.camera_mut());
            self.scheduler.signal(Signal::Interaction);
        }
    }

    /// Wheel input in lines; positive zooms in.
    pub fn scroll(&mut self, lines: f32) {
        if self.orbit.zoom(lines) {
            self.orbit.apply(self.scene.camera_mut());
            self.scheduler.signal(Signal::Interaction);
        }
    }

    /// Display refresh. Only continuous mode turns it into a frame.
    pub fn tick(&mut self) {
        self.scheduler.signal(Signal::Tick);
    }

    pub fn needs_redraw(&self) -> bool {
        self.scheduler.is_due()
    }

    /// Render if a frame is due. Returns whether a frame was drawn.
    pub fn redraw(&mut self) -> Result<bool, RenderError> {
        if !self.scheduler.take_due() {
            return Ok(false);
        }
        self.renderer.render(&self.scene)?;
        self.renders += 1;
        Ok(true)
    }

    pub fn mode(&self) -> RenderMode {
        self.scheduler.mode()
    }

    pub fn renders(&self) -> u64 {
        self.renders
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn orbit(&self) -> &OrbitControls {
        &self.orbit
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    /// Release scene contents and hand the renderer back.
    pub fn teardown(mut self) -> R {
        self.scene.clear();
        log::info!("Session closed after {} render(s)", self.renders);
        self.renderer
    }
}
