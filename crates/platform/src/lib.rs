//! Platform layer: window, event loop, asset loader thread.
//!
//! - The event loop owns the session; every scene mutation happens on it.
//! - Assets load on a separate thread and arrive as a user event.
//! - Event-driven mode waits for events, continuous mode polls and redraws
//!   every iteration.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use anyhow::{Context, Result, anyhow};
use asset::{LoadStrategy, LoadedModel, load_assets};
use renderer::{GpuOptions, GpuState, RenderError};
use winit::{
    application::ApplicationHandler,
    dpi::{PhysicalPosition, PhysicalSize},
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop, EventLoopProxy},
    window::{Window, WindowId},
};

pub mod config;
pub mod scheduler;
pub mod session;

pub use config::ViewerConfig;
pub use scheduler::{RenderMode, RenderScheduler, Signal};
pub use session::{SessionBuilder, ViewerSession};

/// Pixels of touchpad scroll per wheel line.
const PIXELS_PER_LINE: f32 = 40.0;

/// Messages from the loader thread.
#[derive(Debug)]
pub enum ViewerEvent {
    Progress(f32),
    /// Terminal; `None` if the mesh could not be loaded.
    ModelLoaded(Option<LoadedModel>),
}

struct ViewerApp {
    config: ViewerConfig,
    backends: wgpu::Backends,
    window: Option<Arc<Window>>,
    session: Option<ViewerSession<GpuState>>,
    /// Model that arrived before the GPU was ready.
    pending_model: Option<Option<LoadedModel>>,
    dragging: bool,
    last_cursor: Option<PhysicalPosition<f64>>,
    error: Option<anyhow::Error>,
}

impl ViewerApp {
    fn new(config: ViewerConfig, backends: wgpu::Backends) -> Self {
        Self {
            config,
            backends,
            window: None,
            session: None,
            pending_model: None,
            dragging: false,
            last_cursor: None,
            error: None,
        }
    }

    fn gpu_options(&self) -> GpuOptions {
        GpuOptions {
            backends: self.backends,
            pipeline: self.config.render.pipeline,
            effects: self.config.render.effects.clone(),
            glitch_interval: self.config.render.glitch_interval,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = Window::default_attributes()
            .with_title("ModelView")
            .with_inner_size(PhysicalSize::new(
                self.config.window.width,
                self.config.window.height,
            ));
        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .context("Failed to create window")?,
        );
        let size = window.inner_size();
        log::info!("Window created: {}x{}", size.width, size.height);

        let gpu = pollster::block_on(GpuState::new(window.clone(), &self.gpu_options()))?;
        let mut session = ViewerSession::<GpuState>::builder(self.config.clone())
            .viewport(size.width, size.height)
            .build(gpu)?;
        if let Some(model) = self.pending_model.take() {
            session.on_model_loaded(model);
        }
        if session.needs_redraw() {
            window.request_redraw();
        }

        self.window = Some(window);
        self.session = Some(session);
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: anyhow::Error) {
        log::error!("{err:#}");
        self.error = Some(err);
        event_loop.exit();
    }

    fn request_redraw_if_due(&self) {
        if let (Some(window), Some(session)) = (&self.window, &self.session) {
            if session.needs_redraw() {
                window.request_redraw();
            }
        }
    }
}

impl ApplicationHandler<ViewerEvent> for ViewerApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(err) = self.init(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn user_event(&mut self, _event_loop: &ActiveEventLoop, event: ViewerEvent) {
        match event {
            ViewerEvent::Progress(fraction) => {
                log::debug!("Loading: {:.0}%", fraction * 100.0);
            }
            ViewerEvent::ModelLoaded(model) => match &mut self.session {
                Some(session) => {
                    session.on_model_loaded(model);
                    self.request_redraw_if_due();
                }
                None => self.pending_model = Some(model),
            },
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let Some(session) = self.session.as_mut() else {
            if matches!(event, WindowEvent::CloseRequested) {
                event_loop.exit();
            }
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested. Exiting event loop.");
                event_loop.exit();
                return;
            }
            WindowEvent::Resized(size) => {
                log::info!("Resized: {}x{}", size.width, size.height);
                session.resize(size.width, size.height);
            }
            WindowEvent::ScaleFactorChanged { scale_factor, .. } => {
                log::info!("Scale factor changed: {:.3}", scale_factor);
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.dragging = state == ElementState::Pressed;
            }
            WindowEvent::CursorMoved { position, .. } => {
                if let (true, Some(last)) = (self.dragging, self.last_cursor) {
                    session.pointer_drag(
                        (position.x - last.x) as f32,
                        (position.y - last.y) as f32,
                    );
                }
                self.last_cursor = Some(position);
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let lines = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(p) => p.y as f32 / PIXELS_PER_LINE,
                };
                session.scroll(lines);
            }
            WindowEvent::RedrawRequested => match session.redraw() {
                Ok(_) => {}
                Err(RenderError::OutOfMemory) => {
                    self.fail(event_loop, anyhow!(RenderError::OutOfMemory));
                    return;
                }
                Err(e) => log::error!("Render error: {e}"),
            },
            _ => {}
        }
        self.request_redraw_if_due();
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.as_mut() {
            if session.mode() == RenderMode::Continuous {
                session.tick();
            }
        }
        self.request_redraw_if_due();
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(session) = self.session.take() {
            drop(session.teardown());
        }
        self.window = None;
    }
}

/// Load on a dedicated thread with its own current-thread runtime. The loader
/// owns no scene state; it only reports progress and the final model.
fn spawn_loader(
    strategy: LoadStrategy,
    proxy: EventLoopProxy<ViewerEvent>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("asset-loader".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    log::error!("Failed to start loader runtime: {e}");
                    let _ = proxy.send_event(ViewerEvent::ModelLoaded(None));
                    return;
                }
            };
            let progress = proxy.clone();
            let model = runtime.block_on(load_assets(&strategy, move |fraction| {
                let _ = progress.send_event(ViewerEvent::Progress(fraction));
            }));
            if proxy.send_event(ViewerEvent::ModelLoaded(model)).is_err() {
                log::debug!("Event loop closed before the model arrived");
            }
        })
        .context("Failed to spawn loader thread")
}

/// Open the viewer window and run until it is closed.
pub fn run_viewer(config: ViewerConfig, backends: wgpu::Backends) -> Result<()> {
    config.validate()?;

    let event_loop = EventLoop::<ViewerEvent>::with_user_event()
        .build()
        .context("Failed to create event loop")?;
    event_loop.set_control_flow(match config.render.mode {
        RenderMode::Continuous => ControlFlow::Poll,
        RenderMode::EventDriven => ControlFlow::Wait,
    });

    let strategy = config.load_strategy();
    log::info!("Loading {:?}", strategy);
    let loader = spawn_loader(strategy, event_loop.create_proxy())?;

    let mut app = ViewerApp::new(config, backends);
    event_loop
        .run_app(&mut app)
        .map_err(|e| anyhow!("Event loop error: {e:?}"))?;

    // Loads cannot be cancelled; an unfinished loader is left to exit with the process.
    if loader.is_finished() {
        let _ = loader.join();
    }

    match app.error.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
