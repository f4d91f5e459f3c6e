//! Entry point for ModelView.
//! Logging, CLI flags layered over an optional TOML config.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use platform::{RenderMode, ViewerConfig};
use renderer::PipelineMode;

#[derive(Parser, Debug)]
#[command(name = "modelview")]
#[command(about = "OBJ/MTL model viewer with event-driven or continuous rendering")]
struct Cli {
    /// TOML config file; CLI flags override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// OBJ mesh to display
    #[arg(long)]
    mesh: Option<PathBuf>,

    /// Single texture applied to every mesh node
    #[arg(long, conflicts_with = "materials")]
    texture: Option<PathBuf>,

    /// MTL library supplying per-node materials
    #[arg(long)]
    materials: Option<PathBuf>,

    #[arg(long, value_enum)]
    mode: Option<ModeArg>,

    #[arg(long, value_enum)]
    pipeline: Option<PipelineArg>,

    /// Window size as WxH
    #[arg(long, value_parser = parse_size)]
    size: Option<(u32, u32)>,

    /// auto|vulkan|dx12|metal|gl
    #[arg(long = "gpu-backend", default_value = "auto", value_parser = parse_backend)]
    gpu_backend: wgpu::Backends,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModeArg {
    EventDriven,
    Continuous,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum PipelineArg {
    Direct,
    Composited,
}

fn parse_backend(val: &str) -> Result<wgpu::Backends, String> {
    match val.to_ascii_lowercase().as_str() {
        "auto" => Ok(wgpu::Backends::all()),
        "vulkan" | "vk" => Ok(wgpu::Backends::VULKAN),
        "dx12" | "d3d12" => Ok(wgpu::Backends::DX12),
        "metal" | "mtl" => Ok(wgpu::Backends::METAL),
        "gl" | "opengl" | "gles" => Ok(wgpu::Backends::GL),
        other => Err(format!("unknown backend '{other}'")),
    }
}

fn parse_size(val: &str) -> Result<(u32, u32), String> {
    let (w, h) = val
        .split_once('x')
        .or_else(|| val.split_once('X'))
        .ok_or_else(|| format!("expected WxH, got '{val}'"))?;
    let w = w.parse::<u32>().map_err(|e| e.to_string())?;
    let h = h.parse::<u32>().map_err(|e| e.to_string())?;
    if w == 0 || h == 0 {
        return Err("size must be non-zero".into());
    }
    Ok((w, h))
}

impl Cli {
    fn into_config(self) -> Result<(ViewerConfig, wgpu::Backends)> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(mesh) = self.mesh {
            config.model.mesh = mesh;
        }
        if let Some(texture) = self.texture {
            config.model.texture = Some(texture);
            config.model.materials = None;
        }
        if let Some(materials) = self.materials {
            config.model.materials = Some(materials);
            config.model.texture = None;
        }
        if let Some(mode) = self.mode {
            config.render.mode = match mode {
                ModeArg::EventDriven => RenderMode::EventDriven,
                ModeArg::Continuous => RenderMode::Continuous,
            };
        }
        if let Some(pipeline) = self.pipeline {
            config.render.pipeline = match pipeline {
                PipelineArg::Direct => PipelineMode::Direct,
                PipelineArg::Composited => PipelineMode::Composited,
            };
        }
        if let Some((width, height)) = self.size {
            config.window.width = width;
            config.window.height = height;
        }
        config.validate()?;
        Ok((config, self.gpu_backend))
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let (config, backends) = Cli::parse().into_config()?;
    log::info!(
        "Starting ModelView. Backend: {:?}, mode: {:?}, pipeline: {:?}, window_size={}x{}",
        backends,
        config.render.mode,
        config.render.pipeline,
        config.window.width,
        config.window.height
    );

    platform::run_viewer(config, backends)?;

    log::info!("Graceful shutdown. Bye!");
    Ok(())
}
