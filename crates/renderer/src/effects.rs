//! Composited passes: scene, full-screen effects, output.

use std::num::NonZeroU64;

use bytemuck::{Pod, Zeroable};
use rand::{Rng, SeedableRng, rngs::StdRng};
use serde::{Deserialize, Serialize};
use wgpu::{
    BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, Buffer,
    BufferBindingType, BufferUsages, ColorTargetState, ColorWrites, Device, FragmentState,
    LoadOp, Operations, PipelineLayoutDescriptor, RenderPassColorAttachment,
    RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor, Sampler,
    ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, TextureFormat, VertexState,
};

use crate::{
    PassChain, RenderError,
    framegraph::{Pass, PassIo, PassKind},
    gpu::{GpuFrame, HDR_FORMAT},
};

/// Full-screen effect selectable from config.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EffectKind {
    Glitch,
    Film,
}

/// Frame-driven glitch timing. A strong burst lands at the end of each period,
/// the first fifth of the next period jitters mildly, the rest is clean.
#[derive(Debug)]
pub struct GlitchClock {
    rng: StdRng,
    interval: u32,
    period: u32,
    frame: u32,
}

impl GlitchClock {
    pub fn new(interval: u32, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let interval = interval.clamp(1, u32::MAX / 2);
        let period = rng.gen_range(interval..interval * 2);
        Self {
            rng,
            interval,
            period,
            frame: 0,
        }
    }

    pub fn period(&self) -> u32 {
        self.period
    }

    /// Advance one frame and return the distortion amount in `[0, 1]`.
    pub fn tick(&mut self) -> f32 {
        self.frame += 1;
        if self.frame >= self.period {
            self.frame = 0;
            self.period = self.rng.gen_range(self.interval..self.interval * 2);
            self.rng.gen_range(0.5..1.0)
        } else if self.frame < self.period / 5 {
            self.rng.gen_range(0.0..0.15)
        } else {
            0.0
        }
    }
}

/// Draws the scene into the pass output.
pub struct ScenePass;

impl Pass<GpuFrame> for ScenePass {
    fn label(&self) -> &str {
        "scene"
    }

    fn kind(&self) -> PassKind {
        PassKind::Scene
    }

    fn run(&mut self, ctx: &mut GpuFrame, io: PassIo) -> Result<(), RenderError> {
        let view = ctx.view(io.output);
        ctx.scene
            .encode(&mut ctx.encoder, &view, &ctx.depth, ctx.clear);
        Ok(())
    }
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct PostParams {
    time: f32,
    seed: f32,
    amount: f32,
    _pad: f32,
}

pub enum PostEffect {
    Glitch { clock: GlitchClock },
    Film { intensity: f32 },
    Output,
}

impl PostEffect {
    fn entry_point(&self) -> &'static str {
        match self {
            Self::Glitch { .. } => "fs_glitch",
            Self::Film { .. } => "fs_film",
            Self::Output => "fs_output",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Glitch { .. } => "glitch",
            Self::Film { .. } => "film",
            Self::Output => "output",
        }
    }
}

/// Full-screen pass sampling the previous target.
pub struct PostPass {
    effect: PostEffect,
    pipeline: RenderPipeline,
    layout: BindGroupLayout,
    sampler: Sampler,
    params: Buffer,
}

impl PostPass {
    pub fn new(device: &Device, effect: PostEffect, target_format: TextureFormat) -> Self {
        let label = effect.label();
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Post WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/post.wgsl").into()),
        });
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: NonZeroU64::new(
                            std::mem::size_of::<PostParams>() as u64
                        ),
                    },
                    count: None,
                },
            ],
        });
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some(label),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some(label),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_fullscreen"),
                buffers: &[],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some(effect.entry_point()),
                targets: &[Some(ColorTargetState {
                    format: target_format,
                    blend: None,
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<PostParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        Self {
            effect,
            pipeline,
            layout,
            sampler,
            params,
        }
    }

    fn params(&mut self, ctx: &GpuFrame) -> PostParams {
        let amount = match &mut self.effect {
            PostEffect::Glitch { clock } => clock.tick(),
            PostEffect::Film { intensity } => *intensity,
            PostEffect::Output => 0.0,
        };
        PostParams {
            time: ctx.time,
            seed: (ctx.frame_index % 4096) as f32,
            amount,
            _pad: 0.0,
        }
    }
}

impl Pass<GpuFrame> for PostPass {
    fn label(&self) -> &str {
        self.effect.label()
    }

    fn kind(&self) -> PassKind {
        match self.effect {
            PostEffect::Output => PassKind::Output,
            _ => PassKind::Effect,
        }
    }

    fn run(&mut self, ctx: &mut GpuFrame, io: PassIo) -> Result<(), RenderError> {
        let input = io.input.ok_or_else(|| {
            RenderError::InvalidChain(format!("pass '{}' has no input", self.label()))
        })?;
        let params = self.params(ctx);
        ctx.queue
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&params));

        // Inputs ping-pong, so the bind group follows the routing each frame.
        let src = ctx.view(input);
        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(self.effect.label()),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&src),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: self.params.as_entire_binding(),
                },
            ],
        });

        let dst = ctx.view(io.output);
        let mut rpass = ctx.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some(self.effect.label()),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &dst,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(wgpu::Color::BLACK),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &bind_group, &[]);
        rpass.draw(0..3, 0..1);
        Ok(())
    }
}

const FILM_INTENSITY: f32 = 0.35;

/// Scene, then the requested effects in order, then output to `surface_format`.
pub fn build_composer(
    device: &Device,
    surface_format: TextureFormat,
    effects: &[EffectKind],
    glitch_interval: u32,
) -> Result<PassChain<GpuFrame>, RenderError> {
    let mut chain = PassChain::new().with_pass(Box::new(ScenePass));
    for (i, kind) in effects.iter().enumerate() {
        let effect = match kind {
            EffectKind::Glitch => PostEffect::Glitch {
                clock: GlitchClock::new(glitch_interval, 0x5eed ^ i as u64),
            },
            EffectKind::Film => PostEffect::Film {
                intensity: FILM_INTENSITY,
            },
        };
        chain.add_pass(Box::new(PostPass::new(device, effect, HDR_FORMAT)));
    }
    chain.add_pass(Box::new(PostPass::new(
        device,
        PostEffect::Output,
        surface_format,
    )));
    chain.compile()?;
    Ok(chain)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn period_stays_within_interval_range() {
        let mut clock = GlitchClock::new(10, 7);
        for _ in 0..500 {
            assert!((10..20).contains(&clock.period()));
            clock.tick();
        }
    }

    #[test]
    fn strong_burst_once_per_period() {
        let mut clock = GlitchClock::new(30, 1);
        let period = clock.period();
        let amounts: Vec<f32> = (0..period).map(|_| clock.tick()).collect();
        let strong = amounts.iter().filter(|a| **a >= 0.5).count();
        assert_eq!(strong, 1);
        assert!(*amounts.last().unwrap() >= 0.5);
        assert!(amounts.iter().all(|a| (0.0..=1.0).contains(a)));
    }

    #[test]
    fn quiet_after_jitter_window() {
        let mut clock = GlitchClock::new(50, 3);
        let period = clock.period();
        let amounts: Vec<f32> = (0..period - 1).map(|_| clock.tick()).collect();
        for (i, a) in amounts.iter().enumerate() {
            let frame = i as u32 + 1;
            if frame < period / 5 {
                assert!(*a < 0.15);
            } else {
                assert_eq!(*a, 0.0);
            }
        }
    }

    #[test]
    fn zero_interval_is_clamped() {
        let mut clock = GlitchClock::new(0, 9);
        assert_eq!(clock.period(), 1);
        assert!(clock.tick() >= 0.5);
    }

    #[test]
    fn effect_kinds_parse_kebab_case() {
        #[derive(Deserialize)]
        struct Wrap {
            effects: Vec<EffectKind>,
        }
        let w: Wrap = toml::from_str(r#"effects = ["glitch", "film"]"#).unwrap();
        assert_eq!(w.effects, vec![EffectKind::Glitch, EffectKind::Film]);
    }
}
