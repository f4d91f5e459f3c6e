//! wgpu backend: surface, depth, lit mesh pipeline, optional composited chain.

use std::collections::HashMap;
use std::num::NonZeroU64;
use std::sync::Arc;
use std::time::Instant;

use asset::{LoadedModel, MaterialRef, MeshData, TextureData};
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use wgpu::{
    BindGroup, BindGroupLayout, BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType,
    BlendState, Buffer, BufferBindingType, BufferUsages, ColorTargetState, ColorWrites,
    CommandEncoder, CommandEncoderDescriptor, DepthBiasState, DepthStencilState, Device,
    DeviceDescriptor, Extent3d, Features, FragmentState, Instance, InstanceDescriptor, Limits,
    LoadOp, Operations, PipelineLayoutDescriptor, PowerPreference, PresentMode, Queue,
    RenderPassColorAttachment, RenderPassDescriptor, RenderPipeline, RenderPipelineDescriptor,
    Sampler, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, Surface,
    SurfaceConfiguration, SurfaceError, TextureDescriptor, TextureDimension, TextureFormat,
    TextureUsages, TextureView, TextureViewDescriptor, VertexBufferLayout, VertexState,
    VertexStepMode, util::DeviceExt,
};
use winit::{dpi::PhysicalSize, window::Window};

use crate::{
    EffectKind, FrameRenderer, PassChain, PipelineMode, RenderError, Target,
    effects::build_composer,
    scene::{PrimitiveShape, SceneGraph},
};

/// Vertex: position + normal + uv.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct GpuVertex {
    pub pos: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}
impl GpuVertex {
    const ATTRIBS: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];

    pub const LAYOUT: VertexBufferLayout<'static> = VertexBufferLayout {
        array_stride: std::mem::size_of::<GpuVertex>() as u64,
        step_mode: VertexStepMode::Vertex,
        attributes: &Self::ATTRIBS,
    };
}

/// Per-frame UBO (16-byte aligned).
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FrameUniform {
    view_proj: [[f32; 4]; 4],
    ambient: [f32; 4],
    light_position: [f32; 4],
    light_color: [f32; 4],
}

/// Per-object UBO.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct DrawUniform {
    model: [[f32; 4]; 4],
    normal: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MaterialUniform {
    tint: [f32; 4],
}

const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;
/// Offscreen format for composited rendering.
pub const HDR_FORMAT: TextureFormat = TextureFormat::Rgba16Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.0,
    b: 0.0,
    a: 1.0,
};

/// glam's GL-style clip space (z in [-1,1]) to wgpu's (z in [0,1]).
#[rustfmt::skip]
const OPENGL_TO_WGPU: Mat4 = Mat4::from_cols_array(&[
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
]);

/// Renderer construction options. Pipeline mode and effects are fixed for the
/// renderer's lifetime.
#[derive(Clone, Debug)]
pub struct GpuOptions {
    pub backends: wgpu::Backends,
    pub pipeline: PipelineMode,
    pub effects: Vec<EffectKind>,
    /// Mean frames between strong glitches.
    pub glitch_interval: u32,
}

impl Default for GpuOptions {
    fn default() -> Self {
        Self {
            backends: wgpu::Backends::all(),
            pipeline: PipelineMode::Composited,
            effects: vec![EffectKind::Glitch],
            glitch_interval: 120,
        }
    }
}

#[derive(Clone)]
struct GpuMesh {
    vertex_buf: Buffer,
    index_buf: Buffer,
    index_count: u32,
}

/// Everything drawn with one model matrix.
#[derive(Clone)]
struct DrawObject {
    draw_buf: Buffer,
    draw_bg: BindGroup,
    parts: Vec<(GpuMesh, BindGroup)>,
}

/// Cloned handles needed to encode the scene; owned so a frame context can carry it.
#[derive(Clone)]
pub struct SceneDraw {
    pipeline: RenderPipeline,
    frame_bg: BindGroup,
    objects: Vec<DrawObject>,
}

impl SceneDraw {
    pub fn encode(
        &self,
        encoder: &mut CommandEncoder,
        color: &TextureView,
        depth: &TextureView,
        clear: wgpu::Color,
    ) {
        let mut rpass = encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("ScenePass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: color,
                depth_slice: None,
                resolve_target: None,
                ops: Operations {
                    load: LoadOp::Clear(clear),
                    store: StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(Operations {
                    load: LoadOp::Clear(1.0),
                    store: StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });

        rpass.set_pipeline(&self.pipeline);
        rpass.set_bind_group(0, &self.frame_bg, &[]);
        for object in &self.objects {
            rpass.set_bind_group(1, &object.draw_bg, &[]);
            for (mesh, material_bg) in &object.parts {
                rpass.set_bind_group(2, material_bg, &[]);
                rpass.set_vertex_buffer(0, mesh.vertex_buf.slice(..));
                rpass.set_index_buffer(mesh.index_buf.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }
    }
}

/// Per-frame context handed to every pass of the composited chain.
pub struct GpuFrame {
    pub device: Device,
    pub queue: Queue,
    pub encoder: CommandEncoder,
    pub scene: SceneDraw,
    pub depth: TextureView,
    pub offscreen: [TextureView; 2],
    pub screen: TextureView,
    pub clear: wgpu::Color,
    pub time: f32,
    pub frame_index: u64,
}

impl GpuFrame {
    pub fn view(&self, target: Target) -> TextureView {
        match target {
            Target::Offscreen(i) => self.offscreen[usize::from(i & 1)].clone(),
            Target::Screen => self.screen.clone(),
        }
    }
}

pub struct GpuState {
    // Surface
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,

    // Device/queue
    device: Device,
    queue: Queue,

    // Scene pipeline
    mesh_pipeline: RenderPipeline,
    draw_bgl: BindGroupLayout,
    material_bgl: BindGroupLayout,
    sampler: Sampler,
    frame_buf: Buffer,
    frame_bg: BindGroup,
    primitives: Vec<DrawObject>,
    model: Option<DrawObject>,

    // Composited path
    composer: Option<PassChain<GpuFrame>>,
    offscreen: Option<[TextureView; 2]>,

    // Depth
    depth_view: TextureView,

    start: Instant,
    frame_index: u64,

    // Size cache
    width: u32,
    height: u32,
}

impl GpuState {
    /// Create GPU state bound to an Arc<Window>.
    pub async fn new(window: Arc<Window>, options: &GpuOptions) -> Result<Self, RenderError> {
        let PhysicalSize { width, height } = window.inner_size();
        let width = width.max(1);
        let height = height.max(1);

        // Instance & surface
        let instance = Instance::new(&InstanceDescriptor {
            backends: options.backends,
            ..Default::default()
        });
        let surface: Surface<'static> = instance
            .create_surface(window.clone())
            .map_err(|e| RenderError::Setup(format!("create_surface failed: {e}")))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| RenderError::Setup(format!("No suitable GPU adapter: {e}")))?;
        log::info!("Using adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("ModelView Device"),
                required_features: Features::empty(),
                required_limits: Limits::downlevel_webgl2_defaults()
                    .using_resolution(adapter.limits()),
                ..Default::default()
            })
            .await
            .map_err(|e| RenderError::Setup(format!("request_device failed: {e}")))?;

        // Surface format (prefer sRGB)
        let caps = surface.get_capabilities(&adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| RenderError::Setup("surface reports no formats".into()))?;

        // Configure surface
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width,
            height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let depth_view = create_depth_view(&device, width, height);

        // The scene renders to the surface directly, or to an HDR target the chain reads.
        let scene_format = match options.pipeline {
            PipelineMode::Direct => surface_format,
            PipelineMode::Composited => HDR_FORMAT,
        };

        // ==== Shaders ====
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("Mesh WGSL"),
            source: ShaderSource::Wgsl(include_str!("shaders/mesh.wgsl").into()),
        });

        // ==== Bind group layouts ====
        let frame_bgl = uniform_layout::<FrameUniform>(
            &device,
            "Frame BGL",
            ShaderStages::VERTEX_FRAGMENT,
        );
        let draw_bgl = uniform_layout::<DrawUniform>(&device, "Draw BGL", ShaderStages::VERTEX);
        let material_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("Material BGL"),
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
                            std::mem::size_of::<MaterialUniform>() as u64,
                        ),
                    },
                    count: None,
                },
            ],
        });

        let frame_buf = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Frame UBO"),
            size: std::mem::size_of::<FrameUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let frame_bg = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame BG"),
            layout: &frame_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buf.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Albedo Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        // ==== Pipeline ====
        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("Mesh PipelineLayout"),
            bind_group_layouts: &[&frame_bgl, &draw_bgl, &material_bgl],
            push_constant_ranges: &[],
        });
        let mesh_pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("Mesh Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[GpuVertex::LAYOUT],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(ColorTargetState {
                    format: scene_format,
                    blend: Some(BlendState::REPLACE),
                    write_mask: ColorWrites::ALL,
                })],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            }),
            // OBJ winding is not reliable; the shader flips back-face normals.
            primitive: wgpu::PrimitiveState {
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::LessEqual,
                stencil: wgpu::StencilState::default(),
                bias: DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let (composer, offscreen) = match options.pipeline {
            PipelineMode::Direct => (None, None),
            PipelineMode::Composited => {
                let chain = build_composer(
                    &device,
                    surface_format,
                    &options.effects,
                    options.glitch_interval,
                )?;
                log::info!("Composited pipeline: {:?}", chain.labels());
                (Some(chain), Some(create_offscreen(&device, width, height)))
            }
        };

        Ok(Self {
            surface,
            surface_config,
            device,
            queue,
            mesh_pipeline,
            draw_bgl,
            material_bgl,
            sampler,
            frame_buf,
            frame_bg,
            primitives: Vec::new(),
            model: None,
            composer,
            offscreen,
            depth_view,
            start: Instant::now(),
            frame_index: 0,
            width,
            height,
        })
    }

    pub fn is_surface_lost(err: &SurfaceError) -> bool {
        matches!(err, SurfaceError::Lost | SurfaceError::Outdated)
    }

    pub fn recreate_surface(&mut self) {
        self.resize(self.width, self.height);
    }

    fn upload_mesh(&self, label: &str, vertices: &[GpuVertex], indices: &[u32]) -> GpuMesh {
        let vertex_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} VB")),
            contents: bytemuck::cast_slice(vertices),
            usage: BufferUsages::VERTEX,
        });
        let index_buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} IB")),
            contents: bytemuck::cast_slice(indices),
            usage: BufferUsages::INDEX,
        });
        GpuMesh {
            vertex_buf,
            index_buf,
            index_count: indices.len() as u32,
        }
    }

    fn upload_texture(&self, label: &str, texture: &TextureData) -> TextureView {
        let size = Extent3d {
            width: texture.width,
            height: texture.height,
            depth_or_array_layers: 1,
        };
        let tex = self.device.create_texture(&TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: TextureFormat::Rgba8UnormSrgb,
            usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &tex,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &texture.data,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(texture.bytes_per_pixel() * texture.width),
                rows_per_image: Some(texture.height),
            },
            size,
        );
        tex.create_view(&TextureViewDescriptor::default())
    }

    fn material_bind_group(&self, label: &str, view: &TextureView, tint: [f32; 3]) -> BindGroup {
        let [r, g, b] = tint.map(srgb_to_linear);
        let uniform = MaterialUniform {
            tint: [r, g, b, 1.0],
        };
        let buf = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label} Material UBO")),
            contents: bytemuck::bytes_of(&uniform),
            usage: BufferUsages::UNIFORM,
        });
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Material BG")),
            layout: &self.material_bgl,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buf.as_entire_binding(),
                },
            ],
        })
    }

    fn solid_material(&self, label: &str, color: [f32; 3]) -> BindGroup {
        let view = self.upload_texture(label, &TextureData::solid(color.map(unit_to_byte)));
        self.material_bind_group(label, &view, [1.0, 1.0, 1.0])
    }

    fn draw_object(&self, label: &str, parts: Vec<(GpuMesh, BindGroup)>) -> DrawObject {
        let draw_buf = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&format!("{label} Draw UBO")),
            size: std::mem::size_of::<DrawUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let draw_bg = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{label} Draw BG")),
            layout: &self.draw_bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: draw_buf.as_entire_binding(),
            }],
        });
        DrawObject {
            draw_buf,
            draw_bg,
            parts,
        }
    }

    /// Primitives are fixed after assembly; build their GPU side on first sight.
    fn sync_primitives(&mut self, scene: &SceneGraph) {
        if self.primitives.len() == scene.primitives().len() {
            return;
        }
        let objects: Vec<DrawObject> = scene
            .primitives()
            .iter()
            .map(|p| {
                let (vertices, indices) = match p.shape {
                    PrimitiveShape::Cube => cube_vertices(),
                };
                let mesh = self.upload_mesh(&p.name, &vertices, &indices);
                let material = self.solid_material(&p.name, p.color);
                self.draw_object(&p.name, vec![(mesh, material)])
            })
            .collect();
        self.primitives = objects;
    }

    fn write_uniforms(&self, scene: &SceneGraph) {
        let camera = scene.camera();
        let ambient = scene.ambient();
        let light = scene.point_light();
        let [ar, ag, ab] = ambient.color.map(srgb_to_linear);
        let [lr, lg, lb] = light.color.map(srgb_to_linear);
        let light_pos = light.world_position(camera);

        let frame = FrameUniform {
            view_proj: (OPENGL_TO_WGPU * camera.proj_view()).to_cols_array_2d(),
            ambient: [
                ar * ambient.intensity,
                ag * ambient.intensity,
                ab * ambient.intensity,
                1.0,
            ],
            light_position: [light_pos.x, light_pos.y, light_pos.z, 1.0],
            light_color: [lr, lg, lb, light.intensity],
        };
        self.queue
            .write_buffer(&self.frame_buf, 0, bytemuck::bytes_of(&frame));

        for (object, primitive) in self.primitives.iter().zip(scene.primitives()) {
            write_draw(&self.queue, object, primitive.transform.matrix());
        }
        if let (Some(object), Some(placed)) = (&self.model, scene.model()) {
            write_draw(&self.queue, object, placed.transform.matrix());
        }
    }

    fn scene_draw(&self) -> SceneDraw {
        SceneDraw {
            pipeline: self.mesh_pipeline.clone(),
            frame_bg: self.frame_bg.clone(),
            objects: self
                .primitives
                .iter()
                .chain(self.model.iter())
                .cloned()
                .collect(),
        }
    }
}

impl FrameRenderer for GpuState {
    /// Resize: reconfigure surface & recreate depth/offscreen views.
    fn resize(&mut self, width: u32, height: u32) {
        self.width = width.max(1);
        self.height = height.max(1);
        self.surface_config.width = self.width;
        self.surface_config.height = self.height;
        self.surface.configure(&self.device, &self.surface_config);
        self.depth_view = create_depth_view(&self.device, self.width, self.height);
        if self.offscreen.is_some() {
            self.offscreen = Some(create_offscreen(&self.device, self.width, self.height));
        }
    }

    fn output_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn upload_model(&mut self, model: &LoadedModel) -> Result<(), RenderError> {
        // Nodes usually share one texture; upload each distinct texture once.
        let mut views: HashMap<*const TextureData, TextureView> = HashMap::new();
        let mut parts = Vec::with_capacity(model.mesh.nodes.len());
        for (i, (node, material)) in model.nodes().enumerate() {
            if !node.data.is_valid() {
                continue;
            }
            let label = format!("{}#{}", model.mesh.name, i);
            let mesh = self.upload_mesh(&label, &to_gpu_vertices(&node.data), &node.data.indices);
            let bind_group = match material {
                MaterialRef::Textured { texture, tint } => {
                    let key = Arc::as_ptr(texture);
                    let view = match views.get(&key) {
                        Some(view) => view.clone(),
                        None => {
                            let view = self.upload_texture(&label, texture);
                            views.insert(key, view.clone());
                            view
                        }
                    };
                    self.material_bind_group(&label, &view, *tint)
                }
                MaterialRef::Solid { color } => self.solid_material(&label, *color),
            };
            parts.push((mesh, bind_group));
        }
        if parts.is_empty() {
            return Err(RenderError::Setup(format!(
                "model '{}' has no drawable nodes",
                model.mesh.name
            )));
        }
        log::info!(
            "Uploaded model '{}': {} draw(s), {} texture(s)",
            model.mesh.name,
            parts.len(),
            views.len()
        );
        self.model = Some(self.draw_object(&model.mesh.name, parts));
        Ok(())
    }

    /// Render one frame: update uniforms, then draw directly or through the chain.
    fn render(&mut self, scene: &SceneGraph) -> Result<(), RenderError> {
        self.sync_primitives(scene);
        self.write_uniforms(scene);

        let frame = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) if Self::is_surface_lost(&err) => {
                log::warn!("Surface {err}; reconfiguring and skipping frame");
                self.recreate_surface();
                return Ok(());
            }
            Err(SurfaceError::Timeout) => {
                log::warn!("Surface timeout; skipping frame");
                return Ok(());
            }
            Err(SurfaceError::OutOfMemory) => return Err(RenderError::OutOfMemory),
            Err(err) => return Err(RenderError::Surface(err)),
        };
        let view = frame.texture.create_view(&TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&CommandEncoderDescriptor {
                label: Some("MainEncoder"),
            });
        let scene_draw = self.scene_draw();

        match (&mut self.composer, &self.offscreen) {
            (Some(chain), Some(targets)) => {
                let mut ctx = GpuFrame {
                    device: self.device.clone(),
                    queue: self.queue.clone(),
                    encoder,
                    scene: scene_draw,
                    depth: self.depth_view.clone(),
                    offscreen: targets.clone(),
                    screen: view,
                    clear: CLEAR_COLOR,
                    time: self.start.elapsed().as_secs_f32(),
                    frame_index: self.frame_index,
                };
                chain.execute(&mut ctx)?;
                encoder = ctx.encoder;
            }
            _ => scene_draw.encode(&mut encoder, &view, &self.depth_view, CLEAR_COLOR),
        }

        self.queue.submit(Some(encoder.finish()));
        frame.present();
        self.frame_index += 1;
        Ok(())
    }
}

fn write_draw(queue: &Queue, object: &DrawObject, model: Mat4) {
    let uniform = DrawUniform {
        model: model.to_cols_array_2d(),
        normal: model.inverse().transpose().to_cols_array_2d(),
    };
    queue.write_buffer(&object.draw_buf, 0, bytemuck::bytes_of(&uniform));
}

fn uniform_layout<T>(device: &Device, label: &str, visibility: ShaderStages) -> BindGroupLayout {
    device.create_bind_group_layout(&BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: BindingType::Buffer {
                ty: BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: NonZeroU64::new(std::mem::size_of::<T>() as u64),
            },
            count: None,
        }],
    })
}

/// Create a depth texture view of the given size.
fn create_depth_view(device: &Device, width: u32, height: u32) -> TextureView {
    let tex = device.create_texture(&TextureDescriptor {
        label: Some("DepthTex"),
        size: Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&TextureViewDescriptor::default())
}

/// Ping-pong color targets for the composited chain.
fn create_offscreen(device: &Device, width: u32, height: u32) -> [TextureView; 2] {
    [0, 1].map(|i| {
        let tex = device.create_texture(&TextureDescriptor {
            label: Some(&format!("Offscreen{i}")),
            size: Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: TextureDimension::D2,
            format: HDR_FORMAT,
            usage: TextureUsages::RENDER_ATTACHMENT | TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        tex.create_view(&TextureViewDescriptor::default())
    })
}

fn to_gpu_vertices(data: &MeshData) -> Vec<GpuVertex> {
    data.vertices
        .iter()
        .map(|v| GpuVertex {
            pos: v.position,
            normal: v.normal,
            uv: v.uv,
        })
        .collect()
}

fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

fn unit_to_byte(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Unit cube centered on the origin, 4 vertices per face for flat normals (CCW).
fn cube_vertices() -> (Vec<GpuVertex>, Vec<u32>) {
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        // normal, u axis, v axis
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
    ];
    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (n, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
            let p = (n + u * su + v * sv) * 0.5;
            vertices.push(GpuVertex {
                pos: p.to_array(),
                normal: n.to_array(),
                uv: [(su + 1.0) * 0.5, (sv + 1.0) * 0.5],
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    (vertices, indices)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_faces_wind_outward() {
        let (v, idx) = cube_vertices();
        assert_eq!(v.len(), 24);
        assert_eq!(idx.len(), 36);
        for tri in idx.chunks_exact(3) {
            let [a, b, c] = [0, 1, 2].map(|k| Vec3::from(v[tri[k] as usize].pos));
            let face_n = (b - a).cross(c - a).normalize();
            let n = Vec3::from(v[tri[0] as usize].normal);
            assert!(face_n.dot(n) > 0.99);
            assert!(a.abs().max_element() <= 0.5 + 1e-6);
        }
    }

    #[test]
    fn gl_to_wgpu_maps_depth_range() {
        let near = OPENGL_TO_WGPU * glam::Vec4::new(0.0, 0.0, -1.0, 1.0);
        let far = OPENGL_TO_WGPU * glam::Vec4::new(0.0, 0.0, 1.0, 1.0);
        assert!((near.z / near.w).abs() < 1e-6);
        assert!((far.z / far.w - 1.0).abs() < 1e-6);
    }

    #[test]
    fn srgb_conversion_endpoints() {
        assert_eq!(srgb_to_linear(0.0), 0.0);
        assert!((srgb_to_linear(1.0) - 1.0).abs() < 1e-6);
        assert_eq!(unit_to_byte(1.0), 255);
        assert_eq!(unit_to_byte(-3.0), 0);
    }
}
