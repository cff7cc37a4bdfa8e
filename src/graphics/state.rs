use std::num::NonZeroU32;
use std::ops::Range;
use anyhow::Context;
use slotmap::SlotMap;
use winit::window::Window;
use wgpu::util::{BufferInitDescriptor, DeviceExt};
use wgpu::{
    AddressMode, BindGroupDescriptor, BindGroupEntry, BindGroupLayout, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingResource, BindingType, BlendState, Buffer, BufferBindingType,
    BufferDescriptor, BufferUsages, ColorTargetState, ColorWrites, CommandEncoder,
    CommandEncoderDescriptor, CompositeAlphaMode, Device, DeviceDescriptor, Extent3d, Features,
    FilterMode, FragmentState, FrontFace, IndexFormat, InstanceDescriptor, Limits, LoadOp,
    Operations, PipelineLayoutDescriptor, PolygonMode, PowerPreference, PresentMode,
    PrimitiveState, PrimitiveTopology, Queue, RenderPassColorAttachment, RenderPassDescriptor,
    RenderPipeline, RenderPipelineDescriptor, RequestAdapterOptions, Sampler, SamplerBindingType,
    SamplerDescriptor, ShaderModuleDescriptor, ShaderSource, ShaderStages, StoreOp, Surface,
    SurfaceConfiguration, SurfaceTexture, TextureDescriptor, TextureDimension, TextureFormat,
    TextureSampleType, TextureUsages, TextureView, TextureViewDescriptor, TextureViewDimension,
    VertexBufferLayout, VertexFormat, VertexState, VertexStepMode,
};
use crate::{
    AttributeFormat, BufferDesc, BufferId, BufferKind, Color, DrawCall, GraphicsDevice,
    PipelineDesc, PipelineId, TextureDesc, TextureId, MAX_TEXTURES,
};

/**
 * Stores WGPU primitives and fulfills [`GraphicsDevice`] requests with them.
 */
pub struct GraphicsState {
    device: Device,
    queue: Queue,
    surface: Surface<'static>,
    surface_config: SurfaceConfiguration,
    sampler: Sampler,
    blank: GpuTexture,
    textures: SlotMap<TextureId, GpuTexture>,
    buffers: SlotMap<BufferId, GpuBuffer>,
    pipelines: SlotMap<PipelineId, GpuPipeline>,
    frame: Option<Frame>,
}

struct GpuTexture {
    _texture: wgpu::Texture,
    view: TextureView,
}

/// GPU buffer with a CPU copy.
/// Writes land in the copy and are uploaded in order with the draw that needs them.
struct GpuBuffer {
    buffer: Buffer,
    shadow: Vec<u8>,
    dirty: Option<Range<u64>>,
}

struct GpuPipeline {
    pipeline: RenderPipeline,
    camera_layout: BindGroupLayout,
    texture_layout: BindGroupLayout,
    max_textures: u32,
}

/// Commands of the render pass in progress.
struct Frame {
    surface_texture: SurfaceTexture,
    view: TextureView,
    encoder: CommandEncoder,
    /// Pending clear, consumed by the first pass of the frame.
    clear: Option<wgpu::Color>,
}

impl GraphicsState {

    pub fn new(window: &Window) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(InstanceDescriptor::default());
        let surface = unsafe {
            instance.create_surface_unsafe(
                wgpu::SurfaceTargetUnsafe::from_window(window).context("Failed to get window handle")?,
            ).context("Failed to create surface")?
        };
        let adapter = instance.request_adapter(&RequestAdapterOptions {
            power_preference: PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        });
        let adapter = pollster::block_on(adapter).context("Compatible adapter not found")?;
        let device_queue = adapter.request_device(&DeviceDescriptor {
            label: Some("tmx_batch_device"),
            required_features: Features::TEXTURE_BINDING_ARRAY
                | Features::SAMPLED_TEXTURE_AND_STORAGE_BUFFER_ARRAY_NON_UNIFORM_INDEXING,
            required_limits: Limits {
                max_sampled_textures_per_shader_stage: MAX_TEXTURES as u32,
                ..Limits::default()
            },
        }, None);
        let (device, queue) = pollster::block_on(device_queue).context("Failed to request device")?;
        let window_size = window.inner_size();
        let surface_config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: TextureFormat::Bgra8UnormSrgb,
            width: window_size.width.max(1),
            height: window_size.height.max(1),
            present_mode: PresentMode::Fifo,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("nearest_sampler"),
            address_mode_u: AddressMode::ClampToEdge,
            address_mode_v: AddressMode::ClampToEdge,
            mag_filter: FilterMode::Nearest,
            min_filter: FilterMode::Nearest,
            ..Default::default()
        });
        let blank = create_texture(&device, &queue, &TextureDesc {
            label: Some("blank_texture"),
            width: 1,
            height: 1,
            pixels: &[255, 255, 255, 255],
        });
        log::info!("Graphics initialized on {:?}", adapter.get_info().backend);
        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            sampler,
            blank,
            textures: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            frame: None,
        })
    }

    /// Resizes pixel size of surface.
    /// Commonly invoked when window size changes.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.surface_config.width = width.max(1);
        self.surface_config.height = height.max(1);
        self.surface.configure(&self.device, &self.surface_config);
    }
}

impl GraphicsDevice for GraphicsState {

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let texture = create_texture(&self.device, &self.queue, desc);
        self.textures.insert(texture)
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        if self.textures.remove(texture).is_none() {
            log::warn!("Destroyed unknown texture {texture:?}");
        }
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId {
        let kind_usage = match desc.kind {
            BufferKind::Vertex => BufferUsages::VERTEX,
            BufferKind::Index => BufferUsages::INDEX,
        };
        let buffer = self.device.create_buffer(&BufferDescriptor {
            label: desc.label,
            size: desc.size,
            usage: kind_usage | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        self.buffers.insert(GpuBuffer {
            buffer,
            shadow: vec![0; desc.size as usize],
            dirty: None,
        })
    }

    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        let Some(gpu_buffer) = self.buffers.get_mut(buffer) else {
            log::warn!("Updated unknown buffer {buffer:?}");
            return;
        };
        let range = offset..offset + data.len() as u64;
        let Some(target) = gpu_buffer.shadow.get_mut(range.start as usize..range.end as usize) else {
            log::error!("Buffer write {range:?} out of bounds");
            return;
        };
        target.copy_from_slice(data);
        gpu_buffer.dirty = Some(match gpu_buffer.dirty.take() {
            Some(dirty) => dirty.start.min(range.start)..dirty.end.max(range.end),
            None => range,
        });
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        if let Some(gpu_buffer) = self.buffers.remove(buffer) {
            gpu_buffer.buffer.destroy();
        }
    }

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> PipelineId {
        let module = self.device.create_shader_module(ShaderModuleDescriptor {
            label: desc.label,
            source: ShaderSource::Wgsl(desc.shader_source.into()),
        });
        let camera_layout = self.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("camera_layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let texture_layout = self.device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("texture_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: NonZeroU32::new(desc.max_textures),
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let layout = self.device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: desc.label,
            bind_group_layouts: &[&camera_layout, &texture_layout],
            push_constant_ranges: &[],
        });

        // Attributes are packed in declaration order
        let mut stride = 0;
        let attributes: Vec<wgpu::VertexAttribute> = desc.attributes
            .iter()
            .enumerate()
            .map(|(location, attribute)| {
                let format = vertex_format(attribute.format);
                let vertex_attribute = wgpu::VertexAttribute {
                    format,
                    offset: stride,
                    shader_location: location as u32,
                };
                stride += format.size();
                vertex_attribute
            })
            .collect();
        let vertex_layout = VertexBufferLayout {
            array_stride: stride,
            step_mode: VertexStepMode::Vertex,
            attributes: &attributes,
        };

        let pipeline = self.device.create_render_pipeline(&RenderPipelineDescriptor {
            label: desc.label,
            layout: Some(&layout),
            vertex: VertexState {
                module: &module,
                entry_point: "vertex_main",
                buffers: &[vertex_layout],
            },
            fragment: Some(FragmentState {
                module: &module,
                entry_point: "fragment_main",
                targets: &[Some(ColorTargetState {
                    format: self.surface_config.format,
                    blend: Some(BlendState::ALPHA_BLENDING),
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                unclipped_depth: false,
                polygon_mode: PolygonMode::Fill,
                conservative: false,
            },
            depth_stencil: None,
            multisample: Default::default(),
            multiview: None,
        });
        self.pipelines.insert(GpuPipeline {
            pipeline,
            camera_layout,
            texture_layout,
            max_textures: desc.max_textures,
        })
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineId) {
        self.pipelines.remove(pipeline);
    }

    fn viewport_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn begin_pass(&mut self, clear: Color) {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(surface_texture) => surface_texture,
            Err(err) => {
                log::error!("{err}");
                return;
            }
        };
        let view = surface_texture.texture.create_view(&TextureViewDescriptor::default());
        let encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("quad_batch_encoder"),
        });
        self.frame = Some(Frame {
            surface_texture,
            view,
            encoder,
            clear: Some(wgpu::Color {
                r: clear.r as f64,
                g: clear.g as f64,
                b: clear.b as f64,
                a: clear.a as f64,
            }),
        });
    }

    fn draw(&mut self, call: &DrawCall) {
        let Some(frame) = self.frame.as_mut() else { return };
        let Some(pipeline) = self.pipelines.get(call.pipeline) else {
            log::warn!("Draw with unknown pipeline {:?}", call.pipeline);
            return;
        };

        // Uploads buffer writes issued since the previous draw
        for buffer_id in [call.vertex_buffer, call.index_buffer] {
            let Some(gpu_buffer) = self.buffers.get_mut(buffer_id) else { continue };
            let Some(dirty) = gpu_buffer.dirty.take() else { continue };
            let staging = self.device.create_buffer_init(&BufferInitDescriptor {
                label: Some("staging_buffer"),
                contents: &gpu_buffer.shadow[dirty.start as usize..dirty.end as usize],
                usage: BufferUsages::COPY_SRC,
            });
            frame.encoder.copy_buffer_to_buffer(&staging, 0, &gpu_buffer.buffer, dirty.start, dirty.end - dirty.start);
        }
        let (Some(vertices), Some(indices)) = (self.buffers.get(call.vertex_buffer), self.buffers.get(call.index_buffer)) else {
            log::warn!("Draw with unknown buffers");
            return;
        };

        // Binds camera and textures. Unused slots sample the blank texture.
        let camera = self.device.create_buffer_init(&BufferInitDescriptor {
            label: Some("camera_uniform"),
            contents: bytemuck::bytes_of(&call.camera),
            usage: BufferUsages::UNIFORM,
        });
        let camera_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("camera_group"),
            layout: &pipeline.camera_layout,
            entries: &[BindGroupEntry { binding: 0, resource: camera.as_entire_binding() }],
        });
        let mut views: Vec<&TextureView> = call.textures
            .iter()
            .take(pipeline.max_textures as usize)
            .map(|texture| match self.textures.get(*texture) {
                Some(gpu_texture) => &gpu_texture.view,
                None => &self.blank.view,
            })
            .collect();
        views.resize(pipeline.max_textures as usize, &self.blank.view);
        let texture_group = self.device.create_bind_group(&BindGroupDescriptor {
            label: Some("texture_group"),
            layout: &pipeline.texture_layout,
            entries: &[
                BindGroupEntry { binding: 0, resource: BindingResource::TextureViewArray(&views) },
                BindGroupEntry { binding: 1, resource: BindingResource::Sampler(&self.sampler) },
            ],
        });

        let load = match frame.clear.take() {
            Some(clear) => LoadOp::Clear(clear),
            None => LoadOp::Load,
        };
        let (width, height) = (self.surface_config.width, self.surface_config.height);
        let mut pass = frame.encoder.begin_render_pass(&RenderPassDescriptor {
            label: Some("quad_batch_pass"),
            color_attachments: &[Some(RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: Operations { load, store: StoreOp::Store },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        pass.set_pipeline(&pipeline.pipeline);
        pass.set_bind_group(0, &camera_group, &[]);
        pass.set_bind_group(1, &texture_group, &[]);
        pass.set_vertex_buffer(0, vertices.buffer.slice(..));
        pass.set_index_buffer(indices.buffer.slice(..), IndexFormat::Uint32);
        pass.draw_indexed(0..call.index_count, 0, 0..1);
    }

    fn end_pass(&mut self) {
        let Some(frame) = self.frame.take() else { return };
        let Frame { surface_texture, view, mut encoder, clear } = frame;

        // Nothing was drawn, the target still needs its clear
        if let Some(clear) = clear {
            encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("clear_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: Operations { load: LoadOp::Clear(clear), store: StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }
        self.queue.submit([encoder.finish()]);
        surface_texture.present();
    }
}

fn create_texture(device: &Device, queue: &Queue, desc: &TextureDesc) -> GpuTexture {
    let texture = device.create_texture_with_data(queue, &TextureDescriptor {
        label: desc.label,
        size: Extent3d {
            width: desc.width,
            height: desc.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    }, wgpu::util::TextureDataOrder::LayerMajor, desc.pixels);
    let view = texture.create_view(&TextureViewDescriptor::default());
    GpuTexture { _texture: texture, view }
}

fn vertex_format(format: AttributeFormat) -> VertexFormat {
    match format {
        AttributeFormat::Float => VertexFormat::Float32,
        AttributeFormat::Float2 => VertexFormat::Float32x2,
        AttributeFormat::Float4 => VertexFormat::Float32x4,
    }
}
