//! Requests the renderer issues to a graphics backend.
//! [`GraphicsState`](crate::GraphicsState) fulfills them with wgpu,
//! [`RecordingDevice`](crate::RecordingDevice) records them.

use glam::Mat4;
use slotmap::new_key_type;
use crate::Color;

new_key_type! {
    /// Opaque handle to a texture owned by a [`GraphicsDevice`].
    pub struct TextureId;
    /// Opaque handle to a vertex or index buffer.
    pub struct BufferId;
    /// Opaque handle to a render pipeline.
    pub struct PipelineId;
}

/// Texture upload. Pixels are tightly packed RGBA8 and sampled with nearest-neighbor filtering.
#[derive(Copy, Clone, Debug)]
pub struct TextureDesc<'a> {
    pub label: Option<&'a str>,
    pub width: u32,
    pub height: u32,
    pub pixels: &'a [u8],
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BufferKind {
    Vertex,
    Index,
}

/// Dynamic buffer, written in sub-ranges with [`GraphicsDevice::update_buffer`].
#[derive(Copy, Clone, Debug)]
pub struct BufferDesc<'a> {
    pub label: Option<&'a str>,
    pub kind: BufferKind,
    pub size: u64,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AttributeFormat {
    Float,
    Float2,
    Float4,
}

impl AttributeFormat {
    pub const fn size(self) -> u64 {
        match self {
            Self::Float => 4,
            Self::Float2 => 8,
            Self::Float4 => 16,
        }
    }
}

/// Vertex attribute. Shader location is its index in [`PipelineDesc::attributes`].
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct VertexAttribute {
    pub name: &'static str,
    pub format: AttributeFormat,
}

#[derive(Copy, Clone, Debug)]
pub struct PipelineDesc<'a> {
    pub label: Option<&'a str>,
    pub shader_source: &'a str,
    pub attributes: &'a [VertexAttribute],
    /// Length of the sampler array bound on every draw.
    pub max_textures: u32,
}

/// A single indexed draw.
/// `textures[i]` is bound to sampler slot `i`.
#[derive(Copy, Clone, Debug)]
pub struct DrawCall<'a> {
    pub pipeline: PipelineId,
    pub vertex_buffer: BufferId,
    pub index_buffer: BufferId,
    pub textures: &'a [TextureId],
    pub camera: Mat4,
    pub index_count: u32,
}

/// Graphics backend driven by the quad batcher and the tileset loader.
/// Draws between [`begin_pass`](Self::begin_pass) and [`end_pass`](Self::end_pass)
/// execute in the order they were requested, each seeing the buffer writes issued before it.
pub trait GraphicsDevice {
    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId;
    fn destroy_texture(&mut self, texture: TextureId);
    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId;
    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]);
    fn destroy_buffer(&mut self, buffer: BufferId);
    fn create_pipeline(&mut self, desc: &PipelineDesc) -> PipelineId;
    fn destroy_pipeline(&mut self, pipeline: PipelineId);

    /// Size in pixels of the render target.
    fn viewport_size(&self) -> (u32, u32);

    /// Starts a render pass, clearing the target.
    fn begin_pass(&mut self, clear: Color);
    fn draw(&mut self, call: &DrawCall);
    /// Finishes the render pass and submits everything recorded since [`begin_pass`](Self::begin_pass).
    fn end_pass(&mut self);
}
