use glam::Mat4;
use slotmap::SlotMap;
use bytemuck::Pod;
use crate::{BufferDesc, BufferId, BufferKind, Color, DrawCall, GraphicsDevice, PipelineDesc, PipelineId, TextureDesc, TextureId};

/// Headless [`GraphicsDevice`] that records every request.
/// Buffer writes are mirrored in memory, and each draw keeps a snapshot of the buffers it read.
pub struct RecordingDevice {
    viewport: (u32, u32),
    textures: SlotMap<TextureId, (u32, u32)>,
    buffers: SlotMap<BufferId, RecordedBuffer>,
    pipelines: SlotMap<PipelineId, ()>,
    requests: Vec<Request>,
}

struct RecordedBuffer {
    kind: BufferKind,
    bytes: Vec<u8>,
}

#[derive(Clone, PartialEq, Debug)]
pub enum Request {
    CreateTexture { texture: TextureId, width: u32, height: u32 },
    DestroyTexture(TextureId),
    CreateBuffer { buffer: BufferId, kind: BufferKind, size: u64 },
    UpdateBuffer { buffer: BufferId, offset: u64, len: usize },
    DestroyBuffer(BufferId),
    CreatePipeline(PipelineId),
    DestroyPipeline(PipelineId),
    BeginPass(Color),
    Draw(RecordedDraw),
    EndPass,
}

/// A draw, with the vertex and index buffer contents at the time it was issued.
#[derive(Clone, PartialEq, Debug)]
pub struct RecordedDraw {
    pub pipeline: PipelineId,
    pub textures: Vec<TextureId>,
    pub camera: Mat4,
    pub index_count: u32,
    pub vertex_bytes: Vec<u8>,
    pub index_bytes: Vec<u8>,
}

impl RecordedDraw {

    /// Indices covered by the draw.
    pub fn indices(&self) -> Vec<u32> {
        read_pod::<u32>(&self.index_bytes)
            .into_iter()
            .take(self.index_count as usize)
            .collect()
    }

    /// Full vertex buffer contents, decoded as `V`.
    pub fn vertices<V: Pod>(&self) -> Vec<V> {
        read_pod(&self.vertex_bytes)
    }
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new(800, 600)
    }
}

impl RecordingDevice {

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            viewport: (width, height),
            textures: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            pipelines: SlotMap::with_key(),
            requests: Vec::new(),
        }
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Forgets recorded requests. Live resources are kept.
    pub fn clear_requests(&mut self) {
        self.requests.clear();
    }

    pub fn draws(&self) -> impl Iterator<Item = &RecordedDraw> {
        self.requests.iter().filter_map(|request| match request {
            Request::Draw(draw) => Some(draw),
            _ => None,
        })
    }

    pub fn texture_size(&self, texture: TextureId) -> Option<(u32, u32)> {
        self.textures.get(texture).copied()
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self) -> usize {
        self.buffers.len()
    }

    pub fn live_pipelines(&self) -> usize {
        self.pipelines.len()
    }

    fn buffer_bytes(&self, buffer: BufferId) -> Vec<u8> {
        self.buffers
            .get(buffer)
            .map(|buffer| buffer.bytes.clone())
            .unwrap_or_default()
    }
}

impl GraphicsDevice for RecordingDevice {

    fn create_texture(&mut self, desc: &TextureDesc) -> TextureId {
        let texture = self.textures.insert((desc.width, desc.height));
        self.requests.push(Request::CreateTexture { texture, width: desc.width, height: desc.height });
        texture
    }

    fn destroy_texture(&mut self, texture: TextureId) {
        self.textures.remove(texture);
        self.requests.push(Request::DestroyTexture(texture));
    }

    fn create_buffer(&mut self, desc: &BufferDesc) -> BufferId {
        let buffer = self.buffers.insert(RecordedBuffer {
            kind: desc.kind,
            bytes: vec![0; desc.size as usize],
        });
        self.requests.push(Request::CreateBuffer { buffer, kind: desc.kind, size: desc.size });
        buffer
    }

    fn update_buffer(&mut self, buffer: BufferId, offset: u64, data: &[u8]) {
        if let Some(recorded) = self.buffers.get_mut(buffer) {
            let start = offset as usize;
            let end = start + data.len();
            match recorded.bytes.get_mut(start..end) {
                Some(target) => target.copy_from_slice(data),
                None => log::error!("{:?} buffer write {start}..{end} out of bounds", recorded.kind),
            }
        }
        self.requests.push(Request::UpdateBuffer { buffer, offset, len: data.len() });
    }

    fn destroy_buffer(&mut self, buffer: BufferId) {
        self.buffers.remove(buffer);
        self.requests.push(Request::DestroyBuffer(buffer));
    }

    fn create_pipeline(&mut self, _desc: &PipelineDesc) -> PipelineId {
        let pipeline = self.pipelines.insert(());
        self.requests.push(Request::CreatePipeline(pipeline));
        pipeline
    }

    fn destroy_pipeline(&mut self, pipeline: PipelineId) {
        self.pipelines.remove(pipeline);
        self.requests.push(Request::DestroyPipeline(pipeline));
    }

    fn viewport_size(&self) -> (u32, u32) {
        self.viewport
    }

    fn begin_pass(&mut self, clear: Color) {
        self.requests.push(Request::BeginPass(clear));
    }

    fn draw(&mut self, call: &DrawCall) {
        let draw = RecordedDraw {
            pipeline: call.pipeline,
            textures: call.textures.to_vec(),
            camera: call.camera,
            index_count: call.index_count,
            vertex_bytes: self.buffer_bytes(call.vertex_buffer),
            index_bytes: self.buffer_bytes(call.index_buffer),
        };
        self.requests.push(Request::Draw(draw));
    }

    fn end_pass(&mut self) {
        self.requests.push(Request::EndPass);
    }
}

fn read_pod<T: Pod>(bytes: &[u8]) -> Vec<T> {
    bytes
        .chunks_exact(std::mem::size_of::<T>())
        .map(bytemuck::pod_read_unaligned)
        .collect()
}
