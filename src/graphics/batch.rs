use arrayvec::ArrayVec;
use derive_more::{Display, Error, From};
use glam::{Mat4, Vec2, Vec4};
use tracing::instrument;
use crate::{AssetError, AssetRoot, BufferDesc, BufferId, BufferKind, Color, DrawCall, GraphicsDevice, PipelineDesc, PipelineId, QuadVertex, TextureId};

/// Quads recorded before a batch is flushed.
pub const BATCH_CAPACITY: u32 = 1000;
/// Distinct textures bound to a single batch.
pub const MAX_TEXTURES: usize = 32;
pub const VERTICES_PER_QUAD: u32 = 4;
pub const INDICES_PER_QUAD: u32 = 6;

/// Two triangles over the quad's 4 vertices.
const QUAD_INDICES: [u32; INDICES_PER_QUAD as usize] = [3, 2, 1, 3, 1, 0];
const INDEX_SIZE: u64 = std::mem::size_of::<u32>() as u64;

/// The quad that crosses [`BATCH_CAPACITY`] is recorded before the batch flushes,
/// so buffers hold one quad more than the capacity.
const BUFFER_QUADS: u64 = BATCH_CAPACITY as u64 + 1;

/// Region of a texture sampled by a [`Quad`].
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct QuadTexture {
    pub texture: TextureId,
    /// x, y, width and height in pixels.
    pub rect: Vec4,
    /// Full texture size in pixels.
    pub size: Vec2,
}

impl QuadTexture {
    /// `rect` normalized by the texture size.
    pub fn uv_rect(&self) -> Vec4 {
        self.rect / Vec4::new(self.size.x, self.size.y, self.size.x, self.size.y)
    }
}

/// Request to draw a single axis-aligned rectangle.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Quad {
    pub position: Vec2,
    pub size: Vec2,
    pub texture: Option<QuadTexture>,
    pub color: Color,
}

impl Quad {

    pub fn colored(position: Vec2, size: Vec2, color: Color) -> Self {
        Self { position, size, texture: None, color }
    }

    pub fn textured(position: Vec2, size: Vec2, texture: QuadTexture, color: Color) -> Self {
        Self { position, size, texture: Some(texture), color }
    }

    /// Vertices in the order top-left, top-right, bottom-right, bottom-left.
    fn vertices(&self, texture_slot: f32) -> [QuadVertex; VERTICES_PER_QUAD as usize] {
        let Self { position: p, size: s, .. } = *self;
        let positions = [p, p + Vec2::new(s.x, 0.0), p + s, p + Vec2::new(0.0, s.y)];
        let (uv, use_texture) = match &self.texture {
            Some(texture) => (texture.uv_rect(), 1.0),
            None => (Vec4::ZERO, 0.0),
        };
        let uvs = [
            Vec2::new(uv.x, uv.y),
            Vec2::new(uv.x + uv.z, uv.y),
            Vec2::new(uv.x + uv.z, uv.y + uv.w),
            Vec2::new(uv.x, uv.y + uv.w),
        ];
        let color = self.color.to_array();
        std::array::from_fn(|i| QuadVertex {
            position: positions[i].to_array(),
            uv: uvs[i].to_array(),
            color,
            texture_slot,
            use_texture,
        })
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum BatchPhase {
    Idle,
    Recording,
}

#[derive(Error, Display, From, Debug)]
pub enum BatchError {
    #[display(fmt = "Quad pushed outside of begin/end")]
    #[from(ignore)]
    NotRecording,
    #[display(fmt = "Batch already recording")]
    #[from(ignore)]
    AlreadyRecording,
    #[display(fmt = "{_0}")]
    Asset(AssetError),
}

/// Accumulates quads into shared vertex / index buffers and draws them in as few calls as possible.
///
/// A frame is `begin`, any number of `push`, then `end`.
/// A batch is drawn when:
/// * `end` or `flush` is called.
/// * A quad needs a texture and all [`MAX_TEXTURES`] slots are taken.
///   The batch is drawn and the bound texture set is emptied before the quad is recorded,
///   so the new texture lands in slot 0.
/// * A recorded quad takes the count past [`BATCH_CAPACITY`].
///   The quad stays in the batch being drawn. Bound textures are kept.
///
/// Only `begin` and the texture overflow empty the bound texture set,
/// so slot assignments only grow within a frame unless textures overflow.
pub struct QuadBatcher {
    pipeline: PipelineId,
    vertex_buffer: BufferId,
    index_buffer: BufferId,
    textures: ArrayVec<TextureId, MAX_TEXTURES>,
    quad_count: u32,
    phase: BatchPhase,
    clear_color: Color,
    draw_calls: u32,
}

impl QuadBatcher {

    /// Creates buffers and the pipeline from WGSL source.
    pub fn new(device: &mut dyn GraphicsDevice, shader_source: &str, clear_color: Color) -> Self {
        let vertex_buffer = device.create_buffer(&BufferDesc {
            label: Some("quad_vertices"),
            kind: BufferKind::Vertex,
            size: BUFFER_QUADS * VERTICES_PER_QUAD as u64 * QuadVertex::SIZE,
        });
        let index_buffer = device.create_buffer(&BufferDesc {
            label: Some("quad_indices"),
            kind: BufferKind::Index,
            size: BUFFER_QUADS * INDICES_PER_QUAD as u64 * INDEX_SIZE,
        });
        let pipeline = device.create_pipeline(&PipelineDesc {
            label: Some("quad_pipeline"),
            shader_source,
            attributes: QuadVertex::ATTRIBUTES,
            max_textures: MAX_TEXTURES as u32,
        });
        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            textures: ArrayVec::new(),
            quad_count: 0,
            phase: BatchPhase::Idle,
            clear_color,
            draw_calls: 0,
        }
    }

    /// Reads the shader from the asset root, then creates the batcher.
    pub fn load(
        device: &mut dyn GraphicsDevice,
        assets: &AssetRoot,
        shader_path: &str,
        clear_color: Color,
    ) -> Result<Self, BatchError> {
        let shader_source = assets.read_to_string(shader_path)?;
        Ok(Self::new(device, &shader_source, clear_color))
    }

    /// Clears the target and starts recording a frame.
    pub fn begin(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), BatchError> {
        if self.phase == BatchPhase::Recording {
            return Err(BatchError::AlreadyRecording);
        }
        device.begin_pass(self.clear_color);
        self.quad_count = 0;
        self.textures.clear();
        self.draw_calls = 0;
        self.phase = BatchPhase::Recording;
        Ok(())
    }

    /// Records a quad, drawing the current batch first or afterwards when limits are hit.
    pub fn push(&mut self, device: &mut dyn GraphicsDevice, quad: &Quad) -> Result<(), BatchError> {
        if self.phase != BatchPhase::Recording {
            return Err(BatchError::NotRecording);
        }
        let texture_slot = match &quad.texture {
            Some(texture) => self.texture_slot(device, texture.texture) as f32,
            None => -1.0,
        };

        let vertices = quad.vertices(texture_slot);
        let base_vertex = self.quad_count * VERTICES_PER_QUAD;
        let indices = QUAD_INDICES.map(|index| base_vertex + index);
        let quad_index = self.quad_count as u64;
        device.update_buffer(
            self.vertex_buffer,
            quad_index * VERTICES_PER_QUAD as u64 * QuadVertex::SIZE,
            bytemuck::cast_slice(&vertices),
        );
        device.update_buffer(
            self.index_buffer,
            quad_index * INDICES_PER_QUAD as u64 * INDEX_SIZE,
            bytemuck::cast_slice(&indices),
        );
        self.quad_count += 1;

        if self.quad_count > BATCH_CAPACITY {
            self.draw_batch(device);
        }
        Ok(())
    }

    /// Draws everything recorded since the last flush.
    /// The bound texture set is left as is.
    pub fn flush(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), BatchError> {
        if self.phase != BatchPhase::Recording {
            return Err(BatchError::NotRecording);
        }
        self.draw_batch(device);
        Ok(())
    }

    /// Flushes, then submits the frame.
    pub fn end(&mut self, device: &mut dyn GraphicsDevice) -> Result<(), BatchError> {
        self.flush(device)?;
        device.end_pass();
        self.phase = BatchPhase::Idle;
        Ok(())
    }

    /// Releases buffers, then the pipeline.
    pub fn destroy(self, device: &mut dyn GraphicsDevice) {
        device.destroy_buffer(self.vertex_buffer);
        device.destroy_buffer(self.index_buffer);
        device.destroy_pipeline(self.pipeline);
    }

    pub fn phase(&self) -> BatchPhase {
        self.phase
    }

    /// Quads recorded since the last flush.
    pub fn quad_count(&self) -> u32 {
        self.quad_count
    }

    /// Textures bound to the current batch. Index is the slot.
    pub fn bound_textures(&self) -> &[TextureId] {
        &self.textures
    }

    /// Draw calls issued since `begin`.
    pub fn draw_calls(&self) -> u32 {
        self.draw_calls
    }

    /// Slot of a texture in the current batch, binding it if needed.
    fn texture_slot(&mut self, device: &mut dyn GraphicsDevice, texture: TextureId) -> u32 {
        if let Some(slot) = self.textures.iter().position(|bound| *bound == texture) {
            return slot as u32;
        }
        if self.textures.is_full() {
            log::trace!("Texture slots exhausted, flushing {} quads", self.quad_count);
            self.draw_batch(device);
            self.textures.clear();
        }
        self.textures.push(texture);
        (self.textures.len() - 1) as u32
    }

    #[instrument(skip_all)]
    fn draw_batch(&mut self, device: &mut dyn GraphicsDevice) {
        if self.quad_count == 0 {
            return;
        }
        let (width, height) = device.viewport_size();
        let camera = Mat4::orthographic_rh(0.0, width as f32, height as f32, 0.0, -1.0, 1.0);
        device.draw(&DrawCall {
            pipeline: self.pipeline,
            vertex_buffer: self.vertex_buffer,
            index_buffer: self.index_buffer,
            textures: &self.textures,
            camera,
            index_count: self.quad_count * INDICES_PER_QUAD,
        });
        self.draw_calls += 1;
        self.quad_count = 0;
    }
}

#[cfg(test)]
mod test {
    use glam::{Vec2, Vec4};
    use crate::{Color, GraphicsDevice, QuadVertex, RecordingDevice, Request, TextureDesc, TextureId};
    use super::{BatchError, BatchPhase, Quad, QuadBatcher, QuadTexture, BATCH_CAPACITY, MAX_TEXTURES};

    fn batcher(device: &mut RecordingDevice) -> QuadBatcher {
        QuadBatcher::new(device, "", Color::BLACK)
    }

    fn textures(device: &mut RecordingDevice, count: usize) -> Vec<TextureId> {
        (0..count)
            .map(|_| device.create_texture(&TextureDesc { label: None, width: 32, height: 32, pixels: &[] }))
            .collect()
    }

    fn textured(texture: TextureId) -> Quad {
        Quad::textured(
            Vec2::new(0.0, 0.0),
            Vec2::new(16.0, 16.0),
            QuadTexture { texture, rect: Vec4::new(16.0, 0.0, 16.0, 16.0), size: Vec2::new(32.0, 32.0) },
            Color::WHITE,
        )
    }

    #[test]
    fn push_requires_recording() {
        let mut device = RecordingDevice::default();
        let mut batcher = batcher(&mut device);
        let quad = Quad::colored(Vec2::ZERO, Vec2::ONE, Color::RED);
        assert!(matches!(batcher.push(&mut device, &quad), Err(BatchError::NotRecording)));
        assert!(matches!(batcher.end(&mut device), Err(BatchError::NotRecording)));
        batcher.begin(&mut device).unwrap();
        assert!(matches!(batcher.begin(&mut device), Err(BatchError::AlreadyRecording)));
        assert_eq!(batcher.phase(), BatchPhase::Recording);
        batcher.end(&mut device).unwrap();
        assert_eq!(batcher.phase(), BatchPhase::Idle);
    }

    #[test]
    fn single_batch_layout() {
        let mut device = RecordingDevice::new(640, 480);
        let mut batcher = batcher(&mut device);
        let texture = textures(&mut device, 1)[0];
        let tint = Color::from_rgba8(255, 128, 0, 255);

        batcher.begin(&mut device).unwrap();
        batcher.push(&mut device, &Quad::colored(Vec2::new(10.0, 20.0), Vec2::new(4.0, 8.0), tint)).unwrap();
        let mut quad = textured(texture);
        quad.position = Vec2::new(100.0, 50.0);
        batcher.push(&mut device, &quad).unwrap();
        batcher.end(&mut device).unwrap();

        let draws: Vec<_> = device.draws().collect();
        assert_eq!(draws.len(), 1);
        let draw = draws[0];
        assert_eq!(draw.index_count, 12);
        assert_eq!(draw.textures, vec![texture]);
        assert_eq!(draw.indices(), vec![3, 2, 1, 3, 1, 0, 7, 6, 5, 7, 5, 4]);

        let vertices: Vec<QuadVertex> = draw.vertices();
        let colored = &vertices[0..4];
        let positions: Vec<[f32; 2]> = colored.iter().map(|v| v.position).collect();
        assert_eq!(positions, vec![[10.0, 20.0], [14.0, 20.0], [14.0, 28.0], [10.0, 28.0]]);
        assert!(colored.iter().all(|v| v.color == tint.to_array()));
        assert!(colored.iter().all(|v| v.texture_slot == -1.0 && v.use_texture == 0.0));

        let textured = &vertices[4..8];
        let uvs: Vec<[f32; 2]> = textured.iter().map(|v| v.uv).collect();
        assert_eq!(uvs, vec![[0.5, 0.0], [1.0, 0.0], [1.0, 0.5], [0.5, 0.5]]);
        assert_eq!(textured[2].position, [116.0, 66.0]);
        assert!(textured.iter().all(|v| v.texture_slot == 0.0 && v.use_texture == 1.0));

        let projected = draw.camera.project_point3(glam::Vec3::new(640.0, 480.0, 0.0));
        assert!((projected.x - 1.0).abs() < 1e-5);
        assert!((projected.y + 1.0).abs() < 1e-5);
    }

    #[test]
    fn reuses_texture_slots() {
        let mut device = RecordingDevice::default();
        let mut batcher = batcher(&mut device);
        let textures = textures(&mut device, 3);

        batcher.begin(&mut device).unwrap();
        for texture in [textures[0], textures[1], textures[0], textures[2], textures[1]] {
            batcher.push(&mut device, &textured(texture)).unwrap();
        }
        assert_eq!(batcher.bound_textures(), &textures[..]);
        batcher.end(&mut device).unwrap();

        let draw = device.draws().next().unwrap();
        let slots: Vec<f32> = draw
            .vertices::<QuadVertex>()
            .chunks(4)
            .take(5)
            .map(|quad| quad[0].texture_slot)
            .collect();
        assert_eq!(slots, vec![0.0, 1.0, 0.0, 2.0, 1.0]);
    }

    #[test]
    fn texture_overflow_flushes_before_recording() {
        let mut device = RecordingDevice::default();
        let mut batcher = batcher(&mut device);
        let textures = textures(&mut device, MAX_TEXTURES + 1);

        batcher.begin(&mut device).unwrap();
        for texture in &textures[..MAX_TEXTURES] {
            batcher.push(&mut device, &textured(*texture)).unwrap();
        }
        assert_eq!(device.draws().count(), 0);

        batcher.push(&mut device, &textured(textures[MAX_TEXTURES])).unwrap();
        assert_eq!(device.draws().count(), 1);
        assert_eq!(batcher.quad_count(), 1);
        assert_eq!(batcher.bound_textures(), &[textures[MAX_TEXTURES]]);
        batcher.end(&mut device).unwrap();

        let draws: Vec<_> = device.draws().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].index_count, MAX_TEXTURES as u32 * 6);
        assert_eq!(draws[0].textures, textures[..MAX_TEXTURES].to_vec());
        assert_eq!(draws[1].index_count, 6);
        assert_eq!(draws[1].textures, vec![textures[MAX_TEXTURES]]);
        let overflowed = draws[1].vertices::<QuadVertex>()[0];
        assert_eq!(overflowed.texture_slot, 0.0);
        assert_eq!(draws[1].indices(), vec![3, 2, 1, 3, 1, 0]);
    }

    #[test]
    fn capacity_flush_keeps_overshoot_quad() {
        let mut device = RecordingDevice::default();
        let mut batcher = batcher(&mut device);
        let texture = textures(&mut device, 1)[0];

        batcher.begin(&mut device).unwrap();
        for _ in 0..BATCH_CAPACITY {
            batcher.push(&mut device, &textured(texture)).unwrap();
        }
        assert_eq!(device.draws().count(), 0);
        assert_eq!(batcher.quad_count(), BATCH_CAPACITY);

        batcher.push(&mut device, &textured(texture)).unwrap();
        assert_eq!(batcher.quad_count(), 0);
        assert_eq!(batcher.bound_textures(), &[texture]);
        batcher.push(&mut device, &textured(texture)).unwrap();
        batcher.end(&mut device).unwrap();

        let draws: Vec<_> = device.draws().collect();
        assert_eq!(draws.len(), 2);
        assert_eq!(draws[0].index_count, (BATCH_CAPACITY + 1) * 6);
        let last = draws[0].indices()[(BATCH_CAPACITY * 6) as usize..].to_vec();
        let base = BATCH_CAPACITY * 4;
        assert_eq!(last, vec![base + 3, base + 2, base + 1, base + 3, base + 1, base]);
        assert_eq!(draws[1].index_count, 6);
        assert_eq!(batcher.draw_calls(), 2);
    }

    #[test]
    fn full_batch_is_one_draw() {
        let mut device = RecordingDevice::default();
        let mut batcher = batcher(&mut device);
        let textures = textures(&mut device, MAX_TEXTURES);

        batcher.begin(&mut device).unwrap();
        for i in 0..BATCH_CAPACITY as usize {
            batcher.push(&mut device, &textured(textures[i % MAX_TEXTURES])).unwrap();
        }
        batcher.end(&mut device).unwrap();

        let draws: Vec<_> = device.draws().collect();
        assert_eq!(draws.len(), 1);
        assert_eq!(draws[0].index_count, BATCH_CAPACITY * 6);
    }

    #[test]
    fn empty_frame_issues_no_draw() {
        let mut device = RecordingDevice::default();
        let mut batcher = batcher(&mut device);
        device.clear_requests();

        batcher.begin(&mut device).unwrap();
        batcher.flush(&mut device).unwrap();
        batcher.end(&mut device).unwrap();
        assert_eq!(device.requests(), &[Request::BeginPass(Color::BLACK), Request::EndPass]);
    }

    #[test]
    fn begin_resets_texture_slots() {
        let mut device = RecordingDevice::default();
        let mut batcher = batcher(&mut device);
        let textures = textures(&mut device, 2);

        batcher.begin(&mut device).unwrap();
        batcher.push(&mut device, &textured(textures[0])).unwrap();
        batcher.flush(&mut device).unwrap();
        batcher.push(&mut device, &textured(textures[1])).unwrap();
        assert_eq!(batcher.bound_textures(), &textures[..]);
        batcher.end(&mut device).unwrap();

        batcher.begin(&mut device).unwrap();
        assert!(batcher.bound_textures().is_empty());
        batcher.push(&mut device, &textured(textures[1])).unwrap();
        batcher.end(&mut device).unwrap();
        let last = device.draws().last().unwrap();
        assert_eq!(last.textures, vec![textures[1]]);
    }

    #[test]
    fn destroy_releases_resources() {
        let mut device = RecordingDevice::default();
        let batcher = batcher(&mut device);
        assert_eq!(device.live_buffers(), 2);
        assert_eq!(device.live_pipelines(), 1);
        batcher.destroy(&mut device);
        assert_eq!(device.live_buffers(), 0);
        assert_eq!(device.live_pipelines(), 0);
    }
}
