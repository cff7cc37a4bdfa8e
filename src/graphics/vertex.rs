use bytemuck::{Pod, Zeroable};
use crate::{AttributeFormat, VertexAttribute};

/// Vertex written by the quad batcher.
#[repr(C)]
#[derive(Copy, Clone, PartialEq, Debug, Default, Pod, Zeroable)]
pub struct QuadVertex {
    pub position: [f32; 2],
    pub uv: [f32; 2],
    pub color: [f32; 4],
    /// Sampler slot, -1 for untextured quads.
    pub texture_slot: f32,
    /// 1 when the texture is sampled, 0 otherwise.
    pub use_texture: f32,
}

impl QuadVertex {
    pub const ATTRIBUTES: &'static [VertexAttribute] = &[
        VertexAttribute { name: "position", format: AttributeFormat::Float2 },
        VertexAttribute { name: "uv", format: AttributeFormat::Float2 },
        VertexAttribute { name: "color", format: AttributeFormat::Float4 },
        VertexAttribute { name: "texture_slot", format: AttributeFormat::Float },
        VertexAttribute { name: "use_texture", format: AttributeFormat::Float },
    ];
    pub const SIZE: u64 = std::mem::size_of::<QuadVertex>() as u64;
}
