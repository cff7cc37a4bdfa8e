use glam::Vec2;
use tracing::instrument;
use crate::{BatchError, GraphicsDevice, Map, Quad, QuadBatcher, QuadTexture};

/// Draws one frame of a map: visible layers, then visible object groups, each in declaration order.
/// Positions and sizes are multiplied by `scale`.
#[instrument(skip_all)]
pub fn draw_map(
    map: &Map,
    batcher: &mut QuadBatcher,
    device: &mut dyn GraphicsDevice,
    scale: f32,
) -> Result<(), BatchError> {
    batcher.begin(device)?;
    for layer in map.layers.iter().filter(|layer| layer.visible) {
        for (column, row, tile) in layer.cells() {
            if tile.is_empty() {
                continue;
            }
            let Some(tileset) = map.tilesets.get(tile.tileset_index) else { continue };
            let cell = map.cell_size(tileset);
            let texture = QuadTexture {
                texture: tileset.texture,
                rect: tileset.tile_rect(tile.gid),
                size: tileset.sheet_size(),
            };
            let quad = Quad::textured(
                Vec2::new(column as f32 * cell.x, row as f32 * cell.y) * scale,
                tileset.tile_size() * scale,
                texture,
                layer.tint,
            );
            batcher.push(device, &quad)?;
        }
    }
    for group in map.object_groups.iter().filter(|group| group.visible) {
        for object in &group.objects {
            let quad = Quad::colored(
                Vec2::new(object.x, object.y) * scale,
                Vec2::new(object.width, object.height) * scale,
                group.color,
            );
            batcher.push(device, &quad)?;
        }
    }
    batcher.end(device)
}
