use crate::{Color, TmxError};

/// A single cell of a [`Layer`].
#[derive(Copy, Clone, Eq, PartialEq, Default, Debug)]
pub struct Tile {
    /// Global tile id. 0 is an empty cell.
    pub gid: u32,
    /// Index of the tileset the gid resolved to. 0 when nothing matched.
    pub tileset_index: usize,
}

impl Tile {
    pub fn is_empty(&self) -> bool {
        self.gid == 0
    }
}

/// Grid of tiles stored in row-major order.
#[derive(Clone, PartialEq, Debug)]
pub struct Layer {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub tint: Color,
    pub visible: bool,
    pub tiles: Vec<Tile>,
}

impl Layer {

    /// Tiles paired with their column and row.
    pub fn cells(&self) -> impl Iterator<Item = (u32, u32, Tile)> + '_ {
        let width = self.width.max(1);
        self.tiles
            .iter()
            .enumerate()
            .map(move |(index, tile)| (index as u32 % width, index as u32 / width, *tile))
    }
}

/// Bits Tiled sets on a gid for flipped and rotated tiles.
pub const GID_FLAG_MASK: u32 = 0xF000_0000;

/// Decodes the text of a CSV `<data>` element into exactly `expected` gids.
/// Whitespace around values and a single trailing comma are accepted.
/// Flip and rotation flags are stripped.
pub fn decode_csv(text: &str, expected: usize) -> Result<Vec<u32>, TmxError> {
    let body = text.trim();
    let body = body.strip_suffix(',').unwrap_or(body);
    let mut gids = Vec::new();
    if !body.trim().is_empty() {
        for value in body.split(',') {
            let value = value.trim();
            let gid: u32 = value.parse().map_err(|_| TmxError::InvalidTileId { value: String::from(value) })?;
            gids.push(gid & !GID_FLAG_MASK);
        }
    }
    if gids.len() != expected {
        return Err(TmxError::InvalidLayerData { expected, found: gids.len() });
    }
    Ok(gids)
}
