use glam::Vec2;
use crate::{GraphicsDevice, Layer, ObjectGroup, Tileset};

/// Fully loaded map. Layers and object groups are kept in declaration order.
#[derive(Clone, Default, Debug)]
pub struct Map {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    /// Ascending `first_gid` when the source follows the format.
    pub tilesets: Vec<Tileset>,
    pub layers: Vec<Layer>,
    pub object_groups: Vec<ObjectGroup>,
}

impl Map {

    /// Tileset a gid resolves to. None for empty cells.
    pub fn tileset_for(&self, gid: u32) -> Option<&Tileset> {
        if gid == 0 {
            return None;
        }
        self.tilesets.get(resolve_tileset(&self.tilesets, gid))
    }

    /// Grid spacing of cells drawn with a tileset.
    /// The map grid when the map declares one, otherwise the tileset's tile size.
    pub fn cell_size(&self, tileset: &Tileset) -> Vec2 {
        if self.tile_width > 0 && self.tile_height > 0 {
            Vec2::new(self.tile_width as f32, self.tile_height as f32)
        }
        else {
            tileset.tile_size()
        }
    }

    /// Releases layers, then tileset textures.
    pub fn unload(self, device: &mut dyn GraphicsDevice) {
        let Self { tilesets, layers, object_groups, .. } = self;
        drop(layers);
        drop(object_groups);
        for tileset in tilesets {
            device.destroy_texture(tileset.texture);
        }
    }
}

/// Index of the tileset with the largest `first_gid` not greater than `gid`.
/// 0 when no tileset qualifies.
pub fn resolve_tileset(tilesets: &[Tileset], gid: u32) -> usize {
    let mut best: Option<(usize, u32)> = None;
    for (index, tileset) in tilesets.iter().enumerate() {
        if tileset.first_gid > gid {
            continue;
        }
        match best {
            Some((_, best_gid)) if best_gid >= tileset.first_gid => {},
            _ => best = Some((index, tileset.first_gid)),
        }
    }
    best.map(|(index, _)| index).unwrap_or(0)
}

#[cfg(test)]
mod test {
    use slotmap::KeyData;
    use crate::{RecordingDevice, GraphicsDevice, TextureDesc, TextureId, Tileset};
    use super::{resolve_tileset, Map};

    fn tileset(first_gid: u32) -> Tileset {
        Tileset {
            name: format!("tileset_{first_gid}"),
            texture: TextureId::from(KeyData::from_ffi(first_gid as u64)),
            tile_width: 16,
            tile_height: 16,
            tile_count: 10,
            first_gid,
            sheet_width: 64,
            sheet_height: 64,
        }
    }

    #[test]
    fn resolves_closest_from_below() {
        let tilesets = [tileset(1), tileset(11), tileset(21)];
        assert_eq!(resolve_tileset(&tilesets, 1), 0);
        assert_eq!(resolve_tileset(&tilesets, 10), 0);
        assert_eq!(resolve_tileset(&tilesets, 11), 1);
        assert_eq!(resolve_tileset(&tilesets, 20), 1);
        assert_eq!(resolve_tileset(&tilesets, 21), 2);
        assert_eq!(resolve_tileset(&tilesets, 5000), 2);
    }

    #[test]
    fn unmatched_gid_defaults_to_first() {
        let tilesets = [tileset(5), tileset(9)];
        assert_eq!(resolve_tileset(&tilesets, 0), 0);
        assert_eq!(resolve_tileset(&tilesets, 4), 0);
        assert_eq!(resolve_tileset(&[], 3), 0);
    }

    #[test]
    fn unordered_tilesets_use_best_match() {
        let tilesets = [tileset(21), tileset(1), tileset(11)];
        assert_eq!(resolve_tileset(&tilesets, 15), 2);
        assert_eq!(resolve_tileset(&tilesets, 3), 1);
        assert_eq!(resolve_tileset(&tilesets, 30), 0);
    }

    #[test]
    fn empty_gid_has_no_tileset() {
        let map = Map { tilesets: vec![tileset(1)], ..Default::default() };
        assert!(map.tileset_for(0).is_none());
        assert_eq!(map.tileset_for(3).map(|tileset| tileset.first_gid), Some(1));
    }

    #[test]
    fn unload_destroys_textures() {
        let mut device = RecordingDevice::default();
        let mut map = Map::default();
        for first_gid in [1, 5] {
            let texture = device.create_texture(&TextureDesc {
                label: None,
                width: 1,
                height: 1,
                pixels: &[0, 0, 0, 255],
            });
            map.tilesets.push(Tileset { texture, ..tileset(first_gid) });
        }
        assert_eq!(device.live_textures(), 2);
        map.unload(&mut device);
        assert_eq!(device.live_textures(), 0);
    }
}
