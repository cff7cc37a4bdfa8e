use glam::{Vec2, Vec4};
use crate::markup::{self, Element};
use crate::{AssetRoot, GraphicsDevice, TextureDesc, TextureId, TmxError, GID_FLAG_MASK};

/// Texture sheet covering the gids from `first_gid` up to the next tileset's `first_gid`.
#[derive(Clone, PartialEq, Debug)]
pub struct Tileset {
    pub name: String,
    /// Owned by the tileset. Released by [`Map::unload`](crate::Map::unload).
    pub texture: TextureId,
    pub tile_width: u32,
    pub tile_height: u32,
    pub tile_count: u32,
    pub first_gid: u32,
    pub sheet_width: u32,
    pub sheet_height: u32,
}

impl Tileset {

    /// Tiles per sheet row.
    pub fn columns(&self) -> u32 {
        (self.sheet_width / self.tile_width).max(1)
    }

    pub fn sheet_size(&self) -> Vec2 {
        Vec2::new(self.sheet_width as f32, self.sheet_height as f32)
    }

    pub fn tile_size(&self) -> Vec2 {
        Vec2::new(self.tile_width as f32, self.tile_height as f32)
    }

    /// Pixel rectangle (x, y, width, height) of a gid within the sheet.
    /// Flip flags on the gid are ignored.
    pub fn tile_rect(&self, gid: u32) -> Vec4 {
        let local = (gid & !GID_FLAG_MASK).saturating_sub(self.first_gid) as u64;
        let columns = self.columns() as u64;
        Vec4::new(
            ((local % columns) * self.tile_width as u64) as f32,
            ((local / columns) * self.tile_height as u64) as f32,
            self.tile_width as f32,
            self.tile_height as f32,
        )
    }
}

/// Resolves the `<tileset>` references of a map.
pub struct TsxLoader<'a> {
    assets: &'a AssetRoot,
}

impl<'a> TsxLoader<'a> {

    pub fn new(assets: &'a AssetRoot) -> Self {
        Self { assets }
    }

    /// Loads the tileset a reference points to and uploads its sheet.
    /// A reference without `source` describes the tileset inline.
    pub(crate) fn load(&self, reference: Element, device: &mut dyn GraphicsDevice) -> Result<Tileset, TmxError> {
        let first_gid = reference.number("firstgid")?;
        match reference.optional_attribute("source") {
            Some(source) => {
                let text = self.assets.read_to_string(source)?;
                let doc = markup::parse(&text, source)?;
                let root = Element::find(&doc, "tileset")?;
                self.resolve(root, first_gid, device)
            },
            None => self.resolve(reference, first_gid, device),
        }
    }

    fn resolve(&self, root: Element, first_gid: u32, device: &mut dyn GraphicsDevice) -> Result<Tileset, TmxError> {
        let name = root.optional_attribute("name").unwrap_or_default();
        let tile_width = dimension(root, "tilewidth")?;
        let tile_height = dimension(root, "tileheight")?;
        let tile_count = root.number("tilecount")?;
        let image_source = root
            .children("image")
            .next()
            .and_then(|image| image.optional_attribute("source"))
            .ok_or_else(|| TmxError::MissingImageReference { tileset: String::from(name) })?;

        // Pixels are dropped once uploaded
        let image = self.assets.load_image(image_source)?;
        let texture = device.create_texture(&TextureDesc {
            label: Some(image_source),
            width: image.width,
            height: image.height,
            pixels: &image.pixels,
        });
        log::debug!("Resolved tileset '{name}' from '{image_source}' at gid {first_gid}");
        Ok(Tileset {
            name: String::from(name),
            texture,
            tile_width,
            tile_height,
            tile_count,
            first_gid,
            sheet_width: image.width,
            sheet_height: image.height,
        })
    }
}

/// Required size attribute. Must be greater than 0.
pub(super) fn dimension(element: Element, name: &str) -> Result<u32, TmxError> {
    let value: u32 = element.number(name)?;
    if value == 0 {
        return Err(TmxError::InvalidAttributeValue {
            attribute: String::from(name),
            value: String::from("0"),
        });
    }
    Ok(value)
}
