use derive_more::{Display, Error, From};
use roxmltree::Document;
use tracing::instrument;
use crate::markup::{self, Element};
use super::tileset::dimension;
use crate::{
    decode_csv, resolve_tileset, AssetError, AssetRoot, Color, GraphicsDevice, Layer,
    Map, Object, ObjectGroup, Tile, Tileset, TsxLoader, OBJECT_GROUP_ALPHA,
};

/// Loads `.tmx` maps relative to an asset root.
pub struct TmxLoader<'a> {
    assets: &'a AssetRoot,
}

impl<'a> TmxLoader<'a> {

    pub fn new(assets: &'a AssetRoot) -> Self {
        Self { assets }
    }

    /// Loads a map file and the tilesets it references.
    #[instrument(skip_all)]
    pub fn load(&self, path: &str, device: &mut dyn GraphicsDevice) -> Result<Map, TmxError> {
        log::info!("Loading map '{}'", self.assets.resolve(path));
        let text = self.assets.read_to_string(path)?;
        self.load_str(&text, path, device)
    }

    /// Loads a map from markup text. Tileset and image paths are still resolved against the asset root.
    /// On failure, textures already created are destroyed before the error is returned.
    pub fn load_str(&self, text: &str, path: &str, device: &mut dyn GraphicsDevice) -> Result<Map, TmxError> {
        let doc = markup::parse(text, path)?;
        let mut map = Map::default();
        match self.populate(&doc, &mut map, device) {
            Ok(()) => {
                log::info!(
                    "Loaded map '{path}' with {} tilesets, {} layers and {} object groups",
                    map.tilesets.len(),
                    map.layers.len(),
                    map.object_groups.len(),
                );
                Ok(map)
            },
            Err(err) => {
                map.unload(device);
                Err(err)
            },
        }
    }

    fn populate(&self, doc: &Document, map: &mut Map, device: &mut dyn GraphicsDevice) -> Result<(), TmxError> {
        let root = Element::find(doc, "map")?;
        map.width = root.optional_number("width")?.unwrap_or(0);
        map.height = root.optional_number("height")?.unwrap_or(0);
        map.tile_width = root.optional_number("tilewidth")?.unwrap_or(0);
        map.tile_height = root.optional_number("tileheight")?.unwrap_or(0);

        let tsx_loader = TsxLoader::new(self.assets);
        for reference in root.children("tileset") {
            let tileset = tsx_loader.load(reference, device)?;
            map.tilesets.push(tileset);
        }
        for layer_node in root.children("layer") {
            let layer = parse_layer(layer_node, &map.tilesets)?;
            log::debug!("Decoded layer '{}' ({}x{})", layer.name, layer.width, layer.height);
            map.layers.push(layer);
        }
        for group_node in root.children("objectgroup") {
            map.object_groups.push(parse_object_group(group_node)?);
        }
        Ok(())
    }
}

fn parse_layer(layer_node: Element, tilesets: &[Tileset]) -> Result<Layer, TmxError> {
    let width = dimension(layer_node, "width")?;
    let height = dimension(layer_node, "height")?;
    let tint = match layer_node.optional_attribute("tintcolor") {
        Some(value) => parse_color(value, 255)?,
        None => Color::WHITE,
    };

    // Only CSV data is supported. Without an encoding, Tiled writes <tile> elements.
    let data = layer_node.child("data")?;
    let encoding = data.optional_attribute("encoding").unwrap_or("xml");
    if encoding != "csv" {
        return Err(TmxError::UnsupportedEncoding { encoding: String::from(encoding) });
    }
    let expected = (width as usize).checked_mul(height as usize).ok_or(TmxError::InvalidLayerData {
        expected: usize::MAX,
        found: 0,
    })?;
    let gids = decode_csv(data.text(), expected)?;
    let tiles = gids
        .into_iter()
        .map(|gid| Tile { gid, tileset_index: resolve_tileset(tilesets, gid) })
        .collect();
    Ok(Layer {
        name: String::from(layer_node.optional_attribute("name").unwrap_or_default()),
        width,
        height,
        tint,
        visible: is_visible(layer_node)?,
        tiles,
    })
}

fn parse_object_group(group_node: Element) -> Result<ObjectGroup, TmxError> {
    let color = match group_node.optional_attribute("color") {
        Some(value) => parse_color(value, OBJECT_GROUP_ALPHA)?,
        None => Color::WHITE,
    };
    let mut objects = Vec::new();
    for object_node in group_node.children("object") {
        objects.push(Object {
            id: object_node.number("id")?,
            name: String::from(object_node.optional_attribute("name").unwrap_or_default()),
            x: object_node.number("x")?,
            y: object_node.number("y")?,
            width: object_node.optional_number("width")?.unwrap_or(1.0),
            height: object_node.optional_number("height")?.unwrap_or(1.0),
        });
    }
    Ok(ObjectGroup {
        name: String::from(group_node.optional_attribute("name").unwrap_or_default()),
        color,
        visible: is_visible(group_node)?,
        objects,
    })
}

fn parse_color(value: &str, alpha: u8) -> Result<Color, TmxError> {
    Color::from_hex(value, alpha).ok_or_else(|| TmxError::InvalidColor { value: String::from(value) })
}

fn is_visible(element: Element) -> Result<bool, TmxError> {
    Ok(element.optional_number::<u8>("visible")? != Some(0))
}

#[derive(Error, Display, From, Debug)]
pub enum TmxError {
    #[display(fmt = "Failed to parse '{path}': {source}")]
    #[from(ignore)]
    ParseFailure { path: String, source: roxmltree::Error },
    #[display(fmt = "Missing <{tag}> node")]
    #[from(ignore)]
    MissingNode { tag: String },
    #[display(fmt = "<{tag}> is missing attribute '{attribute}'")]
    #[from(ignore)]
    MissingAttribute { tag: String, attribute: String },
    #[display(fmt = "Invalid value '{value}' for attribute '{attribute}'")]
    #[from(ignore)]
    InvalidAttributeValue { attribute: String, value: String },
    #[display(fmt = "Invalid color '{value}'")]
    #[from(ignore)]
    InvalidColor { value: String },
    #[display(fmt = "Tileset '{tileset}' has no image source")]
    #[from(ignore)]
    MissingImageReference { tileset: String },
    #[display(fmt = "Unsupported layer encoding '{encoding}'")]
    #[from(ignore)]
    UnsupportedEncoding { encoding: String },
    #[display(fmt = "Expected {expected} tiles in layer data, found {found}")]
    #[from(ignore)]
    InvalidLayerData { expected: usize, found: usize },
    #[display(fmt = "Invalid tile id '{value}'")]
    #[from(ignore)]
    InvalidTileId { value: String },
    #[display(fmt = "{_0}")]
    Asset(AssetError),
}
