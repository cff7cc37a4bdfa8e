//! File access relative to the asset root.

use std::io;
use derive_more::{Display, Error};

/// Directory every referenced asset path is resolved against.
/// Paths are joined by plain concatenation, so the root normally ends in `/`.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct AssetRoot {
    root: String,
}

impl Default for AssetRoot {
    fn default() -> Self {
        Self::new("./data/")
    }
}

impl AssetRoot {

    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Full path of an asset.
    pub fn resolve(&self, path: &str) -> String {
        format!("{}{}", self.root, path)
    }

    pub fn read_to_string(&self, path: &str) -> Result<String, AssetError> {
        let full_path = self.resolve(path);
        std::fs::read_to_string(&full_path).map_err(|source| AssetError::NotFound {
            path: full_path,
            source,
        })
    }

    /// Reads and decodes an image into RGBA8 pixels.
    pub fn load_image(&self, path: &str) -> Result<Image, AssetError> {
        let full_path = self.resolve(path);
        let bytes = match std::fs::read(&full_path) {
            Ok(bytes) => bytes,
            Err(source) => return Err(AssetError::NotFound { path: full_path, source }),
        };
        let decoded = match image::load_from_memory(&bytes) {
            Ok(decoded) => decoded.into_rgba8(),
            Err(source) => return Err(AssetError::InvalidImage { path: full_path, source }),
        };
        Ok(Image {
            width: decoded.width(),
            height: decoded.height(),
            pixels: decoded.into_raw(),
        })
    }
}

/// Decoded RGBA8 image.
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Error, Display, Debug)]
pub enum AssetError {
    #[display(fmt = "Asset '{path}' not found: {source}")]
    NotFound { path: String, source: io::Error },
    #[display(fmt = "Asset '{path}' is not a valid image: {source}")]
    InvalidImage { path: String, source: image::ImageError },
}

#[cfg(test)]
mod test {
    use super::{AssetError, AssetRoot};

    #[test]
    fn resolves_by_concatenation() {
        let assets = AssetRoot::new("./data/");
        assert_eq!(assets.resolve("tiles/grass.png"), "./data/tiles/grass.png");
        assert_eq!(assets.resolve("../outside.tmx"), "./data/../outside.tmx");
    }

    #[test]
    fn missing_file_is_not_found() {
        let assets = AssetRoot::new("/nonexistent-asset-root/");
        let err = assets.load_image("missing.png").err().expect("expected error");
        assert!(matches!(err, AssetError::NotFound { .. }));
        let err = assets.read_to_string("missing.tmx").err().expect("expected error");
        assert!(matches!(err, AssetError::NotFound { ref path, .. } if path == "/nonexistent-asset-root/missing.tmx"));
    }
}
