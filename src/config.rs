use std::path::Path;
use anyhow::Context;
use serde::Deserialize;
use crate::Color;

/// Startup settings. Missing fields take their default.
#[derive(Clone, PartialEq, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub window_width: u32,
    pub window_height: u32,
    pub title: String,
    /// Prefix every asset path is appended to.
    pub asset_root: String,
    pub map: String,
    pub shader: String,
    /// Multiplier applied to tile and object geometry.
    pub display_scale: f32,
    pub clear_color: [f32; 4],
}

impl Default for Config {
    fn default() -> Self {
        Self {
            window_width: 1280,
            window_height: 720,
            title: String::from("tmx_batch"),
            asset_root: String::from("./data/"),
            map: String::from("map.tmx"),
            shader: String::from("shader/sprite.wgsl"),
            display_scale: 2.0,
            clear_color: [0.1, 0.1, 0.1, 1.0],
        }
    }
}

impl Config {

    /// Reads a YAML config file. Falls back to defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            log::info!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn clear_color(&self) -> Color {
        let [r, g, b, a] = self.clear_color;
        Color::new(r, g, b, a)
    }
}
