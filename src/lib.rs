mod asset;
mod graphics;
mod map;
mod scene;
mod config;
mod app;
mod markup;

pub use asset::*;
pub use graphics::*;
pub use map::*;
pub use scene::*;
pub use config::*;
pub use app::*;
