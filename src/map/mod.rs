mod map;
mod tileset;
mod layer;
mod object;
mod tmx;

pub use map::*;
pub use tileset::*;
pub use layer::*;
pub use object::*;
pub use tmx::*;
