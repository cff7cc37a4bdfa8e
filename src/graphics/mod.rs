//! Quad batching and the graphics device it issues requests to.
//! [`GraphicsState`] fulfills requests with wgpu, [`RecordingDevice`] records them headlessly.

mod color;
mod device;
mod vertex;
mod batch;
mod recorder;
mod state;

pub use color::*;
pub use device::*;
pub use vertex::*;
pub use batch::*;
pub use recorder::*;
pub use state::*;
