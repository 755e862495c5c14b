pub mod canvas_surface;
pub mod memory_surface;
pub mod painter;

pub use canvas_surface::{CanvasSurface, CanvasSurfaceFactory, encode_data_url};
pub use memory_surface::{MemorySeries, MemorySurface, MemorySurfaceFactory, SurfaceLifecycle, SurfaceProbe};
