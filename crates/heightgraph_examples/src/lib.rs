#![forbid(unsafe_code)]

mod rendering;

pub use rendering::{init_tracing, render_heightmap_to_png, ColorMap, RenderConfig};
