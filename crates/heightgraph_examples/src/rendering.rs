use std::path::Path;

use heightgraph::prelude::Heightmap;
use image::{ImageBuffer, Rgb, RgbImage};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Installs a formatting subscriber. `RUST_LOG` overrides the default `info` level.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMap {
    #[default]
    Gray,
    /// Water, sand, grass, rock and snow bands.
    Terrain,
}

impl ColorMap {
    fn color(self, t: f32) -> [u8; 3] {
        let t = t.clamp(0.0, 1.0);
        match self {
            ColorMap::Gray => {
                let v = (t * 255.0).round() as u8;
                [v, v, v]
            }
            ColorMap::Terrain => {
                const STOPS: [(f32, [f32; 3]); 5] = [
                    (0.0, [30.0, 60.0, 140.0]),
                    (0.3, [210.0, 200.0, 150.0]),
                    (0.45, [70.0, 140.0, 60.0]),
                    (0.75, [120.0, 100.0, 80.0]),
                    (1.0, [245.0, 245.0, 250.0]),
                ];
                let k = STOPS.iter().position(|s| s.0 >= t).unwrap_or(STOPS.len() - 1).max(1);
                let (t0, c0) = STOPS[k - 1];
                let (t1, c1) = STOPS[k];
                let f = ((t - t0) / (t1 - t0)).clamp(0.0, 1.0);
                let mix = |a: f32, b: f32| (a + (b - a) * f).round() as u8;
                [mix(c0[0], c1[0]), mix(c0[1], c1[1]), mix(c0[2], c1[2])]
            }
        }
    }
}

/// Configuration for rendering a heightmap.
#[derive(Clone, Copy, Debug)]
pub struct RenderConfig {
    /// Output pixels per heightmap cell.
    pub scale: u32,
    pub color_map: ColorMap,
    /// Stretch values to the field's own range instead of reading them as `[0, 1]`.
    pub normalize: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            scale: 2,
            color_map: ColorMap::Gray,
            normalize: true,
        }
    }
}

impl RenderConfig {
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.scale = scale.max(1);
        self
    }

    pub fn with_color_map(mut self, color_map: ColorMap) -> Self {
        self.color_map = color_map;
        self
    }

    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }
}

/// Writes the heightmap as a PNG, row `j = 0` at the bottom.
pub fn render_heightmap_to_png(
    field: &Heightmap,
    config: &RenderConfig,
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let (nx, ny) = field.shape();
    let values = field.to_array();
    let (lo, hi) = if config.normalize {
        (field.min(), field.max())
    } else {
        (0.0, 1.0)
    };
    let range = if hi - lo > f32::EPSILON { hi - lo } else { 1.0 };
    let scale = config.scale.max(1);

    let img: RgbImage = ImageBuffer::from_fn(nx as u32 * scale, ny as u32 * scale, |x, y| {
        let i = (x / scale) as usize;
        let j = ny - 1 - (y / scale) as usize;
        let t = (values[j * nx + i] - lo) / range;
        Rgb(config.color_map.color(t))
    });

    let path = path.as_ref();
    img.save(path)?;
    info!("Wrote {}x{} image to '{}'.", img.width(), img.height(), path.display());
    Ok(())
}
