use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::heightmap::{BBox, HeightmapLayout, TransformMode};

/// Graph-wide compute settings shared by every node.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Shape, tiling, overlap and bounding box of every heightmap in the graph.
    pub layout: HeightmapLayout,
    /// Default dispatch mode for tile kernels.
    pub transform_mode: TransformMode,
}

impl GraphConfig {
    /// Creates a new [`GraphConfig`] with the given pixel shape and default tiling.
    pub fn new(shape: (usize, usize)) -> Self {
        Self {
            layout: HeightmapLayout {
                shape,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    pub fn with_layout(mut self, layout: HeightmapLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Sets the tile count along each axis.
    pub fn with_tiling(mut self, tiling: (usize, usize)) -> Self {
        self.layout.tiling = tiling;
        self
    }

    /// Sets the overlap band width, in cells.
    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.layout.overlap = overlap;
        self
    }

    pub fn with_bbox(mut self, bbox: BBox) -> Self {
        self.layout.bbox = bbox;
        self
    }

    pub fn with_transform_mode(mut self, mode: TransformMode) -> Self {
        self.transform_mode = mode;
        self
    }

    /// Validates the configuration, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        self.layout
            .validate()
            .map_err(|e| Error::InvalidConfig(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_fields() {
        let config = GraphConfig::new((64, 32))
            .with_tiling((2, 1))
            .with_overlap(3)
            .with_transform_mode(TransformMode::CpuSerial);
        assert_eq!(config.layout.shape, (64, 32));
        assert_eq!(config.layout.tiling, (2, 1));
        assert_eq!(config.layout.overlap, 3);
        assert_eq!(config.transform_mode, TransformMode::CpuSerial);
        config.validate().expect("valid config");
    }

    #[test]
    fn validate_reports_invalid_config() {
        let err = GraphConfig::new((10, 10))
            .with_tiling((3, 3))
            .validate()
            .expect_err("uneven tiling");
        matches!(err, Error::InvalidConfig(_))
            .then_some(())
            .expect("expected InvalidConfig");
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        let config: GraphConfig =
            serde_json::from_str(r#"{"transform_mode":"CpuSerial"}"#).expect("partial config");
        assert_eq!(config.layout, HeightmapLayout::default());
        assert_eq!(config.transform_mode, TransformMode::CpuSerial);
    }
}
