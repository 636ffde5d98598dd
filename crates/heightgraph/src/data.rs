//! Port data types and values.
//!
//! [`DataType`] is the closed set of tags a port can carry; link compatibility is tag
//! equality. [`PortData`] is the matching value stored on OUT ports.
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cloud::Cloud;
use crate::error::{Error, Result};
use crate::heightmap::{Heightmap, HeightmapLayout};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Heightmap,
    Mask,
    Cloud,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Heightmap => "Heightmap",
            DataType::Mask => "Mask",
            DataType::Cloud => "Cloud",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Heightmap" => Ok(DataType::Heightmap),
            "Mask" => Ok(DataType::Mask),
            "Cloud" => Ok(DataType::Cloud),
            other => Err(Error::TypeMismatch(format!("unknown data type '{other}'"))),
        }
    }
}

/// A value produced on an OUT port.
#[derive(Clone, Debug, PartialEq)]
pub enum PortData {
    Heightmap(Heightmap),
    /// A heightmap whose values are weights in `[0, 1]`.
    Mask(Heightmap),
    Cloud(Cloud),
}

impl PortData {
    pub fn data_type(&self) -> DataType {
        match self {
            PortData::Heightmap(_) => DataType::Heightmap,
            PortData::Mask(_) => DataType::Mask,
            PortData::Cloud(_) => DataType::Cloud,
        }
    }

    /// The empty value of a type: zero-filled fields, or a cloud without points.
    pub fn empty(data_type: DataType, layout: HeightmapLayout) -> Result<Self> {
        Ok(match data_type {
            DataType::Heightmap => PortData::Heightmap(Heightmap::new(layout)?),
            DataType::Mask => PortData::Mask(Heightmap::new(layout)?),
            DataType::Cloud => PortData::Cloud(Cloud::new()),
        })
    }

    /// The field of a heightmap or mask value.
    pub fn as_field(&self) -> Option<&Heightmap> {
        match self {
            PortData::Heightmap(h) | PortData::Mask(h) => Some(h),
            PortData::Cloud(_) => None,
        }
    }

    pub fn as_cloud(&self) -> Option<&Cloud> {
        match self {
            PortData::Cloud(c) => Some(c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_type_parses_its_display_form() {
        for t in [DataType::Heightmap, DataType::Mask, DataType::Cloud] {
            assert_eq!(t.to_string().parse::<DataType>().expect("parse"), t);
        }
        assert!(matches!(
            "Volume".parse::<DataType>(),
            Err(Error::TypeMismatch(_))
        ));
    }

    #[test]
    fn empty_values_match_their_type() {
        let layout = HeightmapLayout::new((4, 4), (1, 1), 0);
        for t in [DataType::Heightmap, DataType::Mask, DataType::Cloud] {
            let v = PortData::empty(t, layout).expect("layout");
            assert_eq!(v.data_type(), t);
        }
        let mask = PortData::empty(DataType::Mask, layout).expect("layout");
        assert_eq!(mask.as_field().map(|h| h.max()), Some(0.0));
        assert!(mask.as_cloud().is_none());
    }
}
