use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::error::PipelineError;
use crate::geometry::{Bbox, Geometry};
use crate::security::SavedSecurityContext;

/// Which parts of a feature go into a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureIncludes(u8);

impl FeatureIncludes {
    pub const ATTRIBUTES: u8 = 1;
    pub const GEOMETRY: u8 = 2;
    pub const STYLE: u8 = 4;
    pub const LABEL: u8 = 8;
    pub const ALL: FeatureIncludes = FeatureIncludes(15);

    pub fn from_bits(bits: u8) -> Result<Self, PipelineError> {
        if bits & !Self::ALL.0 != 0 {
            return Err(PipelineError::InvalidArgument(format!(
                "unknown feature include flags: {}",
                bits
            )));
        }
        Ok(Self(bits))
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn attributes(&self) -> bool {
        self.0 & Self::ATTRIBUTES != 0
    }

    pub fn geometry(&self) -> bool {
        self.0 & Self::GEOMETRY != 0
    }

    pub fn style(&self) -> bool {
        self.0 & Self::STYLE != 0
    }

    pub fn label(&self) -> bool {
        self.0 & Self::LABEL != 0
    }
}

impl Default for FeatureIncludes {
    fn default() -> Self {
        Self::ALL
    }
}

/// Position of a tile in the quadtree over a layer's max extent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCode {
    pub level: u8,
    pub x: u32,
    pub y: u32,
}

impl TileCode {
    pub const MAX_LEVEL: u8 = 30;

    pub fn new(level: u8, x: u32, y: u32) -> Result<Self, PipelineError> {
        if level > Self::MAX_LEVEL {
            return Err(PipelineError::InvalidArgument(format!("tile level {} too deep", level)));
        }
        let tiles = 1u64 << level;
        if u64::from(x) >= tiles || u64::from(y) >= tiles {
            return Err(PipelineError::InvalidArgument(format!(
                "tile {}/{}/{} outside the grid",
                level, x, y
            )));
        }
        Ok(Self { level, x, y })
    }

    /// Bounds inside `extent`; row 0 is the top row
    pub fn bounds(&self, extent: &Bbox) -> Bbox {
        let tiles = (1u64 << self.level) as f64;
        let width = extent.width() / tiles;
        let height = extent.height() / tiles;
        let min_x = extent.min_x + self.x as f64 * width;
        let max_y = extent.max_y - self.y as f64 * height;
        Bbox::new(min_x, max_y - height, min_x + width, max_y)
    }
}

impl fmt::Display for TileCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.level, self.x, self.y)
    }
}

/// Everything that determines the content of a tile, apart from the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileMetadata {
    pub layer_id: String,
    pub code: TileCode,
    pub scale: f64,
    #[serde(default)]
    pub filter: Option<Value>,
    #[serde(default)]
    pub style_id: Option<String>,
    pub feature_includes: FeatureIncludes,
    pub crs: String,
}

impl TileMetadata {
    pub fn tile_id(&self) -> String {
        format!("{}.{}", self.layer_id, self.code)
    }

    /// Canonical identity used in cache keys
    pub fn identity(&self) -> String {
        format!(
            "{}|{}|{}|{}|{}|{}|{}",
            self.layer_id,
            self.code,
            self.scale,
            self.filter.as_ref().map(Value::to_string).unwrap_or_default(),
            self.style_id.as_deref().unwrap_or(""),
            self.feature_includes.bits(),
            self.crs,
        )
    }
}

/// One feature as returned to a caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultFeature {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<Geometry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    pub updatable: bool,
    pub deletable: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GetFeaturesContainer {
    pub features: Vec<ResultFeature>,
}

/// Vector tile response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TileContainer {
    pub tile_id: String,
    pub code: Option<TileCode>,
    pub bounds: Option<Bbox>,
    pub features: Vec<ResultFeature>,
    /// Where the matching raster tile can be fetched without re-authenticating
    pub raster_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterizingContainer {
    pub image: Vec<u8>,
    pub tile_id: String,
}

/// Cached record from which a tile request can be replayed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RebuildCacheContainer {
    pub metadata: TileMetadata,
    pub security: SavedSecurityContext,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_includes() {
        let includes = FeatureIncludes::from_bits(FeatureIncludes::ATTRIBUTES | FeatureIncludes::LABEL).unwrap();
        assert!(includes.attributes() && includes.label());
        assert!(!includes.geometry() && !includes.style());
        assert!(FeatureIncludes::from_bits(16).is_err());
    }

    #[test]
    fn test_tile_bounds() {
        let extent = Bbox::new(0.0, 0.0, 100.0, 100.0);
        assert_eq!(TileCode::new(0, 0, 0).unwrap().bounds(&extent), extent);
        let top_right = TileCode::new(1, 1, 0).unwrap().bounds(&extent);
        assert_eq!(top_right, Bbox::new(50.0, 50.0, 100.0, 100.0));
        assert!(TileCode::new(1, 2, 0).is_err());
    }

    #[test]
    fn test_metadata_identity_and_tile_id() {
        let metadata = TileMetadata {
            layer_id: "roads".into(),
            code: TileCode::new(2, 1, 3).unwrap(),
            scale: 4.0,
            filter: None,
            style_id: Some("default".into()),
            feature_includes: FeatureIncludes::ALL,
            crs: "EPSG:4326".into(),
        };
        assert_eq!(metadata.tile_id(), "roads.2.1.3");
        let mut other = metadata.clone();
        assert_eq!(metadata.identity(), other.identity());
        other.feature_includes = FeatureIncludes::from_bits(1).unwrap();
        assert_ne!(metadata.identity(), other.identity());
    }
}
