//! Well-known context keys shared by the built-in steps.

use std::sync::Arc;

use super::containers::{FeatureIncludes, TileMetadata};
use super::context::ContextKey;
use crate::datastore::{Feature, VectorLayer};
use crate::filter::{Filter, SpatialOp};
use crate::geometry::{Bbox, CrsTransform, Geometry};
use crate::style::NamedStyle;

pub const LAYER_ID: ContextKey<String> = ContextKey::new("layerId");
pub const LAYER: ContextKey<Arc<VectorLayer>> = ContextKey::new("layer");
pub const OFFSET: ContextKey<usize> = ContextKey::new("offset");
/// `usize::MAX` means unbounded
pub const MAX_RESULT_SIZE: ContextKey<usize> = ContextKey::new("maxResultSize");
pub const FORCE_PAGING: ContextKey<bool> = ContextKey::new("forcePaging");
/// Request filter on entry; the combined filter once the filter step has run
pub const FILTER: ContextKey<Filter> = ContextKey::new("filter");
pub const LOCATION: ContextKey<(Geometry, SpatialOp)> = ContextKey::new("location");
pub const FEATURE_INCLUDES: ContextKey<FeatureIncludes> = ContextKey::new("featureIncludes");
pub const STYLE_ID: ContextKey<String> = ContextKey::new("styleId");
pub const STYLE: ContextKey<NamedStyle> = ContextKey::new("style");
pub const TILE_METADATA: ContextKey<TileMetadata> = ContextKey::new("tileMetadata");
/// Tile bounds in the layer CRS
pub const BOUNDS: ContextKey<Bbox> = ContextKey::new("bounds");
/// Requested output CRS
pub const CRS: ContextKey<String> = ContextKey::new("crs");
/// Layer CRS to output CRS
pub const CRS_TRANSFORM: ContextKey<CrsTransform> = ContextKey::new("crsTransform");
pub const REBUILD_KEY: ContextKey<String> = ContextKey::new("rebuildKey");
/// Admitted features of a tile, geometry still in the layer CRS
pub const TILE_FEATURES: ContextKey<Vec<Feature>> = ContextKey::new("tileFeatures");
