mod feature_each;
mod filter;
mod layer;
mod rasterize;
mod tile;

pub use feature_each::FeatureEachStep;
pub use filter::FilterStep;
pub use layer::{CrsStep, GetLayerStep};
pub use rasterize::RasterizeStep;
pub use tile::{FillTileStep, PrepareTileStep, TileFeaturesStep};

pub(crate) use feature_each::{admit_features, decorate};
