// Datastore side of the pipeline: features, feature sources and the layer registry.
// Real persistence adapters plug in through `FeatureSource`.

pub mod feature;
pub mod source;
pub mod memory;
pub mod layer;

pub use feature::*;
pub use source::*;
pub use memory::*;
pub use layer::*;
