pub mod feature_service;
pub mod state;
pub mod tile_service;

pub use feature_service::{FeatureSearchRequest, FeatureService, LocationQuery};
pub use state::AppState;
pub use tile_service::{TileQuery, TileService};
