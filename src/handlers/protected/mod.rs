pub mod auth;
pub mod cache;
pub mod features;
pub mod tiles;

pub use auth::whoami_get;
pub use cache::cache_delete;
pub use features::features_post;
pub use tiles::{raster_get, tile_get};
