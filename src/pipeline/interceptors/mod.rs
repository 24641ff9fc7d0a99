mod raster_cache;
mod rebuild_cache;

pub use raster_cache::RasterCacheInterceptor;
pub use rebuild_cache::{rebuild_key, RebuildCacheInterceptor, RebuildRestoreInterceptor};
