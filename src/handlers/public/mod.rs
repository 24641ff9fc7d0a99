pub mod health;
pub mod rasterize;

pub use health::{health, root};
pub use rasterize::rasterize_get;
