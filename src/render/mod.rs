//! Paints prepared features into tile images.

mod png;

pub use png::PngRenderer;

use thiserror::Error;

use crate::datastore::Feature;
use crate::geometry::Bbox;
use crate::style::NamedStyle;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RenderError {
    #[error("Invalid image size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Invalid tile bounds")]
    InvalidBounds,

    #[error("Image encoding failed: {0}")]
    Encoding(String),
}

/// Everything needed to paint one tile. Feature geometries and bounds share one CRS.
#[derive(Debug)]
pub struct RenderRequest<'a> {
    pub features: &'a [Feature],
    pub bounds: Bbox,
    pub style: Option<&'a NamedStyle>,
    pub width: u32,
    pub height: u32,
}

pub trait Renderer: Send + Sync {
    /// Encoded image bytes; identical requests give identical bytes
    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>, RenderError>;
}
