use std::io::Cursor;

use image::{ImageFormat, Rgba, RgbaImage};

use super::{RenderError, RenderRequest, Renderer};
use crate::geometry::{Bbox, Coord, Geometry};
use crate::style::{parse_color, NamedStyle};

/// Largest accepted tile edge in pixels
const MAX_TILE_SIZE: u32 = 4096;

/// Software rasterizer producing PNG tiles on a transparent background
#[derive(Debug, Clone, Copy, Default)]
pub struct PngRenderer;

impl PngRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for PngRenderer {
    fn render(&self, request: &RenderRequest<'_>) -> Result<Vec<u8>, RenderError> {
        let (width, height) = (request.width, request.height);
        if width == 0 || height == 0 || width > MAX_TILE_SIZE || height > MAX_TILE_SIZE {
            return Err(RenderError::InvalidSize { width, height });
        }
        if request.bounds.width() <= 0.0 || request.bounds.height() <= 0.0 {
            return Err(RenderError::InvalidBounds);
        }

        let default_style = NamedStyle::new("default");
        let style = request.style.unwrap_or(&default_style);
        let fill = with_alpha(parse_color(&style.fill_color), 160);
        let stroke = Rgba(parse_color(&style.stroke_color));

        let mut canvas = RgbaImage::new(width, height);
        let view = Viewport::new(request.bounds, width, height);
        for feature in request.features {
            if let Some(geometry) = &feature.geometry {
                paint(&mut canvas, &view, geometry, fill, stroke);
            }
        }

        let mut bytes = Cursor::new(Vec::new());
        canvas
            .write_to(&mut bytes, ImageFormat::Png)
            .map_err(|e| RenderError::Encoding(e.to_string()))?;
        Ok(bytes.into_inner())
    }
}

fn with_alpha(color: [u8; 4], alpha: u8) -> Rgba<u8> {
    Rgba([color[0], color[1], color[2], alpha])
}

/// Maps world coordinates to pixel space, y axis pointing down
struct Viewport {
    bounds: Bbox,
    width: u32,
    height: u32,
}

impl Viewport {
    fn new(bounds: Bbox, width: u32, height: u32) -> Self {
        Self { bounds, width, height }
    }

    fn to_pixel(&self, c: Coord) -> (f64, f64) {
        let px = (c.0 - self.bounds.min_x) / self.bounds.width() * self.width as f64;
        let py = (self.bounds.max_y - c.1) / self.bounds.height() * self.height as f64;
        (px, py)
    }

    fn to_world(&self, px: u32, py: u32) -> Coord {
        let x = self.bounds.min_x + (px as f64 + 0.5) / self.width as f64 * self.bounds.width();
        let y = self.bounds.max_y - (py as f64 + 0.5) / self.height as f64 * self.bounds.height();
        Coord(x, y)
    }
}

fn paint(canvas: &mut RgbaImage, view: &Viewport, geometry: &Geometry, fill: Rgba<u8>, stroke: Rgba<u8>) {
    match geometry {
        Geometry::Point(c) => {
            let (px, py) = view.to_pixel(*c);
            for dx in -1..=1 {
                for dy in -1..=1 {
                    put(canvas, px.floor() as i64 + dx, py.floor() as i64 + dy, stroke);
                }
            }
        }
        Geometry::LineString(points) => {
            for pair in points.windows(2) {
                line(canvas, view.to_pixel(pair[0]), view.to_pixel(pair[1]), stroke);
            }
        }
        Geometry::Polygon(rings) => {
            fill_polygon(canvas, view, geometry, fill);
            for ring in rings {
                for pair in ring.windows(2) {
                    line(canvas, view.to_pixel(pair[0]), view.to_pixel(pair[1]), stroke);
                }
            }
        }
        Geometry::Collection(parts) => {
            for part in parts {
                paint(canvas, view, part, fill, stroke);
            }
        }
    }
}

fn fill_polygon(canvas: &mut RgbaImage, view: &Viewport, polygon: &Geometry, fill: Rgba<u8>) {
    let Some(bbox) = polygon.bbox() else {
        return;
    };
    let (x0, y0) = view.to_pixel(Coord(bbox.min_x, bbox.max_y));
    let (x1, y1) = view.to_pixel(Coord(bbox.max_x, bbox.min_y));
    let clamp_x = |v: f64| v.max(0.0).min(canvas.width() as f64 - 1.0) as u32;
    let clamp_y = |v: f64| v.max(0.0).min(canvas.height() as f64 - 1.0) as u32;
    let (left, right) = (clamp_x(x0.floor()), clamp_x(x1.ceil()));
    let (top, bottom) = (clamp_y(y0.floor()), clamp_y(y1.ceil()));
    for py in top..=bottom {
        for px in left..=right {
            if polygon.contains_point(view.to_world(px, py)) {
                canvas.put_pixel(px, py, fill);
            }
        }
    }
}

/// Bresenham line between two pixel positions, clipped to the canvas first
fn line(canvas: &mut RgbaImage, from: (f64, f64), to: (f64, f64), color: Rgba<u8>) {
    let Some((from, to)) = clip(from, to, canvas.width() as f64, canvas.height() as f64) else {
        return;
    };
    let (mut x, mut y) = (from.0.floor() as i64, from.1.floor() as i64);
    let (x1, y1) = (to.0.floor() as i64, to.1.floor() as i64);
    let dx = (x1 - x).abs();
    let dy = -(y1 - y).abs();
    let sx = if x < x1 { 1 } else { -1 };
    let sy = if y < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(canvas, x, y, color);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

/// Liang-Barsky clipping of a segment to `0..=width, 0..=height`.
/// None when the segment misses the rectangle.
fn clip(from: (f64, f64), to: (f64, f64), width: f64, height: f64) -> Option<((f64, f64), (f64, f64))> {
    let (dx, dy) = (to.0 - from.0, to.1 - from.1);
    let (mut t0, mut t1) = (0.0_f64, 1.0_f64);
    let edges = [
        (-dx, from.0),
        (dx, width - from.0),
        (-dy, from.1),
        (dy, height - from.1),
    ];
    for (p, q) in edges {
        if p == 0.0 {
            if q < 0.0 {
                return None;
            }
            continue;
        }
        let r = q / p;
        if p < 0.0 {
            t0 = t0.max(r);
        } else {
            t1 = t1.min(r);
        }
        if t0 > t1 {
            return None;
        }
    }
    let at = |t: f64| (from.0 + t * dx, from.1 + t * dy);
    Some((at(t0), at(t1)))
}

fn put(canvas: &mut RgbaImage, x: i64, y: i64, color: Rgba<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < canvas.width() && (y as u32) < canvas.height() {
        canvas.put_pixel(x as u32, y as u32, color);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datastore::Feature;
    use serde_json::Map;

    fn request(features: &[Feature]) -> RenderRequest<'_> {
        RenderRequest {
            features,
            bounds: Bbox::new(0.0, 0.0, 10.0, 10.0),
            style: None,
            width: 32,
            height: 32,
        }
    }

    #[test]
    fn test_renders_png_deterministically() {
        let features = vec![
            Feature::new("1", Map::new(), Some(Geometry::rectangle(2.0, 2.0, 6.0, 6.0))),
            Feature::new("2", Map::new(), Some(Geometry::Point(Coord(8.0, 8.0)))),
        ];
        let first = PngRenderer.render(&request(&features)).unwrap();
        let second = PngRenderer.render(&request(&features)).unwrap();
        assert_eq!(&first[..8], b"\x89PNG\r\n\x1a\n");
        assert_eq!(first, second);

        let decoded = image::load_from_memory(&first).unwrap().to_rgba8();
        // Pixel (12, 20) sits inside the rectangle, (0, 0) outside every feature
        assert_ne!(decoded.get_pixel(12, 20)[3], 0);
        assert_eq!(decoded.get_pixel(0, 0)[3], 0);
    }

    #[test]
    fn test_rejects_bad_size() {
        let mut req = request(&[]);
        req.width = 0;
        assert!(matches!(PngRenderer.render(&req), Err(RenderError::InvalidSize { .. })));
    }

    #[test]
    fn test_long_line_crossing_tile_is_drawn() {
        let features = vec![Feature::new(
            "1",
            Map::new(),
            Some(Geometry::LineString(vec![Coord(-10000.0, 5.0), Coord(10000.0, 5.0)])),
        )];
        let png = PngRenderer.render(&request(&features)).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        let painted = decoded.pixels().filter(|p| p[3] != 0).count();
        assert_eq!(painted, 32);
    }

    #[test]
    fn test_clip_drops_segments_outside_canvas() {
        assert_eq!(clip((-5.0, -5.0), (-1.0, -1.0), 32.0, 32.0), None);
        assert_eq!(
            clip((-32.0, 16.0), (96.0, 16.0), 32.0, 32.0),
            Some(((0.0, 16.0), (32.0, 16.0)))
        );
    }
}
