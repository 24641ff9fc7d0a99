use thiserror::Error;

use super::{Bbox, Coord, Geometry};

pub const EPSG_4326: &str = "EPSG:4326";
pub const EPSG_3857: &str = "EPSG:3857";

const EARTH_RADIUS: f64 = 6_378_137.0;
const MAX_LATITUDE: f64 = 85.051_128_779_806_59;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("No transform available from {source_crs} to {target_crs}")]
    UnsupportedTransform { source_crs: String, target_crs: String },
}

/// Coordinate transform between the two CRSs the service understands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrsTransform {
    Identity,
    Wgs84ToWebMercator,
    WebMercatorToWgs84,
}

impl CrsTransform {
    /// Normalize a CRS code ("epsg:4326" -> "EPSG:4326"), rejecting unknown codes
    pub fn normalize(code: &str) -> Result<String, GeometryError> {
        let upper = code.trim().to_ascii_uppercase();
        match upper.as_str() {
            EPSG_4326 | EPSG_3857 => Ok(upper),
            "EPSG:900913" => Ok(EPSG_3857.to_string()),
            _ => Err(GeometryError::UnsupportedCrs(code.to_string())),
        }
    }

    pub fn between(source: &str, target: &str) -> Result<Self, GeometryError> {
        let source = Self::normalize(source)?;
        let target = Self::normalize(target)?;
        match (source.as_str(), target.as_str()) {
            (s, t) if s == t => Ok(CrsTransform::Identity),
            (EPSG_4326, EPSG_3857) => Ok(CrsTransform::Wgs84ToWebMercator),
            (EPSG_3857, EPSG_4326) => Ok(CrsTransform::WebMercatorToWgs84),
            _ => Err(GeometryError::UnsupportedTransform {
                source_crs: source,
                target_crs: target,
            }),
        }
    }

    pub fn inverse(&self) -> Self {
        match self {
            CrsTransform::Identity => CrsTransform::Identity,
            CrsTransform::Wgs84ToWebMercator => CrsTransform::WebMercatorToWgs84,
            CrsTransform::WebMercatorToWgs84 => CrsTransform::Wgs84ToWebMercator,
        }
    }

    pub fn apply_coord(&self, c: Coord) -> Coord {
        match self {
            CrsTransform::Identity => c,
            CrsTransform::Wgs84ToWebMercator => {
                let lat = c.1.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
                let x = EARTH_RADIUS * c.0.to_radians();
                let y = EARTH_RADIUS * (std::f64::consts::FRAC_PI_4 + lat / 2.0).tan().ln();
                Coord(x, y)
            }
            CrsTransform::WebMercatorToWgs84 => {
                let lon = (c.0 / EARTH_RADIUS).to_degrees();
                let lat = (2.0 * (c.1 / EARTH_RADIUS).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
                Coord(lon, lat)
            }
        }
    }

    pub fn apply(&self, geometry: &Geometry) -> Geometry {
        match self {
            CrsTransform::Identity => geometry.clone(),
            _ => geometry.map_coords(&|c| self.apply_coord(c)),
        }
    }

    pub fn apply_bbox(&self, bbox: &Bbox) -> Bbox {
        let min = self.apply_coord(Coord(bbox.min_x, bbox.min_y));
        let max = self.apply_coord(Coord(bbox.max_x, bbox.max_y));
        Bbox::new(min.0, min.1, max.0, max.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_for_same_crs() {
        assert_eq!(CrsTransform::between("epsg:4326", "EPSG:4326").unwrap(), CrsTransform::Identity);
    }

    #[test]
    fn test_mercator_round_trip_origin() {
        let t = CrsTransform::between(EPSG_4326, EPSG_3857).unwrap();
        let projected = t.apply_coord(Coord(0.0, 0.0));
        assert!(projected.0.abs() < 1e-6 && projected.1.abs() < 1e-6);
        let back = t.inverse().apply_coord(t.apply_coord(Coord(10.0, 45.0)));
        assert!((back.0 - 10.0).abs() < 1e-9 && (back.1 - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_unknown_crs_rejected() {
        assert_eq!(
            CrsTransform::between("EPSG:31370", EPSG_4326),
            Err(GeometryError::UnsupportedCrs("EPSG:31370".to_string()))
        );
    }
}
