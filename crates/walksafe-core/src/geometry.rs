//! Planar geometry primitives for corridors and feature correlation.
//!
//! All shapes live in a plane of decimal degrees with `x = lon` and `y = lat`,
//! which is the axis order the feature API returns. Lengths measured here are
//! in degrees and only meaningful as ratios against other lengths in the same
//! plane.

use crate::error::GeometryError;
use geo::{BooleanOps, Buffer, Contains, Intersects, LineString, MultiLineString, MultiPolygon, Point, Rect};
use serde::{Deserialize, Serialize};

/// Half-width of every route corridor, in degrees.
pub const CORRIDOR_BUFFER_DEG: f64 = 0.00025;

/// A (lat, lon) pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub lat: f64,
    pub lon: f64,
}

impl Coordinate {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Route-provider order.
    pub fn lat_lon(&self) -> (f64, f64) {
        (self.lat, self.lon)
    }

    /// Feature-API order.
    pub fn lon_lat(&self) -> (f64, f64) {
        (self.lon, self.lat)
    }

    pub fn to_point(&self) -> Point<f64> {
        Point::new(self.lon, self.lat)
    }

    /// Reject non-finite values and values outside lat [-90, 90], lon [-180, 180].
    pub fn validate(&self) -> Result<(), GeometryError> {
        if !self.lat.is_finite() || !self.lon.is_finite() {
            return Err(GeometryError::NonFinite {
                lat: self.lat,
                lon: self.lon,
            });
        }
        if !(-90.0..=90.0).contains(&self.lat) || !(-180.0..=180.0).contains(&self.lon) {
            return Err(GeometryError::OutOfRange {
                lat: self.lat,
                lon: self.lon,
            });
        }
        Ok(())
    }
}

/// Axis-aligned box defined by its northeast and southwest corners.
///
/// Boxes never cross the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub ne: Coordinate,
    pub sw: Coordinate,
}

impl BoundingBox {
    pub const fn new(ne: Coordinate, sw: Coordinate) -> Self {
        Self { ne, sw }
    }

    pub fn from_extremes(min_lat: f64, min_lon: f64, max_lat: f64, max_lon: f64) -> Self {
        Self {
            ne: Coordinate::new(max_lat, max_lon),
            sw: Coordinate::new(min_lat, min_lon),
        }
    }

    pub fn height_deg(&self) -> f64 {
        self.ne.lat - self.sw.lat
    }

    pub fn width_deg(&self) -> f64 {
        self.ne.lon - self.sw.lon
    }

    pub fn is_valid(&self) -> bool {
        self.ne.lat >= self.sw.lat
    }

    pub fn has_area(&self) -> bool {
        self.height_deg() > 0.0 && self.width_deg() > 0.0
    }

    /// Closed containment: points on the edge belong to the box.
    pub fn contains(&self, coord: &Coordinate) -> bool {
        coord.lat >= self.sw.lat
            && coord.lat <= self.ne.lat
            && coord.lon >= self.sw.lon
            && coord.lon <= self.ne.lon
    }

    pub fn to_rect(&self) -> Rect<f64> {
        Rect::new(self.sw.to_point().0, self.ne.to_point().0)
    }
}

/// Expand `line` by `width` on both sides.
///
/// A single-vertex line buffers to a disc; an empty line or a non-positive
/// width yields an empty polygon.
pub fn buffer(line: &LineString<f64>, width: f64) -> MultiPolygon<f64> {
    if !width.is_finite() || width <= 0.0 {
        return MultiPolygon::new(Vec::new());
    }
    match line.0.as_slice() {
        [] => MultiPolygon::new(Vec::new()),
        [only] => Point::from(*only).buffer(width),
        _ => line.buffer(width),
    }
}

pub fn contains(polygon: &MultiPolygon<f64>, point: &Point<f64>) -> bool {
    polygon.contains(point)
}

pub fn intersects(polygon: &MultiPolygon<f64>, line: &MultiLineString<f64>) -> bool {
    !polygon.0.is_empty() && polygon.intersects(line)
}

/// The parts of `line` inside `polygon`. Disjoint inputs give an empty result.
pub fn intersection(polygon: &MultiPolygon<f64>, line: &MultiLineString<f64>) -> MultiLineString<f64> {
    if !intersects(polygon, line) {
        return MultiLineString::new(Vec::new());
    }
    polygon.clip(line, false)
}

/// Planar length of every part of `line`.
pub fn length(line: &MultiLineString<f64>) -> f64 {
    line.0.iter().map(line_length).sum()
}

pub fn line_length(line: &LineString<f64>) -> f64 {
    line.lines()
        .map(|segment| segment.dx().hypot(segment.dy()))
        .sum()
}
