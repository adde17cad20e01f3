//! Walking routes returned by the route provider.

use crate::error::GeometryError;
use crate::geometry::{self, BoundingBox, Coordinate, CORRIDOR_BUFFER_DEG};
use geo::{LineString, MultiPolygon};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Precision of the provider's encoded polylines.
pub const POLYLINE_PRECISION: u32 = 5;

pub const KM_PER_MILE: f64 = 1.60934;
const KM_PER_FOOT: f64 = 0.000_304_8;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceUnit {
    Kilometers,
    Meters,
    Miles,
    Feet,
}

impl DistanceUnit {
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix.trim().to_ascii_lowercase().as_str() {
            "km" => Some(Self::Kilometers),
            "m" => Some(Self::Meters),
            "mi" => Some(Self::Miles),
            "ft" => Some(Self::Feet),
            _ => None,
        }
    }

    pub fn km_per_unit(self) -> f64 {
        match self {
            Self::Kilometers => 1.0,
            Self::Meters => 0.001,
            Self::Miles => KM_PER_MILE,
            Self::Feet => KM_PER_FOOT,
        }
    }
}

/// A distance with an explicit unit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Distance {
    pub magnitude: f64,
    pub unit: DistanceUnit,
}

impl Distance {
    pub const fn new(magnitude: f64, unit: DistanceUnit) -> Self {
        Self { magnitude, unit }
    }

    pub const fn km(magnitude: f64) -> Self {
        Self::new(magnitude, DistanceUnit::Kilometers)
    }

    /// Parse provider text such as `"1.4 km"`, `"0.9 mi"` or `"1,204 ft"`.
    pub fn parse(text: &str) -> Result<Self, GeometryError> {
        let invalid = || GeometryError::InvalidDistance(text.to_string());
        let mut parts = text.split_whitespace();
        let magnitude = parts
            .next()
            .map(|value| value.replace(',', ""))
            .and_then(|value| value.parse::<f64>().ok())
            .filter(|value| value.is_finite())
            .ok_or_else(invalid)?;
        let unit = parts
            .next()
            .and_then(DistanceUnit::from_suffix)
            .ok_or_else(invalid)?;
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(Self { magnitude, unit })
    }

    pub fn to_km(&self) -> f64 {
        self.magnitude * self.unit.km_per_unit()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl From<LatLng> for Coordinate {
    fn from(value: LatLng) -> Self {
        Coordinate::new(value.lat, value.lng)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawBounds {
    pub northeast: LatLng,
    pub southwest: LatLng,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDistance {
    pub text: String,
    /// Metres, when the provider supplies it.
    #[serde(default)]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawDuration {
    /// Seconds.
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLeg {
    pub distance: RawDistance,
    pub duration: RawDuration,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawPolyline {
    pub points: String,
}

/// One route as the provider returns it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteRaw {
    pub bounds: RawBounds,
    pub legs: Vec<RawLeg>,
    pub overview_polyline: RawPolyline,
}

/// A candidate walking route.
///
/// Identity is the encoded polyline: two routes with byte-equal paths are the
/// same route regardless of any other attribute.
#[derive(Debug, Clone)]
pub struct Route {
    polyline: String,
    ne: Coordinate,
    sw: Coordinate,
    distance_km: f64,
    duration_s: f64,
    waypoints: Vec<Coordinate>,
    centerline: LineString<f64>,
    corridor: MultiPolygon<f64>,
    centerline_length: f64,
}

impl Route {
    /// Build a route from a provider payload, normalizing distance to km.
    pub fn from_raw(raw: &RouteRaw) -> Result<Self, GeometryError> {
        let leg = raw.legs.first().ok_or(GeometryError::MissingLeg)?;
        let distance = match Distance::parse(&leg.distance.text) {
            Ok(distance) => distance,
            Err(err) => match leg.distance.value {
                Some(metres) if metres.is_finite() => Distance::new(metres, DistanceUnit::Meters),
                _ => return Err(err),
            },
        };

        Self::new(
            raw.overview_polyline.points.clone(),
            raw.bounds.northeast.into(),
            raw.bounds.southwest.into(),
            distance,
            leg.duration.value,
        )
    }

    pub fn new(
        polyline: impl Into<String>,
        ne: Coordinate,
        sw: Coordinate,
        distance: Distance,
        duration_s: f64,
    ) -> Result<Self, GeometryError> {
        let polyline = polyline.into();
        if polyline.is_empty() {
            return Err(GeometryError::EmptyPath);
        }
        ne.validate()?;
        sw.validate()?;

        let centerline = polyline::decode_polyline(&polyline, POLYLINE_PRECISION)
            .map_err(|err| GeometryError::InvalidPolyline(err.to_string()))?;
        if centerline.0.is_empty() {
            return Err(GeometryError::EmptyPath);
        }

        let waypoints: Vec<Coordinate> = centerline
            .coords()
            .map(|coord| Coordinate::new(coord.y, coord.x))
            .collect();
        for waypoint in &waypoints {
            waypoint.validate()?;
        }

        let corridor = geometry::buffer(&centerline, CORRIDOR_BUFFER_DEG);
        let centerline_length = geometry::line_length(&centerline);

        Ok(Self {
            polyline,
            ne,
            sw,
            distance_km: distance.to_km(),
            duration_s,
            waypoints,
            centerline,
            corridor,
            centerline_length,
        })
    }

    /// Build a route whose corners are the envelope of its own waypoints.
    pub fn from_polyline(
        polyline: impl Into<String>,
        distance: Distance,
        duration_s: f64,
    ) -> Result<Self, GeometryError> {
        let polyline = polyline.into();
        if polyline.is_empty() {
            return Err(GeometryError::EmptyPath);
        }
        let centerline = polyline::decode_polyline(&polyline, POLYLINE_PRECISION)
            .map_err(|err| GeometryError::InvalidPolyline(err.to_string()))?;

        let mut coords = centerline.coords();
        let first = coords.next().ok_or(GeometryError::EmptyPath)?;
        let (mut min_lat, mut max_lat, mut min_lon, mut max_lon) =
            (first.y, first.y, first.x, first.x);
        for coord in coords {
            min_lat = min_lat.min(coord.y);
            max_lat = max_lat.max(coord.y);
            min_lon = min_lon.min(coord.x);
            max_lon = max_lon.max(coord.x);
        }

        Self::new(
            polyline,
            Coordinate::new(max_lat, max_lon),
            Coordinate::new(min_lat, min_lon),
            distance,
            duration_s,
        )
    }

    pub fn polyline(&self) -> &str {
        &self.polyline
    }

    pub fn ne(&self) -> Coordinate {
        self.ne
    }

    pub fn sw(&self) -> Coordinate {
        self.sw
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::new(self.ne, self.sw)
    }

    pub fn distance_km(&self) -> f64 {
        self.distance_km
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    pub fn waypoints(&self) -> &[Coordinate] {
        &self.waypoints
    }

    pub fn centerline(&self) -> &LineString<f64> {
        &self.centerline
    }

    pub fn corridor(&self) -> &MultiPolygon<f64> {
        &self.corridor
    }

    /// Centerline length in degrees. Only used as a ratio denominator.
    pub fn centerline_length(&self) -> f64 {
        self.centerline_length
    }
}

impl PartialEq for Route {
    fn eq(&self, other: &Self) -> bool {
        self.polyline == other.polyline
    }
}

impl Eq for Route {}

impl Hash for Route {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.polyline.hash(state);
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} km walking route", self.distance_km)
    }
}
