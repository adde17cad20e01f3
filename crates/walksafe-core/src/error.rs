//! Error taxonomy for the safety-metric engine.

use thiserror::Error;

/// Malformed or empty route geometry. Fatal for the whole computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("route path is empty")]
    EmptyPath,

    #[error("encoded polyline could not be decoded: {0}")]
    InvalidPolyline(String),

    #[error("coordinate ({lat}, {lon}) is not finite")]
    NonFinite { lat: f64, lon: f64 },

    #[error("coordinate ({lat}, {lon}) is outside the supported range")]
    OutOfRange { lat: f64, lon: f64 },

    #[error("route has no legs")]
    MissingLeg,

    #[error("distance {0:?} could not be parsed")]
    InvalidDistance(String),
}

/// Invalid partition request. Raised before any network call is issued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PartitionError {
    #[error("cell count {0} is not a non-zero perfect square")]
    NotPerfectSquare(usize),

    #[error("bounding box has zero area")]
    ZeroArea,

    #[error("bounding box is too small to split into {cells_per_side} cells per side")]
    TooSmall { cells_per_side: usize },

    #[error("no routes to bound")]
    NoRoutes,
}

/// A route whose distance or centerline length cannot produce a density.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DegenerateRouteError {
    #[error("route distance {0} km is not positive")]
    NonPositiveDistance(f64),

    #[error("route centerline has zero length")]
    ZeroCenterline,
}
