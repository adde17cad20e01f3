//! Walksafe Core - geometry, partitioning and safety metrics for walking routes.

pub mod error;
pub mod features;
pub mod geometry;
pub mod metrics;
pub mod partition;
pub mod route;

pub use error::{DegenerateRouteError, GeometryError, PartitionError};
pub use features::{
    dedup_by_id, Feature, FeatureCategory, FeatureCollection, FeatureId, Sidewalk, StreetLight,
    TrafficVolume,
};
pub use geometry::{BoundingBox, Coordinate, CORRIDOR_BUFFER_DEG};
pub use metrics::{
    compute_route_metrics, light_density, route_metrics, sidewalk_ratio, traffic_density,
    MetricsReport, RouteAssessment, RouteMetrics, SkippedRoute,
};
pub use partition::{
    combine_boxes, max_bounding_box, max_bounding_box_with, split_box, CombineRule,
    DEFAULT_CELL_COUNT,
};
pub use route::{Distance, DistanceUnit, Route, RouteRaw};
