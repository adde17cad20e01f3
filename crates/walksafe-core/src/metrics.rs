//! Per-route safety metrics.
//!
//! Every metric is a pure function of one route and one feature set, so routes
//! can be scored independently and in any order.

use crate::error::DegenerateRouteError;
use crate::features::{FeatureCollection, Sidewalk, StreetLight, TrafficVolume};
use crate::geometry;
use crate::route::Route;
use serde::{Deserialize, Serialize};

/// Street lights inside the corridor per kilometre of route.
pub fn light_density(route: &Route, lights: &[StreetLight]) -> Result<f64, DegenerateRouteError> {
    let distance_km = checked_distance(route)?;
    Ok(lights_in_corridor(route, lights) as f64 / distance_km)
}

/// Sidewalk length inside the corridor over centerline length.
///
/// 1.0 is full coverage on one side, 2.0 is full coverage on both sides.
/// The ratio is not capped.
pub fn sidewalk_ratio(route: &Route, sidewalks: &[Sidewalk]) -> Result<f64, DegenerateRouteError> {
    let centerline = checked_centerline(route)?;
    let (covered, _) = sidewalk_coverage(route, sidewalks);
    Ok(covered / centerline)
}

/// Length-weighted average daily traffic along the route.
///
/// A road covering the whole centerline contributes its full volume, one
/// covering half of it contributes half.
pub fn traffic_density(route: &Route, roads: &[TrafficVolume]) -> Result<f64, DegenerateRouteError> {
    let centerline = checked_centerline(route)?;
    let (weighted, _) = traffic_exposure(route, roads, centerline);
    Ok(weighted)
}

/// All three metrics for one route plus match counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteMetrics {
    pub polyline: String,
    pub lights_per_km: f64,
    pub sidewalk_ratio: f64,
    pub traffic_weighted_avg: f64,
    pub duration_s: f64,
    pub distance_km: f64,
    pub lights_in_corridor: usize,
    pub sidewalks_matched: usize,
    pub roads_matched: usize,
}

pub fn route_metrics(
    route: &Route,
    features: &FeatureCollection,
) -> Result<RouteMetrics, DegenerateRouteError> {
    let distance_km = checked_distance(route)?;
    let centerline = checked_centerline(route)?;

    let lights = lights_in_corridor(route, &features.lights);
    let (covered, sidewalks_matched) = sidewalk_coverage(route, &features.sidewalks);
    let (traffic, roads_matched) = traffic_exposure(route, &features.traffic, centerline);

    Ok(RouteMetrics {
        polyline: route.polyline().to_string(),
        lights_per_km: lights as f64 / distance_km,
        sidewalk_ratio: covered / centerline,
        traffic_weighted_avg: traffic,
        duration_s: route.duration_s(),
        distance_km,
        lights_in_corridor: lights,
        sidewalks_matched,
        roads_matched,
    })
}

/// A route left out of the results, with the reason.
#[derive(Debug, Clone, PartialEq)]
pub struct SkippedRoute {
    pub polyline: String,
    pub reason: DegenerateRouteError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricsReport {
    pub metrics: Vec<RouteMetrics>,
    pub skipped: Vec<SkippedRoute>,
}

/// Score every route. Degenerate routes are skipped, not fatal.
pub fn compute_route_metrics(routes: &[Route], features: &FeatureCollection) -> MetricsReport {
    let mut report = MetricsReport::default();
    for route in routes {
        match route_metrics(route, features) {
            Ok(metrics) => report.metrics.push(metrics),
            Err(reason) => {
                tracing::warn!(polyline = route.polyline(), %reason, "skipping degenerate route");
                report.skipped.push(SkippedRoute {
                    polyline: route.polyline().to_string(),
                    reason,
                });
            }
        }
    }
    report
}

/// Output record handed to the API layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteAssessment {
    pub polyline: String,
    pub lights_per_km: f64,
    pub sidewalk_ratio: f64,
    pub traffic_weighted_avg: f64,
    pub duration_seconds: f64,
    pub distance_km: f64,
}

impl From<&RouteMetrics> for RouteAssessment {
    fn from(metrics: &RouteMetrics) -> Self {
        Self {
            polyline: metrics.polyline.clone(),
            lights_per_km: metrics.lights_per_km,
            sidewalk_ratio: metrics.sidewalk_ratio,
            traffic_weighted_avg: metrics.traffic_weighted_avg,
            duration_seconds: metrics.duration_s,
            distance_km: metrics.distance_km,
        }
    }
}

fn checked_distance(route: &Route) -> Result<f64, DegenerateRouteError> {
    let distance_km = route.distance_km();
    if !distance_km.is_finite() || distance_km <= 0.0 {
        return Err(DegenerateRouteError::NonPositiveDistance(distance_km));
    }
    Ok(distance_km)
}

fn checked_centerline(route: &Route) -> Result<f64, DegenerateRouteError> {
    let length = route.centerline_length();
    if !length.is_finite() || length <= 0.0 {
        return Err(DegenerateRouteError::ZeroCenterline);
    }
    Ok(length)
}

fn lights_in_corridor(route: &Route, lights: &[StreetLight]) -> usize {
    lights
        .iter()
        .filter(|light| geometry::contains(route.corridor(), &light.location))
        .count()
}

fn sidewalk_coverage(route: &Route, sidewalks: &[Sidewalk]) -> (f64, usize) {
    let mut covered = 0.0;
    let mut matched = 0;
    for sidewalk in sidewalks {
        if !geometry::intersects(route.corridor(), &sidewalk.line) {
            continue;
        }
        covered += geometry::length(&geometry::intersection(route.corridor(), &sidewalk.line));
        matched += 1;
    }
    (covered, matched)
}

fn traffic_exposure(route: &Route, roads: &[TrafficVolume], centerline: f64) -> (f64, usize) {
    let mut weighted = 0.0;
    let mut matched = 0;
    for road in roads {
        if !geometry::intersects(route.corridor(), &road.line) {
            continue;
        }
        let inside = geometry::length(&geometry::intersection(route.corridor(), &road.line));
        weighted += road.volume * (inside / centerline);
        matched += 1;
    }
    (weighted, matched)
}
