//! End-to-end assessment: routes in, per-route safety metrics out.

use crate::collector::{BoxFailure, CollectError, FeatureCollector, TruncatedBox};
use crate::source::FeatureSource;
use std::collections::HashSet;
use std::time::Instant;
use thiserror::Error;
use walksafe_core::{
    compute_route_metrics, max_bounding_box_with, split_box, CombineRule, GeometryError,
    PartitionError, Route, RouteAssessment, RouteMetrics, RouteRaw, SkippedRoute,
    DEFAULT_CELL_COUNT,
};

#[derive(Debug, Error)]
pub enum AssessmentError {
    #[error("no routes to assess")]
    NoRoutes,

    #[error("invalid route geometry: {0}")]
    Geometry(#[from] GeometryError),

    #[error("cannot partition search area: {0}")]
    Partition(#[from] PartitionError),

    #[error(transparent)]
    Collection(#[from] CollectError),

    #[error("every feature query failed ({boxes} boxes)")]
    AllBoxesFailed { boxes: usize },

    #[error("every route is degenerate ({routes} routes)")]
    AllRoutesDegenerate { routes: usize },
}

#[derive(Debug, Clone, Copy)]
pub struct AssessmentOptions {
    /// Number of cells the combined box is split into. Must be a perfect square.
    pub cell_count: usize,
    pub combine_rule: CombineRule,
}

impl Default for AssessmentOptions {
    fn default() -> Self {
        Self {
            cell_count: DEFAULT_CELL_COUNT,
            combine_rule: CombineRule::default(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct AssessmentReport {
    pub metrics: Vec<RouteMetrics>,
    pub skipped: Vec<SkippedRoute>,
    pub failed_boxes: Vec<BoxFailure>,
    pub truncated_boxes: Vec<TruncatedBox>,
}

impl AssessmentReport {
    /// Output records, one per scored route.
    pub fn assessments(&self) -> Vec<RouteAssessment> {
        self.metrics.iter().map(RouteAssessment::from).collect()
    }

    /// True when some part of the area returned no or incomplete data.
    pub fn is_partial(&self) -> bool {
        !self.failed_boxes.is_empty() || !self.truncated_boxes.is_empty()
    }
}

/// Decode provider routes, dropping repeats of the same path.
pub fn build_routes(raw: &[RouteRaw]) -> Result<Vec<Route>, GeometryError> {
    let mut seen = HashSet::new();
    let mut routes = Vec::with_capacity(raw.len());
    for payload in raw {
        let route = Route::from_raw(payload)?;
        if seen.insert(route.polyline().to_string()) {
            routes.push(route);
        } else {
            tracing::debug!(polyline = route.polyline(), "dropping duplicate route");
        }
    }
    Ok(routes)
}

/// Score every route against the features around all of them.
///
/// Geometry and partition problems abort before any feature query is sent.
/// Individual failed boxes are carried in the report; the call only fails on
/// data when nothing came back at all or no route could be scored.
pub async fn compute_metrics<S>(
    collector: &FeatureCollector<S>,
    raw: &[RouteRaw],
    options: AssessmentOptions,
) -> Result<AssessmentReport, AssessmentError>
where
    S: FeatureSource + 'static,
{
    let stage = Instant::now();
    let routes = build_routes(raw)?;
    if routes.is_empty() {
        return Err(AssessmentError::NoRoutes);
    }
    tracing::debug!(
        routes = routes.len(),
        elapsed_ms = stage.elapsed().as_millis() as u64,
        "routes decoded"
    );

    let stage = Instant::now();
    let area = max_bounding_box_with(&routes, options.combine_rule)?;
    let boxes = split_box(&area, options.cell_count)?;
    tracing::debug!(
        ?area,
        cells = boxes.len(),
        elapsed_ms = stage.elapsed().as_millis() as u64,
        "search area partitioned"
    );

    let stage = Instant::now();
    let collection = collector.collect(&boxes).await?;
    tracing::debug!(
        features = collection.features.len(),
        elapsed_ms = stage.elapsed().as_millis() as u64,
        "features collected"
    );
    if collection.all_boxes_failed() {
        return Err(AssessmentError::AllBoxesFailed {
            boxes: collection.boxes_total,
        });
    }

    let stage = Instant::now();
    let scored = compute_route_metrics(&routes, &collection.features);
    tracing::debug!(
        scored = scored.metrics.len(),
        skipped = scored.skipped.len(),
        elapsed_ms = stage.elapsed().as_millis() as u64,
        "metrics computed"
    );
    if scored.metrics.is_empty() {
        return Err(AssessmentError::AllRoutesDegenerate {
            routes: routes.len(),
        });
    }

    Ok(AssessmentReport {
        metrics: scored.metrics,
        skipped: scored.skipped,
        failed_boxes: collection.failed,
        truncated_boxes: collection.truncated,
    })
}
