//! Walksafe CLI - rate candidate walking routes from the command line.
//!
//! This crate provides:
//! - config: environment configuration for both upstream services
//! - rate_trip: directions lookup followed by a full assessment
//! - the `rate_routes` binary

pub mod config;

pub use config::Config;

use walksafe_directions::{Location, RouteProvider};
use walksafe_opendata::{
    compute_metrics, AssessmentError, AssessmentOptions, AssessmentReport, FeatureCollector,
    FeatureSource,
};

/// Ask `provider` for walking routes and assess every one of them.
///
/// A provider that returns nothing surfaces as [`AssessmentError::NoRoutes`].
pub async fn rate_trip<P, S>(
    provider: &P,
    collector: &FeatureCollector<S>,
    from: &Location,
    to: &Location,
    options: AssessmentOptions,
) -> Result<AssessmentReport, AssessmentError>
where
    P: RouteProvider,
    S: FeatureSource + 'static,
{
    let routes = provider.routes(from, to).await;
    tracing::info!(%from, %to, routes = routes.len(), "rating walking routes");
    compute_metrics(collector, &routes, options).await
}
