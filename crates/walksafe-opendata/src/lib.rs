//! Walksafe OpenData - feature queries, concurrent collection and the
//! end-to-end route assessment pipeline.

pub mod assess;
pub mod client;
pub mod collector;
pub mod retry;
pub mod source;

pub use assess::{build_routes, compute_metrics, AssessmentError, AssessmentOptions, AssessmentReport};
pub use client::{parse_features, query_params, OpenDataClient, OpenDataConfig, DEFAULT_OPENDATA_URL};
pub use collector::{
    BoxFailure, CollectError, CollectionReport, CollectorConfig, DeadlinePolicy, FeatureCollector,
    TruncatedBox,
};
pub use retry::RetryPolicy;
pub use source::{DataSourceError, FeatureBatch, FeatureSource};
