//! The seam between the collector and whatever serves geo-features.

use std::future::Future;
use thiserror::Error;
use walksafe_core::{BoundingBox, Feature, FeatureCategory};

/// A single feature query that could not be answered.
#[derive(Debug, Error)]
pub enum DataSourceError {
    #[error("HTTP client could not be built: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to feature API failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("feature API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("feature API error {code}: {message}")]
    Service { code: i64, message: String },

    #[error("malformed feature payload: {0}")]
    Malformed(String),
}

/// Features returned for one category and one box.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureBatch {
    pub features: Vec<Feature>,
    /// The source hit its per-request cap and dropped the rest.
    pub truncated: bool,
}

impl FeatureBatch {
    pub fn complete(features: Vec<Feature>) -> Self {
        Self {
            features,
            truncated: false,
        }
    }
}

/// Something that answers "which features of `category` touch `bbox`".
///
/// Implementations are shared by every collector worker at once.
pub trait FeatureSource: Send + Sync {
    fn query(
        &self,
        category: FeatureCategory,
        bbox: BoundingBox,
    ) -> impl Future<Output = Result<FeatureBatch, DataSourceError>> + Send;
}
