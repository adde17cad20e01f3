//! ArcGIS OpenData "query" endpoint client.

use crate::source::{DataSourceError, FeatureBatch, FeatureSource};
use geo::{LineString, MultiLineString, Point};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;
use walksafe_core::{BoundingBox, Feature, FeatureCategory, Sidewalk, StreetLight, TrafficVolume};

pub const DEFAULT_OPENDATA_URL: &str =
    "https://maps.london.ca/arcgisa/rest/services/OpenData/OpenData_Transportation/MapServer";

const ID_FIELD: &str = "OBJECTID";
const LENGTH_FIELD: &str = "Shape.STLength()";
const VOLUME_FIELD: &str = "VolumeCount";
const WGS84: &str = "4326";

#[derive(Debug, Clone)]
pub struct OpenDataConfig {
    pub base_url: String,
    pub lights_layer: u32,
    pub sidewalks_layer: u32,
    pub traffic_layer: u32,
    pub request_timeout: Duration,
}

impl Default for OpenDataConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_OPENDATA_URL.to_string(),
            lights_layer: 19,
            sidewalks_layer: 4,
            traffic_layer: 21,
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for the OpenData feature layers.
///
/// Cheap to share: the inner `reqwest::Client` pools connections and is safe
/// for concurrent use.
#[derive(Debug, Clone)]
pub struct OpenDataClient {
    client: Client,
    config: OpenDataConfig,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    features: Vec<RawFeature>,
    #[serde(default, rename = "exceededTransferLimit")]
    exceeded_transfer_limit: bool,
    #[serde(default)]
    error: Option<ServiceError>,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct RawFeature {
    #[serde(default)]
    attributes: Map<String, Value>,
    geometry: Option<RawGeometry>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawGeometry {
    Point { x: f64, y: f64 },
    Polyline { paths: Vec<Vec<Vec<f64>>> },
}

impl OpenDataClient {
    pub fn new(config: OpenDataConfig) -> Result<Self, DataSourceError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(DataSourceError::Client)?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: OpenDataConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &OpenDataConfig {
        &self.config
    }

    pub fn layer(&self, category: FeatureCategory) -> u32 {
        match category {
            FeatureCategory::StreetLights => self.config.lights_layer,
            FeatureCategory::Sidewalks => self.config.sidewalks_layer,
            FeatureCategory::TrafficVolumes => self.config.traffic_layer,
        }
    }

    pub fn query_url(&self, category: FeatureCategory) -> String {
        format!(
            "{}/{}/query",
            self.config.base_url.trim_end_matches('/'),
            self.layer(category)
        )
    }

    /// Fetch every feature of `category` whose geometry intersects `bbox`.
    pub async fn query(
        &self,
        category: FeatureCategory,
        bbox: BoundingBox,
    ) -> Result<FeatureBatch, DataSourceError> {
        let url = self.query_url(category);

        let response = self
            .client
            .get(&url)
            .query(&query_params(category, &bbox))
            .send()
            .await
            .map_err(DataSourceError::Transport)?;

        let status = response.status();
        let body = response.text().await.map_err(DataSourceError::Transport)?;
        if !status.is_success() {
            return Err(DataSourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let batch = parse_features(category, &body)?;
        if batch.truncated {
            tracing::warn!(
                %category,
                ?bbox,
                returned = batch.features.len(),
                "feature API hit its transfer limit; results truncated"
            );
        }
        Ok(batch)
    }
}

impl FeatureSource for OpenDataClient {
    async fn query(
        &self,
        category: FeatureCategory,
        bbox: BoundingBox,
    ) -> Result<FeatureBatch, DataSourceError> {
        OpenDataClient::query(self, category, bbox).await
    }
}

fn out_fields(category: FeatureCategory) -> &'static str {
    match category {
        FeatureCategory::StreetLights => "OBJECTID,Shape",
        FeatureCategory::Sidewalks => "OBJECTID,Shape.STLength()",
        FeatureCategory::TrafficVolumes => "OBJECTID,Shape.STLength(),VolumeCount",
    }
}

/// Query string for an envelope-intersects search, `xmin,ymin,xmax,ymax` in lon/lat.
pub fn query_params(category: FeatureCategory, bbox: &BoundingBox) -> Vec<(&'static str, String)> {
    let envelope = format!(
        "{},{},{},{}",
        bbox.sw.lon, bbox.sw.lat, bbox.ne.lon, bbox.ne.lat
    );
    vec![
        ("where", "1=1".to_string()),
        ("outFields", out_fields(category).to_string()),
        ("geometry", envelope),
        ("geometryType", "esriGeometryEnvelope".to_string()),
        ("inSR", WGS84.to_string()),
        ("spatialRel", "esriSpatialRelIntersects".to_string()),
        ("outSR", WGS84.to_string()),
        ("f", "json".to_string()),
    ]
}

/// Decode a query response body into features of `category`.
pub fn parse_features(category: FeatureCategory, body: &str) -> Result<FeatureBatch, DataSourceError> {
    let payload: QueryResponse =
        serde_json::from_str(body).map_err(|err| DataSourceError::Malformed(err.to_string()))?;

    if let Some(error) = payload.error {
        return Err(DataSourceError::Service {
            code: error.code,
            message: error.message,
        });
    }

    let features = payload
        .features
        .into_iter()
        .map(|raw| to_feature(category, raw))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(FeatureBatch {
        features,
        truncated: payload.exceeded_transfer_limit,
    })
}

fn to_feature(category: FeatureCategory, raw: RawFeature) -> Result<Feature, DataSourceError> {
    let id = raw
        .attributes
        .get(ID_FIELD)
        .and_then(Value::as_i64)
        .ok_or_else(|| DataSourceError::Malformed(format!("feature without {ID_FIELD}")))?;
    let geometry = raw
        .geometry
        .ok_or_else(|| DataSourceError::Malformed(format!("feature {id} has no geometry")))?;

    match category {
        FeatureCategory::StreetLights => match geometry {
            RawGeometry::Point { x, y } => Ok(Feature::StreetLight(StreetLight {
                id,
                location: Point::new(x, y),
            })),
            RawGeometry::Polyline { .. } => Err(DataSourceError::Malformed(format!(
                "street light {id} is not a point"
            ))),
        },
        FeatureCategory::Sidewalks => Ok(Feature::Sidewalk(Sidewalk {
            id,
            length_km: number(&raw.attributes, LENGTH_FIELD, id)? / 1000.0,
            line: lines(geometry, id)?,
        })),
        FeatureCategory::TrafficVolumes => Ok(Feature::TrafficVolume(TrafficVolume {
            id,
            length_km: number(&raw.attributes, LENGTH_FIELD, id)? / 1000.0,
            volume: number(&raw.attributes, VOLUME_FIELD, id)?,
            line: lines(geometry, id)?,
        })),
    }
}

fn number(attributes: &Map<String, Value>, field: &str, id: i64) -> Result<f64, DataSourceError> {
    attributes
        .get(field)
        .and_then(Value::as_f64)
        .filter(|value| value.is_finite())
        .ok_or_else(|| DataSourceError::Malformed(format!("feature {id} has no numeric {field}")))
}

fn lines(geometry: RawGeometry, id: i64) -> Result<MultiLineString<f64>, DataSourceError> {
    let RawGeometry::Polyline { paths } = geometry else {
        return Err(DataSourceError::Malformed(format!("feature {id} is not a polyline")));
    };

    let mut parts = Vec::with_capacity(paths.len());
    for path in paths {
        let mut coords = Vec::with_capacity(path.len());
        for vertex in path {
            match vertex.as_slice() {
                [x, y, ..] => coords.push((*x, *y)),
                _ => {
                    return Err(DataSourceError::Malformed(format!(
                        "feature {id} has a vertex with fewer than two ordinates"
                    )))
                }
            }
        }
        if coords.len() >= 2 {
            parts.push(LineString::from(coords));
        }
    }

    if parts.is_empty() {
        return Err(DataSourceError::Malformed(format!("feature {id} has no usable path")));
    }
    Ok(MultiLineString::new(parts))
}
