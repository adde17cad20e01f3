//! Google Maps Directions and Geocoding client.

use crate::location::Location;
use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use walksafe_core::{Coordinate, RouteRaw};

pub const DEFAULT_GMAPS_URL: &str = "https://maps.googleapis.com/maps/api";

/// Supplies candidate walking routes between two locations.
pub trait RouteProvider: Send + Sync {
    /// Every alternative the provider offers. Failures yield an empty list.
    fn routes(
        &self,
        origin: &Location,
        destination: &Location,
    ) -> impl Future<Output = Vec<RouteRaw>> + Send;
}

#[derive(Debug, Clone)]
pub struct DirectionsConfig {
    pub base_url: String,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl Default for DirectionsConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_GMAPS_URL.to_string(),
            api_key: String::new(),
            request_timeout: Duration::from_secs(10),
        }
    }
}

/// HTTP client for walking directions.
#[derive(Debug, Clone)]
pub struct DirectionsClient {
    client: Client,
    config: DirectionsConfig,
}

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    results: Vec<GeocodeResult>,
}

#[derive(Debug, Deserialize)]
struct GeocodeResult {
    geometry: GeocodeGeometry,
}

#[derive(Debug, Deserialize)]
struct GeocodeGeometry {
    location: GeocodeLocation,
}

#[derive(Debug, Deserialize)]
struct GeocodeLocation {
    lat: f64,
    lng: f64,
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    status: String,
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    routes: Vec<RouteRaw>,
}

impl DirectionsClient {
    pub fn new(config: DirectionsConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_client(client, config))
    }

    pub fn with_client(client: Client, config: DirectionsConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &DirectionsConfig {
        &self.config
    }

    /// Resolve `location` to a coordinate, geocoding addresses.
    pub async fn resolve(&self, location: &Location) -> Result<Coordinate> {
        match location {
            Location::Coordinate(coord) => Ok(*coord),
            Location::Address(address) => self.geocode(address).await,
        }
    }

    /// Look up the first match for a free-text address.
    pub async fn geocode(&self, address: &str) -> Result<Coordinate> {
        let url = format!("{}/geocode/json", self.base_url());

        let response = self
            .client
            .get(&url)
            .query(&[("address", address), ("key", self.config.api_key.as_str())])
            .send()
            .await
            .context("Failed to send geocode request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Geocode request failed: {} {}", status, body));
        }

        let body = response
            .text()
            .await
            .context("Failed to read geocode response")?;
        parse_geocode(&body).with_context(|| format!("Failed to geocode {:?}", address))
    }

    /// Walking routes with alternatives, or an error describing what failed.
    pub async fn try_routes(
        &self,
        origin: &Location,
        destination: &Location,
    ) -> Result<Vec<RouteRaw>> {
        let from = self.resolve(origin).await.context("Failed to resolve origin")?;
        let to = self
            .resolve(destination)
            .await
            .context("Failed to resolve destination")?;

        let url = format!("{}/directions/json", self.base_url());
        let departure = Utc::now().timestamp().to_string();
        let origin = Location::from(from).as_query();
        let destination = Location::from(to).as_query();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("origin", origin.as_str()),
                ("destination", destination.as_str()),
                ("mode", "walking"),
                ("alternatives", "true"),
                ("units", "metric"),
                ("departure_time", departure.as_str()),
                ("key", self.config.api_key.as_str()),
            ])
            .send()
            .await
            .context("Failed to send directions request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!(
                "Directions request failed: {} {}",
                status,
                body
            ));
        }

        let body = response
            .text()
            .await
            .context("Failed to read directions response")?;
        parse_directions(&body)
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }
}

impl RouteProvider for DirectionsClient {
    async fn routes(&self, origin: &Location, destination: &Location) -> Vec<RouteRaw> {
        match self.try_routes(origin, destination).await {
            Ok(routes) => {
                tracing::debug!(%origin, %destination, routes = routes.len(), "directions received");
                routes
            }
            Err(err) => {
                tracing::warn!(%origin, %destination, error = %format!("{:#}", err), "directions unavailable");
                Vec::new()
            }
        }
    }
}

fn parse_geocode(body: &str) -> Result<Coordinate> {
    let payload: GeocodeResponse =
        serde_json::from_str(body).context("Failed to parse geocode response")?;
    if payload.status != "OK" {
        return Err(anyhow::anyhow!(
            "Geocoder returned {}: {}",
            payload.status,
            payload.error_message.unwrap_or_default()
        ));
    }

    let location = payload
        .results
        .first()
        .map(|result| &result.geometry.location)
        .ok_or_else(|| anyhow::anyhow!("Geocoder returned no results"))?;
    let coord = Coordinate::new(location.lat, location.lng);
    coord.validate().context("Geocoder returned an invalid coordinate")?;
    Ok(coord)
}

/// `ZERO_RESULTS` is an empty list, not an error.
fn parse_directions(body: &str) -> Result<Vec<RouteRaw>> {
    let payload: DirectionsResponse =
        serde_json::from_str(body).context("Failed to parse directions response")?;
    match payload.status.as_str() {
        "OK" => Ok(payload.routes),
        "ZERO_RESULTS" => Ok(Vec::new()),
        status => Err(anyhow::anyhow!(
            "Directions returned {}: {}",
            status,
            payload.error_message.unwrap_or_default()
        )),
    }
}
