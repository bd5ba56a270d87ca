// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Reverse geocoding: coordinates in, one human-readable address out.
//!
//! Pure request/response. One attempt per call, no retries, no caching; the
//! caller decides what to show when a lookup fails and which of several
//! overlapping lookups still matters.

use std::future::Future;
use std::time::Duration;

use geofence_map_port::LatLng;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// Fallback text callers show when a lookup finds nothing.
pub const NO_ADDRESS_FOUND: &str = "No address found";

/// Public Geoapify reverse-geocoding endpoint.
pub const GEOAPIFY_REVERSE_URL: &str = "https://api.geoapify.com/v1/geocode/reverse";

/// Failure of a single lookup. Never a coordinate string in disguise.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// The service answered, but has no address for this point.
    #[error("no address found")]
    NotFound,
    /// The service answered with a non-success status.
    #[error("geocoder returned status {0}")]
    Status(u16),
    /// The request never completed (DNS, TLS, timeout, connection reset).
    #[error("geocoder transport error: {0}")]
    Transport(#[from] reqwest::Error),
    /// The response body was not the expected JSON.
    #[error("geocoder response malformed: {0}")]
    Decode(#[from] serde_json::Error),
}

impl GeocodeError {
    /// True for "the service answered, but has nothing"; false for failures
    /// where the address is unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Reverse-geocoding port.
pub trait ReverseGeocoder: Send + Sync + 'static {
    /// Resolve one point to a formatted address.
    fn resolve(&self, at: LatLng) -> impl Future<Output = Result<String, GeocodeError>> + Send;
}

/// Geoapify adapter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeoapifyConfig {
    /// Reverse endpoint URL.
    pub endpoint: String,
    /// API key sent as `apiKey`.
    pub api_key: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl GeoapifyConfig {
    /// Default endpoint and timeout with the given key.
    pub fn with_key(api_key: impl Into<String>) -> Self {
        Self {
            endpoint: GEOAPIFY_REVERSE_URL.into(),
            api_key: api_key.into(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Deserialize)]
struct FeatureCollection {
    #[serde(default)]
    features: Vec<Feature>,
}

#[derive(Deserialize)]
struct Feature {
    #[serde(default)]
    properties: FeatureProperties,
}

#[derive(Deserialize, Default)]
struct FeatureProperties {
    formatted: Option<String>,
}

/// Pull the first feature's formatted address out of a Geoapify response.
pub fn parse_reverse_response(body: &[u8]) -> Result<String, GeocodeError> {
    let collection: FeatureCollection = serde_json::from_slice(body)?;
    collection
        .features
        .into_iter()
        .next()
        .and_then(|f| f.properties.formatted)
        .filter(|addr| !addr.trim().is_empty())
        .ok_or(GeocodeError::NotFound)
}

/// HTTPS client for Geoapify's reverse endpoint.
#[derive(Clone)]
pub struct GeoapifyResolver {
    client: reqwest::Client,
    config: GeoapifyConfig,
}

impl GeoapifyResolver {
    /// Build a resolver; fails only if the TLS backend cannot initialize.
    pub fn new(config: GeoapifyConfig) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    /// Settings in use.
    pub fn config(&self) -> &GeoapifyConfig {
        &self.config
    }

    async fn lookup(&self, at: LatLng) -> Result<String, GeocodeError> {
        let lat = at.lat.to_string();
        let lon = at.lng.to_string();
        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("apiKey", self.config.api_key.as_str()),
            ])
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        let address = parse_reverse_response(&body)?;
        debug!(lat = at.lat, lon = at.lng, %address, "reverse geocoded");
        Ok(address)
    }
}

impl ReverseGeocoder for GeoapifyResolver {
    fn resolve(&self, at: LatLng) -> impl Future<Output = Result<String, GeocodeError>> + Send {
        self.lookup(at)
    }
}
