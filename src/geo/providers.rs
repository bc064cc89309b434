//! Geocoding providers: OpenStreetMap Nominatim (primary) and the Google
//! Geocoding API (secondary).
//!
//! Each provider exposes the same two capabilities: reverse-geocode
//! coordinates to a city-level place name, and forward-check that a typed
//! name exists at all. `Ok(None)` from `reverse` means the provider answered
//! but had no usable city-level field; transport and decode failures are
//! `Err` and are absorbed by the resolver's fallback chain.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use super::types::{Coordinates, GeoError};

/// Upstream calls are bounded; a timed-out provider is just a failed provider.
pub const PROVIDER_TIMEOUT: Duration = Duration::from_secs(15);

const USER_AGENT: &str = concat!("CityKiosk/", env!("CARGO_PKG_VERSION"), " (catalog assistant)");

/// Uniform capability of one upstream geocoding service.
#[async_trait]
pub trait GeoProvider: Send + Sync {
    /// Short provider name for logs.
    fn name(&self) -> &'static str;

    /// Coordinates → city-level place name.
    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeoError>;

    /// Place name → existence check. No similarity threshold: any returned
    /// location counts as confirmation.
    async fn forward(&self, name: &str) -> Result<bool, GeoError>;
}

fn build_client() -> Result<reqwest::Client, GeoError> {
    reqwest::Client::builder()
        .timeout(PROVIDER_TIMEOUT)
        .user_agent(USER_AGENT)
        .build()
        .map_err(|e| GeoError::Network(e.to_string()))
}

// ─── Nominatim (primary) ────────────────────────────────────────

pub struct NominatimProvider {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct NominatimAddress {
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
    county: Option<String>,
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
struct NominatimReverse {
    #[serde(default)]
    address: Option<NominatimAddress>,
}

/// First present field wins, in decreasing administrative precision.
fn pick_address_field(address: NominatimAddress) -> Option<String> {
    address
        .city
        .or(address.town)
        .or(address.village)
        .or(address.county)
        .or(address.state)
}

impl NominatimProvider {
    pub fn new() -> Result<Self, GeoError> {
        Self::with_base_url("https://nominatim.openstreetmap.org")
    }

    /// Point the provider at a different endpoint (for tests).
    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self, GeoError> {
        Ok(Self { client: build_client()?, base_url: base_url.into() })
    }
}

#[async_trait]
impl GeoProvider for NominatimProvider {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeoError> {
        let url = format!("{}/reverse", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("lat", coords.lat.to_string()),
                ("lon", coords.lon.to_string()),
                ("format", "jsonv2".into()),
                ("accept-language", "ru".into()),
                ("addressdetails", "1".into()),
            ])
            .send()
            .await
            .map_err(|e| GeoError::Network(e.to_string()))?;

        let body: NominatimReverse = response
            .json()
            .await
            .map_err(|e| GeoError::InvalidResponse(e.to_string()))?;

        Ok(body.address.and_then(pick_address_field))
    }

    async fn forward(&self, name: &str) -> Result<bool, GeoError> {
        let url = format!("{}/search", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", name),
                ("format", "jsonv2"),
                ("limit", "1"),
                ("accept-language", "ru"),
            ])
            .send()
            .await
            .map_err(|e| GeoError::Network(e.to_string()))?;

        let results: Vec<serde_json::Value> = response
            .json()
            .await
            .map_err(|e| GeoError::InvalidResponse(e.to_string()))?;

        Ok(!results.is_empty())
    }
}

// ─── Google Geocoding API (secondary) ───────────────────────────

pub struct GoogleProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct GoogleComponent {
    long_name: String,
    #[serde(default)]
    types: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleResult {
    #[serde(default)]
    address_components: Vec<GoogleComponent>,
}

#[derive(Debug, Deserialize)]
struct GoogleResponse {
    #[serde(default)]
    results: Vec<GoogleResult>,
}

/// First component tagged as a locality (or second-level admin area) wins.
fn pick_locality(components: Vec<GoogleComponent>) -> Option<String> {
    components
        .into_iter()
        .find(|c| {
            c.types.iter().any(|t| t == "locality" || t == "administrative_area_level_2")
        })
        .map(|c| c.long_name)
}

impl GoogleProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, GeoError> {
        Self::with_base_url(api_key, "https://maps.googleapis.com/maps/api/geocode/json")
    }

    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, GeoError> {
        Ok(Self {
            client: build_client()?,
            api_key: api_key.into(),
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl GeoProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    async fn reverse(&self, coords: Coordinates) -> Result<Option<String>, GeoError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latlng", format!("{},{}", coords.lat, coords.lon)),
                ("language", "ru".into()),
                ("key", self.api_key.clone()),
            ])
            .send()
            .await
            .map_err(|e| GeoError::Network(e.to_string()))?;

        let body: GoogleResponse = response
            .json()
            .await
            .map_err(|e| GeoError::InvalidResponse(e.to_string()))?;

        Ok(body
            .results
            .into_iter()
            .next()
            .and_then(|r| pick_locality(r.address_components)))
    }

    async fn forward(&self, name: &str) -> Result<bool, GeoError> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("address", name), ("key", &self.api_key)])
            .send()
            .await
            .map_err(|e| GeoError::Network(e.to_string()))?;

        let body: GoogleResponse = response
            .json()
            .await
            .map_err(|e| GeoError::InvalidResponse(e.to_string()))?;

        Ok(!body.results.is_empty())
    }
}
