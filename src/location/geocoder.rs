//! Place-name geocoders.

use crate::error::{AdapterError, AdapterResult};
use crate::http;
use crate::models::GeoPoint;
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

/// Resolves a place name to a point. `Ok(None)` means no match.
#[async_trait]
pub trait Geocoder: Send + Sync {
    fn name(&self) -> &'static str;

    async fn geocode(&self, query: &str) -> AdapterResult<Option<GeoPoint>>;
}

/// Built-in table of well-known forest regions.
#[derive(Debug, Clone)]
pub struct Gazetteer {
    entries: Vec<(String, GeoPoint)>,
}

impl Default for Gazetteer {
    fn default() -> Self {
        Self::new(vec![
            ("sumatra", GeoPoint::new(0.7893, 101.3431)),
            ("amazon", GeoPoint::new(-3.4653, -62.2159)),
            ("borneo", GeoPoint::new(0.9619, 114.5548)),
            ("congo", GeoPoint::new(-4.0383, 21.7587)),
        ])
    }
}

impl Gazetteer {
    pub fn new(entries: Vec<(&str, GeoPoint)>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|(name, point)| (name.to_lowercase(), point))
                .collect(),
        }
    }

    /// Case-insensitive substring lookup ("North Sumatra" matches "sumatra").
    pub fn lookup(&self, query: &str) -> Option<GeoPoint> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(name, _)| query.contains(name.as_str()))
            .map(|(_, point)| *point)
    }
}

#[async_trait]
impl Geocoder for Gazetteer {
    fn name(&self) -> &'static str {
        "gazetteer"
    }

    async fn geocode(&self, query: &str) -> AdapterResult<Option<GeoPoint>> {
        Ok(self.lookup(query))
    }
}

/// Nominatim-compatible search API.
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "nominatim"
    }

    async fn geocode(&self, query: &str) -> AdapterResult<Option<GeoPoint>> {
        let mut params = vec![("q", query), ("format", "json"), ("limit", "1")];
        if let Some(ref key) = self.api_key {
            params.push(("key", key.as_str()));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&params)
            .send()
            .await?;
        let hits: Vec<SearchHit> = http::json_body(response).await?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };
        let lat = hit
            .lat
            .parse::<f64>()
            .map_err(|_| AdapterError::Decode(format!("bad latitude '{}'", hit.lat)))?;
        let lon = hit
            .lon
            .parse::<f64>()
            .map_err(|_| AdapterError::Decode(format!("bad longitude '{}'", hit.lon)))?;

        debug!(
            "Geocoded '{}' to {}, {} ({})",
            query,
            lat,
            lon,
            hit.display_name.as_deref().unwrap_or("unnamed")
        );
        Ok(Some(GeoPoint::new(lat, lon)))
    }
}

/// Tries each geocoder in order; the first match wins.
///
/// A failing geocoder is skipped. If none matched and at least one failed,
/// the last error is returned so the caller can tell "unknown" from "down".
pub struct ChainGeocoder {
    geocoders: Vec<Box<dyn Geocoder>>,
}

impl ChainGeocoder {
    pub fn new(geocoders: Vec<Box<dyn Geocoder>>) -> Self {
        Self { geocoders }
    }
}

#[async_trait]
impl Geocoder for ChainGeocoder {
    fn name(&self) -> &'static str {
        "chain"
    }

    async fn geocode(&self, query: &str) -> AdapterResult<Option<GeoPoint>> {
        let mut last_error = None;

        for geocoder in &self.geocoders {
            match geocoder.geocode(query).await {
                Ok(Some(point)) => return Ok(Some(point)),
                Ok(None) => debug!("{} has no match for '{}'", geocoder.name(), query),
                Err(e) => {
                    warn!("Geocoder {} failed: {}", geocoder.name(), e);
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) => Err(e),
            None => Ok(None),
        }
    }
}
