//! Businesses and industrial sites mapped in OpenStreetMap (Overpass API).

use crate::error::AdapterResult;
use crate::http;
use crate::models::{Business, GeoPoint, Region, SourceKind};
use crate::sources::{SourceAdapter, SourceRecords};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::info;

/// Words that mark a site as industrial or extractive.
const INDUSTRIAL_MARKERS: &[&str] = &["industrial", "mining", "logging", "quarry", "mineshaft"];

/// Tag keys describing what a site does. Free-text keys such as `name` are
/// not consulted.
const ACTIVITY_KEYS: &[&str] = &["landuse", "industrial", "man_made", "craft"];

pub struct BusinessesAdapter {
    client: reqwest::Client,
    url: String,
}

#[derive(Debug, Deserialize)]
struct OverpassResponse {
    #[serde(default)]
    elements: Vec<Element>,
}

#[derive(Debug, Deserialize)]
struct Element {
    #[serde(rename = "type")]
    kind: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    center: Option<Center>,
    #[serde(default)]
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct Center {
    lat: f64,
    lon: f64,
}

impl BusinessesAdapter {
    pub fn new(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    fn build_query(region: &Region) -> String {
        let center = region.center();
        let around = format!(
            "(around:{:.0},{},{})",
            region.radius_km() * 1000.0,
            center.lat,
            center.lon
        );

        let selectors = [
            r#"["office"="company"]"#,
            r#"["shop"]"#,
            r#"["industrial"]"#,
            r#"["landuse"~"industrial|quarry"]"#,
            r#"["man_made"="mineshaft"]"#,
        ];

        let mut query = String::from("[out:json][timeout:60];\n(\n");
        for element in ["node", "way"] {
            for selector in selectors {
                query.push_str(&format!("  {}{}{};\n", element, selector, around));
            }
        }
        query.push_str(");\nout center tags;\n");
        query
    }

    fn to_business(element: Element) -> Option<Business> {
        if element.tags.is_empty() {
            return None;
        }

        let location = match (element.lat, element.lon, &element.center) {
            (Some(lat), Some(lon), _) => Some(GeoPoint::new(lat, lon)),
            (_, _, Some(center)) => Some(GeoPoint::new(center.lat, center.lon)),
            _ => None,
        };

        Some(Business {
            osm_id: element.id,
            industrial: is_industrial(&element.tags),
            name: element.tags.get("name").cloned(),
            kind: element.kind,
            location,
            tags: element.tags,
        })
    }
}

/// Whether an activity tag names an industrial or extractive use.
///
/// Any `industrial=*` tag counts. Other activity tags count when one of
/// the words of their value is a marker.
pub fn is_industrial(tags: &BTreeMap<String, String>) -> bool {
    if tags.contains_key("industrial") {
        return true;
    }
    ACTIVITY_KEYS
        .iter()
        .filter_map(|key| tags.get(*key))
        .any(|value| {
            value
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .any(|word| INDUSTRIAL_MARKERS.contains(&word))
        })
}

#[async_trait]
impl SourceAdapter for BusinessesAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Businesses
    }

    async fn fetch(&self, region: &Region) -> AdapterResult<SourceRecords> {
        let response = self
            .client
            .post(&self.url)
            .form(&[("data", Self::build_query(region))])
            .send()
            .await?;
        let body: OverpassResponse = http::json_body(response).await?;

        let businesses: Vec<Business> = body
            .elements
            .into_iter()
            .filter_map(Self::to_business)
            .collect();

        info!(
            "Found {} mapped businesses, {} industrial",
            businesses.len(),
            businesses.iter().filter(|b| b.industrial).count()
        );
        Ok(SourceRecords::Businesses(businesses))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn tags(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_is_industrial() {
        assert!(is_industrial(&tags(&[("landuse", "quarry")])));
        assert!(is_industrial(&tags(&[("industrial", "sawmill")])));
        assert!(is_industrial(&tags(&[("man_made", "mineshaft")])));
        assert!(is_industrial(&tags(&[("landuse", "industrial")])));
        assert!(is_industrial(&tags(&[("craft", "logging;sawmill")])));
        assert!(!is_industrial(&tags(&[("shop", "bakery")])));
    }

    #[test]
    fn test_names_and_partial_words_are_not_industrial() {
        assert!(!is_industrial(&tags(&[("amenity", "cafe"), ("name", "Blogging Café")])));
        assert!(!is_industrial(&tags(&[("office", "company"), ("name", "Determining Co")])));
        assert!(!is_industrial(&tags(&[("office", "company"), ("name", "Riau Logging Co")])));
        assert!(!is_industrial(&tags(&[("shop", "mining_supplies")])));
        assert!(!is_industrial(&tags(&[("landuse", "farmland"), ("description", "near a quarry")])));
        assert!(!is_industrial(&tags(&[("man_made", "tower")])));
    }

    #[test]
    fn test_query_uses_radius_in_metres() {
        let region = Region::new(None, GeoPoint::new(0.7893, 101.3431), 20.0, 30);
        let query = BusinessesAdapter::build_query(&region);
        assert!(query.contains(r#"node["shop"](around:20000,0.7893,101.3431);"#));
        assert!(query.contains("out center tags;"));
    }

    #[tokio::test]
    async fn test_fetch_parses_nodes_and_ways() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/interpreter"))
            .and(body_string_contains("data="))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "elements": [
                    {"type": "node", "id": 1, "lat": 0.8, "lon": 101.3,
                     "tags": {"shop": "hardware", "name": "Toko Besi"}},
                    {"type": "way", "id": 2, "center": {"lat": 0.7, "lon": 101.2},
                     "tags": {"landuse": "quarry"}},
                    {"type": "node", "id": 3, "lat": 0.7, "lon": 101.2}
                ]
            })))
            .mount(&server)
            .await;

        let adapter = BusinessesAdapter::new(
            reqwest::Client::new(),
            &format!("{}/api/interpreter", server.uri()),
        );
        let region = Region::new(None, GeoPoint::new(0.7893, 101.3431), 20.0, 30);
        let SourceRecords::Businesses(businesses) = adapter.fetch(&region).await.unwrap() else {
            panic!("wrong record kind");
        };

        assert_eq!(businesses.len(), 2);
        assert_eq!(businesses[0].name.as_deref(), Some("Toko Besi"));
        assert!(!businesses[0].industrial);
        assert_eq!(businesses[1].kind, "way");
        assert_eq!(businesses[1].location, Some(GeoPoint::new(0.7, 101.2)));
        assert!(businesses[1].industrial);
    }
}
