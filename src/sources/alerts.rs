//! Forest-loss alerts from the Global Forest Watch Data API.

use crate::config::{AlertsConfig, EndpointsConfig};
use crate::error::AdapterResult;
use crate::http;
use crate::models::{AlertRecord, GeoPoint, Region, SourceKind};
use crate::sources::{SourceAdapter, SourceRecords};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, info};

pub struct AlertsAdapter {
    client: reqwest::Client,
    base_url: String,
    dataset: String,
    api_key: Option<String>,
    settings: AlertsConfig,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    data: Vec<Map<String, Value>>,
}

impl AlertsAdapter {
    pub fn new(
        client: reqwest::Client,
        endpoints: &EndpointsConfig,
        api_key: Option<String>,
        settings: AlertsConfig,
    ) -> Self {
        Self {
            client,
            base_url: endpoints.gfw_url.trim_end_matches('/').to_string(),
            dataset: endpoints.gfw_dataset.clone(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            settings,
        }
    }

    fn date_field(&self) -> String {
        format!("{}__date", self.dataset)
    }

    fn confidence_field(&self) -> String {
        format!("{}__confidence", self.dataset)
    }

    fn build_sql(&self, since: NaiveDate) -> String {
        format!(
            "SELECT latitude, longitude, {date}, {conf} FROM results \
             WHERE {date} >= '{since}' ORDER BY {date} DESC LIMIT {limit}",
            date = self.date_field(),
            conf = self.confidence_field(),
            since = since.format("%Y-%m-%d"),
            limit = self.settings.max_alerts,
        )
    }

    fn parse_row(&self, row: &Map<String, Value>) -> Option<AlertRecord> {
        let lat = row.get("latitude")?.as_f64()?;
        let lon = row.get("longitude")?.as_f64()?;
        let date = row.get(&self.date_field())?.as_str()?;
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
        let confidence = parse_confidence(row.get(&self.confidence_field())?)?;

        Some(AlertRecord {
            timestamp: date.and_hms_opt(0, 0, 0)?.and_utc(),
            location: GeoPoint::new(lat, lon),
            confidence,
            source: self.dataset.clone(),
            area_ha: row.get("area__ha").and_then(Value::as_f64),
        })
    }

    /// Keep alerts inside the window and the analysis radius at or above the
    /// minimum confidence. The query box is only a coarse prefilter.
    fn filter(
        &self,
        region: &Region,
        now: DateTime<Utc>,
        rows: &[Map<String, Value>],
    ) -> Vec<AlertRecord> {
        let since = region.window_start(now).date_naive();
        let mut skipped = 0usize;

        let mut alerts: Vec<AlertRecord> = rows
            .iter()
            .filter_map(|row| {
                let parsed = self.parse_row(row);
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .filter(|a| a.confidence >= self.settings.min_confidence)
            .filter(|a| a.timestamp.date_naive() >= since)
            .filter(|a| region.covers(&a.location))
            .collect();

        if skipped > 0 {
            debug!("Skipped {} malformed alert rows", skipped);
        }
        alerts.truncate(self.settings.max_alerts);
        alerts
    }
}

/// Numeric confidences pass through (percentages are scaled); GLAD's
/// categorical levels map to fixed values.
fn parse_confidence(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => {
            let v = n.as_f64()?;
            let v = if v > 1.0 { v / 100.0 } else { v };
            Some(v.clamp(0.0, 1.0))
        }
        Value::String(s) => match s.to_lowercase().as_str() {
            "highest" => Some(1.0),
            "high" => Some(0.9),
            "nominal" => Some(0.6),
            "low" => Some(0.3),
            _ => None,
        },
        _ => None,
    }
}

#[async_trait]
impl SourceAdapter for AlertsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Alerts
    }

    async fn fetch(&self, region: &Region) -> AdapterResult<SourceRecords> {
        let now = Utc::now();
        let since = region.window_start(now).date_naive();
        let bbox = region.bounding_box();

        let body = json!({
            "sql": self.build_sql(since),
            "geometry": {
                "type": "Polygon",
                "coordinates": [bbox.ring()],
            },
        });

        let mut request = self
            .client
            .post(format!(
                "{}/dataset/{}/latest/query/json",
                self.base_url, self.dataset
            ))
            .json(&body);
        if let Some(ref key) = self.api_key {
            request = request.header("x-api-key", key);
        }

        let response: QueryResponse = http::json_body(request.send().await?).await?;
        let alerts = self.filter(region, now, &response.data);

        info!(
            "Found {} alerts (of {} rows) within {} km of {}",
            alerts.len(),
            response.data.len(),
            region.radius_km(),
            region.display_name()
        );
        Ok(SourceRecords::Alerts(alerts))
    }
}
