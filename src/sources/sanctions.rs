//! Sanctions screening against OpenSanctions.

use crate::error::{AdapterError, AdapterResult};
use crate::http;
use crate::models::{CorporateEntity, Region, SourceKind};
use crate::sources::{SourceAdapter, SourceRecords};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::HashMap;
use tracing::info;

/// Entity schemas that describe organisations rather than people or assets.
const ORGANISATION_SCHEMAS: &[&str] = &["Company", "Organization", "LegalEntity"];

const SEARCH_LIMIT: &str = "50";

/// `sanction`, `sanction.linked`, `sanction.counter`, ...
fn is_sanction_topic(topic: &str) -> bool {
    topic.starts_with("sanction")
}

pub struct SanctionsAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    caption: String,
    schema: String,
    #[serde(default)]
    properties: HashMap<String, Vec<Value>>,
    #[serde(default)]
    datasets: Vec<String>,
}

impl SanctionsAdapter {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Organisation hits become entities. Only hits carrying a sanction
    /// topic are flagged; PEP, debarment and registry hits stay unflagged.
    fn to_entity(hit: SearchHit) -> Option<CorporateEntity> {
        if !ORGANISATION_SCHEMAS.contains(&hit.schema.as_str()) {
            return None;
        }

        let strings = |key: &str| -> Vec<String> {
            hit.properties
                .get(key)
                .map(|values| {
                    values
                        .iter()
                        .filter_map(|v| v.as_str().map(str::to_string))
                        .collect()
                })
                .unwrap_or_default()
        };
        let topics = strings("topics");
        let industry = strings("sector").into_iter().next();
        let lei = strings("leiCode").into_iter().next();

        Some(CorporateEntity {
            name: hit.caption,
            identifier: hit.id,
            registry_source: match hit.datasets.first() {
                Some(dataset) => format!("opensanctions:{}", dataset),
                None => "opensanctions".to_string(),
            },
            sanctions_flag: topics.iter().any(|t| is_sanction_topic(t)),
            lei,
            industry,
            sanction_topics: topics,
        })
    }
}

#[async_trait]
impl SourceAdapter for SanctionsAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Sanctions
    }

    async fn fetch(&self, region: &Region) -> AdapterResult<SourceRecords> {
        let Some(name) = region.name() else {
            return Err(AdapterError::Skipped(
                "sanctions search needs a place name".to_string(),
            ));
        };

        let response = self
            .client
            .get(format!("{}/search/default", self.base_url))
            .query(&[("q", name), ("limit", SEARCH_LIMIT)])
            .header(
                reqwest::header::AUTHORIZATION,
                format!("ApiKey {}", self.api_key),
            )
            .send()
            .await?;
        let body: SearchResponse = http::json_body(response).await?;

        let total = body.results.len();
        let entities: Vec<CorporateEntity> =
            body.results.into_iter().filter_map(Self::to_entity).collect();

        info!(
            "OpenSanctions returned {} hits for '{}', {} organisations, {} sanctioned",
            total,
            name,
            entities.len(),
            entities.iter().filter(|e| e.sanctions_flag).count()
        );
        Ok(SourceRecords::Sanctions(entities))
    }
}
