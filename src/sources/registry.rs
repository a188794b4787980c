//! Corporate registry lookup: Wikidata organisations near the region,
//! enriched with GLEIF legal entity identifiers.

use crate::config::EndpointsConfig;
use crate::error::AdapterResult;
use crate::http;
use crate::models::{CorporateEntity, Region, SourceKind};
use crate::sources::{SourceAdapter, SourceRecords};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

/// Maximum organisations requested from Wikidata.
const MAX_ORGANISATIONS: usize = 100;

pub struct RegistryAdapter {
    client: reqwest::Client,
    sparql_url: String,
    gleif_url: String,
}

#[derive(Debug, Deserialize)]
struct SparqlResponse {
    results: SparqlResults,
}

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    bindings: Vec<HashMap<String, SparqlValue>>,
}

#[derive(Debug, Deserialize)]
struct SparqlValue {
    value: String,
}

#[derive(Debug, Deserialize)]
struct GleifResponse {
    #[serde(default)]
    data: Vec<GleifRecord>,
}

#[derive(Debug, Deserialize)]
struct GleifRecord {
    id: String,
}

impl RegistryAdapter {
    pub fn new(client: reqwest::Client, endpoints: &EndpointsConfig) -> Self {
        Self {
            client,
            sparql_url: endpoints.wikidata_sparql_url.clone(),
            gleif_url: endpoints.gleif_url.trim_end_matches('/').to_string(),
        }
    }

    /// Organisations (Q43229 and subclasses) with coordinates inside the radius.
    fn build_query(region: &Region) -> String {
        let center = region.center();
        format!(
            r#"SELECT ?org ?orgLabel ?industryLabel WHERE {{
  SERVICE wikibase:around {{
    ?org wdt:P625 ?coord .
    bd:serviceParam wikibase:center "Point({lon} {lat})"^^geo:wktLiteral .
    bd:serviceParam wikibase:radius "{radius}" .
  }}
  ?org wdt:P31/wdt:P279* wd:Q43229 .
  OPTIONAL {{ ?org wdt:P452 ?industry . }}
  SERVICE wikibase:label {{ bd:serviceParam wikibase:language "en" . }}
}}
LIMIT {limit}"#,
            lon = center.lon,
            lat = center.lat,
            radius = region.radius_km(),
            limit = MAX_ORGANISATIONS,
        )
    }

    async fn search_wikidata(&self, region: &Region) -> AdapterResult<Vec<CorporateEntity>> {
        let response = self
            .client
            .get(&self.sparql_url)
            .query(&[("query", Self::build_query(region)), ("format", "json".to_string())])
            .header(reqwest::header::ACCEPT, "application/sparql-results+json")
            .send()
            .await?;
        let body: SparqlResponse = http::json_body(response).await?;

        let mut seen = HashSet::new();
        let mut entities = Vec::new();
        for binding in body.results.bindings {
            let Some(uri) = binding.get("org").map(|v| v.value.as_str()) else {
                continue;
            };
            let qid = uri.rsplit('/').next().unwrap_or(uri).to_string();
            if !seen.insert(qid.clone()) {
                continue;
            }

            // Unlabelled items come back with the QID as their label.
            let name = match binding.get("orgLabel") {
                Some(label) if label.value != qid => label.value.clone(),
                _ => continue,
            };

            entities.push(CorporateEntity {
                name,
                identifier: qid,
                registry_source: "wikidata".to_string(),
                sanctions_flag: false,
                lei: None,
                industry: binding.get("industryLabel").map(|v| v.value.clone()),
                sanction_topics: Vec::new(),
            });
        }

        Ok(entities)
    }

    async fn lookup_lei(&self, legal_name: &str) -> AdapterResult<Option<String>> {
        let response = self
            .client
            .get(format!("{}/lei-records", self.gleif_url))
            .query(&[("filter[entity.legalName]", legal_name), ("page[size]", "1")])
            .send()
            .await?;
        let body: GleifResponse = http::json_body(response).await?;
        Ok(body.data.into_iter().next().map(|r| r.id))
    }

    /// Best-effort LEI enrichment; failures leave `lei` unset.
    async fn enrich(&self, entities: &mut [CorporateEntity]) {
        let mut failures = 0usize;
        for entity in entities.iter_mut() {
            match self.lookup_lei(&entity.name).await {
                Ok(lei) => entity.lei = lei,
                Err(e) => {
                    debug!("GLEIF lookup for '{}' failed: {}", entity.name, e);
                    failures += 1;
                }
            }
        }
        if failures > 0 {
            warn!(
                "GLEIF enrichment failed for {} of {} entities",
                failures,
                entities.len()
            );
        }
    }
}

#[async_trait]
impl SourceAdapter for RegistryAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Registry
    }

    async fn fetch(&self, region: &Region) -> AdapterResult<SourceRecords> {
        let mut entities = self.search_wikidata(region).await?;
        self.enrich(&mut entities).await;

        info!(
            "Found {} registered organisations ({} with LEI)",
            entities.len(),
            entities.iter().filter(|e| e.lei.is_some()).count()
        );
        Ok(SourceRecords::Registry(entities))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn region() -> Region {
        Region::new(
            Some("Sumatra".into()),
            GeoPoint::new(0.7893, 101.3431),
            20.0,
            30,
        )
    }

    fn adapter(server: &MockServer) -> RegistryAdapter {
        let endpoints = EndpointsConfig {
            wikidata_sparql_url: format!("{}/sparql", server.uri()),
            gleif_url: server.uri(),
            ..EndpointsConfig::default()
        };
        RegistryAdapter::new(reqwest::Client::new(), &endpoints)
    }

    fn binding(qid: &str, label: &str) -> serde_json::Value {
        json!({
            "org": {"type": "uri", "value": format!("http://www.wikidata.org/entity/{}", qid)},
            "orgLabel": {"type": "literal", "value": label},
        })
    }

    #[test]
    fn test_query_uses_center_and_radius() {
        let query = RegistryAdapter::build_query(&region());
        assert!(query.contains("Point(101.3431 0.7893)"));
        assert!(query.contains("wikibase:radius \"20\""));
    }

    #[tokio::test]
    async fn test_fetch_dedupes_and_enriches() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": {"bindings": [
                    binding("Q1", "PT Riau Pulp"),
                    binding("Q1", "PT Riau Pulp"),
                    binding("Q2", "Q2"),
                    binding("Q3", "Sinar Mas"),
                ]}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lei-records"))
            .and(query_param("filter[entity.legalName]", "PT Riau Pulp"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"id": "LEI0001"}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/lei-records"))
            .and(query_param("filter[entity.legalName]", "Sinar Mas"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let records = adapter(&server).fetch(&region()).await.unwrap();
        let SourceRecords::Registry(entities) = records else {
            panic!("wrong record kind");
        };

        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].identifier, "Q1");
        assert_eq!(entities[0].lei.as_deref(), Some("LEI0001"));
        assert_eq!(entities[1].name, "Sinar Mas");
        assert_eq!(entities[1].lei, None);
        assert!(entities.iter().all(|e| !e.sanctions_flag));
    }

    #[tokio::test]
    async fn test_sparql_failure_fails_adapter() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sparql"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = adapter(&server).fetch(&region()).await.unwrap_err();
        assert!(matches!(err, crate::error::AdapterError::RateLimited));
    }
}
