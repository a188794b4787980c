//! Source adapters.
//!
//! Each adapter fetches one kind of record for a [`Region`]. Adapters are
//! independent: they share no mutable state and one adapter's failure never
//! affects the others.

pub mod alerts;
pub mod businesses;
pub mod registry;
pub mod sanctions;
pub mod satellite;
pub mod sentiment;
pub mod social;

use crate::config::Config;
use crate::error::{AdapterError, AdapterResult};
use crate::models::{
    AlertRecord, Business, CorporateEntity, Region, SatelliteImage, SocialPost, SourceKind,
};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

pub use alerts::AlertsAdapter;
pub use businesses::BusinessesAdapter;
pub use registry::RegistryAdapter;
pub use sanctions::SanctionsAdapter;
pub use satellite::SatelliteAdapter;
pub use social::SocialAdapter;

/// Records produced by one adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceRecords {
    Alerts(Vec<AlertRecord>),
    Satellite(Vec<SatelliteImage>),
    Registry(Vec<CorporateEntity>),
    Sanctions(Vec<CorporateEntity>),
    Social(Vec<SocialPost>),
    Businesses(Vec<Business>),
}

impl SourceRecords {
    /// An empty record list of the given kind.
    #[cfg(test)]
    pub fn empty(kind: SourceKind) -> Self {
        match kind {
            SourceKind::Alerts => SourceRecords::Alerts(Vec::new()),
            SourceKind::Satellite => SourceRecords::Satellite(Vec::new()),
            SourceKind::Registry => SourceRecords::Registry(Vec::new()),
            SourceKind::Sanctions => SourceRecords::Sanctions(Vec::new()),
            SourceKind::Social => SourceRecords::Social(Vec::new()),
            SourceKind::Businesses => SourceRecords::Businesses(Vec::new()),
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceRecords::Alerts(_) => SourceKind::Alerts,
            SourceRecords::Satellite(_) => SourceKind::Satellite,
            SourceRecords::Registry(_) => SourceKind::Registry,
            SourceRecords::Sanctions(_) => SourceKind::Sanctions,
            SourceRecords::Social(_) => SourceKind::Social,
            SourceRecords::Businesses(_) => SourceKind::Businesses,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            SourceRecords::Alerts(v) => v.len(),
            SourceRecords::Satellite(v) => v.len(),
            SourceRecords::Registry(v) | SourceRecords::Sanctions(v) => v.len(),
            SourceRecords::Social(v) => v.len(),
            SourceRecords::Businesses(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Serialize the records for persistence.
    pub fn to_json(&self) -> serde_json::Result<String> {
        match self {
            SourceRecords::Alerts(v) => serde_json::to_string_pretty(v),
            SourceRecords::Satellite(v) => serde_json::to_string_pretty(v),
            SourceRecords::Registry(v) | SourceRecords::Sanctions(v) => {
                serde_json::to_string_pretty(v)
            }
            SourceRecords::Social(v) => serde_json::to_string_pretty(v),
            SourceRecords::Businesses(v) => serde_json::to_string_pretty(v),
        }
    }
}

/// A data source queried for a region.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn kind(&self) -> SourceKind;

    async fn fetch(&self, region: &Region) -> AdapterResult<SourceRecords>;
}

/// Combine the results of an adapter's independent sub-requests.
///
/// No failures gives the records; all `attempted` failing gives the first
/// error; anything in between is `AdapterError::Partial` carrying the
/// records that did arrive.
pub(crate) fn collect_partial(
    records: SourceRecords,
    errors: Vec<(String, AdapterError)>,
    attempted: usize,
) -> AdapterResult<SourceRecords> {
    if errors.is_empty() {
        return Ok(records);
    }
    if errors.len() >= attempted {
        if let Some((_, first)) = errors.into_iter().next() {
            return Err(first);
        }
        return Ok(records);
    }

    Err(AdapterError::Partial {
        records,
        errors: errors
            .into_iter()
            .map(|(label, e)| format!("{}: {}", label, e))
            .collect(),
    })
}

/// Run options that select optional sources.
#[derive(Debug, Clone, Default)]
pub struct AdapterOptions {
    pub include_osm: bool,
    pub include_satellite: bool,
}

/// A source that will not run, with the reason shown in the report.
#[derive(Debug, Clone, PartialEq)]
pub struct DisabledSource {
    pub kind: SourceKind,
    pub reason: String,
}

/// The adapters selected for a run.
#[derive(Default)]
pub struct AdapterSet {
    pub adapters: Vec<Box<dyn SourceAdapter>>,
    pub disabled: Vec<DisabledSource>,
}

impl AdapterSet {
    fn disable(&mut self, kind: SourceKind, reason: &str) {
        debug!("Source {} disabled: {}", kind, reason);
        self.disabled.push(DisabledSource {
            kind,
            reason: reason.to_string(),
        });
    }
}

/// Construct the adapters enabled by the configuration and options.
///
/// Missing credentials disable a source instead of failing the run.
pub fn build_adapters(
    config: &Config,
    client: reqwest::Client,
    options: &AdapterOptions,
) -> AdapterSet {
    let mut set = AdapterSet::default();

    set.adapters.push(Box::new(AlertsAdapter::new(
        client.clone(),
        &config.endpoints,
        config.credentials.gfw_api_key.clone(),
        config.alerts.clone(),
    )));

    if !options.include_satellite {
        set.disable(SourceKind::Satellite, "not requested (use --include-satellite)");
    } else if let Some((id, secret)) = config.credentials.sentinelhub() {
        set.adapters.push(Box::new(SatelliteAdapter::new(
            client.clone(),
            &config.endpoints,
            id,
            secret,
            satellite_dir(config),
        )));
    } else {
        set.disable(
            SourceKind::Satellite,
            "SENTINELHUB_CLIENT_ID / SENTINELHUB_CLIENT_SECRET not set",
        );
    }

    set.adapters.push(Box::new(RegistryAdapter::new(
        client.clone(),
        &config.endpoints,
    )));

    match config.credentials.opensanctions() {
        Some(key) => set.adapters.push(Box::new(SanctionsAdapter::new(
            client.clone(),
            &config.endpoints.opensanctions_url,
            key,
        ))),
        None => set.disable(SourceKind::Sanctions, "OPENSANCTIONS_API_KEY not set"),
    }

    match config.credentials.reddit() {
        Some((id, secret)) => set.adapters.push(Box::new(SocialAdapter::new(
            client.clone(),
            &config.endpoints,
            id,
            secret,
            &config.credentials.reddit_user_agent,
            config.social.clone(),
        ))),
        None => set.disable(
            SourceKind::Social,
            "REDDIT_CLIENT_ID / REDDIT_CLIENT_SECRET not set",
        ),
    }

    if options.include_osm {
        set.adapters.push(Box::new(BusinessesAdapter::new(
            client,
            &config.endpoints.overpass_url,
        )));
    } else {
        set.disable(SourceKind::Businesses, "not requested (use --include-osm)");
    }

    set
}

fn satellite_dir(config: &Config) -> PathBuf {
    config
        .general
        .data_dir
        .join(SourceKind::Satellite.data_subdir())
}


#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(set: &AdapterSet) -> Vec<SourceKind> {
        set.adapters.iter().map(|a| a.kind()).collect()
    }

    #[test]
    fn test_build_adapters_without_credentials() {
        let set = build_adapters(
            &Config::default(),
            reqwest::Client::new(),
            &AdapterOptions::default(),
        );

        assert_eq!(kinds(&set), vec![SourceKind::Alerts, SourceKind::Registry]);
        let disabled: Vec<_> = set.disabled.iter().map(|d| d.kind).collect();
        assert_eq!(
            disabled,
            vec![
                SourceKind::Satellite,
                SourceKind::Sanctions,
                SourceKind::Social,
                SourceKind::Businesses
            ]
        );
        assert!(set.disabled[2].reason.contains("REDDIT_CLIENT_ID"));
    }

    #[test]
    fn test_build_adapters_all_enabled() {
        let mut config = Config::default();
        config.credentials.reddit_client_id = Some("id".into());
        config.credentials.reddit_client_secret = Some("secret".into());
        config.credentials.sentinelhub_client_id = Some("id".into());
        config.credentials.sentinelhub_client_secret = Some("secret".into());
        config.credentials.opensanctions_api_key = Some("key".into());

        let options = AdapterOptions {
            include_osm: true,
            include_satellite: true,
        };
        let set = build_adapters(&config, reqwest::Client::new(), &options);

        assert_eq!(kinds(&set).len(), 6);
        assert!(set.disabled.is_empty());
    }

    #[test]
    fn test_satellite_requested_without_credentials() {
        let options = AdapterOptions {
            include_osm: false,
            include_satellite: true,
        };
        let set = build_adapters(&Config::default(), reqwest::Client::new(), &options);
        let satellite = set
            .disabled
            .iter()
            .find(|d| d.kind == SourceKind::Satellite)
            .unwrap();
        assert!(satellite.reason.contains("SENTINELHUB"));
    }

    #[test]
    fn test_collect_partial() {
        let ok = collect_partial(SourceRecords::Social(Vec::new()), Vec::new(), 2).unwrap();
        assert!(ok.is_empty());

        let all_failed = collect_partial(
            SourceRecords::Social(Vec::new()),
            vec![
                ("mining".into(), AdapterError::RateLimited),
                ("pollution".into(), AdapterError::Decode("x".into())),
            ],
            2,
        );
        assert!(matches!(all_failed, Err(AdapterError::RateLimited)));

        let partial = collect_partial(
            SourceRecords::Social(Vec::new()),
            vec![("mining".into(), AdapterError::RateLimited)],
            2,
        );
        match partial {
            Err(AdapterError::Partial { errors, .. }) => {
                assert_eq!(errors, vec!["mining: rate limited by upstream API"]);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_records_len_and_kind() {
        let records = SourceRecords::empty(SourceKind::Sanctions);
        assert_eq!(records.kind(), SourceKind::Sanctions);
        assert!(records.is_empty());
        assert_eq!(records.to_json().unwrap(), "[]");
    }
}
