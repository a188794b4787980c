//! Concurrent fetch of all sources followed by aggregation.

use crate::analysis::aggregator::{self, SourceOutcome};
use crate::config::RiskConfig;
use crate::error::{AdapterError, ProfilerError};
use crate::location::{LocationQuery, LocationResolver};
use crate::models::{AnalysisResult, Region};
use crate::sources::{AdapterSet, SourceAdapter};
use chrono::Utc;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Instant;
use tracing::{info, info_span, warn, Instrument};

/// Result of a pipeline run: the aggregate plus the raw per-source outcomes.
#[derive(Debug)]
pub struct PipelineOutput {
    pub result: AnalysisResult,
    pub outcomes: Vec<SourceOutcome>,
}

pub struct Pipeline {
    adapters: AdapterSet,
    risk: RiskConfig,
    show_progress: bool,
}

impl Pipeline {
    pub fn new(adapters: AdapterSet, risk: RiskConfig) -> Self {
        Self {
            adapters,
            risk,
            show_progress: false,
        }
    }

    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Fetch every enabled source concurrently and wait for all of them.
    ///
    /// Disabled sources are reported without being run. The returned list
    /// has one outcome per source kind.
    pub async fn fetch(&self, region: &Region) -> Vec<SourceOutcome> {
        info!(
            "Querying {} sources ({} disabled)",
            self.adapters.adapters.len(),
            self.adapters.disabled.len()
        );

        let progress = self.progress_bar();
        let fetches = self
            .adapters
            .adapters
            .iter()
            .map(|adapter| fetch_one(adapter.as_ref(), region, progress.as_ref()));
        let mut outcomes = join_all(fetches).await;

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        outcomes.extend(
            self.adapters
                .disabled
                .iter()
                .map(|d| SourceOutcome::disabled(d.kind, d.reason.clone())),
        );
        outcomes.sort_by_key(|o| o.kind);
        outcomes
    }

    /// Fetch, then aggregate into a scored result.
    pub async fn run(&self, region: Region) -> PipelineOutput {
        let outcomes = self.fetch(&region).await;
        let result = aggregator::aggregate(region, outcomes.clone(), &self.risk, Utc::now());
        PipelineOutput { result, outcomes }
    }

    /// Resolve the query into a region, then run every source against it.
    ///
    /// A resolution error is returned before any adapter is called.
    pub async fn profile(
        &self,
        resolver: &LocationResolver,
        query: &LocationQuery,
        radius_km: Option<f64>,
        days: Option<u32>,
    ) -> Result<PipelineOutput, ProfilerError> {
        let region = resolver.resolve(query, radius_km, days).await?;
        Ok(self.run(region).await)
    }

    fn progress_bar(&self) -> Option<ProgressBar> {
        if !self.show_progress || self.adapters.adapters.is_empty() {
            return None;
        }

        let pb = ProgressBar::new(self.adapters.adapters.len() as u64);
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {pos}/{len} sources {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(120));
        Some(pb)
    }
}

async fn fetch_one(
    adapter: &dyn SourceAdapter,
    region: &Region,
    progress: Option<&ProgressBar>,
) -> SourceOutcome {
    let kind = adapter.kind();
    let span = info_span!("source", kind = ?kind);

    async move {
        let start = Instant::now();
        let result = adapter.fetch(region).await;
        let elapsed = start.elapsed().as_millis() as u64;

        if let Some(pb) = progress {
            pb.set_message(kind.to_string());
            pb.inc(1);
        }

        match result {
            Ok(records) => {
                info!("{} returned {} records in {}ms", kind, records.len(), elapsed);
                SourceOutcome::completed(records, elapsed)
            }
            Err(AdapterError::Partial { records, errors }) => {
                warn!(
                    "{} returned {} records in {}ms with {} failed sub-requests",
                    kind,
                    records.len(),
                    elapsed,
                    errors.len()
                );
                SourceOutcome::partial(records, errors.join("; "), elapsed)
            }
            Err(AdapterError::Skipped(reason)) => {
                info!("{} skipped: {}", kind, reason);
                SourceOutcome::disabled(kind, reason)
            }
            Err(e) => {
                let failure = ProfilerError::AdapterFailure {
                    source_name: kind.to_string(),
                    message: e.to_string(),
                };
                warn!("{} after {}ms", failure, elapsed);
                SourceOutcome::failed(kind, e.to_string(), elapsed)
            }
        }
    }
    .instrument(span)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisConfig;
    use crate::location::geocoder::Gazetteer;
    use crate::models::{AlertRecord, GeoPoint, RiskFactor, SourceKind, SourceStatus};
    use crate::sources::fake::FakeAdapter;
    use crate::sources::{DisabledSource, SourceRecords};
    use std::sync::atomic::Ordering;

    fn sumatra() -> Region {
        Region::new(None, GeoPoint::new(0.7893, 101.3431), 20.0, 30)
    }

    fn high_confidence_alerts(n: usize) -> Vec<AlertRecord> {
        (0..n)
            .map(|i| AlertRecord {
                timestamp: Utc::now() - chrono::Duration::days(i as i64),
                location: GeoPoint::new(0.7893 + 0.01 * i as f64, 101.3431),
                confidence: 0.95,
                source: "umd_glad_landsat_alerts".to_string(),
                area_ha: Some(1.5),
            })
            .collect()
    }

    fn pipeline(adapters: Vec<Box<dyn SourceAdapter>>) -> Pipeline {
        Pipeline::new(
            AdapterSet {
                adapters,
                disabled: Vec::new(),
            },
            RiskConfig::default(),
        )
    }

    fn all_empty() -> Vec<Box<dyn SourceAdapter>> {
        SourceKind::ALL.iter().map(|&k| FakeAdapter::empty(k)).collect()
    }

    #[tokio::test]
    async fn test_all_sources_empty() {
        let output = pipeline(all_empty()).run(sumatra()).await;
        let result = output.result;

        assert_eq!(result.risk_score, 0.0);
        assert!(result.insufficient_data);
        assert_eq!(result.record_count(), 0);
        assert!(result
            .sources
            .iter()
            .all(|s| s.status == SourceStatus::Empty));
    }

    #[tokio::test]
    async fn test_alerts_only_score_is_deterministic() {
        let alerts = high_confidence_alerts(5);
        let build = || {
            let mut adapters = vec![FakeAdapter::ok(SourceRecords::Alerts(alerts.clone()))];
            adapters.extend(
                SourceKind::ALL
                    .iter()
                    .filter(|&&k| k != SourceKind::Alerts)
                    .map(|&k| FakeAdapter::empty(k)),
            );
            pipeline(adapters)
        };

        let first = build().run(sumatra()).await.result;
        let second = build().run(sumatra()).await.result;

        assert!(!first.insufficient_data);
        assert!(first.risk_score > 0.0);
        assert_eq!(first.risk_score, second.risk_score);
        for term in &first.risk_terms {
            if term.factor == RiskFactor::AlertDensity {
                assert!(term.contribution > 0.0);
            } else {
                assert_eq!(term.contribution, 0.0);
            }
        }
    }

    #[tokio::test]
    async fn test_one_failure_does_not_abort_others() {
        let adapters = vec![
            FakeAdapter::ok(SourceRecords::Alerts(high_confidence_alerts(2))),
            FakeAdapter::failing(SourceKind::Social, "connection reset"),
            FakeAdapter::empty(SourceKind::Registry),
        ];
        let output = pipeline(adapters).run(sumatra()).await;

        assert_eq!(output.outcomes.len(), 3);
        let social = output.result.source(SourceKind::Social).unwrap();
        assert_eq!(social.status, SourceStatus::Failed);
        assert!(social.error.as_deref().unwrap().contains("connection reset"));
        assert_eq!(output.result.alerts.len(), 2);
        assert_eq!(
            output.result.source(SourceKind::Alerts).unwrap().status,
            SourceStatus::Success
        );
    }

    #[tokio::test]
    async fn test_disabled_sources_are_reported() {
        let set = AdapterSet {
            adapters: vec![FakeAdapter::empty(SourceKind::Alerts)],
            disabled: vec![DisabledSource {
                kind: SourceKind::Satellite,
                reason: "not requested".to_string(),
            }],
        };
        let outcomes = Pipeline::new(set, RiskConfig::default())
            .fetch(&sumatra())
            .await;

        assert_eq!(outcomes.len(), 2);
        assert_eq!(outcomes[1].kind, SourceKind::Satellite);
        assert_eq!(outcomes[1].status, SourceStatus::Disabled);
        assert_eq!(outcomes[1].error.as_deref(), Some("not requested"));
    }

    #[tokio::test]
    async fn test_partial_source_keeps_records() {
        let adapters = vec![
            FakeAdapter::partial(
                SourceRecords::Alerts(high_confidence_alerts(3)),
                "page 2: timeout",
            ),
            FakeAdapter::empty(SourceKind::Social),
        ];
        let output = pipeline(adapters).run(sumatra()).await;

        let alerts = output.result.source(SourceKind::Alerts).unwrap();
        assert_eq!(alerts.status, SourceStatus::Partial);
        assert_eq!(alerts.records, 3);
        assert_eq!(alerts.error.as_deref(), Some("page 2: timeout"));
        assert_eq!(output.result.alerts.len(), 3);
        assert!(!output.result.insufficient_data);
        assert!(output.result.risk_score > 0.0);
        assert_eq!(output.outcomes[0].records.as_ref().map(|r| r.len()), Some(3));
    }

    fn gazetteer_resolver() -> LocationResolver {
        LocationResolver::new(Box::new(Gazetteer::default()), AnalysisConfig::default())
    }

    #[tokio::test]
    async fn test_unresolved_location_runs_no_source() {
        let mut adapters = Vec::new();
        let mut counters = Vec::new();
        for &kind in SourceKind::ALL.iter() {
            let (adapter, calls) = FakeAdapter::counting(kind);
            adapters.push(adapter);
            counters.push(calls);
        }
        let pipeline = pipeline(adapters);
        let resolver = gazetteer_resolver();

        let queries = [
            (LocationQuery::Place("Atlantis".into()), None),
            (LocationQuery::Coords("91.0,10.0".into()), None),
            (LocationQuery::Place("Sumatra".into()), Some(0.0)),
        ];
        for (query, radius) in &queries {
            let err = pipeline
                .profile(&resolver, query, *radius, None)
                .await
                .unwrap_err();
            assert!(matches!(err, ProfilerError::InvalidLocation(_)), "{:?}", query);
        }

        for calls in &counters {
            assert_eq!(calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_resolved_location_runs_every_source_once() {
        let mut adapters = Vec::new();
        let mut counters = Vec::new();
        for &kind in SourceKind::ALL.iter() {
            let (adapter, calls) = FakeAdapter::counting(kind);
            adapters.push(adapter);
            counters.push(calls);
        }

        let output = pipeline(adapters)
            .profile(
                &gazetteer_resolver(),
                &LocationQuery::Place("Sumatra".into()),
                Some(20.0),
                Some(30),
            )
            .await
            .unwrap();

        assert_eq!(output.result.region.display_name(), "Sumatra");
        assert_eq!(output.outcomes.len(), SourceKind::ALL.len());
        for calls in &counters {
            assert_eq!(calls.load(Ordering::SeqCst), 1);
        }
    }
}
