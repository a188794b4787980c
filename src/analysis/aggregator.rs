//! Aggregation of source outcomes into an analysis result.
//!
//! This module merges per-source records, scores the region and provides
//! the summary helpers used by the report generators.

use crate::analysis::risk::{self, RiskSignals};
use crate::config::RiskConfig;
use crate::models::{
    AlertRecord, AnalysisResult, CorporateEntity, Region, RiskLevel, SocialPost, SourceKind,
    SourceReport, SourceStatus,
};
use crate::sources::SourceRecords;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Terminal state of one source after the fetch stage.
#[derive(Debug, Clone)]
pub struct SourceOutcome {
    pub kind: SourceKind,
    pub status: SourceStatus,
    pub records: Option<SourceRecords>,
    pub error: Option<String>,
    pub duration_ms: u64,
}

impl SourceOutcome {
    /// Tag fetched records as `Success` or `Empty`.
    pub fn completed(records: SourceRecords, duration_ms: u64) -> Self {
        let status = if records.is_empty() {
            SourceStatus::Empty
        } else {
            SourceStatus::Success
        };
        Self {
            kind: records.kind(),
            status,
            records: Some(records),
            error: None,
            duration_ms,
        }
    }

    /// Records that arrived while other sub-requests failed.
    pub fn partial(records: SourceRecords, error: String, duration_ms: u64) -> Self {
        Self {
            kind: records.kind(),
            status: SourceStatus::Partial,
            records: Some(records),
            error: Some(error),
            duration_ms,
        }
    }

    pub fn failed(kind: SourceKind, error: String, duration_ms: u64) -> Self {
        Self {
            kind,
            status: SourceStatus::Failed,
            records: None,
            error: Some(error),
            duration_ms,
        }
    }

    pub fn disabled(kind: SourceKind, reason: String) -> Self {
        Self {
            kind,
            status: SourceStatus::Disabled,
            records: None,
            error: Some(reason),
            duration_ms: 0,
        }
    }

    fn report(&self) -> SourceReport {
        SourceReport {
            kind: self.kind,
            status: self.status,
            records: self.records.as_ref().map_or(0, SourceRecords::len),
            error: self.error.clone(),
            duration_ms: self.duration_ms,
        }
    }
}

/// Merge registry entities with sanctions hits by normalised name.
///
/// A hit carries its `sanctions_flag` over to the matching registry entity;
/// unmatched hits are appended as they are.
pub fn merge_entities(
    registry: Vec<CorporateEntity>,
    sanctions: Vec<CorporateEntity>,
) -> Vec<CorporateEntity> {
    let mut merged = registry;
    let mut index: HashMap<String, usize> = HashMap::new();
    for (i, entity) in merged.iter().enumerate() {
        index.entry(entity.match_key()).or_insert(i);
    }

    for hit in sanctions {
        match index.get(&hit.match_key()) {
            Some(&i) => {
                let entity = &mut merged[i];
                entity.sanctions_flag |= hit.sanctions_flag;
                for topic in hit.sanction_topics {
                    if !entity.sanction_topics.contains(&topic) {
                        entity.sanction_topics.push(topic);
                    }
                }
                if entity.lei.is_none() {
                    entity.lei = hit.lei;
                }
                debug!(
                    "OpenSanctions match for registry entity '{}' (sanctioned: {})",
                    entity.name, entity.sanctions_flag
                );
            }
            None => {
                index.insert(hit.match_key(), merged.len());
                merged.push(hit);
            }
        }
    }

    merged
}

/// Build the analysis result. Never fails: missing sources only reduce
/// what the result contains.
pub fn aggregate(
    region: Region,
    outcomes: Vec<SourceOutcome>,
    config: &RiskConfig,
    generated_at: DateTime<Utc>,
) -> AnalysisResult {
    let mut sources: Vec<SourceReport> = outcomes.iter().map(SourceOutcome::report).collect();
    sources.sort_by_key(|s| s.kind);

    let mut alerts = Vec::new();
    let mut registry = Vec::new();
    let mut sanctions = Vec::new();
    let mut posts = Vec::new();
    let mut images = Vec::new();
    let mut businesses = Vec::new();

    for outcome in outcomes {
        match outcome.records {
            Some(SourceRecords::Alerts(v)) => alerts = v,
            Some(SourceRecords::Satellite(v)) => images = v,
            Some(SourceRecords::Registry(v)) => registry = v,
            Some(SourceRecords::Sanctions(v)) => sanctions = v,
            Some(SourceRecords::Social(v)) => posts = v,
            Some(SourceRecords::Businesses(v)) => businesses = v,
            None => {}
        }
    }

    let entities = merge_entities(registry, sanctions);

    let signals = RiskSignals {
        alert_confidence: alerts.iter().map(|a| a.confidence).sum(),
        area_km2: region.area_km2(),
        sanctioned_entities: entities.iter().filter(|e| e.sanctions_flag).count(),
        posts: posts.len(),
        negative_posts: posts
            .iter()
            .filter(|p| p.sentiment_score < config.negative_threshold)
            .count(),
        industrial_sites: businesses.iter().filter(|b| b.industrial).count(),
    };
    let total_records =
        alerts.len() + entities.len() + posts.len() + images.len() + businesses.len();

    let completed = |kind: SourceKind| {
        sources
            .iter()
            .any(|s| s.kind == kind && s.status.completed())
    };
    let assessment = risk::assess(&signals, completed, total_records, config);

    info!(
        "Aggregated {} records for {}: risk {:.2} ({}){}",
        total_records,
        region.display_name(),
        assessment.score,
        assessment.level,
        if assessment.insufficient_data {
            ", insufficient data"
        } else {
            ""
        }
    );

    AnalysisResult {
        region,
        alerts,
        entities,
        posts,
        images,
        businesses,
        risk_score: assessment.score,
        risk_level: assessment.level,
        insufficient_data: assessment.insufficient_data,
        risk_terms: assessment.terms,
        negative_threshold: config.negative_threshold,
        sources,
        generated_at,
    }
}

/// Alert counts per calendar day, oldest first.
pub fn daily_alert_counts(alerts: &[AlertRecord]) -> BTreeMap<NaiveDate, usize> {
    let mut counts: BTreeMap<NaiveDate, usize> = BTreeMap::new();
    for alert in alerts {
        *counts.entry(alert.timestamp.date_naive()).or_default() += 1;
    }
    counts
}

/// Direction of alert frequency over the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
}

impl std::fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrendDirection::Increasing => write!(f, "increasing"),
            TrendDirection::Decreasing => write!(f, "decreasing"),
            TrendDirection::Stable => write!(f, "stable"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertTrend {
    pub direction: TrendDirection,
    pub peak_day: NaiveDate,
    pub peak_count: usize,
}

/// Compare the first and last alert days and find the busiest day.
///
/// Returns `None` with fewer than two distinct days.
pub fn alert_trend(alerts: &[AlertRecord]) -> Option<AlertTrend> {
    let counts = daily_alert_counts(alerts);
    if counts.len() < 2 {
        return None;
    }

    let first = *counts.values().next()?;
    let last = *counts.values().next_back()?;
    let direction = match last.cmp(&first) {
        std::cmp::Ordering::Greater => TrendDirection::Increasing,
        std::cmp::Ordering::Less => TrendDirection::Decreasing,
        std::cmp::Ordering::Equal => TrendDirection::Stable,
    };

    // Earliest day wins ties.
    let (peak_day, peak_count) = counts
        .iter()
        .fold(None, |best: Option<(NaiveDate, usize)>, (&day, &count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((day, count)),
        })?;

    Some(AlertTrend {
        direction,
        peak_day,
        peak_count,
    })
}

/// Negative, neutral and positive post counts.
pub fn sentiment_breakdown(posts: &[SocialPost], negative_threshold: f64) -> (usize, usize, usize) {
    let negative = posts
        .iter()
        .filter(|p| p.sentiment_score < negative_threshold)
        .count();
    let positive = posts
        .iter()
        .filter(|p| p.sentiment_score > negative_threshold.abs())
        .count();
    (negative, posts.len() - negative - positive, positive)
}

/// Communities with the most posts.
pub fn top_communities(posts: &[SocialPost], n: usize) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for post in posts {
        *counts.entry(post.community.as_str()).or_default() += 1;
    }

    let mut ranked: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(name, count)| (name.to_string(), count))
        .collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

/// Short findings for the executive summary.
pub fn key_findings(result: &AnalysisResult) -> Vec<String> {
    let mut findings = Vec::new();

    if !result.alerts.is_empty() {
        findings.push(format!(
            "{} forest loss alerts detected in the past {} days",
            result.alerts.len(),
            result.region.time_window_days()
        ));
    }

    let sanctioned = result.sanctioned_entities().count();
    if sanctioned > 0 {
        findings.push(format!(
            "{} sanctioned corporate entities linked to the region",
            sanctioned
        ));
    }

    let negative = result.negative_posts().count();
    if negative > 0 {
        findings.push(format!(
            "{} negative social media discussions about environmental issues",
            negative
        ));
    }

    let industrial = result.businesses.iter().filter(|b| b.industrial).count();
    if industrial > 0 {
        findings.push(format!(
            "{} industrial or extractive sites mapped nearby",
            industrial
        ));
    }

    let failed: Vec<String> = result
        .sources
        .iter()
        .filter(|s| s.status == SourceStatus::Failed)
        .map(|s| s.kind.to_string())
        .collect();
    if !failed.is_empty() {
        findings.push(format!("Data missing from: {}", failed.join(", ")));
    }

    let partial: Vec<String> = result
        .sources
        .iter()
        .filter(|s| s.status == SourceStatus::Partial)
        .map(|s| s.kind.to_string())
        .collect();
    if !partial.is_empty() {
        findings.push(format!("Incomplete data from: {}", partial.join(", ")));
    }

    if findings.is_empty() || result.insufficient_data {
        findings.push("Limited data available for comprehensive risk assessment".to_string());
        findings.push(
            "Consider expanding the radius or time window for a more comprehensive analysis"
                .to_string(),
        );
    }

    findings
}

const CRITICAL_ACTIONS: &[&str] = &[
    "Launch a formal environmental crime investigation",
    "Coordinate with local law enforcement agencies",
    "Deploy real-time satellite monitoring",
    "Conduct field verification of high-risk sites",
    "Freeze assets of sanctioned entities where applicable",
    "Engage social media platforms for content monitoring",
];

const HIGH_ACTIONS: &[&str] = &[
    "Increase satellite monitoring frequency to weekly",
    "Conduct deeper corporate due diligence",
    "Monitor social channels for escalation signals",
    "Prepare contingency investigation plans",
    "Engage with local environmental NGOs",
];

const STANDARD_ACTIONS: &[&str] = &[
    "Maintain the regular satellite monitoring schedule",
    "Continue periodic corporate registry checks",
    "Monitor social media for emerging trends",
    "Document baseline metrics for future comparison",
    "Review regulatory compliance of local businesses",
];

/// Headline and actions for a risk level.
pub fn recommendations(level: RiskLevel) -> (&'static str, &'static [&'static str]) {
    match level {
        RiskLevel::Critical => ("🚨 IMMEDIATE ACTION REQUIRED", CRITICAL_ACTIONS),
        RiskLevel::High => ("⚠️ ENHANCED MONITORING RECOMMENDED", HIGH_ACTIONS),
        RiskLevel::Medium | RiskLevel::Low => ("✅ STANDARD MONITORING SUFFICIENT", STANDARD_ACTIONS),
    }
}
