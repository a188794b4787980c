//! Risk scoring.
//!
//! The score is a weighted mean of four normalised signals. A signal only
//! counts when its source completed (`Success` or `Empty`); the weights of
//! participating signals are renormalised so missing sources neither raise
//! nor lower the score. Nothing here reads the clock or a random source.

use crate::config::RiskConfig;
use crate::models::{RiskFactor, RiskLevel, RiskTerm, SourceKind};

/// Raw signal counts extracted from the collected records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RiskSignals {
    /// Sum of alert confidences.
    pub alert_confidence: f64,
    /// Area of the analysis circle.
    pub area_km2: f64,
    pub sanctioned_entities: usize,
    pub posts: usize,
    pub negative_posts: usize,
    pub industrial_sites: usize,
}

/// Outcome of scoring a region.
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub score: f64,
    pub level: RiskLevel,
    pub insufficient_data: bool,
    pub terms: Vec<RiskTerm>,
}

impl RiskFactor {
    pub const ALL: [RiskFactor; 4] = [
        RiskFactor::AlertDensity,
        RiskFactor::SanctionedEntities,
        RiskFactor::NegativeSentiment,
        RiskFactor::IndustrialSites,
    ];

    fn weight(&self, config: &RiskConfig) -> f64 {
        match self {
            RiskFactor::AlertDensity => config.forest_alerts,
            RiskFactor::SanctionedEntities => config.sanctioned_companies,
            RiskFactor::NegativeSentiment => config.negative_sentiment,
            RiskFactor::IndustrialSites => config.industrial_sites,
        }
    }
}

/// Normalised value of one factor in `[0, 1]`.
pub fn term_value(factor: RiskFactor, signals: &RiskSignals, config: &RiskConfig) -> f64 {
    let value = match factor {
        RiskFactor::AlertDensity => {
            if signals.area_km2 > 0.0 && config.alert_density_saturation > 0.0 {
                signals.alert_confidence / signals.area_km2 / config.alert_density_saturation
            } else {
                0.0
            }
        }
        RiskFactor::SanctionedEntities => {
            ratio(signals.sanctioned_entities, config.sanctions_saturation)
        }
        RiskFactor::NegativeSentiment => ratio(signals.negative_posts, signals.posts),
        RiskFactor::IndustrialSites => ratio(signals.industrial_sites, config.industrial_saturation),
    };

    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn ratio(count: usize, of: usize) -> f64 {
    if of == 0 {
        0.0
    } else {
        count as f64 / of as f64
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Score the signals.
///
/// `completed` says whether a source reached `Success` or `Empty`.
/// With no participating factor, or no records at all, the result is
/// flagged insufficient and the score is 0.
pub fn assess<F>(
    signals: &RiskSignals,
    completed: F,
    total_records: usize,
    config: &RiskConfig,
) -> RiskAssessment
where
    F: Fn(SourceKind) -> bool,
{
    let participating: Vec<bool> = RiskFactor::ALL
        .iter()
        .map(|f| completed(f.source()) && f.weight(config) > 0.0)
        .collect();
    let weight_sum: f64 = RiskFactor::ALL
        .iter()
        .zip(&participating)
        .filter(|(_, p)| **p)
        .map(|(f, _)| f.weight(config))
        .sum();

    let insufficient_data = weight_sum <= 0.0 || total_records == 0;

    let terms: Vec<RiskTerm> = RiskFactor::ALL
        .iter()
        .zip(&participating)
        .map(|(&factor, &participating)| {
            let weight = factor.weight(config);
            let value = term_value(factor, signals, config);
            let contribution = if participating && !insufficient_data {
                100.0 * weight * value / weight_sum
            } else {
                0.0
            };
            RiskTerm {
                factor,
                weight,
                value,
                participating,
                contribution,
            }
        })
        .collect();

    let score = if insufficient_data {
        0.0
    } else {
        round2(terms.iter().map(|t| t.contribution).sum::<f64>().clamp(0.0, 100.0))
    };

    RiskAssessment {
        score,
        level: RiskLevel::from_score(score),
        insufficient_data,
        terms,
    }
}
