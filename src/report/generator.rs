//! Markdown and JSON report generation.
//!
//! This module renders an [`AnalysisResult`] as a region profile report.

use crate::analysis::aggregator::{
    alert_trend, key_findings, recommendations, sentiment_breakdown, top_communities,
};
use crate::models::{AnalysisResult, RiskLevel, SourceStatus};
use anyhow::Result;

/// Maximum rows listed per table.
const MAX_ROWS: usize = 10;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(result: &AnalysisResult) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "# Environmental Crime Profile: {}\n\n",
        result.region.display_name()
    ));

    output.push_str(&generate_metadata_section(result));
    output.push_str(&generate_risk_section(result));
    output.push_str(&generate_sources_section(result));
    output.push_str(&generate_findings_section(result));
    output.push_str(&generate_forest_section(result));
    output.push_str(&generate_corporate_section(result));
    output.push_str(&generate_social_section(result));
    output.push_str(&generate_businesses_section(result));
    output.push_str(&generate_recommendations_section(result));
    output.push_str(&generate_footer());

    output
}

fn generate_metadata_section(result: &AnalysisResult) -> String {
    let region = &result.region;
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    if let Some(name) = region.name() {
        section.push_str(&format!("- **Place:** {}\n", name));
    }
    section.push_str(&format!("- **Center:** {}\n", region.center()));
    section.push_str(&format!("- **Radius:** {} km\n", region.radius_km()));
    section.push_str(&format!(
        "- **Time Window:** {} days\n",
        region.time_window_days()
    ));
    section.push_str(&format!(
        "- **Generated:** {}\n",
        result.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    section.push_str(&format!("- **Total Records:** {}\n\n", result.record_count()));

    section
}

fn generate_risk_section(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Risk Assessment\n\n");
    section.push_str(&format!(
        "**{} {} risk: {:.2} / 100**\n\n",
        result.risk_level.emoji(),
        result.risk_level,
        result.risk_score
    ));

    if result.insufficient_data {
        section.push_str(
            "> ⚠️ **Insufficient data.** No completed source produced records, \
             so the score is not meaningful.\n\n",
        );
    }

    section.push_str("| Factor | Weight | Signal | Contribution |\n");
    section.push_str("|:---|:---:|:---:|---:|\n");
    for term in &result.risk_terms {
        let contribution = if term.participating {
            format!("{:.2}", term.contribution)
        } else {
            "n/a".to_string()
        };
        section.push_str(&format!(
            "| {} | {:.2} | {:.3} | {} |\n",
            term.factor, term.weight, term.value, contribution
        ));
    }
    section.push('\n');

    section
}

fn generate_sources_section(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Data Sources\n\n");
    section.push_str("| Source | Status | Records | Time | Notes |\n");
    section.push_str("|:---|:---|:---:|---:|:---|\n");
    for source in &result.sources {
        section.push_str(&format!(
            "| {} | {} {} | {} | {}ms | {} |\n",
            source.kind,
            source.status.emoji(),
            source.status,
            source.records,
            source.duration_ms,
            source.error.as_deref().unwrap_or("")
        ));
    }
    section.push('\n');

    section
}

fn generate_findings_section(result: &AnalysisResult) -> String {
    let mut section = String::new();

    section.push_str("## Key Findings\n\n");
    for finding in key_findings(result) {
        section.push_str(&format!("- {}\n", finding));
    }
    section.push('\n');

    section
}

fn generate_forest_section(result: &AnalysisResult) -> String {
    let mut section = String::new();
    section.push_str("## Forest Loss Alerts\n\n");

    if result.alerts.is_empty() {
        section.push_str("No forest alert data available for trend analysis.\n\n");
        return section;
    }

    let mean_confidence =
        result.alerts.iter().map(|a| a.confidence).sum::<f64>() / result.alerts.len() as f64;
    section.push_str(&format!("- **Alerts:** {}\n", result.alerts.len()));
    section.push_str(&format!("- **Mean Confidence:** {:.2}\n", mean_confidence));
    let area: f64 = result.alerts.iter().filter_map(|a| a.area_ha).sum();
    if area > 0.0 {
        section.push_str(&format!("- **Affected Area:** {:.1} ha\n", area));
    }
    section.push('\n');

    match alert_trend(&result.alerts) {
        Some(trend) => section.push_str(&format!(
            "Alert frequency shows a **{} trend** over the analysis period. \
             Peak activity occurred on {} with {} alerts.\n\n",
            trend.direction, trend.peak_day, trend.peak_count
        )),
        None => section.push_str("Insufficient data for trend analysis.\n\n"),
    }

    section
}

fn generate_corporate_section(result: &AnalysisResult) -> String {
    if result.entities.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Corporate Entities\n\n");
    section.push_str(&format!(
        "{} entities found, {} sanctioned.\n\n",
        result.entities.len(),
        result.sanctioned_entities().count()
    ));

    section.push_str("| Name | Source | Identifier | LEI | Sanctioned |\n");
    section.push_str("|:---|:---|:---|:---|:---:|\n");

    // Sanctioned entities first.
    let mut entities: Vec<_> = result.entities.iter().collect();
    entities.sort_by_key(|e| !e.sanctions_flag);
    for entity in entities.iter().take(MAX_ROWS) {
        section.push_str(&format!(
            "| {} | {} | `{}` | {} | {} |\n",
            entity.name,
            entity.registry_source,
            entity.identifier,
            entity.lei.as_deref().unwrap_or("-"),
            if entity.sanctions_flag { "🚩" } else { "" }
        ));
    }
    if entities.len() > MAX_ROWS {
        section.push_str(&format!("\n*...and {} more*\n", entities.len() - MAX_ROWS));
    }
    section.push('\n');

    section
}

fn generate_social_section(result: &AnalysisResult) -> String {
    if result.posts.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    let (negative, neutral, positive) =
        sentiment_breakdown(&result.posts, result.negative_threshold);

    section.push_str("## Social Media\n\n");
    section.push_str("| Negative | Neutral | Positive | **Total** |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {} | {} | {} | **{}** |\n\n",
        negative,
        neutral,
        positive,
        result.posts.len()
    ));

    let communities = top_communities(&result.posts, 5);
    if !communities.is_empty() {
        section.push_str("**Most active communities:** ");
        let list: Vec<String> = communities
            .iter()
            .map(|(name, count)| format!("r/{} ({})", name, count))
            .collect();
        section.push_str(&list.join(", "));
        section.push_str("\n\n");
    }

    let mut most_negative: Vec<_> = result.negative_posts().collect();
    most_negative.sort_by(|a, b| {
        a.sentiment_score
            .partial_cmp(&b.sentiment_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    if !most_negative.is_empty() {
        section.push_str("### Most Negative Discussions\n\n");
        for post in most_negative.iter().take(5) {
            let title = post.text.lines().next().unwrap_or("");
            section.push_str(&format!(
                "- {:.2} r/{}: {}\n",
                post.sentiment_score, post.community, title
            ));
        }
        section.push('\n');
    }

    section
}

fn generate_businesses_section(result: &AnalysisResult) -> String {
    if result.businesses.is_empty() {
        return String::new();
    }

    let industrial: Vec<_> = result.businesses.iter().filter(|b| b.industrial).collect();
    let mut section = String::new();
    section.push_str("## Mapped Businesses\n\n");
    section.push_str(&format!(
        "{} businesses mapped, {} industrial or extractive.\n\n",
        result.businesses.len(),
        industrial.len()
    ));
    for business in industrial.iter().take(MAX_ROWS) {
        let tags: Vec<String> = business
            .tags
            .iter()
            .filter(|(k, _)| k.as_str() != "name")
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();
        section.push_str(&format!(
            "- {} ({} {}): {}\n",
            business.name.as_deref().unwrap_or("unnamed"),
            business.kind,
            business.osm_id,
            tags.join(", ")
        ));
    }
    if !industrial.is_empty() {
        section.push('\n');
    }

    section
}

fn generate_recommendations_section(result: &AnalysisResult) -> String {
    let mut section = String::new();
    let (headline, actions) = recommendations(result.risk_level);

    section.push_str("## Recommendations\n\n");
    section.push_str(&format!("**{}**\n\n", headline));
    for (i, action) in actions.iter().enumerate() {
        section.push_str(&format!("{}. {}\n", i + 1, action));
    }
    section.push('\n');

    let next = result.generated_at
        + chrono::Duration::days(result.risk_level.next_assessment_days());
    section.push_str(&format!(
        "**Next assessment:** {} ({} days)\n\n",
        next.format("%Y-%m-%d"),
        result.risk_level.next_assessment_days()
    ));

    let degraded = result
        .sources
        .iter()
        .any(|s| matches!(s.status, SourceStatus::Failed | SourceStatus::Partial));
    if degraded && result.risk_level < RiskLevel::High {
        section.push_str(
            "Some sources failed or returned incomplete data; rerun the analysis \
             before relying on a low score.\n\n",
        );
    }

    section
}

fn generate_footer() -> String {
    let mut footer = String::new();

    footer.push_str("---\n\n");
    footer.push_str(&format!(
        "*Report generated by EcoProfiler v{} from open sources. \
         Findings are leads for investigation, not evidence.*\n",
        env!("CARGO_PKG_VERSION")
    ));

    footer
}

/// Generate a JSON report.
pub fn generate_json_report(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::{aggregate, SourceOutcome};
    use crate::config::RiskConfig;
    use crate::models::{
        AlertRecord, CorporateEntity, GeoPoint, Region, SocialPost, SourceKind,
    };
    use crate::sources::SourceRecords;
    use chrono::Utc;

    fn region() -> Region {
        Region::new(
            Some("Sumatra".to_string()),
            GeoPoint::new(0.7893, 101.3431),
            20.0,
            30,
        )
    }

    fn populated_result() -> AnalysisResult {
        let now = Utc::now();
        let alerts = (0..4)
            .map(|i| AlertRecord {
                timestamp: now - chrono::Duration::days(i),
                location: GeoPoint::new(0.79, 101.34),
                confidence: 0.9,
                source: "umd_glad_landsat_alerts".to_string(),
                area_ha: Some(2.0),
            })
            .collect();
        let sanctioned = CorporateEntity {
            name: "PT Hutan Lestari".to_string(),
            identifier: "NK-1".to_string(),
            registry_source: "opensanctions".to_string(),
            sanctions_flag: true,
            lei: None,
            industry: None,
            sanction_topics: vec!["sanction".to_string()],
        };
        let post = SocialPost {
            id: "p1".to_string(),
            timestamp: now,
            text: "Illegal logging destroyed the forest\n\nbody".to_string(),
            sentiment_score: -1.0,
            topic_tags: vec!["illegal logging".to_string()],
            community: "environment".to_string(),
            url: None,
            engagement: 3,
        };

        aggregate(
            region(),
            vec![
                SourceOutcome::completed(SourceRecords::Alerts(alerts), 10),
                SourceOutcome::completed(SourceRecords::Sanctions(vec![sanctioned]), 10),
                SourceOutcome::completed(SourceRecords::Social(vec![post]), 10),
                SourceOutcome::failed(SourceKind::Registry, "API returned 500: boom".into(), 10),
            ],
            &RiskConfig::default(),
            now,
        )
    }

    fn empty_result() -> AnalysisResult {
        aggregate(
            region(),
            vec![SourceOutcome::completed(SourceRecords::Alerts(Vec::new()), 1)],
            &RiskConfig::default(),
            Utc::now(),
        )
    }

    #[test]
    fn test_generate_markdown_report() {
        let markdown = generate_markdown_report(&populated_result());

        assert!(markdown.contains("# Environmental Crime Profile: Sumatra"));
        assert!(markdown.contains("## Metadata"));
        assert!(markdown.contains("## Risk Assessment"));
        assert!(markdown.contains("## Data Sources"));
        assert!(markdown.contains("API returned 500: boom"));
        assert!(markdown.contains("PT Hutan Lestari"));
        assert!(markdown.contains("r/environment (1)"));
        assert!(markdown.contains("Illegal logging destroyed the forest"));
        assert!(markdown.contains("## Recommendations"));
        assert!(!markdown.contains("Insufficient data."));
    }

    #[test]
    fn test_markdown_flags_insufficient_data() {
        let markdown = generate_markdown_report(&empty_result());

        assert!(markdown.contains("Insufficient data."));
        assert!(markdown.contains("0.00 / 100"));
        assert!(markdown.contains("No forest alert data available"));
        assert!(markdown.contains("Limited data available"));
        assert!(!markdown.contains("## Corporate Entities"));
    }

    #[test]
    fn test_generate_json_report() {
        let json = generate_json_report(&populated_result()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["region"]["name"], "Sumatra");
        assert_eq!(value["alerts"].as_array().unwrap().len(), 4);
        assert_eq!(value["insufficient_data"], false);
        assert!(value["risk_score"].as_f64().unwrap() > 0.0);
        assert_eq!(value["sources"][0]["kind"], "alerts");
    }
}
