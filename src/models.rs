//! Data models for the profiler.
//!
//! This module contains the core data structures shared by the resolver,
//! the source adapters, the aggregator and the report generators.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

/// Kilometres per degree of latitude.
pub const KM_PER_DEGREE: f64 = 111.0;

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine distance in kilometres.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();
        let a = (d_lat / 2.0).sin().powi(2)
            + self.lat.to_radians().cos() * other.lat.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().min(1.0).asin()
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.lat, self.lon)
    }
}

/// Axis-aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// Returns true if the point lies inside the box (edges included).
    pub fn contains(&self, point: &GeoPoint) -> bool {
        point.lat >= self.min_lat
            && point.lat <= self.max_lat
            && point.lon >= self.min_lon
            && point.lon <= self.max_lon
    }

    /// Closed polygon ring in GeoJSON `[lon, lat]` order.
    pub fn ring(&self) -> Vec<[f64; 2]> {
        vec![
            [self.min_lon, self.min_lat],
            [self.max_lon, self.min_lat],
            [self.max_lon, self.max_lat],
            [self.min_lon, self.max_lat],
            [self.min_lon, self.min_lat],
        ]
    }
}

/// The resolved analysis target.
///
/// Fields are private: a region is created once by the location resolver
/// and only read afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Region {
    name: Option<String>,
    center: GeoPoint,
    radius_km: f64,
    time_window_days: u32,
}

impl Region {
    pub(crate) fn new(
        name: Option<String>,
        center: GeoPoint,
        radius_km: f64,
        time_window_days: u32,
    ) -> Self {
        Self {
            name,
            center,
            radius_km,
            time_window_days,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn center(&self) -> GeoPoint {
        self.center
    }

    pub fn radius_km(&self) -> f64 {
        self.radius_km
    }

    pub fn time_window_days(&self) -> u32 {
        self.time_window_days
    }

    /// Human readable name, falling back to the coordinates.
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("({})", self.center),
        }
    }

    /// File-system safe label used for output and log file names.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => slugify(name),
            None => coords_label(self.center.lat, self.center.lon),
        }
    }

    /// Bounding box of the analysis circle.
    ///
    /// The longitude span widens with latitude and is clamped near the poles.
    pub fn bounding_box(&self) -> BoundingBox {
        let lat_delta = self.radius_km / KM_PER_DEGREE;
        let cos_lat = self.center.lat.to_radians().cos().abs().max(0.01);
        let lon_delta = (self.radius_km / (KM_PER_DEGREE * cos_lat)).min(180.0);

        BoundingBox {
            min_lon: (self.center.lon - lon_delta).max(-180.0),
            min_lat: (self.center.lat - lat_delta).max(-90.0),
            max_lon: (self.center.lon + lon_delta).min(180.0),
            max_lat: (self.center.lat + lat_delta).min(90.0),
        }
    }

    /// Whether `point` lies within the analysis radius of the center.
    pub fn covers(&self, point: &GeoPoint) -> bool {
        self.center.distance_km(point) <= self.radius_km
    }

    /// Area of the analysis circle in square kilometres.
    pub fn area_km2(&self) -> f64 {
        std::f64::consts::PI * self.radius_km * self.radius_km
    }

    /// Start of the time window relative to `now`.
    pub fn window_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - chrono::Duration::days(i64::from(self.time_window_days))
    }
}

/// Lowercase, keep alphanumerics, collapse everything else to `_`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
        } else if !slug.ends_with('_') {
            slug.push('_');
        }
    }
    let slug = slug.trim_matches('_').to_string();
    if slug.is_empty() {
        "region".to_string()
    } else {
        slug
    }
}

/// Label for an unnamed region, e.g. `coords_0_7893_101_3431`; negatives get an `m` prefix.
pub fn coords_label(lat: f64, lon: f64) -> String {
    fn part(value: f64) -> String {
        let digits = format!("{:.4}", value.abs()).replace('.', "_");
        if value < 0.0 {
            format!("m{}", digits)
        } else {
            digits
        }
    }
    format!("coords_{}_{}", part(lat), part(lon))
}

/// A forest-loss alert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertRecord {
    pub timestamp: DateTime<Utc>,
    pub location: GeoPoint,
    /// Detection confidence in `[0, 1]`.
    pub confidence: f64,
    pub source: String,
    /// Affected area in hectares, when the feed reports one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub area_ha: Option<f64>,
}

/// A company or organisation linked to the region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorporateEntity {
    pub name: String,
    /// Registry-specific identifier (Wikidata QID, OpenSanctions id, ...).
    pub identifier: String,
    pub registry_source: String,
    pub sanctions_flag: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lei: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sanction_topics: Vec<String>,
}

impl CorporateEntity {
    /// Key used to match the same entity across registries.
    pub fn match_key(&self) -> String {
        normalize_entity_name(&self.name)
    }
}

/// Lowercase the name and drop punctuation and common legal suffixes.
pub fn normalize_entity_name(name: &str) -> String {
    const SUFFIXES: &[&str] = &["pt", "tbk", "ltd", "inc", "llc", "plc", "sa", "co", "corp", "gmbh"];

    name.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty() && !SUFFIXES.contains(w))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A social media post mentioning the region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocialPost {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    /// Polarity in `[-1, 1]`.
    pub sentiment_score: f64,
    pub topic_tags: Vec<String>,
    pub community: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Upvote score at fetch time.
    pub engagement: i64,
}

/// Imagery product rendered for the region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageLayer {
    TrueColor,
    Ndvi,
}

impl fmt::Display for ImageLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageLayer::TrueColor => write!(f, "True Color"),
            ImageLayer::Ndvi => write!(f, "NDVI"),
        }
    }
}

/// A downloaded satellite image.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SatelliteImage {
    pub layer: ImageLayer,
    pub path: PathBuf,
    pub window_start: NaiveDate,
    pub window_end: NaiveDate,
}

/// A business or facility mapped in OpenStreetMap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Business {
    pub osm_id: i64,
    /// OSM element type (`node` or `way`).
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub tags: BTreeMap<String, String>,
    pub industrial: bool,
}

/// The fixed set of data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Alerts,
    Satellite,
    Registry,
    Sanctions,
    Social,
    Businesses,
}

impl SourceKind {
    #[cfg(test)]
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Alerts,
        SourceKind::Satellite,
        SourceKind::Registry,
        SourceKind::Sanctions,
        SourceKind::Social,
        SourceKind::Businesses,
    ];

    /// Short name used in file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Alerts => "alerts",
            SourceKind::Satellite => "satellite",
            SourceKind::Registry => "registry",
            SourceKind::Sanctions => "sanctions",
            SourceKind::Social => "social",
            SourceKind::Businesses => "businesses",
        }
    }

    /// Subdirectory of the data directory holding this source's output.
    pub fn data_subdir(&self) -> &'static str {
        match self {
            SourceKind::Alerts => "alerts",
            SourceKind::Satellite => "satellite",
            SourceKind::Registry | SourceKind::Sanctions | SourceKind::Businesses => "companies",
            SourceKind::Social => "reddit",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Alerts => write!(f, "Forest Alerts"),
            SourceKind::Satellite => write!(f, "Satellite Imagery"),
            SourceKind::Registry => write!(f, "Corporate Registry"),
            SourceKind::Sanctions => write!(f, "Sanctions Screening"),
            SourceKind::Social => write!(f, "Social Media"),
            SourceKind::Businesses => write!(f, "OSM Businesses"),
        }
    }
}

/// Terminal state of one source after the fetch stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    /// Returned at least one record.
    Success,
    /// Some sub-requests failed; the records that did arrive are kept.
    Partial,
    /// Completed but returned nothing.
    Empty,
    /// Errored; its records are missing from the result.
    Failed,
    /// Not run (missing credentials or not requested).
    Disabled,
}

impl SourceStatus {
    /// Whether the source produced a usable signal.
    ///
    /// `Partial` counts: its records are a sample of the full answer and
    /// the ratio-based risk terms stay meaningful on a sample.
    pub fn completed(&self) -> bool {
        matches!(
            self,
            SourceStatus::Success | SourceStatus::Partial | SourceStatus::Empty
        )
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            SourceStatus::Success => "✅",
            SourceStatus::Partial => "⚠️",
            SourceStatus::Empty => "⚪",
            SourceStatus::Failed => "❌",
            SourceStatus::Disabled => "⏸️",
        }
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceStatus::Success => write!(f, "Success"),
            SourceStatus::Partial => write!(f, "Partial"),
            SourceStatus::Empty => write!(f, "Empty"),
            SourceStatus::Failed => write!(f, "Failed"),
            SourceStatus::Disabled => write!(f, "Disabled"),
        }
    }
}

/// Per-source metadata surfaced in the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub kind: SourceKind,
    pub status: SourceStatus,
    pub records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// Overall risk band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Band for a score in `[0, 100]`.
    pub fn from_score(score: f64) -> Self {
        if score > 70.0 {
            RiskLevel::Critical
        } else if score > 40.0 {
            RiskLevel::High
        } else if score > 20.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            RiskLevel::Low => "🟢",
            RiskLevel::Medium => "🟡",
            RiskLevel::High => "🟠",
            RiskLevel::Critical => "🔴",
        }
    }

    /// Days until the region should be assessed again.
    pub fn next_assessment_days(&self) -> i64 {
        match self {
            RiskLevel::Critical => 7,
            RiskLevel::High => 14,
            RiskLevel::Medium | RiskLevel::Low => 30,
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
            RiskLevel::Critical => write!(f, "Critical"),
        }
    }
}

/// Signal feeding the risk score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskFactor {
    AlertDensity,
    SanctionedEntities,
    NegativeSentiment,
    IndustrialSites,
}

impl RiskFactor {
    /// The source whose completion makes this factor participate.
    pub fn source(&self) -> SourceKind {
        match self {
            RiskFactor::AlertDensity => SourceKind::Alerts,
            RiskFactor::SanctionedEntities => SourceKind::Sanctions,
            RiskFactor::NegativeSentiment => SourceKind::Social,
            RiskFactor::IndustrialSites => SourceKind::Businesses,
        }
    }
}

impl fmt::Display for RiskFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskFactor::AlertDensity => write!(f, "Forest alert density"),
            RiskFactor::SanctionedEntities => write!(f, "Sanctioned entities"),
            RiskFactor::NegativeSentiment => write!(f, "Negative sentiment"),
            RiskFactor::IndustrialSites => write!(f, "Industrial sites"),
        }
    }
}

/// One weighted term of the risk score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskTerm {
    pub factor: RiskFactor,
    pub weight: f64,
    /// Normalised signal in `[0, 1]`.
    pub value: f64,
    pub participating: bool,
    /// Points contributed to the final score.
    pub contribution: f64,
}

/// The aggregated, scored record for one region.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub region: Region,
    pub alerts: Vec<AlertRecord>,
    pub entities: Vec<CorporateEntity>,
    pub posts: Vec<SocialPost>,
    pub images: Vec<SatelliteImage>,
    pub businesses: Vec<Business>,
    /// Score in `[0, 100]`.
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub insufficient_data: bool,
    pub risk_terms: Vec<RiskTerm>,
    /// Posts scoring below this polarity counted as negative.
    pub negative_threshold: f64,
    pub sources: Vec<SourceReport>,
    pub generated_at: DateTime<Utc>,
}

impl AnalysisResult {
    /// Total number of records across all categories.
    pub fn record_count(&self) -> usize {
        self.alerts.len()
            + self.entities.len()
            + self.posts.len()
            + self.images.len()
            + self.businesses.len()
    }

    pub fn sanctioned_entities(&self) -> impl Iterator<Item = &CorporateEntity> {
        self.entities.iter().filter(|e| e.sanctions_flag)
    }

    pub fn negative_posts(&self) -> impl Iterator<Item = &SocialPost> {
        self.posts
            .iter()
            .filter(move |p| p.sentiment_score < self.negative_threshold)
    }

    #[cfg(test)]
    pub fn source(&self, kind: SourceKind) -> Option<&SourceReport> {
        self.sources.iter().find(|s| s.kind == kind)
    }

    /// Sources that contributed records, partially or fully, or completed empty.
    pub fn contributing_sources(&self) -> Vec<SourceKind> {
        self.sources
            .iter()
            .filter(|s| s.status.completed())
            .map(|s| s.kind)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sumatra() -> Region {
        Region::new(
            Some("Sumatra".to_string()),
            GeoPoint::new(0.7893, 101.3431),
            20.0,
            30,
        )
    }

    #[test]
    fn test_risk_level_bands() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20.0), RiskLevel::Low);
        assert_eq!(RiskLevel::from_score(20.5), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(55.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(71.0), RiskLevel::Critical);
        assert!(RiskLevel::Low < RiskLevel::Critical);
    }

    #[test]
    fn test_next_assessment_days() {
        assert_eq!(RiskLevel::Critical.next_assessment_days(), 7);
        assert_eq!(RiskLevel::High.next_assessment_days(), 14);
        assert_eq!(RiskLevel::Low.next_assessment_days(), 30);
    }

    #[test]
    fn test_bounding_box_at_equator_is_finite() {
        let region = Region::new(None, GeoPoint::new(0.0, 10.0), 20.0, 30);
        let bbox = region.bounding_box();

        assert!(bbox.min_lon.is_finite() && bbox.max_lon.is_finite());
        assert!((bbox.max_lat - 20.0 / KM_PER_DEGREE).abs() < 1e-9);
        assert!((bbox.max_lon - (10.0 + 20.0 / KM_PER_DEGREE)).abs() < 1e-9);
        assert!(bbox.contains(&region.center()));
    }

    #[test]
    fn test_bounding_box_clamped_near_pole() {
        let region = Region::new(None, GeoPoint::new(89.9, 0.0), 100.0, 30);
        let bbox = region.bounding_box();
        assert!(bbox.max_lat <= 90.0);
        assert!(bbox.min_lon >= -180.0 && bbox.max_lon <= 180.0);
    }

    #[test]
    fn test_region_label() {
        assert_eq!(sumatra().label(), "sumatra");
        let region = Region::new(Some("Río Negro, AM".into()), GeoPoint::new(0.0, 0.0), 5.0, 7);
        assert_eq!(region.label(), "río_negro_am");

        let unnamed = Region::new(None, GeoPoint::new(-3.4653, -62.2159), 5.0, 7);
        assert_eq!(unnamed.label(), "coords_m3_4653_m62_2159");
    }

    #[test]
    fn test_area() {
        let area = sumatra().area_km2();
        assert!((area - 1256.637).abs() < 0.01);
    }

    #[test]
    fn test_distance_km() {
        let center = sumatra().center();
        assert_eq!(center.distance_km(&center), 0.0);

        // One degree of latitude is about 111 km.
        let north = GeoPoint::new(center.lat + 1.0, center.lon);
        assert!((center.distance_km(&north) - 111.19).abs() < 0.1);
    }

    #[test]
    fn test_covers_excludes_box_corners() {
        let region = sumatra();
        let center = region.center();
        let corner = GeoPoint::new(center.lat + 0.17, center.lon + 0.17);

        assert!(region.bounding_box().contains(&corner));
        assert!(center.distance_km(&corner) > 26.0);
        assert!(!region.covers(&corner));
        assert!(region.covers(&GeoPoint::new(center.lat + 0.1, center.lon)));
    }

    #[test]
    fn test_normalize_entity_name() {
        assert_eq!(
            normalize_entity_name("PT Perkebunan Nusantara Tbk."),
            "perkebunan nusantara"
        );
        assert_eq!(
            normalize_entity_name("perkebunan  NUSANTARA"),
            "perkebunan nusantara"
        );
    }

    #[test]
    fn test_source_status_completed() {
        assert!(SourceStatus::Success.completed());
        assert!(SourceStatus::Empty.completed());
        assert!(SourceStatus::Partial.completed());
        assert!(!SourceStatus::Failed.completed());
        assert!(!SourceStatus::Disabled.completed());
    }

    #[test]
    fn test_factor_sources() {
        assert_eq!(RiskFactor::AlertDensity.source(), SourceKind::Alerts);
        assert_eq!(RiskFactor::IndustrialSites.source(), SourceKind::Businesses);
    }
}
