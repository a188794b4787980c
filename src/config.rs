//! Configuration file handling.
//!
//! This module handles loading `.ecoprofiler.toml` files and layering the
//! environment and CLI arguments on top. The resulting `Config` is passed
//! explicitly to the resolver, the adapters and the aggregator.

use crate::error::ProfilerError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".ecoprofiler.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Region bounds and defaults.
    #[serde(default)]
    pub analysis: AnalysisConfig,

    /// API credentials. Usually supplied through the environment.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    /// Upstream API endpoints.
    #[serde(default)]
    pub endpoints: EndpointsConfig,

    /// HTTP client settings.
    #[serde(default)]
    pub http: HttpConfig,

    /// Forest alert filtering.
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Social media search settings.
    #[serde(default)]
    pub social: SocialConfig,

    /// Risk scoring weights.
    #[serde(default)]
    pub risk: RiskConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Root of the output tree (alerts, companies, satellite, reddit, reports, logs).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Log filter used when neither --verbose nor --quiet is given.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Persist per-source outputs under the data directory.
    #[serde(default = "default_true")]
    pub save_outputs: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            log_level: default_log_level(),
            save_outputs: true,
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_true() -> bool {
    true
}

/// Region defaults and bounds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_radius_km")]
    pub default_radius_km: f64,

    #[serde(default = "default_days_back")]
    pub default_days_back: u32,

    #[serde(default = "default_max_radius_km")]
    pub max_radius_km: f64,

    #[serde(default = "default_max_days_back")]
    pub max_days_back: u32,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            default_radius_km: default_radius_km(),
            default_days_back: default_days_back(),
            max_radius_km: default_max_radius_km(),
            max_days_back: default_max_days_back(),
        }
    }
}

fn default_radius_km() -> f64 {
    20.0
}

fn default_days_back() -> u32 {
    30
}

fn default_max_radius_km() -> f64 {
    100.0
}

fn default_max_days_back() -> u32 {
    365
}

/// Optional API credentials. A missing pair disables the matching source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reddit_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reddit_client_secret: Option<String>,
    #[serde(default = "default_reddit_user_agent")]
    pub reddit_user_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinelhub_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sentinelhub_client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geocoding_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gfw_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub opensanctions_api_key: Option<String>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            reddit_client_id: None,
            reddit_client_secret: None,
            reddit_user_agent: default_reddit_user_agent(),
            sentinelhub_client_id: None,
            sentinelhub_client_secret: None,
            geocoding_api_key: None,
            gfw_api_key: None,
            opensanctions_api_key: None,
        }
    }
}

fn default_reddit_user_agent() -> String {
    "EcoProfilerOSINT/1.0".to_string()
}

impl CredentialsConfig {
    /// Reddit client id and secret, if both are set.
    pub fn reddit(&self) -> Option<(&str, &str)> {
        Some((
            non_empty(&self.reddit_client_id)?,
            non_empty(&self.reddit_client_secret)?,
        ))
    }

    /// Sentinel Hub client id and secret, if both are set.
    pub fn sentinelhub(&self) -> Option<(&str, &str)> {
        Some((
            non_empty(&self.sentinelhub_client_id)?,
            non_empty(&self.sentinelhub_client_secret)?,
        ))
    }

    pub fn opensanctions(&self) -> Option<&str> {
        non_empty(&self.opensanctions_api_key)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

/// Upstream API endpoints. Overridable for mirrors and tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointsConfig {
    #[serde(default = "default_geocoding_url")]
    pub geocoding_url: String,
    #[serde(default = "default_gfw_url")]
    pub gfw_url: String,
    #[serde(default = "default_gfw_dataset")]
    pub gfw_dataset: String,
    #[serde(default = "default_sentinelhub_url")]
    pub sentinelhub_url: String,
    #[serde(default = "default_sentinelhub_token_url")]
    pub sentinelhub_token_url: String,
    #[serde(default = "default_wikidata_url")]
    pub wikidata_sparql_url: String,
    #[serde(default = "default_gleif_url")]
    pub gleif_url: String,
    #[serde(default = "default_opensanctions_url")]
    pub opensanctions_url: String,
    #[serde(default = "default_reddit_auth_url")]
    pub reddit_auth_url: String,
    #[serde(default = "default_reddit_api_url")]
    pub reddit_api_url: String,
    #[serde(default = "default_overpass_url")]
    pub overpass_url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            geocoding_url: default_geocoding_url(),
            gfw_url: default_gfw_url(),
            gfw_dataset: default_gfw_dataset(),
            sentinelhub_url: default_sentinelhub_url(),
            sentinelhub_token_url: default_sentinelhub_token_url(),
            wikidata_sparql_url: default_wikidata_url(),
            gleif_url: default_gleif_url(),
            opensanctions_url: default_opensanctions_url(),
            reddit_auth_url: default_reddit_auth_url(),
            reddit_api_url: default_reddit_api_url(),
            overpass_url: default_overpass_url(),
        }
    }
}

fn default_geocoding_url() -> String {
    "https://nominatim.openstreetmap.org".to_string()
}

fn default_gfw_url() -> String {
    "https://data-api.globalforestwatch.org".to_string()
}

fn default_gfw_dataset() -> String {
    "umd_glad_landsat_alerts".to_string()
}

fn default_sentinelhub_url() -> String {
    "https://services.sentinel-hub.com".to_string()
}

fn default_sentinelhub_token_url() -> String {
    "https://services.sentinel-hub.com/auth/realms/main/protocol/openid-connect/token".to_string()
}

fn default_wikidata_url() -> String {
    "https://query.wikidata.org/sparql".to_string()
}

fn default_gleif_url() -> String {
    "https://api.gleif.org/api/v1".to_string()
}

fn default_opensanctions_url() -> String {
    "https://api.opensanctions.org".to_string()
}

fn default_reddit_auth_url() -> String {
    "https://www.reddit.com/api/v1/access_token".to_string()
}

fn default_reddit_api_url() -> String {
    "https://oauth.reddit.com".to_string()
}

fn default_overpass_url() -> String {
    "https://overpass-api.de/api/interpreter".to_string()
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// User agent for APIs that require one (Nominatim, Wikidata).
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_seconds: default_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_timeout() -> u64 {
    60
}

fn default_user_agent() -> String {
    format!("ecoprofiler/{}", env!("CARGO_PKG_VERSION"))
}

/// Forest alert filtering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    /// Alerts below this confidence are dropped.
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,

    /// Maximum number of alerts requested.
    #[serde(default = "default_max_alerts")]
    pub max_alerts: usize,
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            min_confidence: default_min_confidence(),
            max_alerts: default_max_alerts(),
        }
    }
}

fn default_min_confidence() -> f64 {
    0.5
}

fn default_max_alerts() -> usize {
    1000
}

/// Social media search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Terms combined with the region name; matches become topic tags.
    #[serde(default = "default_search_terms")]
    pub search_terms: Vec<String>,

    /// Results requested per search term.
    #[serde(default = "default_max_posts")]
    pub max_posts_per_query: usize,
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            search_terms: default_search_terms(),
            max_posts_per_query: default_max_posts(),
        }
    }
}

fn default_search_terms() -> Vec<String> {
    vec![
        "illegal logging",
        "deforestation",
        "mining",
        "environmental crime",
        "pollution",
        "wildlife trafficking",
        "forest fire",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_max_posts() -> usize {
    100
}

/// Risk scoring weights and saturation points.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    #[serde(default = "default_alert_weight")]
    pub forest_alerts: f64,
    #[serde(default = "default_sanctions_weight")]
    pub sanctioned_companies: f64,
    #[serde(default = "default_sentiment_weight")]
    pub negative_sentiment: f64,
    #[serde(default = "default_industrial_weight")]
    pub industrial_sites: f64,

    /// Confidence-weighted alerts per km² at which the alert term saturates.
    #[serde(default = "default_alert_saturation")]
    pub alert_density_saturation: f64,
    /// Sanctioned entity count at which the sanctions term saturates.
    #[serde(default = "default_sanctions_saturation")]
    pub sanctions_saturation: usize,
    /// Industrial site count at which the industrial term saturates.
    #[serde(default = "default_industrial_saturation")]
    pub industrial_saturation: usize,
    /// Posts scoring below this polarity count as negative.
    #[serde(default = "default_negative_threshold")]
    pub negative_threshold: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            forest_alerts: default_alert_weight(),
            sanctioned_companies: default_sanctions_weight(),
            negative_sentiment: default_sentiment_weight(),
            industrial_sites: default_industrial_weight(),
            alert_density_saturation: default_alert_saturation(),
            sanctions_saturation: default_sanctions_saturation(),
            industrial_saturation: default_industrial_saturation(),
            negative_threshold: default_negative_threshold(),
        }
    }
}

fn default_alert_weight() -> f64 {
    0.4
}

fn default_sanctions_weight() -> f64 {
    0.3
}

fn default_sentiment_weight() -> f64 {
    0.2
}

fn default_industrial_weight() -> f64 {
    0.1
}

fn default_alert_saturation() -> f64 {
    0.05
}

fn default_sanctions_saturation() -> usize {
    3
}

fn default_industrial_saturation() -> usize {
    5
}

fn default_negative_threshold() -> f64 {
    -0.1
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Overlay values from the process environment.
    pub fn merge_with_env(&mut self) -> Result<(), ProfilerError> {
        self.merge_with_lookup(|key| std::env::var(key).ok())
    }

    /// Overlay values from an environment-like lookup.
    ///
    /// Unset or empty variables leave the current value in place.
    pub fn merge_with_lookup<F>(&mut self, lookup: F) -> Result<(), ProfilerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let creds = &mut self.credentials;
        for (key, slot) in [
            ("REDDIT_CLIENT_ID", &mut creds.reddit_client_id),
            ("REDDIT_CLIENT_SECRET", &mut creds.reddit_client_secret),
            ("SENTINELHUB_CLIENT_ID", &mut creds.sentinelhub_client_id),
            ("SENTINELHUB_CLIENT_SECRET", &mut creds.sentinelhub_client_secret),
            ("GEOCODING_API_KEY", &mut creds.geocoding_api_key),
            ("GFW_API_KEY", &mut creds.gfw_api_key),
            ("OPENSANCTIONS_API_KEY", &mut creds.opensanctions_api_key),
        ] {
            if let Some(value) = get(key) {
                *slot = Some(value);
            }
        }
        if let Some(agent) = get("REDDIT_USER_AGENT") {
            creds.reddit_user_agent = agent;
        }

        if let Some(value) = get("DEFAULT_RADIUS_KM") {
            self.analysis.default_radius_km = parse_env("DEFAULT_RADIUS_KM", &value)?;
        }
        if let Some(value) = get("DEFAULT_DAYS_BACK") {
            self.analysis.default_days_back = parse_env("DEFAULT_DAYS_BACK", &value)?;
        }
        if let Some(value) = get("MAX_RADIUS_KM") {
            self.analysis.max_radius_km = parse_env("MAX_RADIUS_KM", &value)?;
        }
        if let Some(value) = get("LOG_LEVEL") {
            self.general.log_level = value.to_lowercase();
        }
        if let Some(value) = get("ECOPROFILER_DATA_DIR") {
            self.general.data_dir = PathBuf::from(value);
        }

        Ok(())
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over the file and the environment.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref data_dir) = args.data_dir {
            self.general.data_dir = data_dir.clone();
        }

        if args.no_save {
            self.general.save_outputs = false;
        }

        if let Some(timeout) = args.timeout {
            self.http.timeout_seconds = timeout;
        }
    }

    /// Check bounds and weights for consistency.
    pub fn validate(&self) -> Result<(), ProfilerError> {
        let analysis = &self.analysis;

        if !(analysis.max_radius_km > 0.0) {
            return Err(ProfilerError::Config(
                "max_radius_km must be positive".to_string(),
            ));
        }
        if !(analysis.default_radius_km > 0.0) || analysis.default_radius_km > analysis.max_radius_km
        {
            return Err(ProfilerError::Config(format!(
                "default_radius_km must be in (0, {}]",
                analysis.max_radius_km
            )));
        }
        if analysis.max_days_back == 0 {
            return Err(ProfilerError::Config(
                "max_days_back must be at least 1".to_string(),
            ));
        }
        if analysis.default_days_back == 0 || analysis.default_days_back > analysis.max_days_back {
            return Err(ProfilerError::Config(format!(
                "default_days_back must be in [1, {}]",
                analysis.max_days_back
            )));
        }

        let risk = &self.risk;
        let weights = [
            risk.forest_alerts,
            risk.sanctioned_companies,
            risk.negative_sentiment,
            risk.industrial_sites,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(ProfilerError::Config(
                "risk weights must be non-negative".to_string(),
            ));
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(ProfilerError::Config(
                "at least one risk weight must be positive".to_string(),
            ));
        }
        if !(risk.alert_density_saturation > 0.0)
            || risk.sanctions_saturation == 0
            || risk.industrial_saturation == 0
        {
            return Err(ProfilerError::Config(
                "risk saturation points must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ProfilerError> {
    value
        .trim()
        .parse()
        .map_err(|_| ProfilerError::Config(format!("{} has an invalid value: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.analysis.default_radius_km, 20.0);
        assert_eq!(config.analysis.default_days_back, 30);
        assert_eq!(config.analysis.max_radius_km, 100.0);
        assert_eq!(config.risk.forest_alerts, 0.4);
        assert!(config.credentials.reddit().is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml_content = r#"
[general]
data_dir = "/tmp/eco"

[analysis]
max_radius_km = 50.0

[risk]
forest_alerts = 0.7
industrial_sites = 0.0
"#;

        let config: Config = toml::from_str(toml_content).unwrap();
        assert_eq!(config.general.data_dir, PathBuf::from("/tmp/eco"));
        assert_eq!(config.analysis.max_radius_km, 50.0);
        assert_eq!(config.analysis.default_radius_km, 20.0);
        assert_eq!(config.risk.forest_alerts, 0.7);
        assert_eq!(config.risk.industrial_sites, 0.0);
        assert_eq!(config.risk.sanctioned_companies, 0.3);
    }

    #[test]
    fn test_env_overlay() {
        let mut config = Config::default();
        config
            .merge_with_lookup(lookup(&[
                ("REDDIT_CLIENT_ID", "id"),
                ("REDDIT_CLIENT_SECRET", "secret"),
                ("REDDIT_USER_AGENT", "agent/2.0"),
                ("DEFAULT_RADIUS_KM", "15"),
                ("DEFAULT_DAYS_BACK", "14"),
                ("MAX_RADIUS_KM", "80"),
                ("LOG_LEVEL", "DEBUG"),
                ("SENTINELHUB_CLIENT_ID", ""),
            ]))
            .unwrap();

        assert_eq!(config.credentials.reddit(), Some(("id", "secret")));
        assert_eq!(config.credentials.reddit_user_agent, "agent/2.0");
        assert_eq!(config.analysis.default_radius_km, 15.0);
        assert_eq!(config.analysis.default_days_back, 14);
        assert_eq!(config.analysis.max_radius_km, 80.0);
        assert_eq!(config.general.log_level, "debug");
        assert!(config.credentials.sentinelhub().is_none());
    }

    #[test]
    fn test_env_overlay_rejects_bad_number() {
        let mut config = Config::default();
        let err = config
            .merge_with_lookup(lookup(&[("MAX_RADIUS_KM", "far")]))
            .unwrap_err();
        assert!(err.to_string().contains("MAX_RADIUS_KM"));
    }

    #[test]
    fn test_validate_bounds() {
        let mut config = Config::default();
        config.analysis.default_radius_km = 150.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.risk.forest_alerts = -1.0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.risk = RiskConfig {
            forest_alerts: 0.0,
            sanctioned_companies: 0.0,
            negative_sentiment: 0.0,
            industrial_sites: 0.0,
            ..RiskConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_toml_generation() {
        let toml_str = Config::default_toml();
        assert!(!toml_str.is_empty());
        assert!(toml_str.contains("[general]"));
        assert!(toml_str.contains("[analysis]"));
        assert!(toml_str.contains("[risk]"));
        assert!(!toml_str.contains("reddit_client_secret"));
    }
}
