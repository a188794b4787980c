//! Sentinel-2 imagery from the Sentinel Hub Process API.

use crate::config::EndpointsConfig;
use crate::error::AdapterResult;
use crate::http::{self, TokenResponse};
use crate::models::{ImageLayer, Region, SatelliteImage, SourceKind};
use crate::sources::{collect_partial, SourceAdapter, SourceRecords};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use std::path::PathBuf;
use tracing::{debug, info, warn};

const IMAGE_SIZE: u32 = 512;

const TRUE_COLOR_SCRIPT: &str = r#"//VERSION=3
function setup() {
  return { input: [{ bands: ["B02", "B03", "B04"] }], output: { bands: 3 } };
}
function evaluatePixel(sample) {
  return [2.5 * sample.B04, 2.5 * sample.B03, 2.5 * sample.B02];
}
"#;

const NDVI_SCRIPT: &str = r#"//VERSION=3
function setup() {
  return { input: [{ bands: ["B04", "B08"] }], output: { bands: 3 } };
}
function evaluatePixel(sample) {
  let ndvi = (sample.B08 - sample.B04) / (sample.B08 + sample.B04);
  if (ndvi < -0.2) return [0, 0, 0.3];
  if (ndvi < 0.0) return [0.5, 0.4, 0.3];
  if (ndvi < 0.1) return [0.8, 0.8, 0.4];
  if (ndvi < 0.3) return [0.5, 0.7, 0.3];
  if (ndvi < 0.5) return [0.3, 0.6, 0.2];
  if (ndvi < 0.7) return [0.1, 0.5, 0.1];
  return [0.0, 0.4, 0.0];
}
"#;

impl ImageLayer {
    fn evalscript(&self) -> &'static str {
        match self {
            ImageLayer::TrueColor => TRUE_COLOR_SCRIPT,
            ImageLayer::Ndvi => NDVI_SCRIPT,
        }
    }

    fn file_suffix(&self) -> &'static str {
        match self {
            ImageLayer::TrueColor => "true_color",
            ImageLayer::Ndvi => "ndvi",
        }
    }
}

pub struct SatelliteAdapter {
    client: reqwest::Client,
    process_url: String,
    token_url: String,
    client_id: String,
    client_secret: String,
    output_dir: PathBuf,
}

impl SatelliteAdapter {
    pub fn new(
        client: reqwest::Client,
        endpoints: &EndpointsConfig,
        client_id: &str,
        client_secret: &str,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            client,
            process_url: format!(
                "{}/api/v1/process",
                endpoints.sentinelhub_url.trim_end_matches('/')
            ),
            token_url: endpoints.sentinelhub_token_url.clone(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            output_dir,
        }
    }

    async fn access_token(&self) -> AdapterResult<String> {
        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await?;
        let token: TokenResponse = http::json_body(response).await?;
        Ok(token.access_token)
    }

    fn process_request(region: &Region, layer: ImageLayer) -> serde_json::Value {
        let bbox = region.bounding_box();
        let now = Utc::now();
        json!({
            "input": {
                "bounds": {
                    "bbox": [bbox.min_lon, bbox.min_lat, bbox.max_lon, bbox.max_lat],
                    "properties": {"crs": "http://www.opengis.net/def/crs/EPSG/0/4326"}
                },
                "data": [{
                    "type": "sentinel-2-l2a",
                    "dataFilter": {
                        "timeRange": {
                            "from": region.window_start(now).to_rfc3339(),
                            "to": now.to_rfc3339()
                        },
                        "mosaickingOrder": "mostRecent"
                    }
                }]
            },
            "output": {
                "width": IMAGE_SIZE,
                "height": IMAGE_SIZE,
                "responses": [{"identifier": "default", "format": {"type": "image/png"}}]
            },
            "evalscript": layer.evalscript()
        })
    }

    async fn render(
        &self,
        token: &str,
        region: &Region,
        layer: ImageLayer,
    ) -> AdapterResult<SatelliteImage> {
        let response = self
            .client
            .post(&self.process_url)
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "image/png")
            .json(&Self::process_request(region, layer))
            .send()
            .await?;
        let bytes = http::check_status(response).await?.bytes().await?;

        let dir = self.output_dir.join(region.label());
        tokio::fs::create_dir_all(&dir).await?;
        let path = dir.join(format!("{}_{}.png", region.label(), layer.file_suffix()));
        tokio::fs::write(&path, &bytes).await?;
        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());

        let now = Utc::now();
        Ok(SatelliteImage {
            layer,
            path,
            window_start: region.window_start(now).date_naive(),
            window_end: now.date_naive(),
        })
    }
}

#[async_trait]
impl SourceAdapter for SatelliteAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Satellite
    }

    async fn fetch(&self, region: &Region) -> AdapterResult<SourceRecords> {
        let token = self.access_token().await?;

        let layers = [ImageLayer::TrueColor, ImageLayer::Ndvi];
        let mut images = Vec::new();
        let mut errors = Vec::new();
        for layer in layers {
            match self.render(&token, region, layer).await {
                Ok(image) => images.push(image),
                Err(e) => {
                    warn!("{} image failed: {}", layer, e);
                    errors.push((layer.to_string(), e));
                }
            }
        }

        info!(
            "Saved {} of {} satellite images under {}",
            images.len(),
            layers.len(),
            self.output_dir.join(region.label()).display()
        );
        collect_partial(SourceRecords::Satellite(images), errors, layers.len())
    }
}
