//! Shared HTTP client plumbing for the geocoder and the source adapters.

use crate::config::HttpConfig;
use crate::error::{AdapterError, AdapterResult};
use anyhow::{Context, Result};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Build the client shared (by clone) across all adapters.
pub fn build_client(config: &HttpConfig) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .user_agent(config.user_agent.clone())
        .build()
        .context("Failed to create HTTP client")
}

/// Map non-success statuses to adapter errors.
pub async fn check_status(response: Response) -> AdapterResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(match status {
        StatusCode::TOO_MANY_REQUESTS => AdapterError::RateLimited,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            AdapterError::Auth(format!("{}: {}", status, truncate(&body, 200)))
        }
        _ => AdapterError::Status {
            status: status.as_u16(),
            body: truncate(&body, 500),
        },
    })
}

/// Check the status and decode a JSON body.
pub async fn json_body<T: DeserializeOwned>(response: Response) -> AdapterResult<T> {
    let response = check_status(response).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| AdapterError::Decode(e.to_string()))
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        text.to_string()
    } else {
        let cut: String = text.chars().take(max).collect();
        format!("{}...", cut)
    }
}

/// OAuth2 token response shared by the client-credentials flows.
#[derive(Debug, serde::Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn get(server: &MockServer, status: u16) -> AdapterResult<Response> {
        Mock::given(method("GET"))
            .and(path("/x"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(server)
            .await;
        let response = reqwest::get(format!("{}/x", server.uri())).await?;
        check_status(response).await
    }

    #[tokio::test]
    async fn test_rate_limited() {
        let server = MockServer::start().await;
        assert!(matches!(get(&server, 429).await, Err(AdapterError::RateLimited)));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        assert!(matches!(get(&server, 401).await, Err(AdapterError::Auth(_))));
    }

    #[tokio::test]
    async fn test_other_status() {
        let server = MockServer::start().await;
        match get(&server, 502).await {
            Err(AdapterError::Status { status, body }) => {
                assert_eq!(status, 502);
                assert_eq!(body, "nope");
            }
            other => panic!("unexpected: {:?}", other.map(|r| r.status())),
        }
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("abc", 5), "abc");
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn test_build_client() {
        assert!(build_client(&HttpConfig::default()).is_ok());
    }
}
