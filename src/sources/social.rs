//! Reddit discussion about the region.

use crate::config::{EndpointsConfig, SocialConfig};
use crate::error::{AdapterError, AdapterResult};
use crate::http::{self, TokenResponse};
use crate::models::{Region, SocialPost, SourceKind};
use crate::sources::{collect_partial, sentiment, SourceAdapter, SourceRecords};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

pub struct SocialAdapter {
    client: reqwest::Client,
    auth_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    user_agent: String,
    settings: SocialConfig,
}

#[derive(Debug, Deserialize)]
struct Listing {
    data: ListingData,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(default)]
    children: Vec<Child>,
}

#[derive(Debug, Deserialize)]
struct Child {
    data: Submission,
}

#[derive(Debug, Deserialize)]
struct Submission {
    id: String,
    title: String,
    #[serde(default)]
    selftext: String,
    subreddit: String,
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    permalink: Option<String>,
}

impl SocialAdapter {
    pub fn new(
        client: reqwest::Client,
        endpoints: &EndpointsConfig,
        client_id: &str,
        client_secret: &str,
        user_agent: &str,
        settings: SocialConfig,
    ) -> Self {
        Self {
            client,
            auth_url: endpoints.reddit_auth_url.clone(),
            api_url: endpoints.reddit_api_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            user_agent: user_agent.to_string(),
            settings,
        }
    }

    async fn access_token(&self) -> AdapterResult<String> {
        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;
        let token: TokenResponse = http::json_body(response).await?;
        Ok(token.access_token)
    }

    async fn search(
        &self,
        token: &str,
        query: &str,
        period: &str,
    ) -> AdapterResult<Vec<Submission>> {
        let limit = self.settings.max_posts_per_query.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.api_url))
            .bearer_auth(token)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .query(&[
                ("q", query),
                ("sort", "new"),
                ("t", period),
                ("type", "link"),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;
        let listing: Listing = http::json_body(response).await?;
        Ok(listing.data.children.into_iter().map(|c| c.data).collect())
    }

    /// Terms that appear in the text, plus the term whose search found it.
    fn topic_tags(&self, text: &str, found_by: &str) -> Vec<String> {
        let lower = text.to_lowercase();
        let mut tags: Vec<String> = self
            .settings
            .search_terms
            .iter()
            .filter(|term| term.as_str() == found_by || lower.contains(&term.to_lowercase()))
            .cloned()
            .collect();
        tags.sort();
        tags
    }

    fn to_post(&self, submission: Submission, found_by: &str) -> Option<SocialPost> {
        let timestamp = timestamp_from_epoch(submission.created_utc)?;
        let text = if submission.selftext.trim().is_empty() {
            submission.title
        } else {
            format!("{}\n\n{}", submission.title, submission.selftext)
        };

        Some(SocialPost {
            topic_tags: self.topic_tags(&text, found_by),
            sentiment_score: sentiment::polarity(&text),
            id: submission.id,
            timestamp,
            text,
            community: submission.subreddit,
            url: submission
                .permalink
                .map(|p| format!("https://www.reddit.com{}", p)),
            engagement: submission.score,
        })
    }
}

/// Smallest Reddit search period covering `days`.
fn search_period(days: u32) -> &'static str {
    match days {
        0..=1 => "day",
        2..=7 => "week",
        8..=31 => "month",
        32..=365 => "year",
        _ => "all",
    }
}

fn timestamp_from_epoch(seconds: f64) -> Option<DateTime<Utc>> {
    if !seconds.is_finite() {
        return None;
    }
    Utc.timestamp_opt(seconds as i64, 0).single()
}

#[async_trait]
impl SourceAdapter for SocialAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Social
    }

    async fn fetch(&self, region: &Region) -> AdapterResult<SourceRecords> {
        let Some(name) = region.name() else {
            return Err(AdapterError::Skipped(
                "social search needs a place name".to_string(),
            ));
        };

        let token = self.access_token().await?;
        let period = search_period(region.time_window_days());
        let since = region.window_start(Utc::now());

        let mut posts: BTreeMap<String, SocialPost> = BTreeMap::new();
        let mut errors = Vec::new();
        for term in &self.settings.search_terms {
            let query = format!("{} {}", name, term);
            let submissions = match self.search(&token, &query, period).await {
                Ok(submissions) => submissions,
                Err(e) => {
                    warn!("Search '{}' failed: {}", query, e);
                    errors.push((term.clone(), e));
                    continue;
                }
            };
            debug!("Search '{}' returned {} posts", query, submissions.len());

            for submission in submissions {
                let Some(post) = self.to_post(submission, term) else {
                    continue;
                };
                if post.timestamp < since {
                    continue;
                }
                match posts.get_mut(&post.id) {
                    Some(existing) => {
                        for tag in post.topic_tags {
                            if !existing.topic_tags.contains(&tag) {
                                existing.topic_tags.push(tag);
                            }
                        }
                        existing.topic_tags.sort();
                    }
                    None => {
                        posts.insert(post.id.clone(), post);
                    }
                }
            }
        }

        let mut posts: Vec<SocialPost> = posts.into_values().collect();
        posts.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));

        let attempted = self.settings.search_terms.len();
        info!(
            "Collected {} unique posts across {} of {} search terms",
            posts.len(),
            attempted - errors.len(),
            attempted
        );
        collect_partial(SourceRecords::Social(posts), errors, attempted)
    }
}
