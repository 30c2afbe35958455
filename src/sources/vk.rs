use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use super::{FeedSource, Post};
use crate::{config::VkConfig, error::VkError, retry::RetryPolicy};

pub struct VkClient {
    client: reqwest::Client,
    api_url: String,
    /// VK service access key
    token: String,
    /// Wall owner. Negative for groups
    group_id: String,
    api_version: String,
    count: u32,
    retry: RetryPolicy,
}

#[derive(Deserialize)]
struct VkEnvelope {
    error: Option<VkRawError>,
    response: Option<serde_json::Value>,
}
#[derive(Deserialize)]
struct VkRawError {
    error_code: i64,
    #[serde(default)]
    error_msg: String,
}

impl VkClient {
    pub fn new(cfg: &VkConfig, retry: RetryPolicy) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: cfg.api_url.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
            group_id: cfg.group_id.clone(),
            api_version: cfg.api_version.clone(),
            count: cfg.count,
            retry,
        }
    }

    /// Single `wall.get` call, no retries.
    pub async fn fetch_wall(&self) -> Result<Vec<Post>, VkError> {
        let count = self.count.to_string();

        let res = self
            .client
            .get(format!("{}/wall.get", self.api_url))
            .query(&[
                ("owner_id",     self.group_id.as_str()),
                ("count",        count.as_str()),
                ("filter",       "all"),
                ("access_token", self.token.as_str()),
                ("v",            self.api_version.as_str()),
            ])
            .send()
            .await?;

        let posts = parse_wall(&res.text().await?)?;
        debug!(count = posts.len(), "fetched wall");

        Ok(posts)
    }
}

/// Decode a `wall.get` body into unpinned posts, preserving order.
pub fn parse_wall(body: &str) -> Result<Vec<Post>, VkError> {
    let envelope: VkEnvelope = serde_json::from_str(body)?;

    if let Some(err) = envelope.error {
        return Err(VkError::Api {
            code: err.error_code,
            message: err.error_msg,
        });
    }

    let items = match envelope.response.and_then(|mut r| r.get_mut("items").map(|i| i.take())) {
        Some(items) => items,
        None => return Ok(vec![]),
    };

    let items: Vec<serde_json::Value> = serde_json::from_value(items)?;

    let posts = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Post>(item) {
            Ok(post) => Some(post),
            Err(e) => {
                warn!(error = %e, "skipping malformed wall item");
                None
            }
        })
        .filter(|p| !p.is_pinned)
        .collect();

    Ok(posts)
}

#[async_trait]
impl FeedSource for VkClient {
    async fn fetch_recent_posts(&self) -> Result<Vec<Post>, VkError> {
        self.retry.execute("wall.get", || self.fetch_wall()).await
    }
}
