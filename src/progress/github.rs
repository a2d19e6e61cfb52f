//! GitHub issue-comment progress channel

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::errors::{PixelbotError, Result};

use super::ProgressChannel;

const API_URL: &str = "https://api.github.com";
const USER_AGENT: &str = concat!("pixelbot/", env!("CARGO_PKG_VERSION"));

/// Publishes the progress message as a comment on the triggering issue.
pub struct GithubCommentChannel {
    client: reqwest::Client,
    repo: String,
    issue: u64,
    token: String,
}

#[derive(Debug, Deserialize)]
struct CreatedComment {
    id: u64,
}

impl GithubCommentChannel {
    pub fn new(repo: &str, issue: u64, token: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PixelbotError::NetworkError(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            repo: repo.to_string(),
            issue,
            token: token.to_string(),
        })
    }

    fn auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Accept", "application/vnd.github+json")
    }
}

#[async_trait]
impl ProgressChannel for GithubCommentChannel {
    async fn create(&self, body: &str) -> Result<u64> {
        let url = format!("{API_URL}/repos/{}/issues/{}/comments", self.repo, self.issue);

        let response = self
            .auth(self.client.post(&url))
            .json(&json!({ "body": body }))
            .send()
            .await
            .map_err(|e| PixelbotError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PixelbotError::NetworkError(format!(
                "comment creation failed: {status}: {text}"
            )));
        }

        let created: CreatedComment = response
            .json()
            .await
            .map_err(|e| PixelbotError::SerializationError(e.to_string()))?;

        debug!("Created progress comment {}", created.id);
        Ok(created.id)
    }

    async fn update(&self, id: u64, body: &str) -> Result<()> {
        let url = format!("{API_URL}/repos/{}/issues/comments/{id}", self.repo);

        let response = self
            .auth(self.client.patch(&url))
            .json(&json!({ "body": body }))
            .send()
            .await
            .map_err(|e| PixelbotError::NetworkError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(PixelbotError::NetworkError(format!(
                "comment update failed: {status}: {text}"
            )));
        }

        Ok(())
    }
}
