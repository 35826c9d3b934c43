use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::collaborators::FeedbackSender;

#[derive(Debug, Error)]
pub enum FeedbackError {
    #[error("no API base URL configured for feedback")]
    NotConfigured,
    #[error("failed to submit feedback: {0}")]
    Request(#[source] reqwest::Error),
}

#[derive(Serialize)]
struct FeedbackPayload<'a> {
    feedback: &'a str,
}

/// Posts feedback as JSON to `{base_url}/feedback`.
#[derive(Debug, Clone)]
pub struct FeedbackClient {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl FeedbackClient {
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: Option<String>) -> Self {
        let base_url = base_url
            .map(|url| url.trim().trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty());
        Self { client, base_url }
    }

    #[must_use]
    pub fn endpoint(&self) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{base}/feedback"))
    }
}

#[async_trait]
impl FeedbackSender for FeedbackClient {
    async fn send(&self, feedback: &str) -> Result<reqwest::StatusCode, FeedbackError> {
        let endpoint = self.endpoint().ok_or(FeedbackError::NotConfigured)?;

        let response = self
            .client
            .post(&endpoint)
            .json(&FeedbackPayload { feedback })
            .send()
            .await
            .map_err(FeedbackError::Request)?;

        Ok(response.status())
    }
}
